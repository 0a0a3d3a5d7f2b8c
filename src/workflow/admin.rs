//! Admin console: catalog CRUD, payment configuration and bulk reset.
//!
//! The console keeps a local mirror fed by the registry's push updates. Every
//! write goes through the [`WriteGuard`] so its own echo cannot revert the mirror.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use serde::Serialize;

use super::guard::{EntityFamily, WriteGuard, WriteKind};
use crate::errors::AppError;
use crate::models::{
    initial_catalog, Category, Gift, GiftForm, RegistryConfig, RegistrySummary,
};
use crate::registry::{dedup_by_id, RegistryService, Subscription};

/// Two-step confirmation in front of the irreversible bulk reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResetConfirmation {
    #[default]
    Idle,
    AwaitingFirst,
    AwaitingSecond,
}

/// Result of one confirmation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum ConfirmOutcome {
    AwaitingSecondConfirmation,
    Executed(ResetOutcome),
}

/// Per-record results of a bulk reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
    pub reset_ids: Vec<i64>,
    pub failures: Vec<ResetFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetFailure {
    pub id: i64,
    pub message: String,
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedForm {
    pub name: String,
    pub price: f64,
    pub category: Category,
    pub icon: String,
    pub description: String,
}

impl ValidatedForm {
    fn apply_to(self, gift: Gift) -> Gift {
        Gift {
            name: self.name,
            price: self.price,
            open_amount: self.category == Category::Surprise,
            category: self.category,
            icon: self.icon,
            description: self.description,
            ..gift
        }
    }
}

/// Check the add/edit form.
pub fn validate_form(form: &GiftForm) -> Result<ValidatedForm, AppError> {
    let name = form.name.trim();
    let icon = form.icon.trim();
    if name.is_empty() || icon.is_empty() {
        return Err(AppError::Validation(
            "Name and icon are required".to_string(),
        ));
    }

    let price = parse_price(&form.price)
        .ok_or_else(|| AppError::Validation("Please enter a valid price".to_string()))?;

    let category = match form.category.trim() {
        "" => Category::default(),
        raw => Category::from_str(raw)
            .ok_or_else(|| AppError::Validation(format!("Unknown category: {}", raw)))?,
    };

    Ok(ValidatedForm {
        name: name.to_string(),
        price,
        category,
        icon: icon.to_string(),
        description: form.description.trim().to_string(),
    })
}

/// Non-negative price in plain (`4200.50`) or Brazilian (`4.200,50`) notation.
pub fn parse_price(input: &str) -> Option<f64> {
    let trimmed = input.trim().trim_start_matches("R$").trim();
    let plain = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };
    let price: f64 = plain.parse().ok()?;
    (price.is_finite() && price >= 0.0).then_some(price)
}

#[derive(Debug, Default)]
struct AdminView {
    gifts: Vec<Gift>,
    config: RegistryConfig,
    reset: ResetConfirmation,
}

/// Administrator's view of the registry.
#[derive(Clone)]
pub struct AdminConsole {
    registry: RegistryService,
    guard: WriteGuard,
    view: Arc<Mutex<AdminView>>,
    listeners: Arc<Mutex<Vec<Subscription>>>,
}

impl AdminConsole {
    pub fn new(registry: RegistryService) -> Self {
        Self {
            registry,
            guard: WriteGuard::new(),
            view: Arc::new(Mutex::new(AdminView {
                gifts: initial_catalog(),
                ..AdminView::default()
            })),
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Load the mirror from the registry.
    pub async fn load(&self) {
        let gifts = self.registry.fetch_all().await;
        let config = self.registry.fetch_config().await;

        let mut view = self.view();
        view.gifts = gifts;
        view.config = config;
    }

    /// Start mirroring push updates. Replaces any previous listeners.
    pub fn attach(&self) {
        let gifts_console = self.clone();
        let key_console = self.clone();
        let image_console = self.clone();

        let subscriptions = vec![
            self.registry
                .subscribe(move |gifts| gifts_console.receive_gifts(gifts)),
            self.registry
                .subscribe_key(move |key| key_console.receive_key(key)),
            self.registry
                .subscribe_image(move |image| image_console.receive_image(image)),
        ];

        *self.listeners() = subscriptions;
        tracing::info!("Admin console attached to registry updates");
    }

    /// Re-attach when a listener has stopped after a read error.
    pub fn reattach_if_stopped(&self) {
        let stopped = {
            let listeners = self.listeners();
            !listeners.is_empty() && listeners.iter().any(|l| !l.is_active())
        };
        if stopped {
            tracing::warn!("Admin console listener stopped, re-attaching");
            self.attach();
        }
    }

    /// Stop mirroring push updates.
    pub fn detach(&self) {
        for subscription in self.listeners().drain(..) {
            subscription.unsubscribe();
        }
    }

    /// Push update for the catalog; ignored while suppressed or empty.
    pub fn receive_gifts(&self, gifts: Vec<Gift>) {
        if gifts.is_empty() {
            return;
        }
        if self.guard.is_suppressed(EntityFamily::Gifts) {
            tracing::debug!("Ignoring catalog update during local write");
            self.schedule_resync(EntityFamily::Gifts);
            return;
        }
        self.view().gifts = gifts;
    }

    pub fn receive_key(&self, key: String) {
        if self.guard.is_suppressed(EntityFamily::PaymentKey) {
            tracing::debug!("Ignoring payment key update during local write");
            self.schedule_resync(EntityFamily::PaymentKey);
            return;
        }
        self.view().config.pix_key = key;
    }

    pub fn receive_image(&self, image: String) {
        if self.guard.is_suppressed(EntityFamily::QrImage) {
            tracing::debug!("Ignoring QR image update during local write");
            self.schedule_resync(EntityFamily::QrImage);
            return;
        }
        self.view().config.qrcode = image;
    }

    pub fn gifts(&self) -> Vec<Gift> {
        self.view().gifts.clone()
    }

    pub fn config(&self) -> RegistryConfig {
        self.view().config.clone()
    }

    pub fn summary(&self) -> RegistrySummary {
        RegistrySummary::from_gifts(&self.view().gifts)
    }

    pub fn reset_confirmation(&self) -> ResetConfirmation {
        self.view().reset
    }

    /// Replace the whole catalog from an untyped array.
    pub async fn save_raw_catalog(&self, gifts: &serde_json::Value) -> Result<(), AppError> {
        let ticket = self.guard.begin(WriteKind::Catalog);
        let stored = self.registry.replace_all(gifts).await?;

        self.view().gifts = stored;
        ticket.complete();
        Ok(())
    }

    /// Add a gift with the next free id in storage.
    pub async fn add_gift(&self, form: &GiftForm) -> Result<Gift, AppError> {
        let fields = validate_form(form)?;
        let mut stored = self.registry.try_fetch_all().await?;
        let id = stored.iter().map(|g| g.id).max().map_or(1, |max| max + 1);

        let gift = fields.apply_to(Gift {
            id,
            name: String::new(),
            price: 0.0,
            category: Category::default(),
            icon: String::new(),
            description: String::new(),
            reserved: false,
            reserved_by: String::new(),
            reserved_at: String::new(),
            open_amount: false,
        });

        let ticket = self.guard.begin(WriteKind::Gift);
        self.registry.upsert_one(&gift).await?;

        stored.push(gift.clone());
        self.view().gifts = dedup_by_id(stored);
        ticket.complete();

        tracing::info!("Added gift {} ({})", gift.id, gift.name);
        Ok(gift)
    }

    /// Change the form fields of a gift, keeping its stored reservation.
    pub async fn edit_gift(&self, id: i64, form: &GiftForm) -> Result<Gift, AppError> {
        let fields = validate_form(form)?;
        let mut stored = self.registry.try_fetch_all().await?;
        let existing = find_stored(&stored, id)?;
        let gift = fields.apply_to(existing);

        let ticket = self.guard.begin(WriteKind::Gift);
        self.registry.upsert_one(&gift).await?;

        if let Some(slot) = stored.iter_mut().find(|g| g.id == id) {
            *slot = gift.clone();
        }
        self.view().gifts = dedup_by_id(stored);
        ticket.complete();

        tracing::info!("Edited gift {} ({})", gift.id, gift.name);
        Ok(gift)
    }

    /// Delete a gift unless a guest has already reserved it.
    ///
    /// Checks the stored record, not the mirror, so a reservation made moments
    /// ago still blocks the delete.
    pub async fn delete_gift(&self, id: i64) -> Result<(), AppError> {
        let mut stored = self.registry.try_fetch_all().await?;
        let gift = find_stored(&stored, id)?;
        if gift.is_taken() {
            tracing::warn!("Refusing to delete reserved gift {}", id);
            return Err(AppError::Conflict(
                "Cannot delete a gift that has already been reserved".to_string(),
            ));
        }

        self.registry.delete_one(id).await?;
        stored.retain(|g| g.id != id);
        self.view().gifts = stored;
        Ok(())
    }

    pub async fn save_pix_key(&self, key: &str) -> Result<(), AppError> {
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "Payment key cannot be empty".to_string(),
            ));
        }

        let ticket = self.guard.begin(WriteKind::PaymentKey);
        self.registry.save_key(trimmed).await?;

        self.view().config.pix_key = trimmed.to_string();
        ticket.complete();
        Ok(())
    }

    pub async fn save_qrcode(&self, image: &str) -> Result<(), AppError> {
        let ticket = self.guard.begin(WriteKind::QrImage);
        self.registry.save_image(image).await?;

        self.view().config.qrcode = image.to_string();
        ticket.complete();
        Ok(())
    }

    /// First click on "reset": ask for confirmation.
    pub fn request_reset(&self) -> ResetConfirmation {
        let mut view = self.view();
        view.reset = ResetConfirmation::AwaitingFirst;
        view.reset
    }

    pub fn cancel_reset(&self) {
        self.view().reset = ResetConfirmation::Idle;
    }

    /// Advance the confirmation; the second confirmation runs the reset.
    pub async fn confirm_reset(&self) -> Result<ConfirmOutcome, AppError> {
        let step = {
            let mut view = self.view();
            let step = view.reset;
            view.reset = match step {
                ResetConfirmation::AwaitingFirst => ResetConfirmation::AwaitingSecond,
                _ => ResetConfirmation::Idle,
            };
            step
        };

        match step {
            ResetConfirmation::Idle => Err(AppError::Conflict(
                "No reset has been requested".to_string(),
            )),
            ResetConfirmation::AwaitingFirst => Ok(ConfirmOutcome::AwaitingSecondConfirmation),
            ResetConfirmation::AwaitingSecond => {
                Ok(ConfirmOutcome::Executed(self.reset_all().await?))
            }
        }
    }

    /// Clear every reservation, one record at a time.
    ///
    /// A failed read aborts before anything is written.
    async fn reset_all(&self) -> Result<ResetOutcome, AppError> {
        let ticket = self.guard.begin(WriteKind::BulkReset);
        let current = self.registry.try_fetch_all().await?;
        let cleared: Vec<Gift> = current.iter().map(Gift::without_reservation).collect();

        let results = join_all(cleared.iter().map(|g| self.registry.upsert_one(g))).await;

        let mut outcome = ResetOutcome::default();
        let mut mirror = Vec::with_capacity(current.len());
        for ((before, after), result) in current.into_iter().zip(cleared).zip(results) {
            match result {
                Ok(()) => {
                    outcome.reset_ids.push(after.id);
                    mirror.push(after);
                }
                Err(e) => {
                    outcome.failures.push(ResetFailure {
                        id: before.id,
                        message: e.message(),
                    });
                    mirror.push(before);
                }
            }
        }

        self.view().gifts = mirror;
        ticket.complete();

        tracing::info!(
            "Reset {} gifts ({} failures)",
            outcome.reset_ids.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    /// Re-read `family` once its suppression window closes, so an update
    /// ignored during a local write is not lost.
    fn schedule_resync(&self, family: EntityFamily) {
        if !self.guard.defer(family) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.guard.take_pending(family);
            return;
        };

        let console = self.clone();
        runtime.spawn(async move {
            while let Some(wait) = console.guard.remaining(family) {
                tokio::time::sleep(wait).await;
            }
            if console.guard.take_pending(family) {
                console.resync(family).await;
            }
        });
    }

    async fn resync(&self, family: EntityFamily) {
        tracing::debug!("Re-reading {:?} after suppressed updates", family);
        let result = match family {
            EntityFamily::Gifts => self
                .registry
                .try_fetch_all()
                .await
                .map(|gifts| self.receive_gifts(gifts)),
            EntityFamily::PaymentKey => self
                .registry
                .try_fetch_key()
                .await
                .map(|key| self.receive_key(key)),
            EntityFamily::QrImage => self
                .registry
                .try_fetch_image()
                .await
                .map(|image| self.receive_image(image)),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to re-read {:?}: {}", family, e);
        }
    }

    fn view(&self) -> MutexGuard<'_, AdminView> {
        self.view.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Subscription>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn find_stored(gifts: &[Gift], id: i64) -> Result<Gift, AppError> {
    gifts
        .iter()
        .find(|g| g.id == id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Gift {} not found", id)))
}
