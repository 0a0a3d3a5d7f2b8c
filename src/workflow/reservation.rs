//! Guest reservation flow: pick a gift, commit it, show how to pay.

use chrono::Local;

use crate::errors::AppError;
use crate::models::{initial_catalog, Category, Gift, PaymentInstructions, RegistryConfig};
use crate::registry::{filter_by_category, RegistryService};

/// Where a guest is in the reservation dialog.
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationState {
    Browsing,
    GiftSelected { gift_id: i64 },
    Submitting { gift_id: i64 },
    PaymentShown(PaymentInstructions),
}

/// One guest's view of the registry and their in-progress reservation.
pub struct ReservationFlow {
    registry: RegistryService,
    catalog: Vec<Gift>,
    config: RegistryConfig,
    filter: Option<Category>,
    state: ReservationState,
}

impl ReservationFlow {
    pub fn new(registry: RegistryService) -> Self {
        Self {
            registry,
            catalog: initial_catalog(),
            config: RegistryConfig::default(),
            filter: None,
            state: ReservationState::Browsing,
        }
    }

    /// Load the catalog and payment configuration from the registry.
    pub async fn load(&mut self) {
        let gifts = self.registry.fetch_all().await;
        self.apply_catalog(gifts);
        self.config = self.registry.fetch_config().await;
    }

    /// Load for a reservation: a failed catalog read is an error instead of
    /// falling back to the initial catalog.
    pub async fn try_load(&mut self) -> Result<(), AppError> {
        let gifts = self.registry.try_fetch_all().await?;
        self.apply_catalog(gifts);
        self.config = self.registry.fetch_config().await;
        Ok(())
    }

    /// Real-time catalog update. Empty updates are ignored.
    pub fn apply_catalog(&mut self, gifts: Vec<Gift>) {
        if !gifts.is_empty() {
            self.catalog = gifts;
        }
    }

    pub fn catalog(&self) -> &[Gift] {
        &self.catalog
    }

    pub fn set_filter(&mut self, category: Option<Category>) {
        self.filter = category;
    }

    /// The catalog as currently filtered.
    pub fn visible_gifts(&self) -> Vec<Gift> {
        filter_by_category(&self.catalog, self.filter)
    }

    /// Open the dialog for a gift. Returns false (and changes nothing) for an
    /// unknown or already taken gift.
    pub fn select(&mut self, gift_id: i64) -> bool {
        if !matches!(
            self.state,
            ReservationState::Browsing | ReservationState::GiftSelected { .. }
        ) {
            return false;
        }

        match self.find(gift_id) {
            Some(gift) if !gift.is_taken() => {
                self.state = ReservationState::GiftSelected { gift_id };
                true
            }
            _ => false,
        }
    }

    /// Commit the selected gift.
    ///
    /// Open-amount gifts take the contribution from `amount_input` and are
    /// never written. Fixed-price gifts are marked reserved for `guest_name`
    /// and persisted before the payment view is shown.
    pub async fn submit(
        &mut self,
        guest_name: &str,
        amount_input: Option<&str>,
    ) -> Result<PaymentInstructions, AppError> {
        let ReservationState::GiftSelected { gift_id } = self.state else {
            return Err(AppError::Conflict("No gift selected".to_string()));
        };
        let gift = self
            .find(gift_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Gift {} not found", gift_id)))?;

        let (gift, amount) = if gift.open_amount {
            let amount = amount_input.and_then(parse_amount).ok_or_else(|| {
                AppError::Validation("Please enter a valid amount".to_string())
            })?;
            (gift, amount)
        } else {
            let guest = guest_name.trim();
            if guest.is_empty() {
                return Err(AppError::Validation("Guest name is required".to_string()));
            }

            self.state = ReservationState::Submitting { gift_id };
            let current = match self.stored_gift(gift_id).await {
                Ok(current) => current,
                Err(e) => {
                    self.state = ReservationState::GiftSelected { gift_id };
                    return Err(e);
                }
            };
            if current.is_taken() {
                tracing::warn!("Gift {} was reserved by another guest", gift_id);
                self.replace_local(current);
                self.state = ReservationState::Browsing;
                return Err(AppError::Conflict(format!(
                    "Gift {} has already been reserved",
                    gift_id
                )));
            }

            let reserved = Gift {
                reserved: true,
                reserved_by: guest.to_string(),
                reserved_at: Local::now().format("%d/%m/%Y %H:%M:%S").to_string(),
                ..current
            };

            if let Err(e) = self.registry.upsert_one(&reserved).await {
                tracing::error!("Failed to reserve gift {}: {}", gift_id, e);
                self.state = ReservationState::GiftSelected { gift_id };
                return Err(e);
            }

            tracing::info!("Gift {} reserved by {}", gift_id, reserved.reserved_by);
            self.replace_local(reserved.clone());
            let price = reserved.price;
            (reserved, price)
        };

        let payment = PaymentInstructions::new(&gift, amount, &self.config);
        self.state = ReservationState::PaymentShown(payment.clone());
        Ok(payment)
    }

    /// The record as stored right now; a failed read is an error.
    async fn stored_gift(&self, gift_id: i64) -> Result<Gift, AppError> {
        self.registry
            .try_fetch_all()
            .await?
            .into_iter()
            .find(|g| g.id == gift_id)
            .ok_or_else(|| AppError::NotFound(format!("Gift {} not found", gift_id)))
    }

    fn replace_local(&mut self, gift: Gift) {
        if let Some(slot) = self.catalog.iter_mut().find(|g| g.id == gift.id) {
            *slot = gift;
        }
    }

    fn find(&self, gift_id: i64) -> Option<&Gift> {
        self.catalog.iter().find(|g| g.id == gift_id)
    }
}

/// Dialog controls for long-lived guest sessions. The HTTP surface runs one
/// flow per request and never reaches them.
#[allow(dead_code)]
impl ReservationFlow {
    pub fn state(&self) -> &ReservationState {
        &self.state
    }

    /// Close the dialog without side effects. The payment view needs [`Self::dismiss`].
    pub fn cancel(&mut self) {
        if !matches!(self.state, ReservationState::PaymentShown(_)) {
            self.state = ReservationState::Browsing;
        }
    }

    /// Leave the payment view.
    pub fn dismiss(&mut self) {
        if matches!(self.state, ReservationState::PaymentShown(_)) {
            self.state = ReservationState::Browsing;
        }
    }
}

/// A strictly positive decimal; `,` is accepted as the decimal separator.
pub fn parse_amount(input: &str) -> Option<f64> {
    let amount: f64 = input.trim().replace(',', ".").parse().ok()?;
    (amount.is_finite() && amount > 0.0).then_some(amount)
}
