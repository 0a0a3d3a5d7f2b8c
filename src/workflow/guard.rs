//! Write-suppression guard.
//!
//! While a local write to an entity family is in flight, and for a short
//! cooldown after it completes, push updates for that family are ignored so a
//! late echo (or a stale snapshot) cannot revert the change just applied.
//! An update dropped this way marks the family pending, so the owner can
//! re-read once the window closes. Best effort only: this is not a
//! concurrency control.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Independently guarded groups of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityFamily {
    Gifts,
    PaymentKey,
    QrImage,
}

/// Kinds of admin writes, each with its own cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Catalog,
    Gift,
    BulkReset,
    PaymentKey,
    QrImage,
}

impl WriteKind {
    pub fn family(self) -> EntityFamily {
        match self {
            WriteKind::Catalog | WriteKind::Gift | WriteKind::BulkReset => EntityFamily::Gifts,
            WriteKind::PaymentKey => EntityFamily::PaymentKey,
            WriteKind::QrImage => EntityFamily::QrImage,
        }
    }

    pub fn cooldown(self) -> Duration {
        match self {
            WriteKind::Catalog => Duration::from_millis(2000),
            WriteKind::Gift => Duration::from_millis(1000),
            WriteKind::BulkReset => Duration::from_millis(500),
            WriteKind::PaymentKey => Duration::from_millis(1000),
            WriteKind::QrImage => Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Default)]
struct FamilyState {
    in_flight: usize,
    suppress_until: Option<Instant>,
    pending: bool,
}

/// Polling interval while a write is still in flight.
const IN_FLIGHT_POLL: Duration = Duration::from_millis(50);

/// Per-family in-flight counter plus a monotonic "suppress until" instant.
#[derive(Debug, Clone, Default)]
pub struct WriteGuard {
    families: Arc<Mutex<HashMap<EntityFamily, FamilyState>>>,
}

impl WriteGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a write as in flight until the returned ticket completes or drops.
    pub fn begin(&self, kind: WriteKind) -> WriteTicket {
        self.lock().entry(kind.family()).or_default().in_flight += 1;
        tracing::debug!("Suppressing {:?} updates during {:?} write", kind.family(), kind);
        WriteTicket {
            guard: self.clone(),
            kind,
            finished: false,
        }
    }

    pub fn is_suppressed(&self, family: EntityFamily) -> bool {
        self.is_suppressed_at(family, Instant::now())
    }

    pub fn is_suppressed_at(&self, family: EntityFamily, now: Instant) -> bool {
        match self.lock().get(&family) {
            Some(state) => {
                state.in_flight > 0 || state.suppress_until.is_some_and(|until| now < until)
            }
            None => false,
        }
    }

    /// Time left before updates for `family` apply again, or `None` once they do.
    pub fn remaining(&self, family: EntityFamily) -> Option<Duration> {
        let now = Instant::now();
        let families = self.lock();
        let state = families.get(&family)?;
        if state.in_flight > 0 {
            return Some(IN_FLIGHT_POLL);
        }
        state
            .suppress_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Record that an update for `family` was ignored.
    ///
    /// Returns true when the family was not already pending, i.e. the caller
    /// should schedule a re-read.
    pub fn defer(&self, family: EntityFamily) -> bool {
        let mut families = self.lock();
        let state = families.entry(family).or_default();
        !std::mem::replace(&mut state.pending, true)
    }

    /// Clear the pending mark, returning whether one was set.
    pub fn take_pending(&self, family: EntityFamily) -> bool {
        self.lock()
            .get_mut(&family)
            .is_some_and(|state| std::mem::take(&mut state.pending))
    }

    fn release(&self, kind: WriteKind, completed_at: Option<Instant>) {
        let mut families = self.lock();
        let state = families.entry(kind.family()).or_default();
        state.in_flight = state.in_flight.saturating_sub(1);

        if let Some(at) = completed_at {
            let until = at + kind.cooldown();
            state.suppress_until = Some(match state.suppress_until {
                Some(existing) if existing > until => existing,
                _ => until,
            });
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EntityFamily, FamilyState>> {
        self.families.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An in-flight write. Dropping it without completing releases the family at once.
#[must_use = "a dropped ticket releases the guard without a cooldown"]
pub struct WriteTicket {
    guard: WriteGuard,
    kind: WriteKind,
    finished: bool,
}

impl WriteTicket {
    /// The write succeeded; keep suppressing for the kind's cooldown.
    pub fn complete(self) {
        self.complete_at(Instant::now());
    }

    pub fn complete_at(mut self, at: Instant) {
        self.finished = true;
        self.guard.release(self.kind, Some(at));
    }
}

impl Drop for WriteTicket {
    fn drop(&mut self) {
        if !self.finished {
            self.guard.release(self.kind, None);
        }
    }
}
