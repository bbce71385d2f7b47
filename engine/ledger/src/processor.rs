//! Event processor - the only writer of the shared ledger
//!
//! Every transition runs under a single async mutex, so concurrent events from
//! different connections can never interleave their read-modify-write. After a
//! successful transition the full ledger is persisted under the default label
//! and the answer is handed to the caller's publisher while the lock is still
//! held, which keeps broadcast order identical to mutation order.

use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::ledger::Ledger;
use crate::messages::{Answer, Event};
use crate::store::LedgerStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Applies inbound events to the shared ledger
pub struct EventProcessor {
    ledger: Mutex<Ledger>,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl EventProcessor {
    /// Create a processor around an existing ledger
    pub fn new(ledger: Ledger, store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self::with_clock(ledger, store, Arc::new(SystemClock), config)
    }

    /// Create a processor with a custom time source
    pub fn with_clock(
        mut ledger: Ledger,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Self {
        ledger.normalize();
        Self { ledger: Mutex::new(ledger), store, clock, config }
    }

    /// Load the ledger saved under the default label, or start empty
    pub async fn restore(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> LedgerResult<Self> {
        let ledger = match store.load(&config.default_label).await? {
            Some(ledger) => {
                info!(
                    "Restored ledger '{}' with {} users and {} history entries",
                    config.default_label,
                    ledger.users().len(),
                    ledger.history().len()
                );
                ledger
            }
            None => {
                info!("No saved ledger under '{}', starting empty", config.default_label);
                Ledger::new()
            }
        };

        Ok(Self::with_clock(ledger, store, clock, config))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Apply an event and return the answer to broadcast
    pub async fn apply(&self, event: Event) -> LedgerResult<Answer> {
        self.apply_and_publish(event, |_| {}).await
    }

    /// Apply an event and publish its answer before releasing the ledger lock
    ///
    /// `publish` is not called when the transition fails.
    pub async fn apply_and_publish<F>(&self, event: Event, publish: F) -> LedgerResult<Answer>
    where
        F: FnOnce(&Answer) + Send,
    {
        let mut ledger = self.ledger.lock().await;
        let now = self.clock.now();
        let kind = event.kind();

        let answer = match event {
            Event::NewUser { name } => {
                let user = ledger.add_user(name);
                debug!(user_id = user.id, "Added user '{}'", user.name);
                Answer::NewUser { user }
            }
            Event::UpdateDebt { id, debt } => {
                ledger.update_debt(id, debt, now, self.config.coalescing_window())?;
                Answer::UpdateDebt { id, debt }
            }
            Event::UpdatePrice { price } => {
                ledger.set_price(price);
                Answer::UpdatePrice { price }
            }
            Event::Reset { keep_participants } => {
                let label = self.config.archive_label(now);
                match self.store.save(&ledger, &label).await {
                    Ok(()) => info!("Archived ledger as '{}'", label),
                    Err(e) => error!("Failed to archive ledger as '{}': {}", label, e),
                }

                ledger.reset(keep_participants);
                info!(keep_participants, "Ledger reset");
                Answer::AllData { data: ledger.clone() }
            }
        };

        debug!(kind, "Applied event");

        // The mutation stands even if the save fails
        if let Err(e) = self.store.save(&ledger, &self.config.default_label).await {
            error!("Failed to persist ledger after {}: {}", kind, e);
        }

        publish(&answer);
        Ok(answer)
    }

    /// Run `f` against the current ledger while holding the lock
    pub async fn with_ledger<R>(&self, f: impl FnOnce(&Ledger) -> R) -> R {
        let ledger = self.ledger.lock().await;
        f(&ledger)
    }

    /// Clone of the current ledger
    pub async fn snapshot(&self) -> Ledger {
        self.ledger.lock().await.clone()
    }

    /// Persist the current ledger under the default label
    pub async fn flush(&self) -> LedgerResult<()> {
        let ledger = self.ledger.lock().await;
        self.store.save(&ledger, &self.config.default_label).await.map_err(|e| {
            warn!("Final ledger flush failed: {}", e);
            e
        })
    }
}
