//! The only write path that moves an item's current price.
//!
//! Every accepted update produces exactly one ledger record and the matching
//! current-price change, committed together through
//! [`PriceStore::commit_price_change`]. Updates to the same serial are
//! serialized by an in-process lock and, across processes, by the store's
//! version check.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};

use pricetrack_core::{ExpectedVersion, Price, PriceHistoryId, SerialNumber};
use pricetrack_inventory::{Item, PriceHistoryRecord, PriceUpdateInput};

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::policy::StorePolicy;
use crate::store::{CommittedPriceChange, PriceChange, PriceStore, StoreError};

/// Result of an accepted price update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdated {
    pub item: Item,
    pub record: PriceHistoryRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReconcileOutcome {
    InSync,
    Repaired { from: Price, to: Price },
}

/// One async mutex per serial currently being written.
#[derive(Debug, Default)]
struct SerialLocks {
    inner: Mutex<HashMap<SerialNumber, Arc<tokio::sync::Mutex<()>>>>,
}

impl SerialLocks {
    async fn acquire(&self, serial: &SerialNumber) -> ServiceResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .inner
                .lock()
                .map_err(|_| ServiceError::Store(StoreError::Backend("lock table poisoned".into())))?;
            // Entries nobody holds or waits on are dropped.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(serial.clone()).or_default())
        };
        Ok(lock.lock_owned().await)
    }
}

pub struct PriceUpdateCoordinator<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    policy: StorePolicy,
    locks: Arc<SerialLocks>,
}

impl<S: ?Sized> Clone for PriceUpdateCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S> PriceUpdateCoordinator<S>
where
    S: PriceStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, policy: StorePolicy) -> Self {
        Self {
            store,
            clock,
            policy,
            locks: Arc::new(SerialLocks::default()),
        }
    }

    /// Move `raw`'s current price to `input.new_price`, recording the change.
    ///
    /// Unknown serials fail with `NotFound` before the payload is validated.
    /// Contention and transient store failures are retried within the policy
    /// budget; the ledger record id is fixed up front so a retry after an
    /// ambiguous failure never appends twice.
    pub async fn update_price(&self, raw: &str, input: PriceUpdateInput) -> ServiceResult<PriceUpdated> {
        let serial = SerialNumber::lookup(raw).ok_or_else(ServiceError::item_not_found)?;
        self.load(&serial).await?;
        let update = input.validate()?;

        let _guard = self.locks.acquire(&serial).await?;
        let change_id = PriceHistoryId::new();

        let mut attempt = 1;
        loop {
            let item = self.load(&serial).await?;
            let change = PriceChange {
                id: change_id,
                record: item.price_change(update.new_price, update.notes.clone()),
                expected_version: ExpectedVersion::of(&item),
            };

            match self.commit(change).await {
                Ok(committed) => {
                    if committed.replayed {
                        // The item may have moved on since; only the ledger
                        // invariant is checked, not the returned snapshot.
                        self.verify_serial(&serial).await?;
                        info!(serial = %serial, change_id = %change_id, "price change already committed");
                    } else {
                        self.check_committed(&committed).await?;
                        info!(
                            serial = %serial,
                            old_price = %committed.record.old_price,
                            new_price = %committed.record.new_price,
                            "price updated"
                        );
                    }
                    return Ok(PriceUpdated {
                        item: committed.item,
                        record: committed.record,
                    });
                }
                Err(e @ (StoreError::Concurrency(_) | StoreError::Timeout(_) | StoreError::Unavailable(_)))
                    if attempt < self.policy.attempts =>
                {
                    warn!(serial = %serial, attempt, error = %e, "price commit failed, retrying");
                    tokio::time::sleep(self.policy.backoff_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Re-derive `raw`'s current price from its newest ledger record.
    pub async fn reconcile(&self, raw: &str) -> ServiceResult<ReconcileOutcome> {
        let serial = SerialNumber::lookup(raw).ok_or_else(ServiceError::item_not_found)?;
        let _guard = self.locks.acquire(&serial).await?;
        self.reconcile_locked(&serial).await
    }

    /// Check the current-price invariant for `raw` without changing anything.
    pub async fn verify(&self, raw: &str) -> ServiceResult<()> {
        let serial = SerialNumber::lookup(raw).ok_or_else(ServiceError::item_not_found)?;
        self.verify_serial(&serial).await
    }

    async fn verify_serial(&self, serial: &SerialNumber) -> ServiceResult<()> {
        let item = self.load(serial).await?;
        let latest = self
            .policy
            .read("latest_for_item", || self.store.latest_for_item(item.id))
            .await?;
        match latest {
            Some(record) if record.new_price != item.current_price => {
                error!(
                    serial = %serial,
                    expected_price = %record.new_price,
                    actual_price = %item.current_price,
                    "current price does not match latest price history record"
                );
                Err(ServiceError::Consistency(format!(
                    "{serial}: current price {} but latest history record says {}",
                    item.current_price, record.new_price
                )))
            }
            _ => Ok(()),
        }
    }

    async fn load(&self, serial: &SerialNumber) -> ServiceResult<Item> {
        self.policy
            .read("get_by_serial", || self.store.get_by_serial(serial))
            .await?
            .ok_or_else(ServiceError::item_not_found)
    }

    /// Run the commit on its own task so that dropping the caller's future
    /// cannot interrupt it between the ledger write and the price write.
    async fn commit(&self, change: PriceChange) -> Result<CommittedPriceChange, StoreError> {
        let store = Arc::clone(&self.store);
        let task = tokio::spawn(async move { store.commit_price_change(change).await });
        self.policy
            .bounded("commit_price_change", async {
                task.await
                    .map_err(|e| StoreError::Backend(format!("price commit task failed: {e}")))?
            })
            .await
    }

    async fn check_committed(&self, committed: &CommittedPriceChange) -> ServiceResult<()> {
        if committed.item.current_price == committed.record.new_price {
            return Ok(());
        }
        let serial = &committed.item.serial_number;
        error!(
            serial = %serial,
            expected_price = %committed.record.new_price,
            actual_price = %committed.item.current_price,
            "price commit left item out of step with its ledger"
        );
        if let Err(e) = self.reconcile_locked(serial).await {
            error!(serial = %serial, error = %e, "automatic reconciliation failed");
        }
        Err(ServiceError::Consistency(format!(
            "{serial}: committed price {} but item shows {}",
            committed.record.new_price, committed.item.current_price
        )))
    }

    async fn reconcile_locked(&self, serial: &SerialNumber) -> ServiceResult<ReconcileOutcome> {
        let item = self.load(serial).await?;
        let latest = self
            .policy
            .read("latest_for_item", || self.store.latest_for_item(item.id))
            .await?;
        let Some(latest) = latest else {
            return Ok(ReconcileOutcome::InSync);
        };
        if latest.new_price == item.current_price {
            return Ok(ReconcileOutcome::InSync);
        }

        let repaired = self
            .policy
            .bounded(
                "set_current_price",
                self.store.set_current_price(
                    serial,
                    latest.new_price,
                    ExpectedVersion::of(&item),
                    self.clock.now(),
                ),
            )
            .await?;
        warn!(
            serial = %serial,
            from = %item.current_price,
            to = %repaired.current_price,
            "current price repaired from price history"
        );
        Ok(ReconcileOutcome::Repaired {
            from: item.current_price,
            to: repaired.current_price,
        })
    }
}
