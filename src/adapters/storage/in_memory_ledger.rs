//! In-memory event ledger for tests and local runs.
//!
//! Mirrors the locking behaviour of a unique index: while one transaction
//! holds an uncommitted row for a key, a second transaction persisting the
//! same key waits until the first commits (then sees `Duplicate`) or rolls
//! back (then inserts).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::event::{DedupKey, Event, EventStatus};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{EventLedger, LedgerRecord, LedgerTransaction, PersistOutcome};

/// Ledger operations that can be made to fail in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerFault {
    Begin,
    Persist,
    MarkPublished,
    Commit,
    Ping,
}

#[derive(Default)]
struct LedgerState {
    committed: HashMap<DedupKey, LedgerRecord>,
    in_flight: HashSet<DedupKey>,
    faults: HashSet<LedgerFault>,
    rollbacks: usize,
}

struct Shared {
    state: Mutex<LedgerState>,
    released: Notify,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::database("In-memory ledger lock poisoned"))
    }

    fn check_fault(&self, fault: LedgerFault) -> Result<(), DomainError> {
        if self.lock()?.faults.contains(&fault) {
            return Err(DomainError::database(format!(
                "Injected ledger failure: {:?}",
                fault
            )));
        }
        Ok(())
    }

    /// Releases reserved keys without writing them.
    fn release(&self, keys: impl IntoIterator<Item = DedupKey>) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        for key in keys {
            state.in_flight.remove(&key);
        }
        drop(state);
        self.released.notify_waiters();
    }
}

/// In-memory ledger.
///
/// # Panics
///
/// Test helpers panic if the internal lock is poisoned. Port methods report
/// a poisoned lock as a `DatabaseError` instead.
#[derive(Clone)]
pub struct InMemoryEventLedger {
    shared: Arc<Shared>,
}

impl InMemoryEventLedger {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(LedgerState::default()),
                released: Notify::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.shared
            .state
            .lock()
            .expect("InMemoryEventLedger: state lock poisoned")
    }

    // === Test Helpers ===

    /// Makes every subsequent call of `fault`'s operation fail.
    pub fn inject_fault(&self, fault: LedgerFault) {
        self.state().faults.insert(fault);
    }

    pub fn clear_faults(&self) {
        self.state().faults.clear();
    }

    /// All committed rows, ordered by key.
    pub fn records(&self) -> Vec<LedgerRecord> {
        let mut records: Vec<_> = self.state().committed.values().cloned().collect();
        records.sort_by(|a, b| a.key().cmp(&b.key()));
        records
    }

    /// Number of committed rows.
    pub fn row_count(&self) -> usize {
        self.state().committed.len()
    }

    /// Keys reserved by transactions that have not finished.
    pub fn in_flight_count(&self) -> usize {
        self.state().in_flight.len()
    }

    pub fn rollback_count(&self) -> usize {
        self.state().rollbacks
    }
}

impl Default for InMemoryEventLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLedger for InMemoryEventLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DomainError> {
        self.shared.check_fault(LedgerFault::Begin)?;
        Ok(Box::new(InMemoryTransaction {
            shared: Arc::clone(&self.shared),
            staged: HashMap::new(),
        }))
    }

    async fn find(&self, key: &DedupKey) -> Result<Option<LedgerRecord>, DomainError> {
        Ok(self.shared.lock()?.committed.get(key).cloned())
    }

    async fn ping(&self) -> Result<Timestamp, DomainError> {
        self.shared.check_fault(LedgerFault::Ping)?;
        Ok(Timestamp::now())
    }
}

/// Transaction over [`InMemoryEventLedger`].
///
/// Rows are staged locally and become visible on commit. Keys of staged rows
/// stay reserved until the transaction commits, rolls back or is dropped.
struct InMemoryTransaction {
    shared: Arc<Shared>,
    staged: HashMap<DedupKey, LedgerRecord>,
}

impl InMemoryTransaction {
    fn finish(&mut self, committed: bool) -> Result<(), DomainError> {
        let staged = std::mem::take(&mut self.staged);
        let keys: Vec<DedupKey> = staged.keys().cloned().collect();
        {
            let mut state = self.shared.lock()?;
            if committed {
                state.committed.extend(staged);
            } else {
                state.rollbacks += 1;
            }
        }
        self.shared.release(keys);
        Ok(())
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn persist(&mut self, event: &Event) -> Result<PersistOutcome, DomainError> {
        self.shared.check_fault(LedgerFault::Persist)?;

        let key = event.key().clone();
        if self.staged.contains_key(&key) {
            return Ok(PersistOutcome::Duplicate);
        }

        let shared = Arc::clone(&self.shared);
        loop {
            // Registered before the lock is released so a concurrent
            // release cannot slip between the check and the wait.
            let released = shared.released.notified();
            {
                let mut state = shared.lock()?;
                if state.committed.contains_key(&key) {
                    return Ok(PersistOutcome::Duplicate);
                }
                if state.in_flight.insert(key.clone()) {
                    drop(state);
                    self.staged.insert(key, LedgerRecord::received(event));
                    return Ok(PersistOutcome::Inserted);
                }
            }
            released.await;
        }
    }

    async fn mark_published(&mut self, key: &DedupKey) -> Result<(), DomainError> {
        self.shared.check_fault(LedgerFault::MarkPublished)?;
        let record = self.staged.get_mut(key).ok_or_else(|| {
            DomainError::database(format!("No row for event {} in this transaction", key))
        })?;
        record.status = EventStatus::Published;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), DomainError> {
        // A failed commit falls through to Drop, which releases the keys.
        self.shared.check_fault(LedgerFault::Commit)?;
        self.finish(true)
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), DomainError> {
        self.finish(false)
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if self.staged.is_empty() {
            return;
        }
        let keys: Vec<DedupKey> = self.staged.drain().map(|(k, _)| k).collect();
        {
            let mut state = self.shared.state.lock().unwrap_or_else(|p| p.into_inner());
            state.rollbacks += 1;
        }
        self.shared.release(keys);
    }
}
