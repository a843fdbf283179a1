//! Store capability consumed by the extension handler.
//!
//! A [`StoreProvider`] hands out one [`RegistrationStore`] per request. The
//! returned store owns whatever connection backs it and releases it on drop,
//! so every exit path of a request gives the connection back.
//!
//! [`MemoryStore`] is an in-process provider for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::errors::{QrDocError, QrDocResult};
use crate::server::database::{Registration, VALIDATION_VALID};

/// Point lookup and update of registrations over a single acquired connection.
#[async_trait]
pub trait RegistrationStore: Send {
    /// Fetch one registration. `Ok(None)` when no row has this id.
    async fn find_by_id(&mut self, id: i64) -> QrDocResult<Option<Registration>>;

    /// Set `expiry_date` and mark the registration valid.
    ///
    /// Returns `Ok(false)` when the store reports that no row was changed.
    async fn update_expiry(&mut self, id: i64, new_expiry: NaiveDateTime) -> QrDocResult<bool>;
}

/// Factory for per-request stores.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    async fn acquire(&self) -> QrDocResult<Box<dyn RegistrationStore>>;

    /// Cheap liveness probe for the health endpoint.
    async fn ping(&self) -> bool;

    /// Short backend name reported by the health endpoint.
    fn backend(&self) -> &'static str;
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: Mutex<HashMap<i64, Registration>>,
    acquisitions: AtomicUsize,
    updates: AtomicUsize,
    unavailable: AtomicBool,
    reject_updates: AtomicBool,
}

/// In-memory registration store.
///
/// Clones share the same rows. Counters record how many connections were
/// acquired and how many updates were applied, and two switches simulate an
/// unreachable backend or an update that affects no rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a registration.
    pub fn insert(&self, registration: Registration) -> QrDocResult<()> {
        let mut rows = self.lock()?;
        rows.insert(registration.id, registration);
        Ok(())
    }

    /// Snapshot of one registration.
    pub fn get(&self, id: i64) -> QrDocResult<Option<Registration>> {
        Ok(self.lock()?.get(&id).cloned())
    }

    /// Number of stores handed out by [`StoreProvider::acquire`].
    pub fn acquisitions(&self) -> usize {
        self.state.acquisitions.load(Ordering::SeqCst)
    }

    /// Number of updates that changed a row.
    pub fn updates(&self) -> usize {
        self.state.updates.load(Ordering::SeqCst)
    }

    /// Make `acquire` and `ping` fail as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every update report zero affected rows.
    pub fn set_reject_updates(&self, reject: bool) {
        self.state.reject_updates.store(reject, Ordering::SeqCst);
    }

    fn lock(&self) -> QrDocResult<std::sync::MutexGuard<'_, HashMap<i64, Registration>>> {
        self.state
            .rows
            .lock()
            .map_err(|_| QrDocError::DatabaseError("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn find_by_id(&mut self, id: i64) -> QrDocResult<Option<Registration>> {
        self.get(id)
    }

    async fn update_expiry(&mut self, id: i64, new_expiry: NaiveDateTime) -> QrDocResult<bool> {
        if self.state.reject_updates.load(Ordering::SeqCst) {
            return Ok(false);
        }

        let mut rows = self.lock()?;
        let Some(row) = rows.get_mut(&id) else {
            return Ok(false);
        };

        row.expiry_date = Some(new_expiry);
        row.validation = Some(VALIDATION_VALID.to_string());
        self.state.updates.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

#[async_trait]
impl StoreProvider for MemoryStore {
    async fn acquire(&self) -> QrDocResult<Box<dyn RegistrationStore>> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(QrDocError::DatabaseError(
                "memory store is unavailable".to_string(),
            ));
        }
        self.state.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }

    async fn ping(&self) -> bool {
        !self.state.unavailable.load(Ordering::SeqCst)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
