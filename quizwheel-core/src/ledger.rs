//! Per-identifier spin ledger and its storage contract.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StorageError;
use crate::identifier::Identifier;

/// Durable spin record for one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinLedgerEntry {
    pub identifier: String,
    pub last_spin_date: NaiveDate,
    pub total_spins: u64,
    /// Never exceeds `total_spins`.
    pub total_wins: u64,
}

impl SpinLedgerEntry {
    /// Entry written by an identifier's first committed spin.
    #[must_use]
    pub fn first_spin(identifier: &Identifier, today: NaiveDate, won: bool) -> Self {
        Self {
            identifier: identifier.as_str().to_string(),
            last_spin_date: today,
            total_spins: 1,
            total_wins: u64::from(won),
        }
    }

    /// Whether a spin has already been committed on `today` (or later).
    #[must_use]
    pub fn spun_on_or_after(&self, today: NaiveDate) -> bool {
        self.last_spin_date >= today
    }

    /// Apply one committed spin in place.
    pub fn record_spin(&mut self, today: NaiveDate, won: bool) {
        self.last_spin_date = today;
        self.total_spins += 1;
        self.total_wins += u64::from(won);
    }
}

/// Result of a guarded upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpinCommit {
    /// The spin was recorded; carries the post-commit entry.
    Committed(SpinLedgerEntry),
    /// The date guard refused the write; carries the untouched entry.
    AlreadySpun(SpinLedgerEntry),
}

/// Storage of record for spin ledgers.
///
/// `upsert_spin` must evaluate the date guard and apply the write as one
/// indivisible step with respect to other calls for the same identifier.
pub trait LedgerStore: Send + Sync {
    /// Fetch the entry for `identifier`, if any.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` when the backing store cannot be read.
    fn get(&self, identifier: &Identifier) -> Result<Option<SpinLedgerEntry>, StorageError>;

    /// Create or increment the entry unless a spin is already recorded for `today`.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` when the backing store fails; no partial write
    /// is left behind.
    fn upsert_spin(
        &self,
        identifier: &Identifier,
        today: NaiveDate,
        won: bool,
    ) -> Result<SpinCommit, StorageError>;
}

impl<T: LedgerStore + ?Sized> LedgerStore for std::sync::Arc<T> {
    fn get(&self, identifier: &Identifier) -> Result<Option<SpinLedgerEntry>, StorageError> {
        (**self).get(identifier)
    }

    fn upsert_spin(
        &self,
        identifier: &Identifier,
        today: NaiveDate,
        won: bool,
    ) -> Result<SpinCommit, StorageError> {
        (**self).upsert_spin(identifier, today, won)
    }
}

/// In-process ledger; the map lock is held across the read-check-write.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<HashMap<String, SpinLedgerEntry>>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identifiers that have ever spun.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Poisoned` if a writer panicked while holding the lock.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.entries.lock().map_err(|_| StorageError::Poisoned)?.len())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Poisoned` if a writer panicked while holding the lock.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        self.len().map(|n| n == 0)
    }
}

impl LedgerStore for MemoryLedger {
    fn get(&self, identifier: &Identifier) -> Result<Option<SpinLedgerEntry>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(identifier.as_str()).cloned())
    }

    fn upsert_spin(
        &self,
        identifier: &Identifier,
        today: NaiveDate,
        won: bool,
    ) -> Result<SpinCommit, StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        match entries.get_mut(identifier.as_str()) {
            Some(entry) if entry.spun_on_or_after(today) => {
                Ok(SpinCommit::AlreadySpun(entry.clone()))
            }
            Some(entry) => {
                entry.record_spin(today, won);
                Ok(SpinCommit::Committed(entry.clone()))
            }
            None => {
                let entry = SpinLedgerEntry::first_spin(identifier, today, won);
                entries.insert(entry.identifier.clone(), entry.clone());
                Ok(SpinCommit::Committed(entry))
            }
        }
    }
}
