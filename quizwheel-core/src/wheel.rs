//! Daily wheel: eligibility checks and the atomic spin transaction.
//!
//! A spin reads the ledger, draws an outcome, and commits through
//! [`LedgerStore::upsert_spin`], whose date guard re-validates eligibility
//! inside the same atomic write. Two concurrent spins for one identifier on one
//! day therefore produce exactly one commit; the loser's drawn outcome is
//! discarded.
use chrono::{DateTime, FixedOffset};
use log::{debug, info, warn};
use rand::Rng;
use serde::Serialize;

use crate::calendar::{Clock, next_eligible_at};
use crate::config::{WIN_ODDS, WheelConfig};
use crate::eligibility::{Eligibility, can_spin};
use crate::error::{ConfigError, StorageError, WheelError};
use crate::identifier::Identifier;
use crate::ledger::{LedgerStore, SpinCommit, SpinLedgerEntry};

/// Draw a single independent outcome: a win with probability `1 / odds`.
///
/// `gen_range` samples uniformly without modulo bias. `odds` of zero is
/// treated as one.
pub fn draw_outcome<R: Rng + ?Sized>(rng: &mut R, odds: u32) -> bool {
    rng.gen_range(0..odds.max(1)) == 0
}

/// Committed spin as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinOutcome {
    pub won: bool,
    pub total_spins: u64,
    pub total_wins: u64,
    pub next_eligible_at: DateTime<FixedOffset>,
}

pub struct Wheel<S, C>
where
    S: LedgerStore,
    C: Clock,
{
    store: S,
    clock: C,
    win_odds: u32,
}

impl<S, C> Wheel<S, C>
where
    S: LedgerStore,
    C: Clock,
{
    /// Wheel with the default one-in-fifty odds.
    pub const fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            win_odds: WIN_ODDS,
        }
    }

    /// Wheel with configured odds.
    ///
    /// # Errors
    ///
    /// Returns the `ConfigError` from [`WheelConfig::validate`].
    pub fn with_config(store: S, clock: C, cfg: &WheelConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            store,
            clock,
            win_odds: cfg.win_odds,
        })
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Non-committing eligibility query.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the ledger cannot be read.
    pub fn check(&self, identifier: &Identifier) -> Result<Eligibility, WheelError> {
        let today = self.clock.today();
        let entry = self.read(identifier)?;
        let verdict = can_spin(entry.as_ref(), today, self.clock.offset());
        debug!(
            "wheel check {} on {today}: eligible={}",
            identifier.log_tag(),
            verdict.eligible
        );
        Ok(verdict)
    }

    /// Spin using the thread-local CSPRNG.
    ///
    /// # Errors
    ///
    /// See [`Wheel::spin_with_rng`].
    pub fn spin(&self, identifier: &Identifier) -> Result<SpinOutcome, WheelError> {
        self.spin_with_rng(identifier, &mut rand::thread_rng())
    }

    /// Run the spin transaction with an explicit randomness source.
    ///
    /// # Errors
    ///
    /// Returns `AlreadySpunToday` when a spin is already committed for today
    /// (no state changes) and `StorageUnavailable` when the ledger fails.
    pub fn spin_with_rng<R: Rng + ?Sized>(
        &self,
        identifier: &Identifier,
        rng: &mut R,
    ) -> Result<SpinOutcome, WheelError> {
        let today = self.clock.today();
        let offset = self.clock.offset();

        // Fast path; the authoritative guard is inside upsert_spin.
        let current = self.read(identifier)?;
        let verdict = can_spin(current.as_ref(), today, offset);
        if let Some(next_eligible_at) = verdict.next_eligible_at {
            debug!("wheel spin {} rejected before draw", identifier.log_tag());
            return Err(WheelError::AlreadySpunToday { next_eligible_at });
        }

        let won = draw_outcome(rng, self.win_odds);
        let commit = self
            .store
            .upsert_spin(identifier, today, won)
            .map_err(|err| storage_failure(identifier, err))?;

        match commit {
            SpinCommit::Committed(entry) => {
                info!(
                    "wheel spin committed for {} on {today}: won={won} spins={} wins={}",
                    identifier.log_tag(),
                    entry.total_spins,
                    entry.total_wins
                );
                Ok(outcome(won, &entry, offset))
            }
            SpinCommit::AlreadySpun(entry) => {
                debug!(
                    "wheel spin {} lost race for {today}",
                    identifier.log_tag()
                );
                Err(WheelError::AlreadySpunToday {
                    next_eligible_at: next_eligible_at(entry.last_spin_date, offset),
                })
            }
        }
    }

    fn read(&self, identifier: &Identifier) -> Result<Option<SpinLedgerEntry>, WheelError> {
        self.store
            .get(identifier)
            .map_err(|err| storage_failure(identifier, err))
    }
}

fn storage_failure(identifier: &Identifier, err: StorageError) -> WheelError {
    warn!("wheel storage failure for {}: {err}", identifier.log_tag());
    WheelError::StorageUnavailable(err)
}

fn outcome(won: bool, entry: &SpinLedgerEntry, offset: FixedOffset) -> SpinOutcome {
    SpinOutcome {
        won,
        total_spins: entry.total_spins,
        total_wins: entry.total_wins,
        next_eligible_at: next_eligible_at(entry.last_spin_date, offset),
    }
}
