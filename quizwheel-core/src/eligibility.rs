//! Read-only decision on whether an identifier may spin today.
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;

use crate::calendar::next_eligible_at;
use crate::ledger::SpinLedgerEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub eligible: bool,
    /// Set only when `eligible` is false.
    pub next_eligible_at: Option<DateTime<FixedOffset>>,
}

impl Eligibility {
    #[must_use]
    pub const fn open() -> Self {
        Self {
            eligible: true,
            next_eligible_at: None,
        }
    }
}

/// Decide eligibility from the stored entry.
///
/// A stored date later than `today` only happens when the clock moved
/// backwards; it is treated like a same-day spin so the ledger date never
/// rewinds.
#[must_use]
pub fn can_spin(
    entry: Option<&SpinLedgerEntry>,
    today: NaiveDate,
    offset: FixedOffset,
) -> Eligibility {
    match entry {
        Some(entry) if entry.spun_on_or_after(today) => Eligibility {
            eligible: false,
            next_eligible_at: Some(next_eligible_at(entry.last_spin_date, offset)),
        },
        _ => Eligibility::open(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::utc_offset;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn entry(last: NaiveDate) -> SpinLedgerEntry {
        SpinLedgerEntry {
            identifier: "abc".to_string(),
            last_spin_date: last,
            total_spins: 3,
            total_wins: 1,
        }
    }

    #[test]
    fn absent_entry_is_eligible() {
        assert_eq!(can_spin(None, date(1), utc_offset()), Eligibility::open());
    }

    #[test]
    fn earlier_spin_is_eligible() {
        let e = entry(date(1));
        assert_eq!(can_spin(Some(&e), date(2), utc_offset()), Eligibility::open());
    }

    #[test]
    fn same_day_spin_points_at_next_midnight() {
        let e = entry(date(1));
        let verdict = can_spin(Some(&e), date(1), utc_offset());
        assert!(!verdict.eligible);
        assert_eq!(
            verdict.next_eligible_at.unwrap().to_rfc3339(),
            "2024-05-02T00:00:00+00:00"
        );
    }

    #[test]
    fn future_dated_entry_stays_ineligible() {
        let e = entry(date(3));
        let verdict = can_spin(Some(&e), date(1), utc_offset());
        assert!(!verdict.eligible);
        assert_eq!(
            verdict.next_eligible_at.unwrap().date_naive(),
            date(4)
        );
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(Eligibility::open()).unwrap();
        assert_eq!(json["eligible"], true);
        assert!(json["nextEligibleAt"].is_null());
    }
}
