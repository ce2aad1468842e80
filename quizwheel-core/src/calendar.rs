//! Calendar dates in the wheel's reference timezone.
//!
//! Eligibility is decided on plain calendar dates; timestamps only appear when
//! reporting when the next spin opens up.
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use std::sync::Mutex;

/// Source of "today" for eligibility comparisons.
pub trait Clock: Send + Sync {
    /// Current calendar date in the reference timezone.
    fn today(&self) -> NaiveDate;

    /// Reference timezone the dates are expressed in.
    fn offset(&self) -> FixedOffset;
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }

    fn offset(&self) -> FixedOffset {
        (**self).offset()
    }
}

/// Wall clock shifted into a fixed reference offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Clock pinned to a settable date.
#[derive(Debug)]
pub struct FixedClock {
    today: Mutex<NaiveDate>,
    offset: FixedOffset,
}

impl FixedClock {
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self::with_offset(today, utc_offset())
    }

    #[must_use]
    pub const fn with_offset(today: NaiveDate, offset: FixedOffset) -> Self {
        Self {
            today: Mutex::new(today),
            offset,
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.today.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = date;
    }

    /// Move the clock forward by whole days.
    pub fn advance_days(&self, days: u64) {
        let mut today = self
            .today
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *today = today.checked_add_days(Days::new(days)).unwrap_or(*today);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.today.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

#[must_use]
pub fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// Midnight at the start of `date` in the reference timezone.
#[must_use]
pub fn start_of_day(date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
    let midnight = date.and_time(NaiveTime::MIN);
    // Fixed offsets have no gaps or folds, so the mapping is always single.
    offset
        .from_local_datetime(&midnight)
        .single()
        .unwrap_or_else(|| DateTime::from_naive_utc_and_offset(midnight - offset, offset))
}

/// First instant on which an identifier that spun on `last_spin_date` may spin again.
///
/// Defined as the start of the following calendar day, independent of when the
/// request arrived.
#[must_use]
pub fn next_eligible_at(last_spin_date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
    let tomorrow = last_spin_date.succ_opt().unwrap_or(last_spin_date);
    start_of_day(tomorrow, offset)
}
