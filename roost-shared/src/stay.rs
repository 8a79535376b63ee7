use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// A half-open stay interval: nights [check_in, check_out).
///
/// A one-night (day-use) stay is `check_out == check_in + 1 day`. Empty and
/// inverted ranges are rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, StayRangeError> {
        if check_out <= check_in {
            return Err(StayRangeError::Empty {
                check_in,
                check_out,
            });
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    /// Number of nights covered by the range.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Iterate every night in the range, in ascending date order.
    ///
    /// The ordering matters: inventory locks are acquired in iteration order,
    /// so every caller sees the same global key order.
    pub fn iter_nights(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.check_in;
        let count = self.nights();
        (0..count).map(move |offset| start + Duration::days(offset))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.check_in && date < self.check_out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StayRangeError {
    #[error("stay range is empty or inverted: {check_in} to {check_out}")]
    Empty {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_nights_and_iteration_order() {
        let range = StayRange::new(d("2026-09-10"), d("2026-09-13")).unwrap();
        assert_eq!(range.nights(), 3);

        let nights: Vec<NaiveDate> = range.iter_nights().collect();
        assert_eq!(
            nights,
            vec![d("2026-09-10"), d("2026-09-11"), d("2026-09-12")]
        );
    }

    #[test]
    fn test_day_use_is_single_night() {
        let range = StayRange::new(d("2026-09-10"), d("2026-09-11")).unwrap();
        assert_eq!(range.nights(), 1);
        assert!(range.contains(d("2026-09-10")));
        assert!(!range.contains(d("2026-09-11")));
    }

    #[test]
    fn test_rejects_empty_and_inverted() {
        assert!(StayRange::new(d("2026-09-10"), d("2026-09-10")).is_err());
        assert!(StayRange::new(d("2026-09-11"), d("2026-09-10")).is_err());
    }
}
