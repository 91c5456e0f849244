//! Human-readable report identifiers (`RPT000123`), one counter per calendar year.
//!
//! Allocation is a single atomic increment on the store, so concurrent callers never observe the
//! same value. Gaps are tolerated: a failed persist burns its number, and deleting the newest
//! report of a year only steps the counter back once.

use crate::constants::{REPORT_COUNTER_SCOPE, REPORT_ID_DIGITS, REPORT_ID_PREFIX};
use crate::error::StoreResult;
use crate::store::CounterStore;

/// A sequence value and its formatted report id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedId {
    pub year: i32,
    pub sequence: u32,
    pub report_id: String,
}

/// Counter name for a year (`report_2025`).
pub fn counter_name(year: i32) -> String {
    format!("{REPORT_COUNTER_SCOPE}_{year}")
}

/// Formats a sequence value as a report id, zero-padded to six digits.
///
/// Values beyond six digits are not truncated.
pub fn format_report_id(sequence: u32) -> String {
    format!("{REPORT_ID_PREFIX}{sequence:0width$}", width = REPORT_ID_DIGITS)
}

pub struct SequenceGenerator<'a, S> {
    store: &'a S,
}

impl<'a, S: CounterStore> SequenceGenerator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Allocates the next identifier for `year`, creating the counter at 1 when absent.
    pub fn next(&self, year: i32) -> StoreResult<AllocatedId> {
        let sequence = self.store.increment_counter(&counter_name(year))?;
        Ok(Self::allocated(year, sequence))
    }

    /// Force-advances the counter past a value that turned out to be taken.
    ///
    /// The new value is at least `floor`, and always greater than the current value.
    pub fn bump(&self, year: i32, floor: u32) -> StoreResult<AllocatedId> {
        let sequence = self.store.advance_counter(&counter_name(year), floor)?;
        tracing::debug!(year, sequence, "advanced report counter after id conflict");
        Ok(Self::allocated(year, sequence))
    }

    /// Steps the counter back by one if it still points at `sequence`.
    ///
    /// Returns whether the counter moved. A counter that has already advanced past `sequence`
    /// is left alone so it never regresses onto a number in use.
    pub fn release(&self, year: i32, sequence: u32) -> StoreResult<bool> {
        self.store
            .decrement_counter_if(&counter_name(year), sequence)
    }

    fn allocated(year: i32, sequence: u32) -> AllocatedId {
        AllocatedId {
            year,
            sequence,
            report_id: format_report_id(sequence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_format_report_id_pads_to_six_digits() {
        assert_eq!(format_report_id(1), "RPT000001");
        assert_eq!(format_report_id(123456), "RPT123456");
        assert_eq!(format_report_id(1234567), "RPT1234567");
    }

    #[test]
    fn test_next_is_per_year() {
        let store = SqliteStore::open_in_memory().expect("open should succeed");
        let generator = SequenceGenerator::new(&store);

        assert_eq!(generator.next(2025).unwrap().report_id, "RPT000001");
        assert_eq!(generator.next(2025).unwrap().report_id, "RPT000002");
        assert_eq!(generator.next(2026).unwrap().report_id, "RPT000001");
    }

    #[test]
    fn test_bump_skips_past_floor() {
        let store = SqliteStore::open_in_memory().expect("open should succeed");
        let generator = SequenceGenerator::new(&store);
        generator.next(2025).unwrap();

        let bumped = generator.bump(2025, 8).unwrap();
        assert_eq!(bumped.sequence, 8);
        assert_eq!(generator.next(2025).unwrap().sequence, 9);
    }

    #[test]
    fn test_release_only_when_counter_unchanged() {
        let store = SqliteStore::open_in_memory().expect("open should succeed");
        let generator = SequenceGenerator::new(&store);
        let first = generator.next(2025).unwrap();
        generator.next(2025).unwrap();

        assert!(!generator.release(2025, first.sequence).unwrap());
        assert!(generator.release(2025, 2).unwrap());
        assert_eq!(generator.next(2025).unwrap().sequence, 2);
    }

    #[test]
    fn test_concurrent_allocation_yields_distinct_ids() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteStore::open(&temp_dir.path().join("reports.db")).expect("open should succeed"),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let generator = SequenceGenerator::new(store.as_ref());
                    (0..25)
                        .map(|_| generator.next(2025).expect("allocation should succeed").sequence)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for sequence in handle.join().expect("thread should not panic") {
                assert!(seen.insert(sequence), "sequence {sequence} allocated twice");
            }
        }
        assert_eq!(seen.len(), 200);
        assert_eq!(seen.iter().max(), Some(&200));
    }
}
