use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// The half-open scheduled interval `[pickup_time, delivery_time)` reserved
/// for a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DispatchError> {
        if start >= end {
            return Err(DispatchError::Validation(format!(
                "window start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Half-open overlap: windows that merely touch do not conflict.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::TimeWindow;

    fn window(start_h: u32, end_h: u32) -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 6, 1, start_h, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 1, end_h, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_inverted_window() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        assert!(TimeWindow::new(start, end).is_err());
        assert!(TimeWindow::new(start, start).is_err());
    }

    #[test]
    fn overlapping_windows_conflict() {
        assert!(window(10, 11).overlaps(&window(10, 11)));
        assert!(window(10, 11).overlaps(&window(10, 12)));
        assert!(window(10, 12).overlaps(&window(11, 13)));
        assert!(window(10, 13).overlaps(&window(11, 12)));
    }

    #[test]
    fn touching_windows_do_not_conflict() {
        assert!(!window(10, 11).overlaps(&window(11, 12)));
        assert!(!window(11, 12).overlaps(&window(10, 11)));
    }

    #[test]
    fn disjoint_windows_do_not_conflict() {
        assert!(!window(8, 9).overlaps(&window(11, 12)));
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = window(10, 12);
        let b = window(11, 14);
        assert_eq!(a.overlaps(&b), b.overlaps(&a));
    }
}
