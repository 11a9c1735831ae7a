#![forbid(unsafe_code)]

use crate::types::{ColumnType, Number};
use serde::Serialize;

/// Whole-file statistics for the measurement column, collected while profiling.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column_type: Option<ColumnType>,
    pub row_count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub sum: f64,
}

impl ColumnStats {
    pub fn mean(&self) -> Option<f64> {
        (self.row_count > 0).then(|| self.sum / self.row_count as f64)
    }
}

/// Per-chunk value range used to pick a candidate width.
#[derive(Clone, Debug)]
pub(crate) struct RangeTracker {
    rows: u64,
    min: f64,
    max: f64,
    sum: f64,
    int_min: i128,
    int_max: i128,
    integral: bool,
    float32_lossless: bool,
}

impl Default for RangeTracker {
    fn default() -> Self {
        Self {
            rows: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            int_min: i128::MAX,
            int_max: i128::MIN,
            integral: true,
            float32_lossless: true,
        }
    }
}

impl RangeTracker {
    pub fn push(&mut self, value: Number) {
        let wide = value.as_f64();
        self.rows += 1;
        self.min = self.min.min(wide);
        self.max = self.max.max(wide);
        self.sum += wide;

        match value {
            Number::UInt(v) => self.push_int(v as i128),
            Number::Int(v) => self.push_int(v as i128),
            Number::Float(_) => self.integral = false,
        }
        if self.float32_lossless && value.to_f32_lossless().is_none() {
            self.float32_lossless = false;
        }
    }

    fn push_int(&mut self, v: i128) {
        self.int_min = self.int_min.min(v);
        self.int_max = self.int_max.max(v);
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Narrowest type that holds every value pushed so far.
    pub fn candidate(&self) -> Option<ColumnType> {
        if self.rows == 0 {
            return None;
        }
        Some(if self.integral {
            ColumnType::for_integer_range(self.int_min, self.int_max)
        } else if self.float32_lossless {
            ColumnType::Float32
        } else {
            ColumnType::Float64
        })
    }

    /// Fold this chunk's range into whole-file stats.
    pub fn merge_into(&self, stats: &mut ColumnStats) {
        if self.rows == 0 {
            return;
        }
        stats.row_count += self.rows;
        stats.sum += self.sum;
        stats.min = Some(stats.min.map_or(self.min, |m| m.min(self.min)));
        stats.max = Some(stats.max.map_or(self.max, |m| m.max(self.max)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_widths() {
        let mut tracker = RangeTracker::default();
        assert_eq!(tracker.candidate(), None);
        tracker.push(Number::UInt(0));
        tracker.push(Number::UInt(200));
        assert_eq!(tracker.candidate(), Some(ColumnType::UInt8));
        tracker.push(Number::Int(-1));
        assert_eq!(tracker.candidate(), Some(ColumnType::Int16));
        tracker.push(Number::Float(12.5));
        assert_eq!(tracker.candidate(), Some(ColumnType::Float32));
        tracker.push(Number::Float(0.1234567891));
        assert_eq!(tracker.candidate(), Some(ColumnType::Float64));
    }

    #[test]
    fn merge_accumulates_range() {
        let mut a = RangeTracker::default();
        a.push(Number::Float(-3.0));
        a.push(Number::Float(5.0));
        let mut b = RangeTracker::default();
        b.push(Number::Float(9.0));

        let mut stats = ColumnStats::default();
        a.merge_into(&mut stats);
        b.merge_into(&mut stats);
        RangeTracker::default().merge_into(&mut stats);
        assert_eq!(stats.row_count, 3);
        assert_eq!(stats.min, Some(-3.0));
        assert_eq!(stats.max, Some(9.0));
        assert_eq!(stats.mean(), Some(11.0 / 3.0));
    }
}
