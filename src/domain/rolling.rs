//! Rolling-window and calendar resampling utilities.
//!
//! Series here are `Option<f64>` per row: a `None` is a missing value and is
//! skipped by every reduction rather than treated as zero.

use crate::domain::horizon::{month_start, quarter_start, week_start, year_start};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

/// Trailing simple moving average over the last `window` rows, counting only
/// defined values. At least one defined value in the window is required, so
/// the series starts producing output from its first observation.
///
/// O(n) sliding window. The running sum is rebuilt from the window every
/// `window` rows so rounding error does not accumulate over long series.
pub fn trailing_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0_f64;
    let mut count = 0usize;

    for (i, value) in values.iter().enumerate() {
        if i > 0 && i % window == 0 {
            (sum, count) = window_sum(&values[i + 1 - window..=i]);
        } else {
            if let Some(v) = value {
                sum += v;
                count += 1;
            }
            if i >= window {
                if let Some(old) = values[i - window] {
                    sum -= old;
                    count -= 1;
                }
            }
        }
        out.push(if count > 0 { Some(sum / count as f64) } else { None });
    }

    out
}

fn window_sum(values: &[Option<f64>]) -> (f64, usize) {
    values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1))
}

/// Sum of defined values; `None` if there are none.
pub fn sum_defined<I: IntoIterator<Item = Option<f64>>>(values: I) -> Option<f64> {
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Mean of defined values; `None` if there are none.
pub fn mean_defined<I: IntoIterator<Item = Option<f64>>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Granularity {
    /// First calendar day of the period containing `date`. Weeks start on
    /// Monday.
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => date,
            Granularity::Weekly => week_start(date),
            Granularity::Monthly => month_start(date),
            Granularity::Quarterly => quarter_start(date),
            Granularity::Yearly => year_start(date),
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "daily" | "day" | "d" => Some(Granularity::Daily),
            "weekly" | "week" | "w" => Some(Granularity::Weekly),
            "monthly" | "month" | "m" => Some(Granularity::Monthly),
            "quarterly" | "quarter" | "q" => Some(Granularity::Quarterly),
            "yearly" | "year" | "y" => Some(Granularity::Yearly),
            _ => None,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Daily => write!(f, "daily"),
            Granularity::Weekly => write!(f, "weekly"),
            Granularity::Monthly => write!(f, "monthly"),
            Granularity::Quarterly => write!(f, "quarterly"),
            Granularity::Yearly => write!(f, "yearly"),
        }
    }
}

/// Group dated items by the period they fall in, preserving order within
/// each period.
pub fn group_by_period<T, F>(items: &[T], granularity: Granularity, date_of: F) -> BTreeMap<NaiveDate, Vec<&T>>
where
    F: Fn(&T) -> NaiveDate,
{
    let mut groups: BTreeMap<NaiveDate, Vec<&T>> = BTreeMap::new();
    for item in items {
        groups
            .entry(granularity.period_start(date_of(item)))
            .or_default()
            .push(item);
    }
    groups
}
