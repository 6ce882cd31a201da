//! Lookback horizons and point-in-time resolution.
//!
//! A horizon is turned into a cutoff date, then the latest observation on or
//! before that cutoff is the baseline. The week horizon is weekday-aware
//! (last trading-week close); month, quarter and year use calendar period
//! ends.

use crate::domain::observation::Observation;
use crate::domain::store::PriceSeriesStore;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Horizon {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Horizon {
    pub const ALL: [Horizon; 5] = [
        Horizon::Day,
        Horizon::Week,
        Horizon::Month,
        Horizon::Quarter,
        Horizon::Year,
    ];
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Horizon::Day => write!(f, "%Day"),
            Horizon::Week => write!(f, "%Week"),
            Horizon::Month => write!(f, "%Month"),
            Horizon::Quarter => write!(f, "%Quarter"),
            Horizon::Year => write!(f, "%YTD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointInTimeResolver {
    /// Weekday that closes a trading week.
    pub week_anchor: Weekday,
}

impl Default for PointInTimeResolver {
    fn default() -> Self {
        Self {
            week_anchor: Weekday::Fri,
        }
    }
}

impl PointInTimeResolver {
    pub fn new(week_anchor: Weekday) -> Self {
        Self { week_anchor }
    }

    /// `None` when the cutoff falls before the earliest representable date.
    pub fn cutoff(&self, horizon: Horizon, as_of: NaiveDate) -> Option<NaiveDate> {
        match horizon {
            Horizon::Day => as_of.pred_opt(),
            Horizon::Week => previous_weekday(as_of, self.week_anchor),
            Horizon::Month => month_start(as_of).pred_opt(),
            Horizon::Quarter => quarter_start(as_of).pred_opt(),
            Horizon::Year => year_start(as_of).pred_opt(),
        }
    }

    /// Latest observation at or before the horizon's cutoff.
    pub fn resolve<'a>(
        &self,
        store: &'a PriceSeriesStore,
        instrument_id: &str,
        horizon: Horizon,
        as_of: NaiveDate,
    ) -> Option<&'a Observation> {
        store.as_of(instrument_id, self.cutoff(horizon, as_of)?)
    }
}

/// Most recent `anchor` weekday strictly before `date`.
pub fn previous_weekday(date: NaiveDate, anchor: Weekday) -> Option<NaiveDate> {
    let today = date.weekday().num_days_from_monday();
    let target = anchor.num_days_from_monday();
    let back = match (today + 7 - target) % 7 {
        0 => 7,
        n => n,
    };
    date.checked_sub_days(Days::new(u64::from(back)))
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn quarter_start(date: NaiveDate) -> NaiveDate {
    let month = (date.month0() / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

pub fn year_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date)
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
        .unwrap_or(NaiveDate::MIN)
}
