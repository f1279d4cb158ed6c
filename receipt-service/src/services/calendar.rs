//! Frequency calendar: pure date arithmetic deciding when a tenancy is due
//! and what period a receipt covers.
//!
//! Quarterly uses calendar quarters on both sides (due-check and period) so
//! the two can never disagree near quarter boundaries.

use crate::models::Frequency;
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Inclusive billing period boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Whether a billing event anchored at `anchor` with the given frequency is
/// due on `reference`. Dates before the anchor are never due.
pub fn is_due(anchor: NaiveDate, frequency: Frequency, reference: NaiveDate) -> bool {
    if reference < anchor {
        return false;
    }
    match frequency {
        Frequency::Monthly => day_matches(anchor, reference),
        Frequency::Yearly => reference.month() == anchor.month() && day_matches(anchor, reference),
        Frequency::Biweekly => (reference - anchor).num_days() % 14 == 0,
        Frequency::Quarterly => {
            whole_months_since(anchor, reference) % 3 == 0 && day_matches(anchor, reference)
        }
    }
}

/// The billing period immediately preceding `reference`: the prior calendar
/// month, quarter, or year, or the 14-day span ending the day before
/// `reference` for biweekly tenancies.
///
/// The biweekly span is anchor-aligned only because callers invoke this on
/// dates `is_due` accepted, which sit a whole number of 14-day cycles past
/// the anchor.
///
/// Returns `None` only when `reference` sits at the edge of the representable
/// date range.
pub fn period_for(frequency: Frequency, reference: NaiveDate) -> Option<BillingPeriod> {
    match frequency {
        Frequency::Monthly => {
            let current_start = reference.with_day(1)?;
            period_before(current_start, Months::new(1))
        }
        Frequency::Quarterly => {
            let quarter_month = (reference.month0() / 3) * 3 + 1;
            let current_start = NaiveDate::from_ymd_opt(reference.year(), quarter_month, 1)?;
            period_before(current_start, Months::new(3))
        }
        Frequency::Yearly => {
            let current_start = NaiveDate::from_ymd_opt(reference.year(), 1, 1)?;
            period_before(current_start, Months::new(12))
        }
        Frequency::Biweekly => {
            let start = reference.checked_sub_days(Days::new(14))?;
            let end = reference.pred_opt()?;
            Some(BillingPeriod { start, end })
        }
    }
}

/// Monthly/quarterly/yearly day rule: anchors on the 29th-31st degrade to
/// "last day of the reference month" so short months still fire.
fn day_matches(anchor: NaiveDate, reference: NaiveDate) -> bool {
    if anchor.day() >= 29 {
        reference.day() == days_in_month(reference.year(), reference.month())
    } else {
        reference.day() == anchor.day()
    }
}

fn whole_months_since(anchor: NaiveDate, reference: NaiveDate) -> i32 {
    (reference.year() - anchor.year()) * 12 + reference.month() as i32 - anchor.month() as i32
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt()).map_or(0, |d| d.day())
}

fn period_before(current_start: NaiveDate, span: Months) -> Option<BillingPeriod> {
    let start = current_start.checked_sub_months(span)?;
    let end = current_start.pred_opt()?;
    Some(BillingPeriod { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_fires_on_anchor_day() {
        let anchor = date(2023, 6, 5);
        assert!(is_due(anchor, Frequency::Monthly, date(2024, 3, 5)));
        assert!(!is_due(anchor, Frequency::Monthly, date(2024, 3, 6)));
    }

    #[test]
    fn monthly_day_31_anchor_fires_on_last_day_of_short_months() {
        let anchor = date(2023, 1, 31);
        // Non-leap February: last day is the 28th.
        assert!(is_due(anchor, Frequency::Monthly, date(2023, 2, 28)));
        assert!(!is_due(anchor, Frequency::Monthly, date(2023, 2, 27)));
        // 31-day month: fires on the 31st, not the 29th.
        assert!(is_due(anchor, Frequency::Monthly, date(2023, 3, 31)));
        assert!(!is_due(anchor, Frequency::Monthly, date(2023, 3, 29)));
    }

    #[test]
    fn monthly_never_due_before_anchor() {
        let anchor = date(2024, 6, 10);
        assert!(!is_due(anchor, Frequency::Monthly, date(2024, 5, 10)));
    }

    #[test]
    fn yearly_fires_on_anchor_month_and_day() {
        let anchor = date(2022, 7, 15);
        assert!(is_due(anchor, Frequency::Yearly, date(2024, 7, 15)));
        assert!(!is_due(anchor, Frequency::Yearly, date(2024, 8, 15)));
        assert!(!is_due(anchor, Frequency::Yearly, date(2024, 7, 14)));
    }

    #[test]
    fn biweekly_fires_on_14_day_multiples() {
        let anchor = date(2024, 1, 1);
        assert!(is_due(anchor, Frequency::Biweekly, date(2024, 1, 15)));
        assert!(!is_due(anchor, Frequency::Biweekly, date(2024, 1, 14)));
        assert!(is_due(anchor, Frequency::Biweekly, date(2024, 1, 29)));
        assert!(is_due(anchor, Frequency::Biweekly, anchor));
    }

    #[test]
    fn quarterly_fires_every_third_month_on_anchor_day() {
        let anchor = date(2024, 1, 10);
        assert!(is_due(anchor, Frequency::Quarterly, date(2024, 4, 10)));
        assert!(is_due(anchor, Frequency::Quarterly, date(2024, 7, 10)));
        assert!(!is_due(anchor, Frequency::Quarterly, date(2024, 5, 10)));
        assert!(!is_due(anchor, Frequency::Quarterly, date(2024, 4, 11)));
    }

    #[test]
    fn quarterly_day_31_anchor_degrades_to_month_end() {
        let anchor = date(2023, 10, 31);
        assert!(is_due(anchor, Frequency::Quarterly, date(2024, 1, 31)));
        assert!(is_due(anchor, Frequency::Quarterly, date(2024, 4, 30)));
    }

    #[test]
    fn monthly_period_is_prior_calendar_month() {
        let period = period_for(Frequency::Monthly, date(2024, 3, 10)).unwrap();
        assert_eq!(period.start, date(2024, 2, 1));
        assert_eq!(period.end, date(2024, 2, 29));
    }

    #[test]
    fn monthly_period_crosses_year_boundary() {
        let period = period_for(Frequency::Monthly, date(2024, 1, 31)).unwrap();
        assert_eq!(period.start, date(2023, 12, 1));
        assert_eq!(period.end, date(2023, 12, 31));
    }

    #[test]
    fn quarterly_period_is_prior_calendar_quarter() {
        let period = period_for(Frequency::Quarterly, date(2024, 5, 20)).unwrap();
        assert_eq!(period.start, date(2024, 1, 1));
        assert_eq!(period.end, date(2024, 3, 31));

        let period = period_for(Frequency::Quarterly, date(2024, 2, 1)).unwrap();
        assert_eq!(period.start, date(2023, 10, 1));
        assert_eq!(period.end, date(2023, 12, 31));
    }

    #[test]
    fn yearly_period_is_prior_calendar_year() {
        let period = period_for(Frequency::Yearly, date(2024, 6, 1)).unwrap();
        assert_eq!(period.start, date(2023, 1, 1));
        assert_eq!(period.end, date(2023, 12, 31));
    }

    #[test]
    fn biweekly_period_ends_the_day_before_reference() {
        let period = period_for(Frequency::Biweekly, date(2024, 1, 15)).unwrap();
        assert_eq!(period.start, date(2024, 1, 1));
        assert_eq!(period.end, date(2024, 1, 14));
    }
}
