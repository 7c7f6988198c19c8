use std::cmp::Ordering;

use chrono::{Datelike, Duration, NaiveDate};

/// Approximate end date of a `Mid-Feb 2026` / `EOM-Dec 2025` style label.
pub fn period_end_date(label: &str) -> Option<NaiveDate> {
    let (prefix, month_year) = label.trim().split_once('-')?;
    let month_start =
        NaiveDate::parse_from_str(&format!("01 {}", month_year.trim()), "%d %b %Y").ok()?;

    if prefix.eq_ignore_ascii_case("mid") {
        Some(month_start + Duration::days(14))
    } else if prefix.eq_ignore_ascii_case("eom") {
        let (year, month) = if month_start.month() == 12 {
            (month_start.year() + 1, 1)
        } else {
            (month_start.year(), month_start.month() + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1).map(|next| next - Duration::days(1))
    } else {
        None
    }
}

/// Unparsable labels order before every parsable one.
pub fn compare_periods(a: &str, b: &str) -> Ordering {
    period_end_date(a).cmp(&period_end_date(b))
}

/// The most recent label; the first one seen wins among equals.
pub fn latest_period<'a, I>(labels: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    labels
        .into_iter()
        .filter(|label| !label.trim().is_empty())
        .fold(None, |latest, label| match latest {
            Some(current) if compare_periods(label, current) != Ordering::Greater => Some(current),
            _ => Some(label),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_and_end_of_month_dates() {
        assert_eq!(
            period_end_date("Mid-Feb 2026"),
            NaiveDate::from_ymd_opt(2026, 2, 15)
        );
        assert_eq!(
            period_end_date("EOM-Dec 2025"),
            NaiveDate::from_ymd_opt(2025, 12, 31)
        );
        assert_eq!(
            period_end_date("eom-Feb 2024"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(period_end_date("Q1 2026"), None);
        assert_eq!(period_end_date("Start-Jan 2026"), None);
    }

    #[test]
    fn unparsable_labels_sort_first() {
        assert_eq!(compare_periods("whenever", "Mid-Jan 2026"), Ordering::Less);
        assert_eq!(compare_periods("EOM-Jan 2026", "Mid-Jan 2026"), Ordering::Greater);
        assert_eq!(compare_periods("foo", "bar"), Ordering::Equal);
    }

    #[test]
    fn latest_period_picks_greatest_end_date() {
        let labels = ["EOM-Dec 2025", "Mid-Feb 2026", "", "EOM-Jan 2026", "bogus"];
        assert_eq!(latest_period(labels), Some("Mid-Feb 2026"));
        assert_eq!(latest_period(["bogus", "other"]), Some("bogus"));
        assert_eq!(latest_period(Vec::<&str>::new()), None);
    }
}
