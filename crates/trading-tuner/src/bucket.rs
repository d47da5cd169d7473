use chrono::Datelike;

/// ISO year-week bucket such as `"2024-W05"`.
///
/// Uses the ISO week-numbering year, so 2024-12-30 falls in `"2025-W01"`.
pub fn iso_week_bucket<D: Datelike>(date: &D) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn test_bucket_format() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(iso_week_bucket(&date), "2024-W05");
    }

    #[test]
    fn test_bucket_uses_iso_year() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        assert_eq!(iso_week_bucket(&date), "2025-W01");

        let date = NaiveDate::from_ymd_opt(2021, 1, 3).unwrap();
        assert_eq!(iso_week_bucket(&date), "2020-W53");
    }

    #[test]
    fn test_bucket_from_datetime() {
        let monday = Utc.with_ymd_and_hms(2024, 1, 29, 0, 0, 0).unwrap();
        let sunday = Utc.with_ymd_and_hms(2024, 2, 4, 23, 59, 59).unwrap();
        assert_eq!(iso_week_bucket(&monday), iso_week_bucket(&sunday));
    }
}
