use chrono::{Datelike, Days, NaiveDate, Weekday};

/// The next day lessons take place. Friday and Saturday skip ahead to Monday;
/// every other weekday just advances by one.
pub fn next_school_day(from: NaiveDate) -> NaiveDate {
    let days = match from.weekday() {
        Weekday::Fri => 3,
        Weekday::Sat => 2,
        _ => 1,
    };
    from + Days::new(days)
}

/// The dates one poll cycle covers, in processing order.
pub fn target_days(today: NaiveDate) -> [NaiveDate; 2] {
    [today, next_school_day(today)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_weekday_advances_by_one() {
        // 2026-08-03 is a Monday
        assert_eq!(next_school_day(d(2026, 8, 3)), d(2026, 8, 4));
        assert_eq!(next_school_day(d(2026, 8, 4)), d(2026, 8, 5));
        assert_eq!(next_school_day(d(2026, 8, 6)), d(2026, 8, 7));
    }

    #[test]
    fn test_friday_skips_to_monday() {
        assert_eq!(next_school_day(d(2026, 8, 7)), d(2026, 8, 10));
    }

    #[test]
    fn test_saturday_skips_to_monday() {
        assert_eq!(next_school_day(d(2026, 8, 8)), d(2026, 8, 10));
    }

    #[test]
    fn test_sunday_lands_on_monday() {
        assert_eq!(next_school_day(d(2026, 8, 9)), d(2026, 8, 10));
    }

    #[test]
    fn test_target_days_order() {
        let days = target_days(d(2026, 8, 7));
        assert_eq!(days, [d(2026, 8, 7), d(2026, 8, 10)]);
    }
}
