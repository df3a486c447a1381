use chrono::NaiveDate;

/// Consecutive-day activity counter. Same-day activity keeps the streak,
/// next-day activity extends it, anything else restarts at one.
pub fn advance_streak(current: u32, last_active: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_active {
        Some(date) if date == today => current.max(1),
        Some(date) if (today - date).num_days() == 1 => current + 1,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    #[test]
    fn consecutive_days_extend_the_streak() {
        assert_eq!(advance_streak(3, Some(day(24)), day(25)), 4);
    }

    #[test]
    fn same_day_activity_keeps_the_streak() {
        assert_eq!(advance_streak(3, Some(day(25)), day(25)), 3);
        // First activity ever recorded today still counts as a one-day streak.
        assert_eq!(advance_streak(0, Some(day(25)), day(25)), 1);
    }

    #[test]
    fn a_gap_restarts_the_streak() {
        assert_eq!(advance_streak(9, Some(day(22)), day(25)), 1);
        assert_eq!(advance_streak(9, None, day(25)), 1);
    }
}
