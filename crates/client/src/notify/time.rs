//! Clock-time parsing and next-occurrence computation.

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};

use noor_core::Error;

/// Parse `HH:MM` (24-hour, two digits each side).
pub fn parse_clock_time(input: &str) -> Result<NaiveTime, Error> {
    let trimmed = input.trim();
    let (hours, minutes) = trimmed
        .split_once(':')
        .ok_or_else(|| Error::InvalidTime(format!("expected HH:MM, got {input:?}")))?;

    let hours = two_digits(hours).ok_or_else(|| Error::InvalidTime(format!("bad hour in {input:?}")))?;
    let minutes = two_digits(minutes).ok_or_else(|| Error::InvalidTime(format!("bad minute in {input:?}")))?;

    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(|| Error::InvalidTime(format!("out of range: {input:?}")))
}

fn two_digits(field: &str) -> Option<u32> {
    match field.as_bytes() {
        [tens, ones] if tens.is_ascii_digit() && ones.is_ascii_digit() => {
            Some(u32::from(tens - b'0') * 10 + u32::from(ones - b'0'))
        }
        _ => None,
    }
}

/// Format as `HH:MM`.
pub fn format_clock_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// The next instant `time` occurs on the wall clock of `now`'s zone.
///
/// Today's occurrence if it is still strictly in the future, otherwise
/// tomorrow's. A time skipped by a DST gap moves forward an hour at a time
/// until it exists; an ambiguous time takes the earlier instant.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, time: NaiveTime) -> DateTime<Utc> {
    let tz = now.timezone();
    occurrence_after(now.with_timezone(&Utc), now.date_naive(), time, |naive| {
        tz.from_local_datetime(naive).map(|t| t.with_timezone(&Utc))
    })
}

fn occurrence_after<F>(now: DateTime<Utc>, today: NaiveDate, time: NaiveTime, resolve: F) -> DateTime<Utc>
where
    F: Fn(&NaiveDateTime) -> LocalResult<DateTime<Utc>>,
{
    let today = today.and_time(time);
    let candidate = localize(&resolve, today);
    if candidate > now {
        return candidate;
    }

    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    localize(&resolve, tomorrow)
}

/// Gaps longer than a day do not occur in real zones.
const MAX_GAP_HOURS: i64 = 24;

fn localize<F>(resolve: &F, naive: NaiveDateTime) -> DateTime<Utc>
where
    F: Fn(&NaiveDateTime) -> LocalResult<DateTime<Utc>>,
{
    for hours in 0..=MAX_GAP_HOURS {
        match resolve(&(naive + TimeDelta::hours(hours))) {
            LocalResult::Single(t) => return t,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => {}
        }
    }
    naive.and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(parse_clock_time("05:30").unwrap(), NaiveTime::from_hms_opt(5, 30, 0).unwrap());
        assert_eq!(parse_clock_time(" 23:59 ").unwrap(), NaiveTime::from_hms_opt(23, 59, 0).unwrap());
    }

    #[test]
    fn test_parse_clock_time_rejects_garbage() {
        for bad in ["", "0530", "25:00", "12:60", "ab:cd", "12:", "7:05", "+5:+30", "007:0005", "05:3٠"] {
            assert!(matches!(parse_clock_time(bad), Err(Error::InvalidTime(_))), "{bad}");
        }
    }

    #[test]
    fn test_format_clock_time() {
        assert_eq!(format_clock_time(NaiveTime::from_hms_opt(5, 0, 0).unwrap()), "05:00");
    }

    #[test]
    fn test_later_today() {
        let time = NaiveTime::from_hms_opt(18, 20, 0).unwrap();
        assert_eq!(next_occurrence(&at(12, 0), time), at(18, 20));
    }

    #[test]
    fn test_passed_time_is_tomorrow() {
        let time = NaiveTime::from_hms_opt(5, 30, 0).unwrap();
        let next = next_occurrence(&at(12, 0), time);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 11, 5, 30, 0).unwrap());
    }

    #[test]
    fn test_exactly_now_is_tomorrow() {
        let time = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let next = next_occurrence(&at(12, 0), time);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 11, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_uses_now_zone() {
        // 12:00 UTC is 15:00 in UTC+3; 13:00 local already passed.
        let riyadh = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = at(12, 0).with_timezone(&riyadh);
        let next = next_occurrence(&now, NaiveTime::from_hms_opt(13, 0, 0).unwrap());
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 11, 10, 0, 0).unwrap());
    }

    /// Wall clock that springs forward from UTC+0 to UTC+1 at 01:00 on
    /// 2026-03-29, so 01:00..02:00 local does not exist that day.
    fn spring_forward(naive: &NaiveDateTime) -> LocalResult<DateTime<Utc>> {
        let gap_start = NaiveDate::from_ymd_opt(2026, 3, 29).unwrap().and_hms_opt(1, 0, 0).unwrap();
        let gap_end = gap_start + TimeDelta::hours(1);
        if *naive < gap_start {
            LocalResult::Single(naive.and_utc())
        } else if *naive < gap_end {
            LocalResult::None
        } else {
            LocalResult::Single(naive.and_utc() - TimeDelta::hours(1))
        }
    }

    /// Falls back from UTC+1 to UTC+0 at 02:00 on 2026-10-25, so
    /// 01:00..02:00 local happens twice.
    fn fall_back(naive: &NaiveDateTime) -> LocalResult<DateTime<Utc>> {
        let repeat_start = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap().and_hms_opt(1, 0, 0).unwrap();
        let repeat_end = repeat_start + TimeDelta::hours(1);
        if *naive < repeat_start {
            LocalResult::Single(naive.and_utc() - TimeDelta::hours(1))
        } else if *naive < repeat_end {
            LocalResult::Ambiguous(naive.and_utc() - TimeDelta::hours(1), naive.and_utc())
        } else {
            LocalResult::Single(naive.and_utc())
        }
    }

    #[test]
    fn test_time_inside_dst_gap_moves_forward() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 29).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 29, 0, 0, 0).unwrap();
        let time = NaiveTime::from_hms_opt(1, 30, 0).unwrap();

        // 01:30 local is skipped; 02:30 local (UTC+1) is 01:30 UTC.
        let next = occurrence_after(now, day, time, spring_forward);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 29, 1, 30, 0).unwrap());
    }

    #[test]
    fn test_repeated_hour_takes_earlier_instant() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 24, 22, 0, 0).unwrap();
        let time = NaiveTime::from_hms_opt(1, 30, 0).unwrap();

        let next = occurrence_after(now, day, time, fall_back);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 25, 0, 30, 0).unwrap());
    }

    #[test]
    fn test_zone_without_valid_times_falls_back_to_utc() {
        let naive = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap().and_hms_opt(6, 0, 0).unwrap();
        assert_eq!(localize(&|_: &NaiveDateTime| -> LocalResult<DateTime<Utc>> { LocalResult::None }, naive), naive.and_utc());
    }
}
