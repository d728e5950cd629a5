use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Converts instants into restaurant-local wall time (single fixed offset).
#[derive(Clone, Copy, Debug)]
pub struct RestaurantClock {
    tz: FixedOffset,
}

impl RestaurantClock {
    pub fn new(tz: FixedOffset) -> Self {
        Self { tz }
    }

    pub fn local(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.tz).naive_local()
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local(now).date()
    }
}

pub fn parse_tz_offset(value: &str) -> Option<FixedOffset> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let sign_char = trimmed.chars().next()?;
    let sign = match sign_char {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let rest = &trimmed[1..];
    let mut parts = rest.split(':');
    let hours: i32 = parts.next()?.parse().ok()?;
    let minutes: i32 = parts.next().unwrap_or("0").parse().ok()?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    let total_seconds = sign * (hours * 3600 + minutes * 60);
    FixedOffset::east_opt(total_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signed_offsets() {
        assert_eq!(parse_tz_offset("+05:30").map(|o| o.local_minus_utc()), Some(19800));
        assert_eq!(parse_tz_offset("-03").map(|o| o.local_minus_utc()), Some(-10800));
        assert_eq!(parse_tz_offset("05:30"), None);
        assert_eq!(parse_tz_offset("+24:00"), None);
        assert_eq!(parse_tz_offset(""), None);
    }

    #[test]
    fn local_time_crosses_midnight_ahead_of_utc() {
        use chrono::{TimeZone, Timelike};

        let clock = RestaurantClock::new(parse_tz_offset("+02:00").expect("offset"));
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 23, 30, 0).unwrap();
        assert_eq!(clock.today(now), NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        assert_eq!(clock.local(now).hour(), 1);
    }
}
