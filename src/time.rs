//! Safe time functions.
use std::time::SystemTime;

fn is_leap_year(year: i64) -> bool {
    if year % 400 == 0 {
        true
    } else if year % 100 == 0 {
        false
    } else {
        year % 4 == 0
    }
}

fn year_len_days(year: i64) -> i64 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

#[allow(clippy::match_same_arms)]
#[must_use]
pub fn month_len_days(year: i64, month: i64) -> i64 {
    match month {
        1 => 31,
        2 if is_leap_year(year) => 29,
        2 => 28,
        3 => 31,
        4 => 30,
        5 => 31,
        6 => 30,
        7 => 31,
        8 => 31,
        9 => 30,
        10 => 31,
        11 => 30,
        12 => 31,
        _ => unimplemented!(),
    }
}

// 1970-01-01 was a Thursday.
const DAY_NAMES: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub struct DateTime {
    pub year: i64,
    pub month: i64,
    pub day: i64,
    pub hour: i64,
    pub min: i64,
    pub sec: i64,
    pub weekday: &'static str,
}
impl DateTime {
    // Epoch time assumes that every day is the same length, 24 * 60 * 60 seconds.
    // It ignores leap seconds.
    #[must_use]
    pub fn new(epoch_seconds: i64) -> Self {
        let mut days = epoch_seconds / 86400;
        let mut rem = epoch_seconds % 86400;
        if rem < 0 {
            days -= 1;
            rem += 86400;
        }
        let weekday = DAY_NAMES[((days % 7 + 7) % 7) as usize];
        let hour = rem / 3600;
        let min = (rem % 3600) / 60;
        let sec = rem % 60;
        let mut year = 1970;
        while days >= year_len_days(year) {
            days -= year_len_days(year);
            year += 1;
        }
        while days < 0 {
            year -= 1;
            days += year_len_days(year);
        }
        let mut month = 1;
        while days >= month_len_days(year, month) {
            days -= month_len_days(year, month);
            month += 1;
        }
        Self {
            year,
            month,
            day: days + 1,
            hour,
            min,
            sec,
            weekday,
        }
    }
}

pub trait FormatTime {
    fn iso8601_utc(&self) -> String;
    /// Formats the time as an
    /// [IMF-fixdate](https://datatracker.ietf.org/doc/html/rfc7231#section-7.1.1.1),
    /// the form required for the `Date` response header.
    /// Example: `Sun, 06 Nov 1994 08:49:37 GMT`.
    fn rfc7231_date(&self) -> String;
}

fn epoch_seconds(t: &SystemTime) -> i64 {
    i64::try_from(
        t.duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
    )
    .unwrap_or(0)
}

impl FormatTime for SystemTime {
    fn iso8601_utc(&self) -> String {
        let dt = DateTime::new(epoch_seconds(self));
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            dt.year, dt.month, dt.day, dt.hour, dt.min, dt.sec
        )
    }

    fn rfc7231_date(&self) -> String {
        let dt = DateTime::new(epoch_seconds(self));
        format!(
            "{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
            dt.weekday,
            dt.day,
            MONTH_NAMES[(dt.month - 1) as usize],
            dt.year,
            dt.hour,
            dt.min,
            dt.sec
        )
    }
}
