/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Type information and literal grammar for the Cedar 'datetime' extension,
//! which provides the `datetime` and `duration` types.
//!
//! Accepted `datetime` literals:
//! - `YYYY-MM-DD`
//! - `YYYY-MM-DDThh:mm:ssZ`
//! - `YYYY-MM-DDThh:mm:ss.SSSZ`
//! - `YYYY-MM-DDThh:mm:ss(+|-)hhmm`
//! - `YYYY-MM-DDThh:mm:ss.SSS(+|-)hhmm`
//!
//! `duration` literals are a sequence of `<n>d`, `<n>h`, `<n>m`, `<n>s` and
//! `<n>ms` in that order, each optional, optionally preceded by `-`.

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use regex::Regex;

use super::ExtensionFunctionType;
use crate::validator::types::{ExtensionName, Type};

/// len('YYYY-MM-DDThh:mm:ss.SSS+hhmm') = 28
const DATETIME_STR_MAX_LEN: usize = 28;

// PANIC SAFETY This is a valid `Regex`
#[allow(clippy::unwrap_used)]
mod constants {
    use super::Regex;

    lazy_static::lazy_static! {
        pub static ref DURATION_REGEX : Regex = Regex::new(
            r"^-?(([0-9]+)d)?(([0-9]+)h)?(([0-9]+)m)?(([0-9]+)s)?(([0-9]+)ms)?$"
        ).unwrap();
    }
}

/// Decimal value of a run of ASCII digits
fn number(digits: &[char]) -> Option<u32> {
    digits
        .iter()
        .try_fold(0u32, |acc, c| acc.checked_mul(10)?.checked_add(c.to_digit(10)?))
}

/// Parse a `datetime` literal into milliseconds since the Unix epoch (UTC)
pub fn parse_datetime(s: &str) -> Result<i64, String> {
    let malformed = || format!("`{s}` is not a well-formed datetime value");
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > DATETIME_STR_MAX_LEN {
        return Err(malformed());
    }
    let [y0, y1, y2, y3, '-', m0, m1, '-', d0, d1, rest @ ..] = chars.as_slice() else {
        return Err(malformed());
    };
    let year = number(&[*y0, *y1, *y2, *y3]).ok_or_else(malformed)?;
    let month = number(&[*m0, *m1]).ok_or_else(malformed)?;
    let day = number(&[*d0, *d1]).ok_or_else(malformed)?;
    let year = i32::try_from(year).map_err(|_| malformed())?;
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| format!("`{s}` does not name a valid date"))?;

    let (time, offset_secs) = if rest.is_empty() {
        (NaiveTime::MIN, 0)
    } else {
        let ['T', h0, h1, ':', mi0, mi1, ':', s0, s1, rest @ ..] = rest else {
            return Err(malformed());
        };
        let (millis, rest) = match rest {
            ['.', a, b, c, rest @ ..] => (number(&[*a, *b, *c]).ok_or_else(malformed)?, rest),
            _ => (0, rest),
        };
        let offset_secs: i64 = match rest {
            ['Z'] => 0,
            [sign @ ('+' | '-'), oh0, oh1, om0, om1] => {
                let hh = number(&[*oh0, *oh1]).ok_or_else(malformed)?;
                let mm = number(&[*om0, *om1]).ok_or_else(malformed)?;
                if hh >= 24 || mm >= 60 {
                    return Err(format!("`{s}` has an invalid UTC offset"));
                }
                let secs = i64::from(hh * 3600 + mm * 60);
                // local time is ahead of UTC by a positive offset
                if *sign == '+' {
                    -secs
                } else {
                    secs
                }
            }
            _ => return Err(malformed()),
        };
        let hour = number(&[*h0, *h1]).ok_or_else(malformed)?;
        let minute = number(&[*mi0, *mi1]).ok_or_else(malformed)?;
        let second = number(&[*s0, *s1]).ok_or_else(malformed)?;
        let time = NaiveTime::from_hms_milli_opt(hour, minute, second, millis)
            .ok_or_else(|| format!("`{s}` does not name a valid time of day"))?;
        (time, offset_secs)
    };

    let offset = TimeDelta::try_seconds(offset_secs).ok_or_else(malformed)?;
    date.and_time(time)
        .checked_add_signed(offset)
        .map(|utc| utc.and_utc().timestamp_millis())
        .ok_or_else(|| format!("`{s}` is out of range"))
}

/// Parse a `duration` literal into a number of milliseconds
pub fn parse_duration(s: &str) -> Result<i64, String> {
    let malformed = || format!("`{s}` is not a well-formed duration value");
    let overflow = || format!("`{s}` overflows the range of a duration");
    if s.len() < 2 {
        return Err(malformed());
    }
    let caps = constants::DURATION_REGEX
        .captures(s)
        .ok_or_else(malformed)?;
    let units: [(usize, i64); 5] = [
        (2, 86_400_000),
        (4, 3_600_000),
        (6, 60_000),
        (8, 1_000),
        (10, 1),
    ];
    let mut total: i64 = 0;
    for (group, scale) in units {
        if let Some(m) = caps.get(group) {
            let n: i64 = m.as_str().parse().map_err(|_| overflow())?;
            total = n
                .checked_mul(scale)
                .and_then(|ms| total.checked_add(ms))
                .ok_or_else(overflow)?;
        }
    }
    if s.starts_with('-') {
        total.checked_neg().ok_or_else(overflow)
    } else {
        Ok(total)
    }
}

fn check_datetime_literal(s: &str) -> Result<(), String> {
    parse_datetime(s).map(|_| ())
}

fn check_duration_literal(s: &str) -> Result<(), String> {
    parse_duration(s).map(|_| ())
}

/// Functions of the datetime extension
pub fn extension_schema() -> Vec<ExtensionFunctionType> {
    let datetime = Type::Extension(ExtensionName::Datetime);
    let duration = Type::Extension(ExtensionName::Duration);
    let to_long = |name| ExtensionFunctionType::function(name, vec![duration.clone()], Type::Long);
    vec![
        ExtensionFunctionType::constructor(
            "datetime",
            ExtensionName::Datetime,
            check_datetime_literal,
        ),
        ExtensionFunctionType::constructor(
            "duration",
            ExtensionName::Duration,
            check_duration_literal,
        ),
        ExtensionFunctionType::function(
            "offset",
            vec![datetime.clone(), duration.clone()],
            datetime.clone(),
        ),
        ExtensionFunctionType::function(
            "durationSince",
            vec![datetime.clone(), datetime.clone()],
            duration.clone(),
        ),
        ExtensionFunctionType::function("toDate", vec![datetime.clone()], datetime.clone()),
        ExtensionFunctionType::function("toTime", vec![datetime.clone()], duration.clone()),
        to_long("toMilliseconds"),
        to_long("toSeconds"),
        to_long("toMinutes"),
        to_long("toHours"),
        to_long("toDays"),
    ]
}

// PANIC SAFETY unit tests
#[allow(clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;
    use cool_asserts::assert_matches;

    #[test]
    fn datetimes() {
        assert_eq!(parse_datetime("1970-01-01"), Ok(0));
        assert_eq!(parse_datetime("1970-01-01T00:00:01Z"), Ok(1000));
        assert_eq!(parse_datetime("1970-01-01T00:00:00.250Z"), Ok(250));
        assert_eq!(parse_datetime("1970-01-01T01:00:00+0100"), Ok(0));
        assert_eq!(parse_datetime("1969-12-31T23:00:00-0100"), Ok(0));
        assert_matches!(parse_datetime("2024-01-01T00:00:00Z"), Ok(_));
        assert_matches!(parse_datetime("2024-02-29"), Ok(_));
    }

    #[test]
    fn malformed_datetimes() {
        for s in [
            "",
            "2024",
            "2024-1-01",
            "2024-13-01",
            "2023-02-29",
            "2024-01-01T",
            "2024-01-01T00:00:00",
            "2024-01-01T24:00:00Z",
            "2024-01-01T00:00:00.5Z",
            "2024-01-01T00:00:00+2400",
            "2024-01-01T00:00:00+0060",
            "2024-01-01 00:00:00Z",
            "2024-01-01T00:00:00.000+0000Z",
        ] {
            assert_matches!(parse_datetime(s), Err(_), "{s}");
        }
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("1h"), Ok(3_600_000));
        assert_eq!(parse_duration("1ms"), Ok(1));
        assert_eq!(parse_duration("-2d12h"), Ok(-216_000_000));
        assert_eq!(parse_duration("1d2h3m4s5ms"), Ok(93_784_005));
    }

    #[test]
    fn malformed_durations() {
        for s in ["", "-", "1", "h", "1h1d", "1x", "1.5h", "9223372036854775807d"] {
            assert_matches!(parse_duration(s), Err(_), "{s}");
        }
    }
}
