use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, TimeZone};

use super::error::FlushError;

/// Parsed flush cron expression.
///
/// Accepts the classic five-field crontab form (minute first, day-of-week
/// 0-7 with Sunday as 0 or 7) and the seconds-first six/seven-field form of
/// the `cron` crate (day-of-week 1-7, Sunday = 1). Five-field expressions
/// fire at second zero.
#[derive(Debug, Clone)]
pub struct FlushSchedule {
    expr: String,
    schedule: cron::Schedule,
}

impl FlushSchedule {
    pub fn parse(expr: &str) -> Result<Self, FlushError> {
        let trimmed = expr.trim();
        let normalized = match trimmed.split_whitespace().count() {
            5 => {
                let fields: Vec<&str> = trimmed.split_whitespace().collect();
                let dow = crontab_day_of_week(fields[4]).map_err(|reason| {
                    FlushError::InvalidCron {
                        expr: expr.to_string(),
                        reason,
                    }
                })?;
                format!("0 {} {dow}", fields[..4].join(" "))
            }
            6 | 7 => trimmed.to_string(),
            n => {
                return Err(FlushError::InvalidCron {
                    expr: expr.to_string(),
                    reason: format!("expected 5 fields, got {n}"),
                });
            }
        };
        let schedule =
            cron::Schedule::from_str(&normalized).map_err(|e| FlushError::InvalidCron {
                expr: expr.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            expr: trimmed.to_string(),
            schedule,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// First fire time strictly after `after`.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(after).next()
    }
}

/// Rewrite a crontab day-of-week field into `cron` crate numbering.
/// Named days pass through unchanged.
fn crontab_day_of_week(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }
    let mut days = BTreeSet::new();
    let mut named = Vec::new();
    for item in field.split(',') {
        if item.chars().any(|c| c.is_ascii_alphabetic()) {
            named.push(item.to_string());
            continue;
        }
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => {
                let step: usize = step
                    .parse()
                    .map_err(|_| format!("invalid day-of-week step in {item:?}"))?;
                if step == 0 {
                    return Err(format!("zero day-of-week step in {item:?}"));
                }
                (base, Some(step))
            }
            None => (item, None),
        };
        let (start, end) = match base.split_once('-') {
            _ if base == "*" => (0, 6),
            Some((a, b)) => (day_number(a)?, day_number(b)?),
            None => {
                let d = day_number(base)?;
                (d, if step.is_some() { d.max(6) } else { d })
            }
        };
        if start > end {
            return Err(format!("day-of-week range {item:?} runs backwards"));
        }
        days.extend(
            (start..=end)
                .step_by(step.unwrap_or(1))
                .map(|d| d % 7 + 1),
        );
    }
    let mut parts: Vec<String> = days.iter().map(u32::to_string).collect();
    parts.extend(named);
    Ok(parts.join(","))
}

fn day_number(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(d) if d <= 7 => Ok(d),
        _ => Err(format!("day-of-week {s:?} outside 0-7")),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, TimeZone, Timelike, Utc, Weekday};

    use super::*;

    #[test]
    fn five_field_defaults_parse() {
        assert!(FlushSchedule::parse("30 3 */1 * *").is_ok());
        assert!(FlushSchedule::parse("*/2 * * * *").is_ok());
    }

    #[test]
    fn every_two_minutes_fires_on_even_minute() {
        let s = FlushSchedule::parse("*/2 * * * *").unwrap();
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 1, 30).unwrap();
        let next = s.next_after(&t).unwrap();
        assert_eq!(next.minute(), 2);
        assert_eq!(next.second(), 0);
    }

    #[test]
    fn daily_fires_at_half_past_three() {
        let s = FlushSchedule::parse("30 3 */1 * *").unwrap();
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap();
        let next = s.next_after(&t).unwrap();
        assert_eq!((next.hour(), next.minute()), (3, 30));
        assert_eq!(next.date_naive(), t.date_naive().succ_opt().unwrap());
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        assert!(matches!(
            FlushSchedule::parse("* *"),
            Err(FlushError::InvalidCron { .. })
        ));
        assert!(FlushSchedule::parse("61 * * * *").is_err());
    }

    #[test]
    fn five_field_day_of_week_uses_crontab_numbering() {
        // 2024-01-01 is a Monday.
        let monday = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let sunday = FlushSchedule::parse("30 3 * * 0").unwrap();
        assert_eq!(sunday.next_after(&monday).unwrap().weekday(), Weekday::Sun);
        let also_sunday = FlushSchedule::parse("30 3 * * 7").unwrap();
        assert_eq!(also_sunday.next_after(&monday).unwrap().weekday(), Weekday::Sun);

        let mon = FlushSchedule::parse("30 3 * * 1").unwrap();
        let next = mon.next_after(&monday).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next.date_naive(), monday.date_naive());
    }

    #[test]
    fn five_field_day_of_week_ranges_and_lists() {
        let saturday = Utc.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap();
        let weekdays = FlushSchedule::parse("0 1 * * 1-5").unwrap();
        assert_eq!(weekdays.next_after(&saturday).unwrap().weekday(), Weekday::Mon);

        let weekend = FlushSchedule::parse("0 1 * * 6,0").unwrap();
        assert_eq!(weekend.next_after(&saturday).unwrap().weekday(), Weekday::Sun);

        assert_eq!(crontab_day_of_week("*/2").unwrap(), "1,3,5,7");
        assert_eq!(crontab_day_of_week("MON-FRI").unwrap(), "MON-FRI");
        assert!(FlushSchedule::parse("0 1 * * 8").is_err());
        assert!(FlushSchedule::parse("0 1 * * 5-1").is_err());
    }
}
