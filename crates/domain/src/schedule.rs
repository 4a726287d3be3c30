//! Cron schedules with minute resolution.
//!
//! Expressions use the classic 5-field layout
//! (`minute hour day-of-month month day-of-week`). The `cron` crate expects a
//! leading seconds field and numbers weekdays `1..=7` from Sunday, so the
//! expression is rewritten once at parse time: seconds are pinned to `0` and
//! numeric weekdays (`0..=7`, both `0` and `7` meaning Sunday) are shifted.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ScheduleParseError;
use crate::time::Timestamp;

/// A parsed 5-field cron expression.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    /// Parse a 5-field cron expression.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleParseError`] when the expression does not have
    /// exactly five fields or one of them is malformed.
    pub fn parse(expression: &str) -> Result<Self, ScheduleParseError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
            return Err(ScheduleParseError::FieldCount(fields.len()));
        };
        let day_of_week = translate_day_of_week(day_of_week)?;
        let extended = format!("0 {minute} {hour} {day_of_month} {month} {day_of_week}");
        let schedule =
            cron::Schedule::from_str(&extended).map_err(|err| ScheduleParseError::Syntax {
                expression: expression.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            expression: fields.join(" "),
            schedule,
        })
    }

    /// The normalised 5-field expression.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The first fire time strictly after `after`.
    #[must_use]
    pub fn next_after(&self, after: Timestamp) -> Option<Timestamp> {
        self.schedule.after(&after).next()
    }

    /// Up to `count` fire times strictly after `after`.
    #[must_use]
    pub fn upcoming(&self, after: Timestamp, count: usize) -> Vec<Timestamp> {
        self.schedule.after(&after).take(count).collect()
    }
}

impl FromStr for CronSchedule {
    type Err = ScheduleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for CronSchedule {}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Rewrite a classic day-of-week field into the `cron` crate's numbering.
///
/// Named days (`MON`, `Fri-Sun`, …) are passed through untouched; numeric
/// items are expanded into an explicit list so that wrap-arounds such as
/// `5-7` (Friday to Sunday) stay correct.
fn translate_day_of_week(field: &str) -> Result<String, ScheduleParseError> {
    let invalid = || ScheduleParseError::DayOfWeek(field.to_string());
    let mut items = Vec::new();

    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u8 = step.parse().map_err(|_| invalid())?;
                if step == 0 {
                    return Err(invalid());
                }
                (range, Some(step))
            }
            None => (item, None),
        };

        if range.chars().any(|c| c.is_ascii_alphabetic()) || (range == "*" && step.is_none()) {
            items.push(item.to_string());
            continue;
        }

        let (start, end) = match range {
            "*" => (0, 6),
            _ => match range.split_once('-') {
                Some((start, end)) => (parse_weekday(start, field)?, parse_weekday(end, field)?),
                None => {
                    let start = parse_weekday(range, field)?;
                    (start, if step.is_some() { 6 } else { start })
                }
            },
        };
        if start > end {
            return Err(invalid());
        }

        let days: BTreeSet<u8> = (start..=end)
            .step_by(usize::from(step.unwrap_or(1)))
            .map(|day| day % 7 + 1)
            .collect();
        items.extend(days.iter().map(u8::to_string));
    }

    Ok(items.join(","))
}

fn parse_weekday(value: &str, field: &str) -> Result<u8, ScheduleParseError> {
    match value.parse::<u8>() {
        Ok(day) if day <= 7 => Ok(day),
        _ => Err(ScheduleParseError::DayOfWeek(field.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Utc, Weekday};

    fn at(h: u32, m: u32, s: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn should_fire_at_next_hour_boundary_for_hourly_schedule() {
        let schedule = CronSchedule::parse("0 * * * *").unwrap();
        assert_eq!(schedule.next_after(at(10, 15, 0)), Some(at(11, 0, 0)));
    }

    #[test]
    fn should_fire_strictly_after_given_instant() {
        let schedule = CronSchedule::parse("0 * * * *").unwrap();
        assert_eq!(schedule.next_after(at(11, 0, 0)), Some(at(12, 0, 0)));
    }

    #[test]
    fn should_list_upcoming_fire_times() {
        let schedule = CronSchedule::parse("*/15 * * * *").unwrap();
        let upcoming = schedule.upcoming(at(10, 1, 0), 3);
        assert_eq!(upcoming, vec![at(10, 15, 0), at(10, 30, 0), at(10, 45, 0)]);
    }

    #[test]
    fn should_reject_six_field_expression() {
        let result = CronSchedule::parse("0 0 * * * *");
        assert_eq!(result.unwrap_err(), ScheduleParseError::FieldCount(6));
    }

    #[test]
    fn should_reject_malformed_field() {
        let result = CronSchedule::parse("61 * * * *");
        assert!(matches!(result, Err(ScheduleParseError::Syntax { .. })));
    }

    #[test]
    fn should_reject_out_of_range_weekday() {
        let result = CronSchedule::parse("0 9 * * 8");
        assert!(matches!(result, Err(ScheduleParseError::DayOfWeek(_))));
    }

    #[test]
    fn should_treat_zero_and_seven_as_sunday() {
        // 2024-05-01 is a Wednesday; next Sunday is 2024-05-05.
        for expr in ["0 9 * * 0", "0 9 * * 7", "0 9 * * SUN"] {
            let schedule = CronSchedule::parse(expr).unwrap();
            let next = schedule.next_after(at(10, 0, 0)).unwrap();
            assert_eq!(next.weekday(), Weekday::Sun, "{expr}");
            assert_eq!(next.day(), 5, "{expr}");
            assert_eq!(next.hour(), 9, "{expr}");
        }
    }

    #[test]
    fn should_fire_on_weekdays_only_for_range() {
        let schedule = CronSchedule::parse("30 7 * * 1-5").unwrap();
        let days: Vec<Weekday> = schedule
            .upcoming(at(10, 0, 0), 5)
            .iter()
            .map(Datelike::weekday)
            .collect();
        assert_eq!(
            days,
            vec![Weekday::Thu, Weekday::Fri, Weekday::Mon, Weekday::Tue, Weekday::Wed]
        );
    }

    #[test]
    fn should_translate_wrapping_weekday_range() {
        assert_eq!(translate_day_of_week("5-7").unwrap(), "1,6,7");
        assert_eq!(translate_day_of_week("*/2").unwrap(), "1,3,5,7");
        assert_eq!(translate_day_of_week("*").unwrap(), "*");
        assert_eq!(translate_day_of_week("MON-FRI").unwrap(), "MON-FRI");
    }

    #[test]
    fn should_normalise_whitespace_in_expression() {
        let schedule = CronSchedule::parse("  0   *  * * * ").unwrap();
        assert_eq!(schedule.expression(), "0 * * * *");
        assert_eq!(schedule.to_string(), "0 * * * *");
    }
}
