use access_core::error::AppError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

const MONTH_NAMES: [(&str, u32); 12] = [
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

const DAY_NAMES: [(&str, u32); 7] = [
    ("sun", 0),
    ("mon", 1),
    ("tue", 2),
    ("wed", 3),
    ("thu", 4),
    ("fri", 5),
    ("sat", 6),
];

// Nothing recurs less often than yearly in a five-field expression, so four
// years bounds the search even across leap days.
const MAX_SEARCH_DAYS: i64 = 4 * 366;

/// Parsed five-field cron expression (minute hour day-of-month month
/// day-of-week). Occurrence computation is a pure function of the
/// expression, a timezone and a lower bound; nothing is pre-materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl Schedule {
    pub fn parse(expression: &str) -> Result<Self, AppError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(AppError::Invalid(anyhow::anyhow!(
                "Schedule must have five fields (minute hour day month weekday), got {}",
                fields.len()
            )));
        }

        let invalid =
            |e: String| AppError::Invalid(anyhow::anyhow!("Bad schedule '{}': {}", expression, e));

        let minutes = parse_field(fields[0], 0, 59, &[]).map_err(invalid)?;
        let hours = parse_field(fields[1], 0, 23, &[]).map_err(invalid)?;
        let days_of_month = parse_field(fields[2], 1, 31, &[]).map_err(invalid)?;
        let months = parse_field(fields[3], 1, 12, &MONTH_NAMES).map_err(invalid)?;
        let mut days_of_week = parse_field(fields[4], 0, 7, &DAY_NAMES).map_err(invalid)?;

        // 7 is an alias for Sunday.
        for day in days_of_week.iter_mut() {
            if *day == 7 {
                *day = 0;
            }
        }
        days_of_week.sort_unstable();
        days_of_week.dedup();

        Ok(Self {
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: fields[2] != "*",
            dow_restricted: fields[4] != "*",
        })
    }

    /// Next occurrence strictly after `after`, evaluated in `tz`. Returns
    /// `None` when no occurrence exists within the search horizon (e.g. a
    /// day-of-month that never lands, like February 31st).
    pub fn next_occurrence(&self, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let local_after: NaiveDateTime = after.with_timezone(&tz).naive_local();
        let start_date = local_after.date();

        for day_offset in 0..MAX_SEARCH_DAYS {
            let date = start_date + Duration::days(day_offset);
            if !self.day_matches(date) {
                continue;
            }

            for &hour in &self.hours {
                for &minute in &self.minutes {
                    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
                    let candidate = NaiveDateTime::new(date, time);
                    if candidate <= local_after {
                        continue;
                    }
                    // Spring-forward gaps skip the occurrence; fall-back
                    // ambiguity resolves to the earlier instant.
                    match tz.from_local_datetime(&candidate).earliest() {
                        Some(resolved) => {
                            let utc = resolved.with_timezone(&Utc);
                            if utc > after {
                                return Some(utc);
                            }
                        }
                        None => continue,
                    }
                }
            }
        }

        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        if !self.months.contains(&date.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(&date.day());
        let dow = self
            .days_of_week
            .contains(&date.weekday().num_days_from_sunday());

        // Vixie-cron rule: when both day fields are restricted, either one
        // matching selects the day.
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }
}

fn parse_field(
    field: &str,
    min: u32,
    max: u32,
    names: &[(&str, u32)],
) -> Result<Vec<u32>, String> {
    if field.is_empty() {
        return Err("empty field".to_string());
    }

    let mut values = Vec::new();
    for part in field.split(',') {
        let (base, step) = match part.split_once('/') {
            Some((base, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("bad step in '{}'", part))?;
                if step == 0 {
                    return Err(format!("zero step in '{}'", part));
                }
                (base, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if base == "*" {
            (min, max)
        } else if let Some((lo, hi)) = base.split_once('-') {
            (
                parse_value(lo, names).ok_or_else(|| format!("bad value '{}'", lo))?,
                parse_value(hi, names).ok_or_else(|| format!("bad value '{}'", hi))?,
            )
        } else {
            let value = parse_value(base, names).ok_or_else(|| format!("bad value '{}'", base))?;
            (value, value)
        };

        if lo > hi {
            return Err(format!("inverted range '{}'", part));
        }
        if lo < min || hi > max {
            return Err(format!("'{}' outside {}-{}", part, min, max));
        }

        let mut value = lo;
        while value <= hi {
            values.push(value);
            value += step;
        }
    }

    values.sort_unstable();
    values.dedup();
    Ok(values)
}

fn parse_value(token: &str, names: &[(&str, u32)]) -> Option<u32> {
    if let Ok(value) = token.parse::<u32>() {
        return Some(value);
    }
    let lowered = token.to_lowercase();
    names
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, value)| *value)
}
