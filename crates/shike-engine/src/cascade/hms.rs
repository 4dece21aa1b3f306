//! Hour-minute-second rules: clock times, hour fractions, blurred hour
//! ranges and bare day periods.
//!
//! A day-period word in front of an hour shifts it into the right half of
//! the day (`下午3点` is 15:00). `晚上12点` and `24时` produce an hour of 24,
//! which carries a day bias for the matcher to roll into the next day.

use regex::Captures;

use super::{Context, Family, Normalized, Normalizer, Rule};
use crate::error::{Result, ShikeError};
use crate::handler::{DayBias, Field, TimeHandler};
use crate::numeral::parse_int;

const HOUR: &str = "2[0-4]|[01]?[0-9]|二十[一二三四]?|十[一二三四五六七八九]?|[零〇一二三四五六七八九两]";

const MINUTE: &str =
    "[0-5]?[0-9]|[二三四五]十[一二三四五六七八九]?|十[一二三四五六七八九]?|[零〇][一二三四五六七八九]|[一二三四五六七八九]";

pub(crate) const PERIOD: &str =
    "凌晨|清晨|早晨|早上|上午|中午|午间|下午|午后|傍晚|晚上|晚间|夜晚|夜里|夜间|深夜|半夜|午夜|白天|早|晚";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HmsForm {
    Clock,
    Fraction,
    Minute,
    HourRange,
    DayPeriod,
}

fn rule(name: &'static str, pattern: &str, form: HmsForm) -> Rule {
    Rule::new(name, Family::Hms, pattern, Normalizer::Hms(form))
}

pub(super) fn rules() -> Vec<Rule> {
    let period = format!("(?:(?P<period>{PERIOD}))?");
    vec![
        rule(
            "clock_colon",
            &format!(
                "{period}(?P<hour>2[0-4]|[01]?[0-9])[:：](?P<minute>[0-5][0-9])(?:[:：](?P<second>[0-5][0-9]))?(?P<approx>左右|前后)?"
            ),
            HmsForm::Clock,
        ),
        rule(
            "clock",
            &format!(
                "{period}(?P<hour>{HOUR})[点时]钟?(?:(?P<minute>{MINUTE})分?(?:(?P<second>{MINUTE})秒)?|(?P<whole>整))?(?P<approx>左右|前后|许)?"
            ),
            HmsForm::Clock,
        ),
        rule(
            "clock_fraction",
            &format!("{period}(?P<hour>{HOUR})[点时](?P<frac>过一刻|一刻|三刻|半)(?P<approx>左右|前后|许)?"),
            HmsForm::Fraction,
        ),
        rule(
            "minute_of_hour",
            &format!("(?P<minute>{MINUTE})分(?:(?P<second>{MINUTE})秒)?(?P<approx>左右|前后)?"),
            HmsForm::Minute,
        ),
        rule(
            "hour_range",
            &format!("{period}(?P<h1>{HOUR})(?P<sep>[、到至~-])?(?P<h2>{HOUR})[点时](?P<approx>左右|前后)?"),
            HmsForm::HourRange,
        )
        .guard(|c| {
            let consecutive = parse_int(&c["h1"])
                .zip(parse_int(&c["h2"]))
                .is_some_and(|(a, b)| b == a + 1);
            let chinese = |name: &str| !c[name].starts_with(|ch: char| ch.is_ascii_digit());
            let separated = c.name("sep").is_some() || (chinese("h1") && chinese("h2"));
            consecutive && separated
        }),
        rule("day_period", &format!("(?P<period>{PERIOD})"), HmsForm::DayPeriod),
    ]
}

pub(super) fn normalize(form: HmsForm, caps: &Captures<'_>, _ctx: &Context<'_>) -> Result<Normalized> {
    let period = caps.name("period").map(|m| m.as_str());
    let approx = caps.name("approx").is_some();
    let n = match form {
        HmsForm::Clock | HmsForm::Fraction => {
            let hour = int(caps, "hour")?.ok_or_else(|| unreadable(caps))?;
            let minute = if caps.name("whole").is_some() {
                Some(0)
            } else if let Some(frac) = caps.name("frac") {
                Some(match frac.as_str() {
                    "半" => 30,
                    "三刻" => 45,
                    _ => 15,
                })
            } else {
                int(caps, "minute")?
            };
            let second = int(caps, "second")?;
            clock(period, hour, minute, second)?
        }
        HmsForm::Minute => {
            let minute = int(caps, "minute")?.ok_or_else(|| unreadable(caps))?;
            minute_of_hour(minute, int(caps, "second")?)?
        }
        HmsForm::HourRange => {
            let first = int(caps, "h1")?.ok_or_else(|| unreadable(caps))?;
            let last = int(caps, "h2")?.ok_or_else(|| unreadable(caps))?;
            let (first, _) = adjust_hour(period, first);
            let (last, bias) = adjust_hour(period, last);
            check_hour(first)?;
            check_hour(last)?;
            let mut n = Normalized::between(hour_handler(first), hour_handler(last)).blur();
            n.day_bias = bias;
            n
        }
        HmsForm::DayPeriod => {
            let (first, last) = period_hours(period.unwrap_or_default());
            Normalized::between(hour_handler(first), hour_handler(last)).blur()
        }
    };
    Ok(if approx { n.blur() } else { n })
}

fn unreadable(caps: &Captures<'_>) -> ShikeError {
    ShikeError::InvalidExpression(format!("cannot read the time in '{}'", &caps[0]))
}

fn int(caps: &Captures<'_>, name: &str) -> Result<Option<i32>> {
    match caps.name(name) {
        Some(m) => parse_int(m.as_str())
            .map(|n| Some(n as i32))
            .ok_or_else(|| unreadable(caps)),
        None => Ok(None),
    }
}

fn hour_handler(hour: i32) -> TimeHandler {
    TimeHandler::unset().with(Field::Hour, hour)
}

fn check_hour(hour: i32) -> Result<()> {
    if (0..=24).contains(&hour) {
        Ok(())
    } else {
        Err(ShikeError::InvalidCalendarDate(format!("hour {hour}")))
    }
}

fn clock(
    period: Option<&str>,
    hour: i32,
    minute: Option<i32>,
    second: Option<i32>,
) -> Result<Normalized> {
    let (hour, bias) = adjust_hour(period, hour);
    check_hour(hour)?;
    let mut h = hour_handler(hour);
    if hour == 24 {
        // 24:00 is the only valid reading; the matcher rolls it to 0:00.
        h.set(Field::Minute, 0);
        h.set(Field::Second, 0);
    } else if let Some(minute) = minute {
        if !(0..=59).contains(&minute) || second.is_some_and(|s| !(0..=59).contains(&s)) {
            return Err(ShikeError::InvalidCalendarDate(format!(
                "{hour}:{minute:02}:{:02}",
                second.unwrap_or(0)
            )));
        }
        h.set(Field::Minute, minute);
        if let Some(second) = second {
            h.set(Field::Second, second);
        }
    }
    let mut n = Normalized::point(h);
    n.day_bias = bias;
    Ok(n)
}

/// `30分` on its own: the hour is left for the time base.
fn minute_of_hour(minute: i32, second: Option<i32>) -> Result<Normalized> {
    if !(0..=59).contains(&minute) || second.is_some_and(|s| !(0..=59).contains(&s)) {
        return Err(ShikeError::InvalidCalendarDate(format!(
            "minute {minute}, second {}",
            second.unwrap_or(0)
        )));
    }
    let mut h = TimeHandler::unset().with(Field::Minute, minute);
    if let Some(second) = second {
        h.set(Field::Second, second);
    }
    Ok(Normalized::point(h))
}

/// Move a written hour into the half of the day its period word names.
fn adjust_hour(period: Option<&str>, hour: i32) -> (i32, Option<DayBias>) {
    let (hour, weak) = match period {
        Some("凌晨") if hour == 12 => (0, false),
        Some("中午" | "午间") if hour <= 3 => (hour + 12, false),
        Some("下午" | "午后" | "傍晚") if hour < 12 => (hour + 12, false),
        Some("晚上" | "晚间" | "夜晚" | "晚") => match hour {
            1..=11 => (hour + 12, false),
            0 | 12 => (24, true),
            _ => (hour, false),
        },
        Some("夜里" | "夜间" | "深夜" | "半夜" | "午夜") => match hour {
            6..=11 => (hour + 12, false),
            12 => (24, true),
            _ => (hour, false),
        },
        _ => (hour, false),
    };
    let bias = match (hour, weak) {
        (24, true) => Some(DayBias::weak()),
        (24, false) => Some(DayBias::strong()),
        _ => None,
    };
    (hour, bias)
}

/// Hours covered by a bare day period.
fn period_hours(period: &str) -> (i32, i32) {
    match period {
        "凌晨" => (0, 5),
        "清晨" => (5, 7),
        "早晨" | "早上" | "早" => (6, 8),
        "上午" => (8, 11),
        "中午" | "午间" => (11, 12),
        "下午" | "午后" => (13, 17),
        "傍晚" => (17, 18),
        "夜里" | "夜间" => (20, 23),
        "深夜" => (22, 23),
        "半夜" | "午夜" => (23, 23),
        "白天" => (6, 17),
        _ => (18, 23),
    }
}
