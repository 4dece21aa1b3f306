//! Recurrences: `每年`, `每两周`, `每隔3天`, `每周五下午4点`.
//!
//! The cycle becomes a [`TimeDelta`]. A trailing sub-expression is resolved
//! against a cursor that starts at the time base and advances by one cycle
//! per step, with future leaning so every occurrence lands at or after the
//! cursor.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDateTime};
use regex::Regex;
use tracing::debug;

use crate::delta::{is_weekend, DeltaUnit, TimeDelta, DAYS_PER_MONTH};
use crate::error::{Result, ShikeError};
use crate::handler::TimeHandler;
use crate::numeral::parse_number;
use crate::resolver::{Edge, Resolved};

static PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^每(?P<gap>隔)?(?P<n>[0-9]+|[零〇一二两三四五六七八九十百]+|半)?个?(?P<unit>年|季度|季|月|周|星期|礼拜|工作日|天|日|小时|钟头|刻钟|分钟|分|秒钟|秒)(?P<rest>.*)$",
    )
    .expect("period pattern")
});

static WEEKDAY_REST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^(?:[一二三四五六日天1-7]|末)").expect("weekday pattern"));

/// A recognised `每…` expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PeriodSpec {
    pub unit: DeltaUnit,
    pub count: f64,
    /// The sub-expression placing each occurrence within its cycle.
    pub rest: Option<String>,
}

/// An expanded recurrence.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Period {
    pub delta: TimeDelta,
    pub rest: Option<String>,
    pub occurrences: Vec<Resolved>,
}

pub(crate) fn recognize(text: &str) -> Option<PeriodSpec> {
    let caps = PERIOD.captures(text)?;
    let unit_word = &caps["unit"];
    let unit = DeltaUnit::from_word(unit_word)?;
    let count = match caps.name("n") {
        Some(n) => parse_number(n.as_str()).or_else(|| (n.as_str() == "半").then_some(0.5))?,
        None => 1.0,
    };
    if count <= 0.0 {
        return None;
    }
    let rest = caps["rest"].trim();
    let rest = if rest.is_empty() {
        None
    } else if unit == DeltaUnit::Week && WEEKDAY_REST.is_match(rest) {
        // `每周五`: the weekday needs its week word back.
        Some(format!("{unit_word}{rest}"))
    } else {
        Some(rest.to_string())
    };
    Some(PeriodSpec { unit, count, rest })
}

/// How far the cursor moves for one cycle.
fn step(unit: DeltaUnit, count: f64) -> Result<Duration> {
    let seconds = match unit {
        DeltaUnit::Year => 365.0 * 86_400.0,
        DeltaUnit::Quarter => 3.0 * DAYS_PER_MONTH * 86_400.0,
        DeltaUnit::Month => DAYS_PER_MONTH * 86_400.0,
        DeltaUnit::Week => 7.0 * 86_400.0,
        DeltaUnit::Workday | DeltaUnit::Day => 86_400.0,
        DeltaUnit::Hour => 3_600.0,
        DeltaUnit::QuarterHour => 900.0,
        DeltaUnit::Minute => 60.0,
        DeltaUnit::Second => 1.0,
    };
    Duration::try_seconds((seconds * count).round() as i64)
        .filter(|d| *d > Duration::zero())
        .ok_or_else(|| ShikeError::InvalidExpression(format!("cannot step by {count} {unit:?}")))
}

/// Expand `spec` into up to `count` occurrences.
///
/// `resolve` reads the sub-expression against a cursor handler. Candidates
/// that do not move past the previous occurrence are skipped, as are
/// weekend candidates of a workday cycle.
pub(crate) fn expand<F>(
    spec: &PeriodSpec,
    base: &TimeHandler,
    count: usize,
    mut resolve: F,
) -> Result<Period>
where
    F: FnMut(&str, &TimeHandler) -> Result<Resolved>,
{
    let delta = TimeDelta::of(spec.unit, spec.count);
    let Some(rest) = spec.rest.clone() else {
        return Ok(Period {
            delta,
            rest: None,
            occurrences: Vec::new(),
        });
    };

    let stride = step(spec.unit, spec.count)?;
    let detail = base.prefix_len();
    let mut cursor: NaiveDateTime = base.lower_bound()?;
    let mut occurrences: Vec<Resolved> = Vec::with_capacity(count);
    let mut last: Option<Edge> = None;
    let attempts = count.saturating_mul(3).saturating_add(8);

    for _ in 0..attempts {
        if occurrences.len() >= count {
            break;
        }
        let at = TimeHandler::from_datetime(&cursor).truncate(detail);
        let candidate = resolve(&rest, &at)?;
        let fresh = last.is_none_or(|prev| candidate.start > prev);
        let on_workday = match candidate.start {
            Edge::At(start) => spec.unit != DeltaUnit::Workday || !is_weekend(&start),
            _ => true,
        };
        if fresh && on_workday {
            last = Some(candidate.start);
            occurrences.push(candidate);
        }
        cursor = cursor.checked_add_signed(stride).ok_or_else(|| {
            ShikeError::InvalidCalendarDate(format!("{cursor} advanced past the calendar"))
        })?;
    }
    debug!(rest = %rest, found = occurrences.len(), wanted = count, "period occurrences");

    Ok(Period {
        delta,
        rest: Some(rest),
        occurrences,
    })
}
