//! Durations.
//!
//! Bare duration grammar (`3天`, `一个半月`, `两年零三个月`), ranges
//! (`3到5天`, `三五天`), legal thresholds (`三年以上`, `不满一年`) and the
//! arithmetic that anchors a duration to a time base.
//!
//! Each unit has one anchored segment pattern; a duration is a sequence of
//! segments in descending unit order that consumes the whole text.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, Months, NaiveDateTime, Weekday};
use regex::Regex;
use serde::Serialize;

use crate::error::{Result, ShikeError};
use crate::handler::{Bound, Field, TimeHandler};
use crate::numeral::parse_number;
use crate::result::{DeltaValue, Kind, Precision};

/// Average month length used for fractional months.
pub const DAYS_PER_MONTH: f64 = 30.417;

/// A structured duration. Unset units are omitted when serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workday: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second: Option<f64>,
    /// Open upper end of a threshold (`N以上`).
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub infinite: bool,
    /// Open lower end of a threshold (`N以下`).
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub zero: bool,
}

impl TimeDelta {
    pub fn infinite() -> Self {
        Self {
            infinite: true,
            ..Self::default()
        }
    }

    pub fn zero() -> Self {
        Self {
            zero: true,
            ..Self::default()
        }
    }

    /// A delta of `amount` in a single unit.
    pub fn of(unit: DeltaUnit, amount: f64) -> Self {
        let mut delta = Self::default();
        unit.add_to(&mut delta, amount);
        delta
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_none()
            && self.month.is_none()
            && self.day.is_none()
            && self.workday.is_none()
            && self.hour.is_none()
            && self.minute.is_none()
            && self.second.is_none()
    }

    /// The finest handler field this delta touches.
    pub fn granularity(&self) -> Option<Field> {
        if self.second.is_some() {
            Some(Field::Second)
        } else if self.minute.is_some() {
            Some(Field::Minute)
        } else if self.hour.is_some() {
            Some(Field::Hour)
        } else if self.day.is_some() || self.workday.is_some() {
            Some(Field::Day)
        } else if self.month.is_some() {
            Some(Field::Month)
        } else if self.year.is_some() {
            Some(Field::Year)
        } else {
            None
        }
    }

    /// Move `from` by this delta, forwards or backwards.
    ///
    /// Whole months use calendar arithmetic (clamping the day), fractional
    /// months are converted at [`DAYS_PER_MONTH`] and workdays skip weekends.
    pub fn shift(&self, from: NaiveDateTime, forward: bool) -> Result<NaiveDateTime> {
        let sign = if forward { 1.0 } else { -1.0 };
        let overflow = || ShikeError::InvalidCalendarDate(format!("{from} shifted by {self:?}"));

        let months = (self.year.unwrap_or(0.0) * 12.0 + self.month.unwrap_or(0.0)) * sign;
        let whole = months.trunc();
        let mut dt = if whole >= 0.0 {
            from.checked_add_months(Months::new(whole as u32))
        } else {
            from.checked_sub_months(Months::new((-whole) as u32))
        }
        .ok_or_else(overflow)?;

        let days = self.day.unwrap_or(0.0) * sign + (months - whole) * DAYS_PER_MONTH;
        let seconds = days * 86_400.0
            + (self.hour.unwrap_or(0.0) * 3600.0
                + self.minute.unwrap_or(0.0) * 60.0
                + self.second.unwrap_or(0.0))
                * sign;
        let step = Duration::try_milliseconds((seconds * 1000.0).round() as i64).ok_or_else(overflow)?;
        dt = dt.checked_add_signed(step).ok_or_else(overflow)?;

        if let Some(workdays) = self.workday {
            dt = step_workdays(dt, workdays.round() as i64, forward).ok_or_else(overflow)?;
        }
        Ok(dt)
    }
}

pub(crate) fn is_weekend(dt: &NaiveDateTime) -> bool {
    matches!(dt.weekday(), Weekday::Sat | Weekday::Sun)
}

fn step_workdays(mut dt: NaiveDateTime, count: i64, forward: bool) -> Option<NaiveDateTime> {
    let one = if forward { Duration::days(1) } else { Duration::days(-1) };
    let mut left = count;
    while left > 0 {
        dt = dt.checked_add_signed(one)?;
        if !is_weekend(&dt) {
            left -= 1;
        }
    }
    Some(dt)
}

/// The units a duration segment can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaUnit {
    Year,
    Quarter,
    Month,
    Week,
    Workday,
    Day,
    Hour,
    QuarterHour,
    Minute,
    Second,
}

impl DeltaUnit {
    /// Descending order; segments must appear in this order.
    pub const ORDER: [DeltaUnit; 10] = [
        DeltaUnit::Year,
        DeltaUnit::Quarter,
        DeltaUnit::Month,
        DeltaUnit::Week,
        DeltaUnit::Workday,
        DeltaUnit::Day,
        DeltaUnit::Hour,
        DeltaUnit::QuarterHour,
        DeltaUnit::Minute,
        DeltaUnit::Second,
    ];

    fn pattern(self) -> &'static str {
        match self {
            DeltaUnit::Year => "年",
            DeltaUnit::Quarter => "季度",
            DeltaUnit::Month => "月",
            DeltaUnit::Week => "周|星期|礼拜",
            DeltaUnit::Workday => "工作日",
            DeltaUnit::Day => "天|日",
            DeltaUnit::Hour => "小时|钟头",
            DeltaUnit::QuarterHour => "刻钟",
            DeltaUnit::Minute => "分钟|分",
            DeltaUnit::Second => "秒钟|秒",
        }
    }

    /// Unit named by a recurrence word (`每年`, `每个月`, `每周`).
    pub fn from_word(word: &str) -> Option<DeltaUnit> {
        let unit = match word {
            "年" => DeltaUnit::Year,
            "季度" | "季" => DeltaUnit::Quarter,
            "月" => DeltaUnit::Month,
            "周" | "星期" | "礼拜" => DeltaUnit::Week,
            "工作日" => DeltaUnit::Workday,
            "天" | "日" => DeltaUnit::Day,
            "小时" | "钟头" => DeltaUnit::Hour,
            "刻钟" => DeltaUnit::QuarterHour,
            "分钟" | "分" => DeltaUnit::Minute,
            "秒钟" | "秒" => DeltaUnit::Second,
            _ => return None,
        };
        Some(unit)
    }

    pub(crate) fn add_to(self, delta: &mut TimeDelta, amount: f64) {
        let (slot, scale) = match self {
            DeltaUnit::Year => (&mut delta.year, 1.0),
            DeltaUnit::Quarter => (&mut delta.month, 3.0),
            DeltaUnit::Month => (&mut delta.month, 1.0),
            DeltaUnit::Week => (&mut delta.day, 7.0),
            DeltaUnit::Workday => (&mut delta.workday, 1.0),
            DeltaUnit::Day => (&mut delta.day, 1.0),
            DeltaUnit::Hour => (&mut delta.hour, 1.0),
            DeltaUnit::QuarterHour => (&mut delta.minute, 15.0),
            DeltaUnit::Minute => (&mut delta.minute, 1.0),
            DeltaUnit::Second => (&mut delta.second, 1.0),
        };
        *slot = Some(slot.unwrap_or(0.0) + amount * scale);
    }
}

// ── Grammar ──────────────────────────────────────────────────────────────

const NUM: &str = r"[0-9]+(?:\.[0-9]+)?|[零〇一二两三四五六七八九十百千万廿卅]+";

/// Characters a duration may be written with, for embedding in larger patterns.
const DELTA_CHARS: &str = r"[0-9.零〇一二两三四五六七八九十百千万廿卅半多余来个又]";

const ANY_UNIT: &str = "年|季度|月|周|星期|礼拜|工作日|天|日|小时|钟头|刻钟|分钟|分|秒钟|秒";

/// Units at day granularity or coarser.
pub(crate) const COARSE_UNITS: &str = "年|季度|月|周|星期|礼拜|工作日|天|日";

/// Units finer than a day.
pub(crate) const FINE_UNITS: &str = "小时|钟头|刻钟|分钟|分|秒钟|秒";

/// A named `delta` capture group for a duration whose last unit matches `tail`.
pub(crate) fn delta_fragment(tail: &str) -> String {
    format!("(?P<delta>(?:{DELTA_CHARS}+?(?:{ANY_UNIT})[半多]?)*?{DELTA_CHARS}+?(?:{tail})[半多余]?)")
}

struct Segment {
    unit: DeltaUnit,
    re: Regex,
}

static SEGMENTS: LazyLock<Vec<Segment>> = LazyLock::new(|| {
    DeltaUnit::ORDER
        .iter()
        .map(|&unit| Segment {
            unit,
            re: Regex::new(&format!(
                r"^(?:(?P<num>{NUM})(?P<approx>多|余|来)?)?(?P<ge>个)?(?P<half>半)?(?P<ge2>个)?(?P<more>多)?(?P<unit>{})(?P<half2>半)?(?P<more2>多|余)?",
                unit.pattern()
            ))
            .expect("delta segment pattern"),
        })
        .collect()
});

/// Text that reads as a calendar year before it reads as a duration.
///
/// Two digits followed by `年` are a two-digit year (`98年`, `21年`), and so
/// are two Chinese digits, which puts `三五年` at 2035 rather than "three to
/// five years". Only [`parse_delta_forced`] reads these as durations.
static YEAR_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9]{4}|[0-9]{2}|[零〇一二三四五六七八九]{2,4})年$").expect("year-like pattern")
});

/// A four-digit year, which no duration range or threshold ends on.
static FULL_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9]{4}|[零〇一二三四五六七八九]{4})年$").expect("full year pattern")
});

static LEADING_NUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^(?:{NUM})")).expect("leading numeral pattern"));

static ADJACENT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<a>[一二两三四五六七八九])(?P<b>[二三四五六七八九])(?P<rest>.+)$")
        .expect("adjacent numeral range pattern")
});

static THRESHOLD_BOTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<low>.+?)以上[，,、]?(?P<high>.+?)以下$").expect("threshold pattern")
});

const FUZZY_PREFIXES: [&str; 6] = ["大约", "大概", "约莫", "差不多", "将近", "约"];
const FUZZY_SUFFIXES: [&str; 2] = ["左右", "上下"];
const RANGE_CONNECTORS: [&str; 7] = ["到", "至", "~", "～", "-", "—", "或"];

/// Which context-dependent unit spellings a parse accepts.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DeltaGrammar {
    /// Accept `N月` without `个` as months.
    pub bare_month: bool,
    /// Accept `N日` as days.
    pub day_ri: bool,
}

impl DeltaGrammar {
    pub(crate) const FORCED: DeltaGrammar = DeltaGrammar {
        bare_month: true,
        day_ri: true,
    };

    pub(crate) const EMBEDDED: DeltaGrammar = DeltaGrammar {
        bare_month: false,
        day_ri: true,
    };
}

/// A parsed duration with its precision.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDelta {
    pub value: DeltaValue,
    pub precision: Precision,
}

/// Parse a whole string as a duration.
///
/// Strings shaped like a calendar year (`21年`, `2021年`, `九八年`) are not
/// durations here; use [`parse_delta_forced`] to read them as one.
pub fn parse_delta(text: &str) -> Option<ParsedDelta> {
    parse_delta_with(text, DeltaGrammar::default(), false)
}

/// Parse a whole string as a duration, accepting every unit spelling.
pub fn parse_delta_forced(text: &str) -> Option<ParsedDelta> {
    parse_delta_with(text, DeltaGrammar::FORCED, true)
}

pub(crate) fn parse_delta_with(
    text: &str,
    grammar: DeltaGrammar,
    forced: bool,
) -> Option<ParsedDelta> {
    let text = text.trim();
    if text.is_empty() || (!forced && YEAR_LIKE.is_match(text)) {
        return None;
    }
    let (core, fuzzy) = strip_fuzzy(text);
    let base_precision = if fuzzy {
        Precision::Blur
    } else {
        Precision::Accurate
    };

    if let Some(parsed) = parse_threshold(core, grammar, forced) {
        return Some(parsed);
    }
    if let Some((low, high, precision)) = parse_range(core, grammar, forced) {
        return Some(ParsedDelta {
            value: DeltaValue::Range([low, high]),
            precision: base_precision.merge(precision),
        });
    }
    let (delta, precision) = parse_segments(core, grammar)?;
    Some(ParsedDelta {
        value: DeltaValue::Single(delta),
        precision: base_precision.merge(precision),
    })
}

fn strip_fuzzy(text: &str) -> (&str, bool) {
    let mut core = text;
    let mut fuzzy = false;
    if let Some(rest) = FUZZY_PREFIXES.iter().find_map(|p| core.strip_prefix(p)) {
        core = rest;
        fuzzy = true;
    }
    if let Some(rest) = FUZZY_SUFFIXES.iter().find_map(|s| core.strip_suffix(s)) {
        core = rest;
        fuzzy = true;
    }
    (core.trim(), fuzzy)
}

/// Read a sequence of unit segments that must consume all of `text`.
pub(crate) fn parse_segments(text: &str, grammar: DeltaGrammar) -> Option<(TimeDelta, Precision)> {
    let mut rest = text.trim();
    let mut delta = TimeDelta::default();
    let mut blur = false;
    let mut any = false;

    for segment in SEGMENTS.iter() {
        if rest.is_empty() {
            break;
        }
        let Some(caps) = segment.re.captures(rest) else {
            continue;
        };
        let unit_text = caps.name("unit").map_or("", |m| m.as_str());
        let has_ge = caps.name("ge").is_some() || caps.name("ge2").is_some();
        let has_half = caps.name("half").is_some() || caps.name("half2").is_some();
        if segment.unit == DeltaUnit::Month && !grammar.bare_month && !has_ge && !has_half {
            return None;
        }
        if segment.unit == DeltaUnit::Day && unit_text == "日" && !grammar.day_ri {
            return None;
        }
        let mut amount = match caps.name("num") {
            Some(m) => parse_number(m.as_str())?,
            None if has_half => 0.0,
            None => return None,
        };
        if has_half {
            amount += 0.5;
        }
        blur |= ["approx", "more", "more2"]
            .iter()
            .any(|name| caps.name(name).is_some());
        segment.unit.add_to(&mut delta, amount);
        any = true;

        let consumed = caps.get(0).map_or(0, |m| m.end());
        rest = &rest[consumed..];
        if let Some(joined) = rest.strip_prefix('零').or_else(|| rest.strip_prefix('又')) {
            if !joined.is_empty() {
                rest = joined;
            }
        }
    }

    if !any || !rest.is_empty() {
        return None;
    }
    let precision = if blur {
        Precision::Blur
    } else {
        Precision::Accurate
    };
    Some((delta, precision))
}

/// `2008年到2018年` and `2008到2018年` name calendar years on each side.
fn year_range(left: &str, right: &str) -> bool {
    YEAR_LIKE.is_match(left.trim()) || FULL_YEAR.is_match(right.trim())
}

fn parse_range(
    text: &str,
    grammar: DeltaGrammar,
    forced: bool,
) -> Option<(TimeDelta, TimeDelta, Precision)> {
    for connector in RANGE_CONNECTORS {
        let Some((left, right)) = text.split_once(connector) else {
            continue;
        };
        if !forced && year_range(left, right) {
            return None;
        }
        let Some((high, p_high)) = parse_segments(right, grammar) else {
            continue;
        };
        let low = parse_segments(left, grammar).or_else(|| {
            // `3到5天`: the left side borrows the right side's units
            let num_len = LEADING_NUM.find(right.trim())?.end();
            let units = &right.trim()[num_len..];
            parse_segments(&format!("{}{units}", left.trim()), grammar)
        });
        if let Some((low, p_low)) = low {
            return Some((low, high, p_low.merge(p_high)));
        }
    }

    let caps = ADJACENT_RANGE.captures(text)?;
    let a = parse_number(&caps["a"])?;
    let b = parse_number(&caps["b"])?;
    if b <= a {
        return None;
    }
    let rest = &caps["rest"];
    let (low, p_low) = parse_segments(&format!("{}{rest}", &caps["a"]), grammar)?;
    let (high, p_high) = parse_segments(&format!("{}{rest}", &caps["b"]), grammar)?;
    Some((low, high, p_low.merge(p_high)))
}

fn parse_threshold(text: &str, grammar: DeltaGrammar, forced: bool) -> Option<ParsedDelta> {
    let year_side = |side: &str| !forced && FULL_YEAR.is_match(side.trim());
    if let Some(caps) = THRESHOLD_BOTH.captures(text) {
        if year_side(&caps["low"]) || year_side(&caps["high"]) {
            return None;
        }
        let (low, _) = parse_segments(&caps["low"], grammar)?;
        let (high, _) = parse_segments(&caps["high"], grammar)?;
        return Some(ParsedDelta {
            value: DeltaValue::Range([low, high]),
            precision: Precision::Accurate,
        });
    }
    if let Some(low) = text.strip_suffix("以上") {
        if year_side(low) {
            return None;
        }
        let (low, _) = parse_segments(low, grammar)?;
        return Some(ParsedDelta {
            value: DeltaValue::Range([low, TimeDelta::infinite()]),
            precision: Precision::BlurPlus,
        });
    }
    let high = ["不满", "不足", "未满"]
        .iter()
        .find_map(|p| text.strip_prefix(p))
        .or_else(|| text.strip_suffix("以下"))?;
    if year_side(high) {
        return None;
    }
    let (high, _) = parse_segments(high, grammar)?;
    Some(ParsedDelta {
        value: DeltaValue::Range([TimeDelta::zero(), high]),
        precision: Precision::BlurMinus,
    })
}

// ── Anchoring ────────────────────────────────────────────────────────────

/// How a duration is placed relative to the time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeltaAnchor {
    /// `未来三天`, `三天内`: from the base to base + N.
    Future,
    /// `过去三天`, `三天来`: from base - N to the base.
    Past,
    /// `三天后`, `再过三天`
    After,
    /// `三天前`
    Before,
    /// `三天以后`: from base + N onwards.
    OpenAfter,
    /// `三天以前`: everything up to base - N.
    OpenBefore,
}

/// Place `delta` against `base`.
///
/// Coarse deltas (day or coarser) snap a shifted point to the delta's unit
/// and report a span; fine deltas produce an exact instant. Windows that
/// start or end at the base keep as much detail as the base has.
pub(crate) fn anchor_delta(
    delta: &TimeDelta,
    anchor: DeltaAnchor,
    base: &TimeHandler,
) -> Result<(Bound, Bound, Kind)> {
    let granularity = delta
        .granularity()
        .ok_or_else(|| ShikeError::InvalidExpression("empty duration".to_string()))?;
    let fine = granularity >= Field::Hour;
    let keep = granularity as usize + 1;
    let required = if fine { Field::Hour as usize + 1 } else { keep };
    if base.prefix_len() < required {
        return Err(ShikeError::IncompleteTimeBase(format!(
            "a {} duration needs the time base down to the {}",
            granularity.name(),
            Field::ALL[required - 1].name()
        )));
    }

    let from = base.lower_bound()?;
    let shifted = |forward: bool, len: usize| -> Result<TimeHandler> {
        let dt = delta.shift(from, forward)?;
        Ok(TimeHandler::from_datetime(&dt).truncate(len))
    };
    let unit_len = if fine { 6 } else { keep };
    // Windows reaching back to or forward from the base keep the base's detail.
    let window_len = unit_len.max(base.prefix_len());

    let out = match anchor {
        DeltaAnchor::Future => (
            Bound::At(*base),
            Bound::At(shifted(true, window_len)?),
            Kind::Span,
        ),
        DeltaAnchor::Past => (
            Bound::At(shifted(false, window_len)?),
            Bound::At(*base),
            Kind::Span,
        ),
        DeltaAnchor::After | DeltaAnchor::Before => {
            let at = shifted(anchor == DeltaAnchor::After, unit_len)?;
            let kind = if fine { Kind::Point } else { Kind::Span };
            (Bound::At(at), Bound::At(at), kind)
        }
        DeltaAnchor::OpenAfter => (Bound::At(shifted(true, unit_len)?), Bound::PosInf, Kind::Span),
        DeltaAnchor::OpenBefore => (Bound::NegInf, Bound::At(shifted(false, unit_len)?), Kind::Span),
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(text: &str) -> (TimeDelta, Precision) {
        let parsed = parse_delta(text).unwrap();
        match parsed.value {
            DeltaValue::Single(d) => (d, parsed.precision),
            other => panic!("expected a single delta, got {other:?}"),
        }
    }

    fn range(text: &str) -> ([TimeDelta; 2], Precision) {
        let parsed = parse_delta(text).unwrap();
        match parsed.value {
            DeltaValue::Range(r) => (r, parsed.precision),
            other => panic!("expected a range, got {other:?}"),
        }
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    // ── Grammar ──────────────────────────────────────────────────────────

    #[test]
    fn test_simple_units() {
        assert_eq!(single("3天").0.day, Some(3.0));
        assert_eq!(single("两年").0.year, Some(2.0));
        assert_eq!(single("5个月").0.month, Some(5.0));
        assert_eq!(single("2周").0.day, Some(14.0));
        assert_eq!(single("一刻钟").0.minute, Some(15.0));
        assert_eq!(single("3个工作日").0.workday, Some(3.0));
        assert_eq!(single("两个季度").0.month, Some(6.0));
    }

    #[test]
    fn test_half_units() {
        assert_eq!(single("半年").0.year, Some(0.5));
        assert_eq!(single("一个半月").0.month, Some(1.5));
        assert_eq!(single("半个月").0.month, Some(0.5));
        assert_eq!(single("一天半").0.day, Some(1.5));
    }

    #[test]
    fn test_compound_duration() {
        let (d, p) = single("1年零3个月");
        assert_eq!(d.year, Some(1.0));
        assert_eq!(d.month, Some(3.0));
        assert_eq!(p, Precision::Accurate);
        let (d, _) = single("2小时30分钟");
        assert_eq!(d.hour, Some(2.0));
        assert_eq!(d.minute, Some(30.0));
    }

    #[test]
    fn test_fuzzy_markers() {
        assert_eq!(single("三天多").1, Precision::Blur);
        assert_eq!(single("十来天").1, Precision::Blur);
        assert_eq!(single("大约3小时").1, Precision::Blur);
        assert_eq!(single("5分钟左右").1, Precision::Blur);
    }

    #[test]
    fn test_year_shaped_text_is_not_a_delta() {
        assert!(parse_delta("21年").is_none());
        assert!(parse_delta("2021年").is_none());
        assert!(parse_delta("九八年").is_none());
        assert_eq!(
            parse_delta_forced("21年").map(|p| p.value),
            Some(DeltaValue::Single(TimeDelta::of(DeltaUnit::Year, 21.0)))
        );
    }

    #[test]
    fn test_calendar_year_ranges_are_not_deltas() {
        for text in ["2008年到2018年", "2008年-2018年", "2019年至2021年", "98年到2005年", "2008到2018年"] {
            assert!(parse_delta(text).is_none(), "{text}");
        }
        assert!(parse_delta("2000年以上").is_none());
        assert!(parse_delta("不满2000年").is_none());

        let ([a, b], _) = range("10到20年");
        assert_eq!((a.year, b.year), (Some(10.0), Some(20.0)));
        assert!(parse_delta_forced("2008年到2018年").is_some());
    }

    #[test]
    fn test_two_chinese_digits_before_nian_are_a_year() {
        assert!(parse_delta("三五年").is_none());
        let parsed = parse_delta_forced("三五年").unwrap();
        let DeltaValue::Range([a, b]) = parsed.value else {
            panic!("expected a range, got {:?}", parsed.value);
        };
        assert_eq!((a.year, b.year), (Some(3.0), Some(5.0)));
    }

    #[test]
    fn test_month_and_ri_need_context() {
        assert!(parse_delta("3月").is_none());
        assert!(parse_delta("18日").is_none());
        assert!(parse_delta_forced("18日").is_some());
    }

    #[test]
    fn test_unknown_quantity_rejected() {
        assert!(parse_delta("几天").is_none());
        assert!(parse_delta("天").is_none());
        assert!(parse_delta("3天后").is_none());
    }

    #[test]
    fn test_ranges() {
        let ([a, b], _) = range("3到5天");
        assert_eq!(a.day, Some(3.0));
        assert_eq!(b.day, Some(5.0));
        let ([a, b], _) = range("3-5周");
        assert_eq!(a.day, Some(21.0));
        assert_eq!(b.day, Some(35.0));
        let ([a, b], _) = range("两三年");
        assert_eq!(a.year, Some(2.0));
        assert_eq!(b.year, Some(3.0));
        let ([a, b], _) = range("三五天");
        assert_eq!(a.day, Some(3.0));
        assert_eq!(b.day, Some(5.0));
    }

    #[test]
    fn test_thresholds() {
        let ([low, high], p) = range("三年以上");
        assert_eq!(low.year, Some(3.0));
        assert!(high.infinite);
        assert_eq!(p, Precision::BlurPlus);

        let ([low, high], p) = range("不满一年");
        assert!(low.zero);
        assert_eq!(high.year, Some(1.0));
        assert_eq!(p, Precision::BlurMinus);

        let ([low, high], p) = range("三年以上，七年以下");
        assert_eq!(low.year, Some(3.0));
        assert_eq!(high.year, Some(7.0));
        assert_eq!(p, Precision::Accurate);
    }

    #[test]
    fn test_serialize_omits_unset_units() {
        let json = serde_json::to_value(TimeDelta::of(DeltaUnit::Day, 3.0)).unwrap();
        assert_eq!(json, serde_json::json!({"day": 3.0}));
        let json = serde_json::to_value(TimeDelta::infinite()).unwrap();
        assert_eq!(json, serde_json::json!({"infinite": true}));
    }

    // ── Arithmetic ───────────────────────────────────────────────────────

    #[test]
    fn test_shift_months_clamps_day() {
        let d = TimeDelta::of(DeltaUnit::Month, 1.0);
        let out = d.shift(dt("2021-01-31 00:00:00"), true).unwrap();
        assert_eq!(out, dt("2021-02-28 00:00:00"));
    }

    #[test]
    fn test_shift_backwards() {
        let d = TimeDelta::of(DeltaUnit::Hour, 3.0);
        let out = d.shift(dt("2021-06-14 01:00:00"), false).unwrap();
        assert_eq!(out, dt("2021-06-13 22:00:00"));
    }

    #[test]
    fn test_shift_workdays_skip_weekend() {
        // 2021-06-11 is a Friday
        let d = TimeDelta::of(DeltaUnit::Workday, 1.0);
        let out = d.shift(dt("2021-06-11 09:00:00"), true).unwrap();
        assert_eq!(out, dt("2021-06-14 09:00:00"));
    }

    #[test]
    fn test_anchor_coarse_after_is_span() {
        let base = TimeHandler::from_prefix(&[2021]);
        let d = TimeDelta::of(DeltaUnit::Year, 3.0);
        let (start, end, kind) = anchor_delta(&d, DeltaAnchor::After, &base).unwrap();
        assert_eq!(kind, Kind::Span);
        assert_eq!(start, Bound::At(TimeHandler::from_prefix(&[2024])));
        assert_eq!(end, start);
    }

    #[test]
    fn test_anchor_fine_after_is_point() {
        let base = TimeHandler::from_prefix(&[2021, 6, 14, 10, 0, 0]);
        let d = TimeDelta::of(DeltaUnit::Hour, 3.0);
        let (start, _, kind) = anchor_delta(&d, DeltaAnchor::After, &base).unwrap();
        assert_eq!(kind, Kind::Point);
        assert_eq!(start, Bound::At(TimeHandler::from_prefix(&[2021, 6, 14, 13, 0, 0])));
    }

    #[test]
    fn test_anchor_past_window() {
        let base = TimeHandler::from_prefix(&[2021, 6, 14]);
        let d = TimeDelta::of(DeltaUnit::Day, 3.0);
        let (start, end, _) = anchor_delta(&d, DeltaAnchor::Past, &base).unwrap();
        assert_eq!(start, Bound::At(TimeHandler::from_prefix(&[2021, 6, 11])));
        assert_eq!(end, Bound::At(base));
    }

    #[test]
    fn test_anchor_needs_base_fields() {
        let base = TimeHandler::from_prefix(&[2021]);
        let d = TimeDelta::of(DeltaUnit::Day, 3.0);
        assert!(matches!(
            anchor_delta(&d, DeltaAnchor::After, &base),
            Err(ShikeError::IncompleteTimeBase(_))
        ));
    }

    #[test]
    fn test_embedded_fragment() {
        let re = Regex::new(&format!("^{}后$", delta_fragment(COARSE_UNITS))).unwrap();
        let caps = re.captures("一年半后").unwrap();
        assert_eq!(&caps["delta"], "一年半");
        let caps = re.captures("3个月后").unwrap();
        assert_eq!(&caps["delta"], "3个月");
    }
}
