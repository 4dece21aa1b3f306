//! The pattern cascade.
//!
//! Every recognisable expression is a [`Rule`]: a regex recogniser, an
//! optional guard on the captures, and a tagged [`Normalizer`] that turns the
//! captures into start/end handlers. Rules are split into a year-month-day
//! family and an hour-minute-second family, each kept in priority order.
//!
//! Matching a point runs in two steps:
//!
//! 1. recognition: the longest match of each family wins, ties going to the
//!    rule listed first,
//! 2. normalisation: the winning rule(s) produce handlers, which are
//!    completed from the time base and combined when both families matched.

mod festival;
mod hms;
mod ymd;

pub(crate) use hms::PERIOD;

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};
use tracing::trace;

use crate::delta::{self, anchor_delta, DeltaAnchor, DeltaGrammar};
use crate::error::{Result, ShikeError};
use crate::handler::{roll_hour_24, Bound, DayBias, Field, TimeHandler};
use crate::result::{Kind, ParseOptions, Precision};

// ── Shared pattern fragments ─────────────────────────────────────────────

pub(crate) const YEAR: &str = "[0-9]{4}|[0-9]{2}|[零〇一二三四五六七八九]{2,4}";

/// Two-digit months past 12 are captured so the normaliser can reject them.
pub(crate) const MONTH: &str = "1[0-9]|0?[1-9]|十[一二]?|[一二三四五六七八九]";

pub(crate) const DAY: &str = "3[01]|[12][0-9]|0?[1-9]|三十一?|二十[一二三四五六七八九]?|十[一二三四五六七八九]?|廿[一二三四五六七八九]?|卅一?|[一二三四五六七八九]";

/// Relative year words; offsets are given by [`year_offset`].
pub(crate) const LIMIT_YEAR: &str = "大前年|前年|去年|今年|本年|明年|来年|大后年|后年|上一年|下一年";

pub(crate) const WEEKDAY_NOTE: &str = "(?:[（(]?(?:星期|周|礼拜)[一二三四五六日天][)）]?)?";

/// `2021年` or `去年`, captured as `year` / `ylimit`.
pub(crate) fn year_prefix() -> String {
    format!("(?:(?P<year>{YEAR})年|(?P<ylimit>{LIMIT_YEAR}))")
}

pub(crate) fn year_offset(word: &str) -> Option<i32> {
    let offset = match word {
        "大前年" => -3,
        "前年" => -2,
        "去年" | "上一年" => -1,
        "今年" | "本年" => 0,
        "明年" | "来年" | "下一年" => 1,
        "后年" => 2,
        "大后年" => 3,
        _ => return None,
    };
    Some(offset)
}

// ── Rules ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
    Ymd,
    Hms,
}

/// Which base field an expression left for the time base to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rollover {
    Year,
    Month,
    Week,
    Day,
    Hour,
}

pub(crate) type Guard = fn(&Captures<'_>) -> bool;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Normalizer {
    Ymd(ymd::YmdForm),
    Festival(festival::FestivalForm),
    Hms(hms::HmsForm),
    Delta(DeltaAnchor),
}

pub(crate) struct Rule {
    pub name: &'static str,
    pub family: Family,
    pub priority: usize,
    pub recognizer: Regex,
    pub guard: Option<Guard>,
    pub normalizer: Normalizer,
    /// The expression is relative to the time base (`去年`, `下周五`, `3天后`).
    pub limited: bool,
}

impl Rule {
    pub(crate) fn new(
        name: &'static str,
        family: Family,
        pattern: &str,
        normalizer: Normalizer,
    ) -> Self {
        let recognizer = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("rule {name} has an invalid pattern: {e}"));
        Self {
            name,
            family,
            priority: 0,
            recognizer,
            guard: None,
            normalizer,
            limited: false,
        }
    }

    pub(crate) fn guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub(crate) fn limited(mut self) -> Self {
        self.limited = true;
        self
    }

    /// The longest acceptable match of this rule in `text`.
    pub(crate) fn apply<'t>(&self, text: &'t str) -> Option<(Captures<'t>, Range<usize>)> {
        let mut best: Option<(Captures<'t>, Range<usize>)> = None;
        for caps in self.recognizer.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            if m.is_empty() || !on_digit_boundary(text, m.range()) {
                continue;
            }
            if self.guard.is_some_and(|guard| !guard(&caps)) {
                continue;
            }
            if best.as_ref().is_none_or(|(_, r)| m.len() > r.len()) {
                best = Some((caps, m.range()));
            }
        }
        best
    }

    fn normalize(&self, caps: &Captures<'_>, ctx: &Context<'_>) -> Result<Normalized> {
        match self.normalizer {
            Normalizer::Ymd(form) => ymd::normalize(form, caps, ctx),
            Normalizer::Festival(form) => festival::normalize(form, caps, ctx),
            Normalizer::Hms(form) => hms::normalize(form, caps, ctx),
            Normalizer::Delta(anchor) => normalize_delta(anchor, caps, ctx),
        }
    }
}

/// A match must not start or end in the middle of an Arabic number.
///
/// Only an edge that is itself a digit can cut a number, so `16日24时` may
/// end at `日` while `2月` inside `12月` is rejected.
fn on_digit_boundary(text: &str, range: Range<usize>) -> bool {
    let matched = &text[range.clone()];
    let before = text[..range.start].chars().next_back();
    let after = text[range.end..].chars().next();
    let first = matched.chars().next();
    let last = matched.chars().next_back();
    let digits = |a: Option<char>, b: Option<char>| {
        a.is_some_and(|c| c.is_ascii_digit()) && b.is_some_and(|c| c.is_ascii_digit())
    };
    !digits(before, first) && !digits(last, after)
}

// ── Delta conversions ────────────────────────────────────────────────────

fn embedded_delta(caps: &Captures<'_>) -> Option<delta::TimeDelta> {
    let text = caps.name("delta")?.as_str();
    delta::parse_segments(text, DeltaGrammar::EMBEDDED).map(|(d, _)| d)
}

fn coarse_delta(caps: &Captures<'_>) -> bool {
    embedded_delta(caps)
        .and_then(|d| d.granularity())
        .is_some_and(|g| g <= Field::Day)
}

fn fine_delta(caps: &Captures<'_>) -> bool {
    embedded_delta(caps)
        .and_then(|d| d.granularity())
        .is_some_and(|g| g >= Field::Hour)
}

/// Duration-to-time conversions for one family.
fn delta_rules(family: Family) -> Vec<Rule> {
    let (tail, guard): (&str, Guard) = match family {
        Family::Ymd => (delta::COARSE_UNITS, coarse_delta),
        Family::Hms => (delta::FINE_UNITS, fine_delta),
    };
    let d = delta::delta_fragment(tail);
    let forms: [(&'static str, String, DeltaAnchor); 9] = [
        ("delta_future", format!("(?:未来|今后|接下来|往后|此后)的?{d}(?:之内|以内|内)?"), DeltaAnchor::Future),
        ("delta_past", format!("(?:过去|以往|最近|近)的?{d}(?:以来|来)?"), DeltaAnchor::Past),
        ("delta_pass", format!("(?:再过|过了|过){d}(?:之后|以后|后)?"), DeltaAnchor::After),
        ("delta_within", format!("{d}(?:之内|以内|内)"), DeltaAnchor::Future),
        ("delta_since", format!("{d}(?:以来|来)"), DeltaAnchor::Past),
        ("delta_after", format!("{d}(?:之后|后)"), DeltaAnchor::After),
        ("delta_before", format!("{d}(?:之前|前)"), DeltaAnchor::Before),
        ("delta_open_after", format!("{d}以后"), DeltaAnchor::OpenAfter),
        ("delta_open_before", format!("{d}以前"), DeltaAnchor::OpenBefore),
    ];
    forms
        .into_iter()
        .map(|(name, pattern, anchor)| {
            Rule::new(name, family, &pattern, Normalizer::Delta(anchor))
                .guard(guard)
                .limited()
        })
        .collect()
}

fn normalize_delta(anchor: DeltaAnchor, caps: &Captures<'_>, ctx: &Context<'_>) -> Result<Normalized> {
    let delta = embedded_delta(caps)
        .ok_or_else(|| ShikeError::InvalidExpression("unreadable duration".to_string()))?;
    let (start, end, kind) = anchor_delta(&delta, anchor, ctx.base)?;
    Ok(Normalized {
        start,
        end,
        kind,
        precision: Precision::Blur,
        day_bias: None,
        rollover: None,
    })
}

// ── Rule table ───────────────────────────────────────────────────────────

pub(crate) struct RuleSet {
    rules: Vec<Rule>,
}

/// The process-wide rule table, built on first use.
pub(crate) static RULES: LazyLock<RuleSet> = LazyLock::new(RuleSet::build);

impl RuleSet {
    fn build() -> Self {
        let mut rules = ymd::leading_rules();
        rules.extend(delta_rules(Family::Ymd));
        rules.extend(festival::rules());
        rules.extend(ymd::trailing_rules());
        rules.extend(delta_rules(Family::Hms));
        rules.extend(hms::rules());
        for (priority, rule) in rules.iter_mut().enumerate() {
            rule.priority = priority;
        }
        Self { rules }
    }

    pub(crate) fn len(&self) -> usize {
        self.rules.len()
    }

    fn best<'r, 't>(&'r self, family: Family, text: &'t str) -> Option<Candidate<'r, 't>> {
        let mut best: Option<Candidate<'r, 't>> = None;
        for rule in self.rules.iter().filter(|r| r.family == family) {
            let Some((caps, range)) = rule.apply(text) else {
                continue;
            };
            trace!(rule = rule.name, start = range.start, end = range.end, "candidate");
            let better = best.as_ref().is_none_or(|b| {
                range.len() > b.range.len()
                    || (range.len() == b.range.len() && rule.priority < b.rule.priority)
            });
            if better {
                best = Some(Candidate { rule, caps, range });
            }
        }
        best
    }

    /// True when the best reading of `text` depends on the time base.
    pub(crate) fn is_limited(&self, text: &str) -> bool {
        [Family::Ymd, Family::Hms]
            .into_iter()
            .filter_map(|family| self.best(family, text))
            .any(|c| c.rule.limited)
    }

    /// Resolve `text` as a single point (or bounded stretch) of time.
    pub(crate) fn match_point(&self, text: &str, ctx: &Context<'_>) -> Result<MatchResult> {
        let mut ymd = self.best(Family::Ymd, text);
        let mut hms = self.best(Family::Hms, text);

        if let (Some(y), Some(h)) = (&ymd, &hms) {
            if y.range.start < h.range.end && h.range.start < y.range.end {
                if h.range.len() > y.range.len() {
                    ymd = None;
                } else {
                    hms = None;
                }
            }
        }

        let covered: Vec<Range<usize>> = ymd
            .iter()
            .chain(hms.iter())
            .map(|c| c.range.clone())
            .collect();
        if covered.is_empty() {
            return Err(ShikeError::InvalidExpression(format!(
                "no time expression recognised in '{text}'"
            )));
        }
        check_coverage(text, &covered)?;

        let result = match (ymd, hms) {
            (Some(y), None) => {
                trace!(rule = y.rule.name, "ymd only");
                let n = y.rule.normalize(&y.caps, ctx)?;
                let start = n.start.map(|h| h.complete_leading(ctx.base))?;
                let end = n.end.map(|h| h.complete_leading(ctx.base))?;
                MatchResult {
                    matched_text: y.caps[0].to_string(),
                    start,
                    end,
                    kind: n.kind,
                    precision: n.precision,
                    rollover: n.rollover,
                    midnight_rollover: false,
                }
            }
            (None, Some(h)) => {
                trace!(rule = h.rule.name, "hms only");
                let n = h.rule.normalize(&h.caps, ctx)?;
                let rollover = match n.start.handler().and_then(TimeHandler::first_set) {
                    Some(i) if i >= Field::Minute as usize => Some(Rollover::Hour),
                    Some(i) if i >= Field::Hour as usize => Some(Rollover::Day),
                    _ => n.rollover,
                };
                let (start, _) = complete_clock(n.start, ctx.base, n.day_bias)?;
                let (end, rolled) = complete_clock(n.end, ctx.base, n.day_bias)?;
                MatchResult {
                    matched_text: h.caps[0].to_string(),
                    start,
                    end,
                    kind: n.kind,
                    precision: n.precision,
                    rollover,
                    midnight_rollover: rolled,
                }
            }
            (Some(y), Some(h)) => {
                if y.range.start > h.range.start {
                    return Err(ShikeError::AmbiguousExpression(format!(
                        "the time of day precedes the date in '{text}'"
                    )));
                }
                trace!(ymd = y.rule.name, hms = h.rule.name, "ymd + hms");
                let day = y.rule.normalize(&y.caps, ctx)?;
                let clock = h.rule.normalize(&h.caps, ctx)?;
                let anchor = single_day(&day, ctx.base, text)?;
                let (start, _) = attach_clock(clock.start, &anchor, clock.day_bias)?;
                let (end, rolled) = attach_clock(clock.end, &anchor, clock.day_bias)?;
                let kind = if day.kind == Kind::Span || clock.kind == Kind::Span {
                    Kind::Span
                } else {
                    Kind::Point
                };
                let matched = format!("{}{}", &y.caps[0], &h.caps[0]);
                MatchResult {
                    matched_text: matched,
                    start,
                    end,
                    kind,
                    precision: day.precision.merge(clock.precision),
                    rollover: day.rollover,
                    midnight_rollover: rolled,
                }
            }
            (None, None) => unreachable!("coverage is non-empty"),
        };
        Ok(result)
    }
}

struct Candidate<'r, 't> {
    rule: &'r Rule,
    caps: Captures<'t>,
    range: Range<usize>,
}

fn is_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c) || c == '〇'
}

const FILLER: &[char] = &[
    '的', '，', ',', '、', '在', '于', '。', '；', ';', '：', '（', '）', '(', ')',
];

fn check_coverage(text: &str, covered: &[Range<usize>]) -> Result<()> {
    let ideographic = text.chars().any(is_ideograph);
    let stray = text
        .char_indices()
        .filter(|(i, _)| !covered.iter().any(|r| r.contains(i)))
        .map(|(_, c)| c)
        .find(|&c| !(c.is_whitespace() || (ideographic && FILLER.contains(&c))));
    match stray {
        Some(c) => Err(ShikeError::AmbiguousExpression(format!(
            "'{c}' in '{text}' is not part of a time expression"
        ))),
        None => Ok(()),
    }
}

/// The one calendar day a date expression names, completed from the base.
fn single_day(day: &Normalized, base: &TimeHandler, text: &str) -> Result<TimeHandler> {
    let unresolvable = || {
        ShikeError::UnresolvableDay(format!("'{text}' does not name a single day for its time"))
    };
    let (Bound::At(start), Bound::At(end)) = (day.start, day.end) else {
        return Err(unresolvable());
    };
    let start = start.complete_leading(base)?;
    let end = end.complete_leading(base)?;
    if start != end || start.get(Field::Day).is_none() || start.get(Field::Hour).is_some() {
        return Err(unresolvable());
    }
    Ok(start)
}

fn attach_clock(
    clock: Bound,
    day: &TimeHandler,
    bias: Option<DayBias>,
) -> Result<(Bound, bool)> {
    let Bound::At(time) = clock else {
        return Ok((clock, false));
    };
    let mut combined = *day;
    for field in [Field::Hour, Field::Minute, Field::Second] {
        match time.get(field) {
            Some(v) => combined.set(field, v),
            None => combined.clear(field),
        }
    }
    let (rolled, moved) = roll_hour_24(combined, bias, false)?;
    Ok((Bound::At(rolled), moved))
}

fn complete_clock(
    clock: Bound,
    base: &TimeHandler,
    bias: Option<DayBias>,
) -> Result<(Bound, bool)> {
    let Bound::At(time) = clock else {
        return Ok((clock, false));
    };
    let from_base = time.first_set().is_some_and(|i| i >= Field::Hour as usize);
    let completed = time.complete_leading(base)?;
    let (rolled, moved) = roll_hour_24(completed, bias, from_base)?;
    Ok((Bound::At(rolled), moved))
}

// ── Normaliser plumbing ──────────────────────────────────────────────────

/// Per-call inputs shared by all normalisers.
pub(crate) struct Context<'a> {
    pub base: &'a TimeHandler,
    pub options: &'a ParseOptions,
}

impl Context<'_> {
    pub(crate) fn base_year(&self) -> Result<i32> {
        self.base.get(Field::Year).ok_or_else(|| {
            ShikeError::IncompleteTimeBase("the expression needs the year of the time base".to_string())
        })
    }

    pub(crate) fn base_date(&self) -> Result<NaiveDate> {
        let year = self.base_year()?;
        let (Some(month), Some(day)) = (self.base.get(Field::Month), self.base.get(Field::Day)) else {
            return Err(ShikeError::IncompleteTimeBase(
                "the expression needs the day of the time base".to_string(),
            ));
        };
        NaiveDate::from_ymd_opt(year, month as u32, day as u32).ok_or_else(|| {
            ShikeError::InvalidTimeBase(format!("{year}-{month}-{day} is not a date"))
        })
    }

    /// Year and month of the base, shifted by `months`.
    pub(crate) fn base_month_shifted(&self, months: i32) -> Result<(i32, i32)> {
        let year = self.base_year()?;
        let month = self.base.get(Field::Month).ok_or_else(|| {
            ShikeError::IncompleteTimeBase("the expression needs the month of the time base".to_string())
        })?;
        let index = year * 12 + (month - 1) + months;
        Ok((index.div_euclid(12), index.rem_euclid(12) + 1))
    }
}

/// Year named by `year`/`ylimit` captures, and whether it came from the base.
pub(crate) fn captured_year(caps: &Captures<'_>, ctx: &Context<'_>) -> Result<(i32, bool)> {
    if let Some(m) = caps.name("year") {
        let year = crate::numeral::parse_year(m.as_str()).ok_or_else(|| {
            ShikeError::InvalidExpression(format!("'{}' is not a year", m.as_str()))
        })?;
        return Ok((year, false));
    }
    if let Some(m) = caps.name("ylimit") {
        let offset = year_offset(m.as_str()).unwrap_or(0);
        return Ok((ctx.base_year()? + offset, false));
    }
    Ok((ctx.base_year()?, true))
}

/// What a rule's normaliser produces before completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Normalized {
    pub start: Bound,
    pub end: Bound,
    pub kind: Kind,
    pub precision: Precision,
    pub day_bias: Option<DayBias>,
    pub rollover: Option<Rollover>,
}

impl Normalized {
    pub(crate) fn point(handler: TimeHandler) -> Self {
        Self::between(handler, handler)
    }

    pub(crate) fn between(start: TimeHandler, end: TimeHandler) -> Self {
        Self {
            start: Bound::At(start),
            end: Bound::At(end),
            kind: Kind::Point,
            precision: Precision::Accurate,
            day_bias: None,
            rollover: None,
        }
    }

    pub(crate) fn dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self::between(TimeHandler::from_date(start), TimeHandler::from_date(end))
    }

    pub(crate) fn blur(mut self) -> Self {
        self.precision = Precision::Blur;
        self
    }

    pub(crate) fn span(mut self) -> Self {
        self.kind = Kind::Span;
        self
    }

    pub(crate) fn rollover(mut self, rollover: Option<Rollover>) -> Self {
        self.rollover = rollover;
        self
    }
}

pub(crate) fn weekday_monday(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// A resolved single side of an expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MatchResult {
    pub matched_text: String,
    pub start: Bound,
    pub end: Bound,
    pub kind: Kind,
    pub precision: Precision,
    pub rollover: Option<Rollover>,
    /// The end was `24时` rolled into the next day.
    pub midnight_rollover: bool,
}
