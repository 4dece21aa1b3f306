//! Top-level resolution: one text fragment in, one [`TimeResult`] out.
//!
//! The stages run in a fixed order. A recurrence (`每…`) is tried first,
//! then the whole text as a bare duration, then span connectives, and
//! finally the text as a single point. An explicit [`Kind`] hint skips the
//! stages that cannot produce that kind.
//!
//! Span splitting classifies every candidate separator from its
//! surroundings before committing to a split, so date literals such as
//! `2018-04-02` are never cut apart while `1997.02-2020.12` is.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDateTime, TimeZone};
use regex::Regex;
use tracing::debug;

use crate::base::{normalize_base, TimeBaseInput};
use crate::cascade::{Context, MatchResult, Rollover, RuleSet, PERIOD, RULES};
use crate::delta::{parse_delta, parse_delta_forced, ParsedDelta};
use crate::error::{Result, ShikeError};
use crate::handler::{Bound, TimeHandler};
use crate::period::{self, Period};
use crate::result::{
    Boundary, Kind, ParseOptions, PeriodPoint, PeriodValue, Precision, ResultFormat, TimeResult,
    TimeValue,
};

/// Rendering of [`ResultFormat::String`] boundaries.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Parser ───────────────────────────────────────────────────────────────

/// A parser holding the shared rule table.
///
/// Constructing a parser builds the rule table if no parser has done so yet;
/// after that every call only reads shared data, so one parser can serve
/// many threads.
#[derive(Clone, Copy)]
pub struct TimeParser {
    rules: &'static RuleSet,
}

impl fmt::Debug for TimeParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeParser")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Default for TimeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeParser {
    pub fn new() -> Self {
        Self {
            rules: LazyLock::force(&RULES),
        }
    }

    /// Parse `text` against `base`.
    ///
    /// # Errors
    ///
    /// Every failure is reported as a [`ShikeError`]; no partial result is
    /// ever returned.
    pub fn parse(
        &self,
        text: &str,
        base: &TimeBaseInput,
        options: &ParseOptions,
    ) -> Result<TimeResult> {
        let base = normalize_base(base, options.timezone)?;
        let text = normalize_text(text);
        if text.is_empty() {
            return Err(ShikeError::InvalidExpression("empty expression".to_string()));
        }
        debug!(text = %text, base = %base.describe(), hint = ?options.type_hint, "parse");

        match options.type_hint {
            Some(Kind::Period) => self.period(&text, &base, options)?.ok_or_else(|| {
                ShikeError::InvalidExpression(format!("'{text}' is not a recurrence"))
            }),
            Some(Kind::Delta) => parse_delta_forced(&text)
                .map(delta_result)
                .ok_or_else(|| ShikeError::InvalidExpression(format!("'{text}' is not a duration"))),
            Some(Kind::Point | Kind::Span) => self.resolve(&text, &base, options)?.render(options),
            None => {
                if let Some(result) = self.period(&text, &base, options)? {
                    debug!(stage = "period", "resolved");
                    return Ok(result);
                }
                if let Some(parsed) = parse_delta(&text) {
                    debug!(stage = "delta", "resolved");
                    return Ok(delta_result(parsed));
                }
                self.resolve(&text, &base, options)?.render(options)
            }
        }
    }

    // ── Stages ───────────────────────────────────────────────────────────

    fn period(
        &self,
        text: &str,
        base: &TimeHandler,
        options: &ParseOptions,
    ) -> Result<Option<TimeResult>> {
        let Some(spec) = period::recognize(text) else {
            return Ok(None);
        };
        let leaning = ParseOptions {
            future_leaning: true,
            ..options.clone()
        };
        let count = options.occurrence_count.unwrap_or(1);
        let Period {
            delta,
            rest,
            occurrences,
        } = period::expand(&spec, base, count, |sub, cursor| {
            self.resolve(sub, cursor, &leaning)
        })?;

        let precision = occurrences
            .iter()
            .fold(Precision::Accurate, |p, o| p.merge(o.precision));
        let point = match rest {
            Some(string) => Some(PeriodPoint {
                occurrences: occurrences
                    .iter()
                    .map(|o| o.boundaries(options))
                    .collect::<Result<_>>()?,
                string,
            }),
            None => None,
        };
        Ok(Some(TimeResult {
            kind: Kind::Period,
            precision,
            value: TimeValue::Period(PeriodValue { delta, point }),
        }))
    }

    /// Resolve a point or span expression.
    pub(crate) fn resolve(
        &self,
        text: &str,
        base: &TimeHandler,
        options: &ParseOptions,
    ) -> Result<Resolved> {
        let body = strip_lead(text);

        if let Some(resolved) = self.open_span(body, base, options)? {
            return Ok(resolved);
        }

        let mut split_error = None;
        if let Some((left, right)) = split_two_sided(body) {
            debug!(left, right, "span split");
            match self.two_sided(left, right, base, options) {
                Ok(resolved) => return Ok(resolved),
                Err(e) => {
                    debug!(error = %e, "split did not resolve; trying the whole text");
                    split_error = Some(e);
                }
            }
        }

        match self.single(body, base, options) {
            Ok(resolved) => Ok(resolved),
            Err(e) => Err(split_error.unwrap_or(e)),
        }
    }

    fn side(&self, text: &str, base: &TimeHandler, options: &ParseOptions) -> Result<MatchResult> {
        let ctx = Context { base, options };
        self.rules.match_point(text, &ctx)
    }

    fn single(&self, text: &str, base: &TimeHandler, options: &ParseOptions) -> Result<Resolved> {
        let mut m = self.side(text, base, options)?;
        if options.future_leaning {
            m = self.lean_forward(text, m, base, options)?;
        }
        let (start, end) = edges(&m)?;
        Ok(Resolved {
            start,
            end,
            kind: m.kind,
            precision: m.precision,
        })
    }

    /// Re-read a base-dependent point that fell before the base with the
    /// next year, month, week or day made explicit. A bare minute moves to
    /// the next hour.
    fn lean_forward(
        &self,
        text: &str,
        m: MatchResult,
        base: &TimeHandler,
        options: &ParseOptions,
    ) -> Result<MatchResult> {
        let Some(rollover) = m.rollover else {
            return Ok(m);
        };
        let Bound::At(end) = m.end else {
            return Ok(m);
        };
        if end.upper_bound()? >= base.lower_bound()? {
            return Ok(m);
        }
        let prefix = match rollover {
            Rollover::Year => "明年",
            Rollover::Month => "下个月",
            Rollover::Week => "下",
            Rollover::Day => "明天",
            Rollover::Hour => return next_hour(m),
        };
        let ahead = format!("{prefix}{text}");
        debug!(from = text, to = %ahead, "future-leaning re-resolution");
        let next = self
            .side(&ahead, base, options)
            .and_then(|next| edges(&next).map(|_| next));
        match next {
            Ok(next) => Ok(next),
            // `2月29日` or `31日` may not exist in the next year or month.
            Err(ShikeError::InvalidCalendarDate(reason)) => {
                debug!(reason, "no such day ahead; kept the original reading");
                Ok(m)
            }
            Err(e) => Err(e),
        }
    }

    fn open_span(
        &self,
        text: &str,
        base: &TimeHandler,
        options: &ParseOptions,
    ) -> Result<Option<Resolved>> {
        if let Some(rest) = strip_any_prefix(text, &["截至", "截止", "直到"]) {
            let m = self.side(rest, base, options)?;
            let (_, end) = edges(&m)?;
            return Ok(Some(Resolved::span(Edge::NegInf, end, m.precision)));
        }

        let Some((left, connector)) = OPEN_SUFFIXES
            .iter()
            .find_map(|&(s, c)| text.strip_suffix(s).map(|left| (left, c)))
        else {
            return Ok(None);
        };
        // `3天以后` is a duration conversion, not an open span.
        if left.is_empty() || parse_delta(left).is_some() {
            return Ok(None);
        }
        debug!(left, connector = ?connector, "open span");
        let m = self.side(left, base, options)?;
        let (start, end) = edges(&m)?;
        let resolved = match connector {
            OpenSide::Before => Resolved::span(Edge::NegInf, end, m.precision),
            OpenSide::After => Resolved::span(start, Edge::PosInf, m.precision),
            OpenSide::UntilNow => {
                Resolved::span(start, Edge::At(base.upper_bound()?), m.precision).checked()?
            }
        };
        Ok(Some(resolved))
    }

    fn two_sided(
        &self,
        left: &str,
        right: &str,
        base: &TimeHandler,
        options: &ParseOptions,
    ) -> Result<Resolved> {
        let first = self.side(left, base, options)?;
        let (start, _) = edges(&first)?;

        if NOW_WORDS.contains(&right) {
            return Resolved::span(start, Edge::At(base.upper_bound()?), first.precision).checked();
        }

        let right = inherit_period(left, right);
        let second_base = match (self.rules.is_limited(&right), first.start) {
            (false, Bound::At(h)) => h,
            _ => *base,
        };
        let second = self.side(&right, &second_base, options)?;
        let (_, mut end) = edges(&second)?;
        if second.midnight_rollover {
            if let Edge::At(dt) = end {
                end = Edge::At(dt - Duration::seconds(1));
            }
        }
        Resolved::span(start, end, first.precision.merge(second.precision)).checked()
    }
}

/// Parse `text` with the shared parser.
///
/// ```
/// use shike_engine::{parse, Kind, ParseOptions, TimeBaseInput};
///
/// let base = TimeBaseInput::Text("2021-06-14 10:00:00".to_string());
/// let result = parse("2015年8月12日", &base, &ParseOptions::default()).unwrap();
/// assert_eq!(result.kind, Kind::Point);
/// assert_eq!(
///     result.bound_strings().unwrap(),
///     ["2015-08-12 00:00:00".to_string(), "2015-08-12 23:59:59".to_string()]
/// );
/// ```
pub fn parse(text: &str, base: &TimeBaseInput, options: &ParseOptions) -> Result<TimeResult> {
    TimeParser::new().parse(text, base, options)
}

fn delta_result(parsed: ParsedDelta) -> TimeResult {
    TimeResult {
        kind: Kind::Delta,
        precision: parsed.precision,
        value: TimeValue::Delta(parsed.value),
    }
}

// ── Resolved bounds ──────────────────────────────────────────────────────

/// One end of a resolved point or span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Edge {
    NegInf,
    At(NaiveDateTime),
    PosInf,
}

impl Edge {
    fn render(self, options: &ParseOptions) -> Result<Boundary> {
        let dt = match self {
            Edge::NegInf => return Ok(Boundary::NegInf),
            Edge::PosInf => return Ok(Boundary::PosInf),
            Edge::At(dt) => dt,
        };
        match options.result_format {
            ResultFormat::String => Ok(Boundary::Text(dt.format(DATETIME_FORMAT).to_string())),
            ResultFormat::Epoch => options
                .timezone
                .from_local_datetime(&dt)
                .earliest()
                .map(|local| Boundary::Epoch(local.timestamp()))
                .ok_or_else(|| {
                    ShikeError::InvalidCalendarDate(format!(
                        "{dt} does not exist in {}",
                        options.timezone
                    ))
                }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Resolved {
    pub start: Edge,
    pub end: Edge,
    pub kind: Kind,
    pub precision: Precision,
}

impl Resolved {
    fn span(start: Edge, end: Edge, precision: Precision) -> Self {
        Self {
            start,
            end,
            kind: Kind::Span,
            precision,
        }
    }

    fn checked(self) -> Result<Self> {
        if self.end < self.start {
            return Err(ShikeError::InvalidExpression(format!(
                "the span ends ({:?}) before it starts ({:?})",
                self.end, self.start
            )));
        }
        Ok(self)
    }

    pub(crate) fn boundaries(&self, options: &ParseOptions) -> Result<[Boundary; 2]> {
        Ok([self.start.render(options)?, self.end.render(options)?])
    }

    fn render(self, options: &ParseOptions) -> Result<TimeResult> {
        Ok(TimeResult {
            kind: self.kind,
            precision: self.precision,
            value: TimeValue::Bounds(self.boundaries(options)?),
        })
    }
}

/// `30分` read in the following hour.
fn next_hour(m: MatchResult) -> Result<MatchResult> {
    let shift = |h: TimeHandler| -> Result<TimeHandler> {
        let moved = h.lower_bound()? + Duration::hours(1);
        Ok(TimeHandler::from_datetime(&moved).truncate(h.prefix_len()))
    };
    Ok(MatchResult {
        start: m.start.map(shift)?,
        end: m.end.map(shift)?,
        ..m
    })
}

/// Lower bound of the start handler and upper bound of the end handler.
fn edges(m: &MatchResult) -> Result<(Edge, Edge)> {
    let start = match m.start {
        Bound::NegInf => Edge::NegInf,
        Bound::PosInf => Edge::PosInf,
        Bound::At(h) => Edge::At(h.lower_bound()?),
    };
    let end = match m.end {
        Bound::NegInf => Edge::NegInf,
        Bound::PosInf => Edge::PosInf,
        Bound::At(h) => Edge::At(h.upper_bound()?),
    };
    Ok((start, end))
}

// ── Text preparation ─────────────────────────────────────────────────────

const ABBREVIATIONS: [(&str, &str); 11] = [
    ("今晚上", "今天晚上"),
    ("今晚", "今天晚上"),
    ("明晚上", "明天晚上"),
    ("明晚", "明天晚上"),
    ("昨晚上", "昨天晚上"),
    ("昨晚", "昨天晚上"),
    ("今早上", "今天早上"),
    ("今早", "今天早上"),
    ("今晨", "今天早上"),
    ("明早上", "明天早上"),
    ("明早", "明天早上"),
];

fn normalize_text(text: &str) -> String {
    let mut out: String = text
        .trim()
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(u32::from(c) - u32::from('０') + u32::from('0')).unwrap_or(c),
            '　' => ' ',
            _ => c,
        })
        .collect();
    for (short, long) in ABBREVIATIONS {
        if out.contains(short) {
            out = out.replace(short, long);
        }
    }
    out
}

fn strip_any_prefix<'t>(text: &'t str, prefixes: &[&str]) -> Option<&'t str> {
    prefixes
        .iter()
        .find_map(|p| text.strip_prefix(p))
        .map(str::trim)
        .filter(|rest| !rest.is_empty())
}

fn strip_lead(text: &str) -> &str {
    strip_any_prefix(text, &["自从", "从", "自", "由"]).unwrap_or(text)
}

// ── Span connectives ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenSide {
    Before,
    After,
    UntilNow,
}

const OPEN_SUFFIXES: [(&str, OpenSide); 8] = [
    ("以前", OpenSide::Before),
    ("之前", OpenSide::Before),
    ("开始", OpenSide::After),
    ("以后", OpenSide::After),
    ("之后", OpenSide::After),
    ("起", OpenSide::After),
    ("以来", OpenSide::UntilNow),
    ("至今", OpenSide::UntilNow),
];

/// Right-hand sides that mean "now".
const NOW_WORDS: [&str; 5] = ["今", "现在", "目前", "当前", "如今"];

/// Characters before `至`/`到` that make it part of a word (`冬至`, `直到`).
const CONNECTOR_WORD_PREFIX: [char; 5] = ['冬', '夏', '截', '直', '迟'];

const DOUBLE_SEPARATORS: [&str; 5] = ["——", "--", "~~", "－－", "～～"];

fn non_empty_split<'t>(text: &'t str, at: usize, len: usize) -> Option<(&'t str, &'t str)> {
    let left = text[..at].trim();
    let right = text[at + len..].trim();
    (!left.is_empty() && !right.is_empty()).then_some((left, right))
}

/// Split `text` into the two sides of a `X到Y` style span.
fn split_two_sided(text: &str) -> Option<(&str, &str)> {
    for (at, c) in text.char_indices() {
        if !matches!(c, '到' | '至') {
            continue;
        }
        let prev = text[..at].chars().next_back();
        if prev.is_some_and(|p| CONNECTOR_WORD_PREFIX.contains(&p)) {
            continue;
        }
        if let Some(sides) = non_empty_split(text, at, c.len_utf8()) {
            return Some(sides);
        }
    }
    for sep in DOUBLE_SEPARATORS {
        if let Some(at) = text.find(sep) {
            if let Some(sides) = non_empty_split(text, at, sep.len()) {
                return Some(sides);
            }
        }
    }
    split_single_dash(text)
}

/// Length of the ASCII digit run ending at `end`.
fn digits_before(text: &str, end: usize) -> usize {
    text[..end]
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .count()
}

fn digits_after(text: &str, start: usize) -> usize {
    text[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .count()
}

/// Single dash-like separators, skipping the ones inside a date literal.
///
/// A `-` joins a date when it follows a 4-digit year and precedes a 1-2
/// digit month, or when the previous `-` joined a date and this one sits
/// between two 1-2 digit runs.
fn split_single_dash(text: &str) -> Option<(&str, &str)> {
    let mut previous_joined = false;
    for (at, c) in text.char_indices() {
        match c {
            '-' | '－' => {
                let before = digits_before(text, at);
                let after = digits_after(text, at + c.len_utf8());
                let short = |n: usize| (1..=2).contains(&n);
                let joins = (before == 4 && short(after))
                    || (previous_joined && short(before) && short(after));
                previous_joined = joins;
                if joins {
                    continue;
                }
            }
            '~' | '～' | '—' => previous_joined = false,
            c if c.is_ascii_digit() => continue,
            _ => {
                previous_joined = false;
                continue;
            }
        }
        if let Some(sides) = non_empty_split(text, at, c.len_utf8()) {
            return Some(sides);
        }
    }
    None
}

static PERIOD_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?:{PERIOD})")).expect("period pattern"));

static BARE_HOUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^(?:[0-9]{1,2}|[零〇一二两三四五六七八九十]{1,3})[点时:：]").expect("bare hour pattern")
});

/// `下午3点到5点`: the second side borrows the first side's day period.
fn inherit_period(left: &str, right: &str) -> String {
    if !BARE_HOUR.is_match(right) || PERIOD_WORD.is_match(right) {
        return right.to_string();
    }
    match PERIOD_WORD.find_iter(left).last() {
        Some(period) => format!("{}{right}", period.as_str()),
        None => right.to_string(),
    }
}
