//! Year-month-day rules: calendar dates, calendar divisions and
//! base-relative days, weeks, months and years.

use chrono::Duration;
use regex::Captures;

use super::{
    captured_year, weekday_monday, year_prefix, Context, Family, Normalized,
    Normalizer, Rollover, Rule, DAY, LIMIT_YEAR, MONTH, WEEKDAY_NOTE, YEAR,
};
use crate::error::{Result, ShikeError};
use crate::handler::{Field, TimeHandler};
use crate::lunar::solar_term_solar_date;
use crate::numeral::{parse_int, parse_year};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum YmdForm {
    EnumeratedDays,
    Date,
    Quarter,
    HalfYear,
    Season,
    YearPart,
    MonthPart,
    Century,
    Decade,
    RelativeYear,
    RelativeMonth,
    RelativeDay,
    Week,
    BlurYears,
    BareYear,
}

fn rule(name: &'static str, pattern: &str, form: YmdForm) -> Rule {
    Rule::new(name, Family::Ymd, pattern, Normalizer::Ymd(form))
}

/// Rules ranked above the duration conversions and festivals.
pub(super) fn leading_rules() -> Vec<Rule> {
    let yp = year_prefix();
    vec![
        rule(
            "enumerated_days",
            &format!(
                "(?:(?:(?P<year>{YEAR})年)?(?P<month>{MONTH})月)?(?P<days>(?:{DAY})[日号]?(?:[、，,和及与](?:{DAY})[日号]?)+)"
            ),
            YmdForm::EnumeratedDays,
        )
        .guard(|c| c["days"].ends_with(['日', '号'])),
        rule(
            "date_chinese",
            &format!("(?:(?P<year>{YEAR})年)?(?P<month>{MONTH})月(?:(?P<day>{DAY})[日号])?{WEEKDAY_NOTE}"),
            YmdForm::Date,
        ),
        rule(
            "date_numeric",
            &format!(
                "(?P<year>[0-9]{{4}})[-/.](?P<month>1[0-2]|0?[1-9])(?:[-/.](?P<day>3[01]|[12][0-9]|0?[1-9]))?[日号]?{WEEKDAY_NOTE}"
            ),
            YmdForm::Date,
        ),
        rule(
            "date_compact",
            "(?P<year>(?:19|20)[0-9]{2})(?P<month>1[0-2]|0[1-9])(?P<day>3[01]|[12][0-9]|0[1-9])",
            YmdForm::Date,
        ),
        rule("day_only", &format!("(?P<day>{DAY})[日号]{WEEKDAY_NOTE}"), YmdForm::Date),
        rule(
            "quarter",
            &format!("{yp}?(?:第(?P<q>[1-4一二三四])个?季度|[Qq](?P<q2>[1-4])|(?P<q3>[一二三四])季度)"),
            YmdForm::Quarter,
        ),
        rule("half_year", &format!("{yp}?(?P<half>上|下)半年"), YmdForm::HalfYear),
        rule("season", &format!("{yp}?(?P<season>[春夏秋冬])(?:天|季)"), YmdForm::Season),
        rule(
            "year_part",
            &format!("(?:{yp}|年)(?P<part>初|中|底|末|终)"),
            YmdForm::YearPart,
        ),
        rule(
            "month_part",
            &format!("{yp}?(?P<month>{MONTH})月(?P<part>上旬|中旬|下旬|初|中|底|末)"),
            YmdForm::MonthPart,
        ),
        rule(
            "century",
            "(?P<century>[0-9]{1,2}|[一二三四五六七八九十]{1,3})世纪(?:(?P<decade>[0-9]0|[一二三四五六七八九]十)年代)?(?:(?P<part>初|中|末)期?)?",
            YmdForm::Century,
        ),
        rule(
            "decade",
            "(?P<decade>(?:1[89]|20)?[0-9]0|[一二三四五六七八九]十)年代(?:(?P<part>初|中|末)期?)?",
            YmdForm::Decade,
        ),
        rule(
            "relative_year",
            &format!("(?P<ylimit>{LIMIT_YEAR})(?:(?P<month>{MONTH})月(?:(?P<day>{DAY})[日号])?)?{WEEKDAY_NOTE}"),
            YmdForm::RelativeYear,
        )
        .limited(),
        rule(
            "relative_month",
            &format!(
                "(?P<mlimit>上上个?月|上个?月|本月|这个?月|当月|下下个?月|下个?月)(?:(?P<day>{DAY})[日号])?(?P<part>上旬|中旬|下旬|初|中|底|末)?"
            ),
            YmdForm::RelativeMonth,
        )
        .limited(),
        rule(
            "relative_day",
            "(?P<dlimit>大前天|前天|昨天|昨日|今天|今日|当天|明天|明日|次日|翌日|大后天|后天)",
            YmdForm::RelativeDay,
        )
        .limited(),
        rule(
            "week",
            "(?P<wlimit>上上|下下|上|下|本|这)?个?(?:周|星期|礼拜)(?P<wday>[一二三四五六日天1-7]|末)?",
            YmdForm::Week,
        )
        .guard(|c| c.name("wlimit").is_some() || c.name("wday").is_some())
        .limited(),
    ]
}

/// Rules ranked below the festivals.
pub(super) fn trailing_rules() -> Vec<Rule> {
    vec![
        rule(
            "blur_years",
            "(?P<blur>最近几年|近几年|这几年|近些年|近年来|近年|前几年|未来几年|今后几年|后几年)",
            YmdForm::BlurYears,
        )
        .limited(),
        rule("year", &format!("(?P<year>{YEAR})年(?:份|度)?"), YmdForm::BareYear),
        rule("year_digits", "(?P<year>[0-9]{4})", YmdForm::BareYear).guard(|c| {
            c["year"]
                .parse::<i32>()
                .is_ok_and(|y| (1900..=2100).contains(&y))
        }),
    ]
}

pub(super) fn normalize(form: YmdForm, caps: &Captures<'_>, ctx: &Context<'_>) -> Result<Normalized> {
    match form {
        YmdForm::EnumeratedDays => enumerated_days(caps),
        YmdForm::Date => date(caps),
        YmdForm::Quarter => {
            let q = ["q", "q2", "q3"]
                .iter()
                .find_map(|name| caps.name(name))
                .and_then(|m| parse_int(m.as_str()))
                .ok_or_else(|| unreadable(caps))? as i32;
            let (year, rollover) = year_field(caps, ctx)?;
            Ok(month_range(year, 3 * q - 2, 3 * q).rollover(rollover))
        }
        YmdForm::HalfYear => {
            let (year, rollover) = year_field(caps, ctx)?;
            let (first, last) = if &caps["half"] == "上" { (1, 6) } else { (7, 12) };
            Ok(month_range(year, first, last).rollover(rollover))
        }
        YmdForm::Season => season(caps, ctx),
        YmdForm::YearPart => {
            let (year, rollover) = year_field(caps, ctx)?;
            let (first, last) = match &caps["part"] {
                "初" => (1, 2),
                "中" => (6, 7),
                _ => (11, 12),
            };
            Ok(month_range(year, first, last).blur().rollover(rollover))
        }
        YmdForm::MonthPart => {
            let (year, rollover) = year_field(caps, ctx)?;
            let month = month_field(caps)?.ok_or_else(|| unreadable(caps))?;
            Ok(month_part(year, month, &caps["part"]).rollover(rollover))
        }
        YmdForm::Century => century(caps),
        YmdForm::Decade => decade(caps, ctx),
        YmdForm::RelativeYear => {
            let (year, _) = captured_year(caps, ctx)?;
            let mut h = TimeHandler::from_prefix(&[year]);
            if let Some(month) = month_field(caps)? {
                h.set(Field::Month, month);
                if let Some(day) = int(caps, "day")? {
                    h.set(Field::Day, day);
                }
            }
            Ok(Normalized::point(h))
        }
        YmdForm::RelativeMonth => {
            let word = &caps["mlimit"];
            let offset = if word.starts_with("上上") {
                -2
            } else if word.starts_with('上') {
                -1
            } else if word.starts_with("下下") {
                2
            } else if word.starts_with('下') {
                1
            } else {
                0
            };
            let (year, month) = ctx.base_month_shifted(offset)?;
            if let Some(day) = int(caps, "day")? {
                return Ok(Normalized::point(TimeHandler::from_prefix(&[year, month, day])));
            }
            match caps.name("part") {
                Some(part) => Ok(month_part(Some(year), month, part.as_str())),
                None => Ok(Normalized::point(TimeHandler::from_prefix(&[year, month]))),
            }
        }
        YmdForm::RelativeDay => {
            let offset = match &caps["dlimit"] {
                "大前天" => -3,
                "前天" => -2,
                "昨天" | "昨日" => -1,
                "今天" | "今日" | "当天" => 0,
                "大后天" => 3,
                "后天" => 2,
                _ => 1,
            };
            let date = ctx.base_date()? + Duration::days(offset);
            Ok(Normalized::point(TimeHandler::from_date(date)))
        }
        YmdForm::Week => week(caps, ctx),
        YmdForm::BlurYears => {
            let year = ctx.base_year()?;
            let (first, last) = match &caps["blur"] {
                "前几年" => (year - 5, year - 1),
                "未来几年" | "今后几年" | "后几年" => (year, year + 3),
                _ => (year - 3, year),
            };
            Ok(Normalized::between(
                TimeHandler::from_prefix(&[first]),
                TimeHandler::from_prefix(&[last]),
            )
            .blur()
            .span())
        }
        YmdForm::BareYear => {
            let year = parse_year(&caps["year"]).ok_or_else(|| unreadable(caps))?;
            Ok(Normalized::point(TimeHandler::from_prefix(&[year])))
        }
    }
}

fn unreadable(caps: &Captures<'_>) -> ShikeError {
    ShikeError::InvalidExpression(format!("cannot read the numbers in '{}'", &caps[0]))
}

fn int(caps: &Captures<'_>, name: &str) -> Result<Option<i32>> {
    match caps.name(name) {
        Some(m) => parse_int(m.as_str())
            .map(|n| Some(n as i32))
            .ok_or_else(|| unreadable(caps)),
        None => Ok(None),
    }
}

fn month_field(caps: &Captures<'_>) -> Result<Option<i32>> {
    match int(caps, "month")? {
        Some(month) if !(1..=12).contains(&month) => {
            Err(ShikeError::InvalidCalendarDate(format!("month {month}")))
        }
        month => Ok(month),
    }
}

/// Explicit or relative year, or an unset year the base will fill in.
fn year_field(caps: &Captures<'_>, ctx: &Context<'_>) -> Result<(Option<i32>, Option<Rollover>)> {
    if caps.name("year").is_none() && caps.name("ylimit").is_none() {
        return Ok((None, Some(Rollover::Year)));
    }
    let (year, _) = captured_year(caps, ctx)?;
    Ok((Some(year), None))
}

fn with_year(year: Option<i32>, rest: &[i32]) -> TimeHandler {
    let mut h = TimeHandler::unset();
    if let Some(y) = year {
        h.set(Field::Year, y);
    }
    for (field, value) in [Field::Month, Field::Day].into_iter().zip(rest) {
        h.set(field, *value);
    }
    h
}

fn month_range(year: Option<i32>, first: i32, last: i32) -> Normalized {
    Normalized::between(with_year(year, &[first]), with_year(year, &[last]))
}

fn month_part(year: Option<i32>, month: i32, part: &str) -> Normalized {
    let (first, last, exact) = match part {
        "上旬" => (1, Some(10), true),
        "初" => (1, Some(10), false),
        "中旬" => (11, Some(20), true),
        "中" => (11, Some(20), false),
        "下旬" => (21, None, true),
        _ => (21, None, false),
    };
    let start = with_year(year, &[month, first]);
    let end = match last {
        Some(day) => with_year(year, &[month, day]),
        None => with_year(year, &[month]),
    };
    let n = Normalized::between(start, end);
    if exact {
        n
    } else {
        n.blur()
    }
}

fn enumerated_days(caps: &Captures<'_>) -> Result<Normalized> {
    let year = match caps.name("year") {
        Some(m) => Some(parse_year(m.as_str()).ok_or_else(|| unreadable(caps))?),
        None => None,
    };
    let month = month_field(caps)?;
    let days = caps["days"]
        .split(['、', '，', ',', '和', '及', '与'])
        .map(|d| parse_int(d.trim_end_matches(['日', '号'])).map(|n| n as i32))
        .collect::<Option<Vec<i32>>>()
        .ok_or_else(|| unreadable(caps))?;
    let (Some(&first), Some(&last)) = (days.iter().min(), days.iter().max()) else {
        return Err(unreadable(caps));
    };
    let rollover = match (year, month) {
        (None, Some(_)) => Some(Rollover::Year),
        (None, None) => Some(Rollover::Month),
        _ => None,
    };
    let handler = |day: i32| {
        let mut h = TimeHandler::unset();
        if let Some(y) = year {
            h.set(Field::Year, y);
        }
        if let Some(m) = month {
            h.set(Field::Month, m);
        }
        h.with(Field::Day, day)
    };
    Ok(Normalized::between(handler(first), handler(last))
        .span()
        .rollover(rollover))
}

fn date(caps: &Captures<'_>) -> Result<Normalized> {
    let year = match caps.name("year") {
        Some(m) => Some(parse_year(m.as_str()).ok_or_else(|| unreadable(caps))?),
        None => None,
    };
    let month = month_field(caps)?;
    let day = int(caps, "day")?;

    let mut h = TimeHandler::unset();
    if let Some(y) = year {
        h.set(Field::Year, y);
    }
    if let Some(m) = month {
        h.set(Field::Month, m);
    }
    if let Some(d) = day {
        h.set(Field::Day, d);
    }
    let rollover = match (year, month) {
        (Some(_), _) => None,
        (None, Some(_)) => Some(Rollover::Year),
        (None, None) => Some(Rollover::Month),
    };
    Ok(Normalized::point(h).rollover(rollover))
}

/// Solar-term index where each season begins: 立春, 立夏, 立秋, 立冬.
fn season_start_term(season: &str) -> usize {
    match season {
        "春" => 2,
        "夏" => 8,
        "秋" => 14,
        _ => 20,
    }
}

fn season(caps: &Captures<'_>, ctx: &Context<'_>) -> Result<Normalized> {
    let (year, implicit) = captured_year(caps, ctx)?;
    let season = &caps["season"];
    let start = solar_term_solar_date(year, season_start_term(season))?;
    let next_start = match season {
        "冬" => solar_term_solar_date(year + 1, 2)?,
        _ => solar_term_solar_date(year, season_start_term(season) + 6)?,
    };
    let end = next_start - Duration::days(1);
    let rollover = implicit.then_some(Rollover::Year);
    Ok(Normalized::dates(start, end).blur().rollover(rollover))
}

/// Narrow a run of years by an early/middle/late qualifier.
fn year_part(first: i32, len: i32, part: Option<&str>) -> (i32, i32) {
    match (part, len) {
        (Some("初"), 10) => (first, first + 2),
        (Some("中"), 10) => (first + 3, first + 6),
        (Some("末"), 10) => (first + 7, first + 9),
        (Some("初"), _) => (first, first + 19),
        (Some("中"), _) => (first + 40, first + 59),
        (Some("末"), _) => (first + 80, first + 99),
        _ => (first, first + len - 1),
    }
}

fn year_span(first: i32, last: i32, blurred: bool) -> Normalized {
    let n = Normalized::between(
        TimeHandler::from_prefix(&[first]),
        TimeHandler::from_prefix(&[last]),
    );
    if blurred {
        n.blur()
    } else {
        n
    }
}

fn century(caps: &Captures<'_>) -> Result<Normalized> {
    let century = int(caps, "century")?.ok_or_else(|| unreadable(caps))?;
    if century < 1 {
        return Err(unreadable(caps));
    }
    let first = (century - 1) * 100;
    let part = caps.name("part").map(|m| m.as_str());
    let (first, last) = match int(caps, "decade")? {
        Some(decade) => year_part(first + decade, 10, part),
        None => year_part(first, 100, part),
    };
    Ok(year_span(first, last, part.is_some()))
}

fn decade(caps: &Captures<'_>, ctx: &Context<'_>) -> Result<Normalized> {
    let decade = int(caps, "decade")?.ok_or_else(|| unreadable(caps))?;
    let first = if decade >= 100 {
        decade
    } else {
        match ctx.base.get(Field::Year) {
            Some(base) if 2000 + decade <= base => 2000 + decade,
            _ => 1900 + decade,
        }
    };
    let part = caps.name("part").map(|m| m.as_str());
    let (first, last) = year_part(first, 10, part);
    Ok(year_span(first, last, part.is_some()))
}

fn week(caps: &Captures<'_>, ctx: &Context<'_>) -> Result<Normalized> {
    let offset = match caps.name("wlimit").map(|m| m.as_str()) {
        Some("上上") => -2,
        Some("上") => -1,
        Some("下") => 1,
        Some("下下") => 2,
        _ => 0,
    };
    let monday = weekday_monday(ctx.base_date()?) + Duration::days(7 * offset);
    let Some(wday) = caps.name("wday").map(|m| m.as_str()) else {
        return Ok(Normalized::dates(monday, monday + Duration::days(6)));
    };
    if wday == "末" {
        return Ok(Normalized::dates(
            monday + Duration::days(5),
            monday + Duration::days(6),
        ));
    }
    let index = match wday {
        "日" | "天" => 7,
        other => parse_int(other).ok_or_else(|| unreadable(caps))?,
    };
    let day = monday + Duration::days(index - 1);
    let rollover = caps.name("wlimit").is_none().then_some(Rollover::Week);
    Ok(Normalized::dates(day, day).rollover(rollover))
}
