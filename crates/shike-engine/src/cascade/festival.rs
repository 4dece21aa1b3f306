//! Festivals, solar terms and explicit lunar dates.
//!
//! Lunar festivals and lunar dates go through the lunar-solar converter
//! unless the caller asked for raw lunar fields. A trailing `前后` or `左右`
//! widens the day by three days either side.

use chrono::{Duration, NaiveDate, Weekday};
use regex::Captures;

use super::{captured_year, year_prefix, Context, Family, Normalized, Normalizer, Rollover, Rule, YEAR};
use crate::error::{Result, ShikeError};
use crate::handler::TimeHandler;
use crate::lunar::{self, solar_term_index, solar_term_solar_date, SOLAR_TERMS};
use crate::numeral::parse_int;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FestivalForm {
    Solar,
    Lunar,
    SolarTerm,
    WeekdayRule,
    LunarDate,
}

/// Fixed solar-calendar festivals: (name, month, day). Longer names first.
const SOLAR_FESTIVALS: [(&str, u32, u32); 21] = [
    ("元旦", 1, 1),
    ("情人节", 2, 14),
    ("妇女节", 3, 8),
    ("三八节", 3, 8),
    ("植树节", 3, 12),
    ("愚人节", 4, 1),
    ("劳动节", 5, 1),
    ("五一", 5, 1),
    ("青年节", 5, 4),
    ("儿童节", 6, 1),
    ("六一", 6, 1),
    ("建党节", 7, 1),
    ("建军节", 8, 1),
    ("教师节", 9, 10),
    ("国庆节", 10, 1),
    ("国庆", 10, 1),
    ("双十一", 11, 11),
    ("光棍节", 11, 11),
    ("平安夜", 12, 24),
    ("圣诞节", 12, 25),
    ("圣诞", 12, 25),
];

/// Lunar-calendar festivals: (name, lunar month, lunar day).
const LUNAR_FESTIVALS: [(&str, u32, u32); 17] = [
    ("春节", 1, 1),
    ("大年初一", 1, 1),
    ("元宵节", 1, 15),
    ("元宵", 1, 15),
    ("龙抬头", 2, 2),
    ("端午节", 5, 5),
    ("端午", 5, 5),
    ("七夕节", 7, 7),
    ("七夕", 7, 7),
    ("中元节", 7, 15),
    ("中秋节", 8, 15),
    ("中秋", 8, 15),
    ("重阳节", 9, 9),
    ("重阳", 9, 9),
    ("腊八节", 12, 8),
    ("腊八", 12, 8),
    ("小年", 12, 23),
];

/// The eve of the lunar new year.
const NEW_YEAR_EVE: [&str; 2] = ["除夕", "大年三十"];

/// Festivals on the n-th weekday of a month: (name, month, weekday, n).
const WEEKDAY_FESTIVALS: [(&str, u32, Weekday, u8); 3] = [
    ("母亲节", 5, Weekday::Sun, 2),
    ("父亲节", 6, Weekday::Sun, 3),
    ("感恩节", 11, Weekday::Thu, 4),
];

const AROUND: &str = "(?P<around>前后|左右)?";

const LUNAR_MONTH: &str = "正|冬|腊|十[一二]?|[一二三四五六七八九]|1[0-2]|0?[1-9]";

const LUNAR_DAY: &str = "初[一二三四五六七八九十]|二十[一二三四五六七八九]?|十[一二三四五六七八九]?|廿[一二三四五六七八九]?|三十|卅|30|[12][0-9]|0?[1-9]";

fn rule(name: &'static str, pattern: &str, form: FestivalForm) -> Rule {
    Rule::new(name, Family::Ymd, pattern, Normalizer::Festival(form))
}

fn names<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    items.into_iter().collect::<Vec<_>>().join("|")
}

pub(super) fn rules() -> Vec<Rule> {
    let yp = year_prefix();
    let solar = names(SOLAR_FESTIVALS.iter().map(|f| f.0));
    let lunar = names(
        LUNAR_FESTIVALS
            .iter()
            .map(|f| f.0)
            .chain(NEW_YEAR_EVE.iter().copied()),
    );
    let terms = names(SOLAR_TERMS.iter().copied());
    let weekday = names(WEEKDAY_FESTIVALS.iter().map(|f| f.0));
    vec![
        rule(
            "solar_festival",
            &format!("{yp}?(?P<fest>{solar}){AROUND}"),
            FestivalForm::Solar,
        ),
        rule(
            "lunar_festival",
            &format!("{yp}?(?P<fest>{lunar}){AROUND}"),
            FestivalForm::Lunar,
        ),
        rule(
            "solar_term",
            &format!("{yp}?(?P<fest>{terms})节?{AROUND}"),
            FestivalForm::SolarTerm,
        ),
        rule(
            "weekday_festival",
            &format!("{yp}?(?P<fest>{weekday}){AROUND}"),
            FestivalForm::WeekdayRule,
        ),
        rule(
            "lunar_date",
            &format!(
                "{yp}?(?P<marker>农历|阴历|旧历)?(?:(?P<lyear>{YEAR})年)?(?P<leap>闰)?(?P<month>{LUNAR_MONTH})月(?P<day>{LUNAR_DAY})?{AROUND}"
            ),
            FestivalForm::LunarDate,
        )
        .guard(|c| {
            c.name("marker").is_some()
                || c.name("leap").is_some()
                || matches!(&c["month"], "正" | "冬" | "腊")
                || c.name("day")
                    .is_some_and(|d| d.as_str().starts_with(['初', '廿', '卅']))
        }),
    ]
}

pub(super) fn normalize(
    form: FestivalForm,
    caps: &Captures<'_>,
    ctx: &Context<'_>,
) -> Result<Normalized> {
    let (year, implicit) = match caps.name("lyear") {
        Some(m) => (
            crate::numeral::parse_year(m.as_str()).ok_or_else(|| unreadable(caps))?,
            false,
        ),
        None => captured_year(caps, ctx)?,
    };
    let name = caps.name("fest").map_or("", |m| m.as_str());
    let n = match form {
        FestivalForm::Solar => {
            let (_, month, day) = lookup(&SOLAR_FESTIVALS, name, caps)?;
            let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| out_of_range(year))?;
            Normalized::dates(date, date)
        }
        FestivalForm::Lunar => lunar_festival(name, year, caps, ctx)?,
        FestivalForm::SolarTerm => {
            let index = solar_term_index(name).ok_or_else(|| unreadable(caps))?;
            let date = solar_term_solar_date(year, index)?;
            Normalized::dates(date, date)
        }
        FestivalForm::WeekdayRule => {
            let &(_, month, weekday, nth) = WEEKDAY_FESTIVALS
                .iter()
                .find(|f| f.0 == name)
                .ok_or_else(|| unreadable(caps))?;
            let date = NaiveDate::from_weekday_of_month_opt(year, month, weekday, nth)
                .ok_or_else(|| out_of_range(year))?;
            Normalized::dates(date, date)
        }
        FestivalForm::LunarDate => lunar_date(year, caps, ctx)?,
    };
    let n = if caps.name("around").is_some() {
        widen(n)?
    } else {
        n
    };
    Ok(n.rollover(implicit.then_some(Rollover::Year)))
}

fn unreadable(caps: &Captures<'_>) -> ShikeError {
    ShikeError::InvalidExpression(format!("unknown festival or lunar date '{}'", &caps[0]))
}

fn out_of_range(year: i32) -> ShikeError {
    ShikeError::InvalidCalendarDate(format!("year {year} is out of range"))
}

fn lookup(
    table: &[(&'static str, u32, u32)],
    name: &str,
    caps: &Captures<'_>,
) -> Result<(&'static str, u32, u32)> {
    table
        .iter()
        .find(|f| f.0 == name)
        .copied()
        .ok_or_else(|| unreadable(caps))
}

fn lunar_festival(name: &str, year: i32, caps: &Captures<'_>, ctx: &Context<'_>) -> Result<Normalized> {
    if NEW_YEAR_EVE.contains(&name) {
        if !ctx.options.resolve_lunar {
            let last = lunar::month_days(year - 1, 12, false)?;
            return Ok(raw_lunar(year - 1, 12, Some(last)));
        }
        let eve = lunar::lunar_new_year(year)? - Duration::days(1);
        return Ok(Normalized::dates(eve, eve));
    }
    let (_, month, day) = lookup(&LUNAR_FESTIVALS, name, caps)?;
    // The twelfth lunar month of the previous lunar year falls early in `year`.
    let lunar_year = if month == 12 { year - 1 } else { year };
    if !ctx.options.resolve_lunar {
        return Ok(raw_lunar(lunar_year, month, Some(day)));
    }
    let date = lunar::lunar_to_solar(lunar_year, month, day, false)?;
    Ok(Normalized::dates(date, date))
}

fn lunar_month_number(text: &str) -> Option<u32> {
    match text {
        "正" => Some(1),
        "冬" => Some(11),
        "腊" => Some(12),
        other => parse_int(other).and_then(|n| u32::try_from(n).ok()),
    }
}

fn lunar_day_number(text: &str) -> Option<u32> {
    let digits = text.strip_prefix('初').unwrap_or(text);
    parse_int(digits).and_then(|n| u32::try_from(n).ok())
}

fn lunar_date(year: i32, caps: &Captures<'_>, ctx: &Context<'_>) -> Result<Normalized> {
    let month = lunar_month_number(&caps["month"])
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| unreadable(caps))?;
    let day = match caps.name("day") {
        Some(d) => Some(lunar_day_number(d.as_str()).ok_or_else(|| unreadable(caps))?),
        None => None,
    };
    let is_leap = caps.name("leap").is_some();

    if !ctx.options.resolve_lunar {
        return Ok(raw_lunar(year, month, day));
    }
    match day {
        Some(day) => {
            let date = lunar::lunar_to_solar(year, month, day, is_leap)?;
            Ok(Normalized::dates(date, date))
        }
        None => {
            let first = lunar::lunar_to_solar(year, month, 1, is_leap)?;
            let len = lunar::month_days(year, month, is_leap)?;
            Ok(Normalized::dates(first, first + Duration::days(i64::from(len) - 1)))
        }
    }
}

/// Lunar fields reported as they were written.
fn raw_lunar(year: i32, month: u32, day: Option<u32>) -> Normalized {
    let mut fields = vec![year, month as i32];
    if let Some(day) = day {
        fields.push(day as i32);
    }
    Normalized::point(TimeHandler::from_prefix(&fields))
}

/// `前后` / `左右`: three days either side.
fn widen(n: Normalized) -> Result<Normalized> {
    let shift = |bound: crate::handler::Bound, days: i64| {
        bound.map(|h| {
            let date = h.date().ok_or_else(|| {
                ShikeError::InvalidExpression(format!("cannot widen {}", h.describe()))
            })?;
            Ok(TimeHandler::from_date(date + Duration::days(days)))
        })
    };
    let mut out = n;
    out.start = shift(n.start, -3)?;
    out.end = shift(n.end, 3)?;
    Ok(out.blur())
}

#[cfg(test)]
mod tests {
    use super::super::{Context, MatchResult, RULES};
    use crate::error::ShikeError;
    use crate::handler::TimeHandler;
    use crate::result::{ParseOptions, Precision};

    fn resolve_with(text: &str, base: &[i32], options: &ParseOptions) -> crate::error::Result<MatchResult> {
        let base = TimeHandler::from_prefix(base);
        let ctx = Context {
            base: &base,
            options,
        };
        RULES.match_point(text, &ctx)
    }

    fn day(text: &str, base: &[i32]) -> (String, String) {
        let m = resolve_with(text, base, &ParseOptions::default()).unwrap();
        let fmt = "%Y-%m-%d";
        let start = m.start.handler().unwrap().lower_bound().unwrap();
        let end = m.end.handler().unwrap().upper_bound().unwrap();
        (start.format(fmt).to_string(), end.format(fmt).to_string())
    }

    fn same(d: &str) -> (String, String) {
        (d.to_string(), d.to_string())
    }

    #[test]
    fn test_solar_festivals() {
        assert_eq!(day("国庆节", &[2021]), same("2021-10-01"));
        assert_eq!(day("2019年圣诞节", &[2021]), same("2019-12-25"));
        assert_eq!(day("明年元旦", &[2021]), same("2022-01-01"));
    }

    #[test]
    fn test_lunar_festivals() {
        assert_eq!(day("2021年春节", &[2000]), same("2021-02-12"));
        assert_eq!(day("2020年中秋节", &[2000]), same("2020-10-01"));
        assert_eq!(day("2021年除夕", &[2000]), same("2021-02-11"));
    }

    #[test]
    fn test_around_widens_three_days() {
        let m = resolve_with("去年中秋节前后", &[2021], &ParseOptions::default()).unwrap();
        assert_eq!(m.precision, Precision::Blur);
        assert_eq!(day("去年中秋节前后", &[2021]), ("2020-09-28".to_string(), "2020-10-04".to_string()));
    }

    #[test]
    fn test_solar_term_festival() {
        assert_eq!(day("2021年清明节", &[2000]), same("2021-04-04"));
        assert_eq!(day("冬至", &[2021]), same("2021-12-21"));
    }

    #[test]
    fn test_weekday_festivals() {
        assert_eq!(day("2021年母亲节", &[2000]), same("2021-05-09"));
        assert_eq!(day("2021年感恩节", &[2000]), same("2021-11-25"));
    }

    #[test]
    fn test_explicit_lunar_dates() {
        assert_eq!(day("2020年农历八月十五", &[2000]), same("2020-10-01"));
        assert_eq!(day("2020年闰四月初一", &[2000]), same("2020-05-23"));
        assert_eq!(day("2021年正月初一", &[2000]), same("2021-02-12"));
    }

    #[test]
    fn test_lunar_leap_mismatch() {
        let err = resolve_with("2021年闰四月初一", &[2000], &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ShikeError::InvalidLunarDate(_)));
    }

    #[test]
    fn test_raw_lunar_fields() {
        let options = ParseOptions {
            resolve_lunar: false,
            ..ParseOptions::default()
        };
        let m = resolve_with("2020年农历八月十五", &[2000], &options).unwrap();
        assert_eq!(
            m.start.handler().copied(),
            Some(TimeHandler::from_prefix(&[2020, 8, 15]))
        );
    }
}
