//! Lunar ↔ solar calendar conversion and solar-term estimation.
//!
//! Conversion is table driven. Each lunar year from 1900 to 2100 is packed
//! into one integer:
//!
//! - bits 0–3: the leap month (0 when the year has none),
//! - bits 4–15: month sizes for months 12 down to 1 (1 = 30 days, 0 = 29),
//! - bit 16: the size of the leap month.
//!
//! The solar date of every lunar new year is derived from these codes at
//! compile time, starting from 1900-01-31.
//!
//! Solar terms use the `[Y * D + C] - L` approximation with per-century
//! coefficients plus a short table of known one-day deviations. It is only
//! guaranteed for 1900–2100.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::error::{Result, ShikeError};

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

#[rustfmt::skip]
const LUNAR_INFO: [u32; 201] = [
    0x04bd8, 0x04ae0, 0x0a570, 0x054d5, 0x0d260, 0x0d950, 0x16554, 0x056a0, 0x09ad0, 0x055d2, // 1900
    0x04ae0, 0x0a5b6, 0x0a4d0, 0x0d250, 0x1d255, 0x0b540, 0x0d6a0, 0x0ada2, 0x095b0, 0x14977, // 1910
    0x04970, 0x0a4b0, 0x0b4b5, 0x06a50, 0x06d40, 0x1ab54, 0x02b60, 0x09570, 0x052f2, 0x04970, // 1920
    0x06566, 0x0d4a0, 0x0ea50, 0x16a95, 0x05ad0, 0x02b60, 0x186e3, 0x092e0, 0x1c8d7, 0x0c950, // 1930
    0x0d4a0, 0x1d8a6, 0x0b550, 0x056a0, 0x1a5b4, 0x025d0, 0x092d0, 0x0d2b2, 0x0a950, 0x0b557, // 1940
    0x06ca0, 0x0b550, 0x15355, 0x04da0, 0x0a5b0, 0x14573, 0x052b0, 0x0a9a8, 0x0e950, 0x06aa0, // 1950
    0x0aea6, 0x0ab50, 0x04b60, 0x0aae4, 0x0a570, 0x05260, 0x0f263, 0x0d950, 0x05b57, 0x056a0, // 1960
    0x096d0, 0x04dd5, 0x04ad0, 0x0a4d0, 0x0d4d4, 0x0d250, 0x0d558, 0x0b540, 0x0b6a0, 0x195a6, // 1970
    0x095b0, 0x049b0, 0x0a974, 0x0a4b0, 0x0b27a, 0x06a50, 0x06d40, 0x0af46, 0x0ab60, 0x09570, // 1980
    0x04af5, 0x04970, 0x064b0, 0x074a3, 0x0ea50, 0x06b58, 0x05ac0, 0x0ab60, 0x096d5, 0x092e0, // 1990
    0x0c960, 0x0d954, 0x0d4a0, 0x0da50, 0x07552, 0x056a0, 0x0abb7, 0x025d0, 0x092d0, 0x0cab5, // 2000
    0x0a950, 0x0b4a0, 0x0baa4, 0x0ad50, 0x055d9, 0x04ba0, 0x0a5b0, 0x15176, 0x052b0, 0x0a930, // 2010
    0x07954, 0x06aa0, 0x0ad50, 0x05b52, 0x04b60, 0x0a6e6, 0x0a4e0, 0x0d260, 0x0ea65, 0x0d530, // 2020
    0x05aa0, 0x076a3, 0x096d0, 0x04afb, 0x04ad0, 0x0a4d0, 0x1d0b6, 0x0d250, 0x0d520, 0x0dd45, // 2030
    0x0b5a0, 0x056d0, 0x055b2, 0x049b0, 0x0a577, 0x0a4b0, 0x0aa50, 0x1b255, 0x06d20, 0x0ada0, // 2040
    0x14b63, 0x09370, 0x049f8, 0x04970, 0x064b0, 0x168a6, 0x0ea50, 0x06b20, 0x1a6c4, 0x0aae0, // 2050
    0x092e0, 0x0d2e3, 0x0c960, 0x0d557, 0x0d4a0, 0x0da50, 0x05d55, 0x056a0, 0x0a6d0, 0x055d4, // 2060
    0x052d0, 0x0a9b8, 0x0a950, 0x0b4a0, 0x0b6a6, 0x0ad50, 0x055a0, 0x0aba4, 0x0a5b0, 0x052b0, // 2070
    0x0b273, 0x06930, 0x07337, 0x06aa0, 0x0ad50, 0x14b55, 0x04b60, 0x0a570, 0x054e4, 0x0d160, // 2080
    0x0e968, 0x0d520, 0x0daa0, 0x16aa6, 0x056d0, 0x04ae0, 0x0a9d4, 0x0a2d0, 0x0d150, 0x0f252, // 2090
    0x0d520,                                                                                   // 2100
];

const fn code_year_days(code: u32) -> u32 {
    let mut days = 348;
    let mut bit = 0x8000;
    while bit > 0x8 {
        if code & bit != 0 {
            days += 1;
        }
        bit >>= 1;
    }
    if code & 0xf != 0 {
        days += if code & 0x10000 != 0 { 30 } else { 29 };
    }
    days
}

const fn build_new_year_offsets() -> [u32; 201] {
    let mut offsets = [0u32; 201];
    let mut i = 1;
    while i < 201 {
        offsets[i] = offsets[i - 1] + code_year_days(LUNAR_INFO[i - 1]);
        i += 1;
    }
    offsets
}

/// Days from 1900-01-31 to each lunar new year, 1900..=2100.
const NEW_YEAR_OFFSETS: [u32; 201] = build_new_year_offsets();

/// A date in the Chinese lunar calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LunarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub is_leap: bool,
}

impl LunarDate {
    pub fn new(year: i32, month: u32, day: u32, is_leap: bool) -> Self {
        Self {
            year,
            month,
            day,
            is_leap,
        }
    }
}

fn year_code(year: i32) -> Result<u32> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ShikeError::InvalidLunarDate(format!(
            "lunar year {year} is outside {MIN_YEAR}-{MAX_YEAR}"
        )));
    }
    Ok(LUNAR_INFO[(year - MIN_YEAR) as usize])
}

/// The leap month of a lunar year, if it has one.
pub fn leap_month(year: i32) -> Result<Option<u32>> {
    let m = year_code(year)? & 0xf;
    Ok((m != 0).then_some(m))
}

/// Length of a lunar month in days.
pub fn month_days(year: i32, month: u32, is_leap: bool) -> Result<u32> {
    let code = year_code(year)?;
    if !(1..=12).contains(&month) {
        return Err(ShikeError::InvalidLunarDate(format!("lunar month {month}")));
    }
    if is_leap {
        if code & 0xf != month {
            return Err(ShikeError::InvalidLunarDate(format!(
                "lunar year {year} has no leap month {month}"
            )));
        }
        return Ok(if code & 0x10000 != 0 { 30 } else { 29 });
    }
    Ok(if code & (0x10000 >> month) != 0 { 30 } else { 29 })
}

/// Month lengths of a lunar year in calendar order, leap month included.
fn month_sequence(year: i32) -> Result<Vec<(u32, bool, u32)>> {
    let leap = leap_month(year)?;
    let mut months = Vec::with_capacity(13);
    for month in 1..=12 {
        months.push((month, false, month_days(year, month, false)?));
        if leap == Some(month) {
            months.push((month, true, month_days(year, month, true)?));
        }
    }
    Ok(months)
}

/// Solar date of the first day of a lunar year.
pub fn lunar_new_year(year: i32) -> Result<NaiveDate> {
    year_code(year)?;
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 31)
        .ok_or_else(|| ShikeError::InvalidLunarDate("lunar epoch".to_string()))?;
    let offset = NEW_YEAR_OFFSETS[(year - MIN_YEAR) as usize];
    Ok(epoch + Duration::days(i64::from(offset)))
}

/// Convert a lunar date to its solar date.
///
/// # Errors
///
/// Returns [`ShikeError::InvalidLunarDate`] when `is_leap` does not match the
/// year's leap month, when the day exceeds the month's length, or when the
/// year is outside 1900–2100.
pub fn lunar_to_solar(year: i32, month: u32, day: u32, is_leap: bool) -> Result<NaiveDate> {
    let length = month_days(year, month, is_leap)?;
    if day == 0 || day > length {
        return Err(ShikeError::InvalidLunarDate(format!(
            "day {day} of lunar {year}-{}{month} ({length} days)",
            if is_leap { "leap " } else { "" }
        )));
    }
    let mut offset: u32 = 0;
    for (m, leap, len) in month_sequence(year)? {
        if m == month && leap == is_leap {
            break;
        }
        offset += len;
    }
    Ok(lunar_new_year(year)? + Duration::days(i64::from(offset + day - 1)))
}

/// Convert a solar date to its lunar date.
pub fn solar_to_lunar(date: NaiveDate) -> Result<LunarDate> {
    let mut year = date.year();
    if year > MAX_YEAR + 1 {
        return Err(ShikeError::InvalidLunarDate(format!("{date} is after {MAX_YEAR}")));
    }
    if year > MAX_YEAR || date < lunar_new_year(year.min(MAX_YEAR))? {
        year -= 1;
    }
    if year < MIN_YEAR {
        return Err(ShikeError::InvalidLunarDate(format!(
            "{date} is before the lunar new year of {MIN_YEAR}"
        )));
    }
    let mut offset = (date - lunar_new_year(year)?).num_days() as u32;
    for (month, is_leap, len) in month_sequence(year)? {
        if offset < len {
            return Ok(LunarDate::new(year, month, offset + 1, is_leap));
        }
        offset -= len;
    }
    Err(ShikeError::InvalidLunarDate(format!(
        "{date} falls after the lunar year {year}"
    )))
}

// ── Solar terms ─────────────────────────────────────────────────────────────

/// The 24 solar terms, in calendar order starting from 小寒.
pub const SOLAR_TERMS: [&str; 24] = [
    "小寒", "大寒", "立春", "雨水", "惊蛰", "春分", "清明", "谷雨", "立夏", "小满", "芒种", "夏至",
    "小暑", "大暑", "立秋", "处暑", "白露", "秋分", "寒露", "霜降", "立冬", "小雪", "大雪", "冬至",
];

#[rustfmt::skip]
const C_20TH: [f64; 24] = [
    6.11, 20.84, 4.6295, 19.4599, 6.3826, 21.4155, 5.59, 20.888, 6.318, 21.86, 6.5, 22.20,
    7.928, 23.65, 8.35, 23.95, 8.44, 23.822, 9.098, 24.218, 8.218, 23.08, 7.9, 22.60,
];

#[rustfmt::skip]
const C_21ST: [f64; 24] = [
    5.4055, 20.12, 3.87, 18.73, 5.63, 20.646, 4.81, 20.1, 5.52, 21.04, 5.678, 21.37,
    7.108, 22.83, 7.5, 23.13, 7.646, 23.042, 8.318, 23.438, 7.438, 22.36, 7.18, 21.94,
];

/// Years whose term date deviates from the formula: (year, term index, days).
const TERM_CORRECTIONS: [(i32, usize, i32); 20] = [
    (1982, 0, 1),
    (2019, 0, -1),
    (2000, 1, 1),
    (2082, 1, 1),
    (2026, 3, -1),
    (2084, 5, 1),
    (1911, 8, 1),
    (2008, 9, 1),
    (1902, 10, 1),
    (1928, 11, 1),
    (1925, 12, 1),
    (2016, 12, 1),
    (1922, 13, 1),
    (2002, 14, 1),
    (1927, 16, 1),
    (1942, 17, 1),
    (2089, 19, 1),
    (2089, 20, 1),
    (1978, 21, 1),
    (1954, 22, 1),
];

/// Winter-solstice years that fall one day early.
const WINTER_SOLSTICE_EARLY: [i32; 2] = [1918, 2021];

/// Index of a solar term by name (`清明节` is accepted for `清明`).
pub fn solar_term_index(name: &str) -> Option<usize> {
    let name = name.strip_suffix('节').unwrap_or(name);
    SOLAR_TERMS.iter().position(|t| *t == name)
}

/// Estimated `(month, day)` of a solar term in a given year.
pub fn solar_term_date(year: i32, term: &str) -> Result<(u32, u32)> {
    let index = solar_term_index(term)
        .ok_or_else(|| ShikeError::InvalidExpression(format!("unknown solar term '{term}'")))?;
    solar_term_date_by_index(year, index)
}

pub(crate) fn solar_term_date_by_index(year: i32, index: usize) -> Result<(u32, u32)> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) || index >= 24 {
        return Err(ShikeError::InvalidLunarDate(format!(
            "solar terms are only tabulated for {MIN_YEAR}-{MAX_YEAR}"
        )));
    }
    let (y, c) = if year >= 2000 {
        (year - 2000, C_21ST[index])
    } else {
        (year - 1900, C_20TH[index])
    };
    // Terms in January and February come before that year's leap day.
    let leap_days = if index < 4 { (y - 1) / 4 } else { y / 4 };
    let mut day = (f64::from(y) * 0.2422 + c).floor() as i32 - leap_days;
    for &(cy, ci, delta) in TERM_CORRECTIONS.iter() {
        if cy == year && ci == index {
            day += delta;
        }
    }
    if index == 23 && WINTER_SOLSTICE_EARLY.contains(&year) {
        day -= 1;
    }
    Ok((index as u32 / 2 + 1, day as u32))
}

/// Solar date of a term in a given year.
pub(crate) fn solar_term_solar_date(year: i32, index: usize) -> Result<NaiveDate> {
    let (month, day) = solar_term_date_by_index(year, index)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        ShikeError::InvalidCalendarDate(format!("solar term {year}-{month}-{day}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // ── table decoding ──────────────────────────────────────────────────

    #[test]
    fn test_known_new_years() {
        assert_eq!(lunar_new_year(1900).unwrap(), d(1900, 1, 31));
        assert_eq!(lunar_new_year(2000).unwrap(), d(2000, 2, 5));
        assert_eq!(lunar_new_year(2020).unwrap(), d(2020, 1, 25));
        assert_eq!(lunar_new_year(2021).unwrap(), d(2021, 2, 12));
        assert_eq!(lunar_new_year(2024).unwrap(), d(2024, 2, 10));
    }

    #[test]
    fn test_leap_months() {
        assert_eq!(leap_month(2020).unwrap(), Some(4));
        assert_eq!(leap_month(2021).unwrap(), None);
        assert_eq!(leap_month(2023).unwrap(), Some(2));
        assert_eq!(leap_month(2025).unwrap(), Some(6));
    }

    // ── lunar_to_solar ──────────────────────────────────────────────────

    #[test]
    fn test_mid_autumn() {
        assert_eq!(lunar_to_solar(2020, 8, 15, false).unwrap(), d(2020, 10, 1));
        assert_eq!(lunar_to_solar(2021, 8, 15, false).unwrap(), d(2021, 9, 21));
    }

    #[test]
    fn test_leap_month_conversion() {
        // 闰四月初一, 2020
        assert_eq!(lunar_to_solar(2020, 4, 1, true).unwrap(), d(2020, 5, 23));
        assert_eq!(lunar_to_solar(2020, 5, 1, false).unwrap(), d(2020, 6, 21));
    }

    #[test]
    fn test_wrong_leap_flag() {
        assert!(matches!(
            lunar_to_solar(2021, 4, 1, true),
            Err(ShikeError::InvalidLunarDate(_))
        ));
    }

    #[test]
    fn test_day_30_in_short_month() {
        // The first month of 2021 has 29 days.
        assert_eq!(month_days(2021, 1, false).unwrap(), 29);
        assert!(matches!(
            lunar_to_solar(2021, 1, 30, false),
            Err(ShikeError::InvalidLunarDate(_))
        ));
    }

    #[test]
    fn test_out_of_range_year() {
        assert!(lunar_to_solar(1899, 1, 1, false).is_err());
        assert!(lunar_to_solar(2101, 1, 1, false).is_err());
    }

    // ── solar_to_lunar ──────────────────────────────────────────────────

    #[test]
    fn test_solar_to_lunar_before_new_year() {
        let lunar = solar_to_lunar(d(2021, 2, 11)).unwrap();
        assert_eq!(lunar, LunarDate::new(2020, 12, 30, false));
    }

    #[test]
    fn test_solar_to_lunar_leap() {
        let lunar = solar_to_lunar(d(2020, 5, 23)).unwrap();
        assert_eq!(lunar, LunarDate::new(2020, 4, 1, true));
    }

    #[test]
    fn test_solar_to_lunar_before_table() {
        assert!(solar_to_lunar(d(1900, 1, 30)).is_err());
    }

    // ── solar terms ─────────────────────────────────────────────────────

    #[test]
    fn test_solar_terms_2021() {
        assert_eq!(solar_term_date(2021, "清明").unwrap(), (4, 4));
        assert_eq!(solar_term_date(2021, "立春").unwrap(), (2, 3));
        assert_eq!(solar_term_date(2021, "冬至").unwrap(), (12, 21));
    }

    #[test]
    fn test_solar_term_correction() {
        assert_eq!(solar_term_date(2026, "雨水").unwrap(), (2, 18));
    }

    #[test]
    fn test_solar_term_festival_name() {
        assert_eq!(solar_term_index("清明节"), Some(6));
        assert!(solar_term_date(2021, "春节").is_err());
    }

    proptest! {
        #[test]
        fn prop_lunar_round_trip(year in 1900i32..=2100, month in 1u32..=12, day in 1u32..=30, leap in any::<bool>()) {
            prop_assume!(!leap || leap_month(year).unwrap() == Some(month));
            prop_assume!(day <= month_days(year, month, leap).unwrap());
            let solar = lunar_to_solar(year, month, day, leap).unwrap();
            let back = solar_to_lunar(solar).unwrap();
            prop_assert_eq!(back, LunarDate::new(year, month, day, leap));
        }
    }
}
