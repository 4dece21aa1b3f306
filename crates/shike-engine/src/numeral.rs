//! Numeral conversion for the digits that appear inside temporal expressions.
//!
//! Handles Arabic numerals (with an optional decimal part), positional
//! Chinese numerals (`二十三`, `一百零五`, `廿三`) and digit-by-digit Chinese
//! numerals (`二〇一五`). Anything else, including `几`, yields `None`.

/// Value of a single Chinese digit character.
fn cn_digit(ch: char) -> Option<u32> {
    match ch {
        '零' | '〇' | 'O' => Some(0),
        '一' | '壹' => Some(1),
        '二' | '两' | '贰' => Some(2),
        '三' | '叁' => Some(3),
        '四' | '肆' => Some(4),
        '五' | '伍' => Some(5),
        '六' | '陆' => Some(6),
        '七' | '柒' => Some(7),
        '八' | '捌' => Some(8),
        '九' | '玖' => Some(9),
        _ => None,
    }
}

fn cn_unit(ch: char) -> Option<u64> {
    match ch {
        '十' | '拾' => Some(10),
        '百' | '佰' => Some(100),
        '千' | '仟' => Some(1000),
        _ => None,
    }
}

/// Parse any supported numeral into a floating-point value.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        if s.starts_with('.') || s.ends_with('.') || s.matches('.').count() > 1 {
            return None;
        }
        return s.parse().ok();
    }
    parse_chinese(s).map(|n| n as f64)
}

/// Parse a numeral that must be a whole number.
pub fn parse_int(s: &str) -> Option<i64> {
    let n = parse_number(s)?;
    if n.fract() != 0.0 || n > i64::MAX as f64 {
        return None;
    }
    Some(n as i64)
}

/// Parse a written year.
///
/// Two-digit years (`98`, `九八`) are placed in 1950–2049.
pub fn parse_year(s: &str) -> Option<i32> {
    let s = s.trim();
    let digits = s.chars().count();
    let value = parse_int(s)? as i32;
    if digits == 2 && !s.contains(['十', '廿', '卅']) {
        return Some(if value < 50 { 2000 + value } else { 1900 + value });
    }
    Some(value)
}

fn parse_chinese(s: &str) -> Option<u64> {
    let positional = s.chars().any(|c| cn_unit(c).is_some() || matches!(c, '万' | '廿' | '卅'));
    if !positional {
        // Digit-by-digit reading: 二〇一五
        let mut value: u64 = 0;
        for ch in s.chars() {
            value = value.checked_mul(10)? + u64::from(cn_digit(ch)?);
        }
        return Some(value);
    }

    let mut total: u64 = 0;
    let mut section: u64 = 0;
    let mut number: u64 = 0;
    let mut pending = false;
    for ch in s.chars() {
        if let Some(d) = cn_digit(ch) {
            number = u64::from(d);
            pending = true;
        } else if let Some(unit) = cn_unit(ch) {
            // A bare 十 at the start means 一十
            let n = if pending { number } else if unit == 10 { 1 } else { return None };
            section += n * unit;
            number = 0;
            pending = false;
        } else if ch == '万' {
            section += number;
            total += section.max(1) * 10_000;
            section = 0;
            number = 0;
            pending = false;
        } else if ch == '廿' {
            section += 20;
        } else if ch == '卅' {
            section += 30;
        } else {
            return None;
        }
    }
    Some(total + section + number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arabic_numbers() {
        assert_eq!(parse_int("2015"), Some(2015));
        assert_eq!(parse_number("1.5"), Some(1.5));
        assert_eq!(parse_number("1."), None);
        assert_eq!(parse_int("1.5"), None);
    }

    #[test]
    fn test_positional_chinese() {
        assert_eq!(parse_int("十"), Some(10));
        assert_eq!(parse_int("十二"), Some(12));
        assert_eq!(parse_int("二十四"), Some(24));
        assert_eq!(parse_int("三十一"), Some(31));
        assert_eq!(parse_int("一百零五"), Some(105));
        assert_eq!(parse_int("两千"), Some(2000));
        assert_eq!(parse_int("三万五千"), Some(35_000));
    }

    #[test]
    fn test_ancient_tens() {
        assert_eq!(parse_int("廿三"), Some(23));
        assert_eq!(parse_int("卅"), Some(30));
    }

    #[test]
    fn test_digit_by_digit() {
        assert_eq!(parse_int("二〇一五"), Some(2015));
        assert_eq!(parse_int("零五"), Some(5));
        assert_eq!(parse_int("两"), Some(2));
    }

    #[test]
    fn test_unknown_quantities() {
        assert_eq!(parse_number("几"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("三天"), None);
    }

    #[test]
    fn test_two_digit_years() {
        assert_eq!(parse_year("98"), Some(1998));
        assert_eq!(parse_year("21"), Some(2021));
        assert_eq!(parse_year("九八"), Some(1998));
        assert_eq!(parse_year("二〇二一"), Some(2021));
        assert_eq!(parse_year("2021"), Some(2021));
    }
}
