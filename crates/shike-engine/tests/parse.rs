//! End-to-end behaviour of `parse` across points, spans, durations and
//! recurrences.

use std::collections::BTreeMap;

use shike_engine::{
    parse, Boundary, DeltaValue, Kind, ParseOptions, Precision, ResultFormat, ShikeError,
    TimeBaseInput, TimeHandler, TimeParser, TimeValue,
};

fn base_text(s: &str) -> TimeBaseInput {
    TimeBaseInput::Text(s.to_string())
}

fn year_only(year: i64) -> TimeBaseInput {
    TimeBaseInput::Fields(BTreeMap::from([("year".to_string(), year)]))
}

fn bounds(text: &str, base: &TimeBaseInput) -> (Kind, Precision, [String; 2]) {
    let result = parse(text, base, &ParseOptions::default()).unwrap();
    (result.kind, result.precision, result.bound_strings().unwrap())
}

fn pair(a: &str, b: &str) -> [String; 2] {
    [a.to_string(), b.to_string()]
}

// ── Points ──────────────────────────────────────────────────────────────────

#[test]
fn test_absolute_date_ignores_base() {
    for base in [
        base_text("2021-06-14 10:00:00"),
        year_only(1999),
        TimeBaseInput::Timestamp(0.0),
    ] {
        assert_eq!(
            bounds("2015年8月12日", &base),
            (
                Kind::Point,
                Precision::Accurate,
                pair("2015-08-12 00:00:00", "2015-08-12 23:59:59")
            )
        );
    }
}

#[test]
fn test_festival_around() {
    let (kind, precision, b) = bounds("去年中秋节前后", &base_text("2021-06-14 10:00:00"));
    assert_eq!(kind, Kind::Point);
    assert_eq!(precision, Precision::Blur);
    assert_eq!(b, pair("2020-09-28 00:00:00", "2020-10-04 23:59:59"));
}

#[test]
fn test_leap_year_upper_bound() {
    let (_, _, b) = bounds("2020年2月", &year_only(2021));
    assert_eq!(b[1], "2020-02-29 23:59:59");
    let (_, _, b) = bounds("2021年2月", &year_only(2021));
    assert_eq!(b[1], "2021-02-28 23:59:59");
}

#[test]
fn test_invalid_calendar_day() {
    let err = parse("2021年4月31日", &year_only(2021), &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, ShikeError::InvalidCalendarDate(_)));
}

#[test]
fn test_incomplete_base() {
    let err = parse("下午3点", &year_only(2021), &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, ShikeError::IncompleteTimeBase(_)));
}

#[test]
fn test_date_followed_by_digit_clock() {
    let (kind, _, b) = bounds("2021年6月14日15:00", &year_only(2020));
    assert_eq!(kind, Kind::Point);
    assert_eq!(b, pair("2021-06-14 15:00:00", "2021-06-14 15:00:59"));

    // 2021-06-14 is a Monday.
    let (_, _, b) = bounds("下周五9点", &base_text("2021-06-14 10:00:00"));
    assert_eq!(b, pair("2021-06-25 09:00:00", "2021-06-25 09:59:59"));
    let (_, _, b) = bounds("明天3点", &base_text("2021-06-14 10:00:00"));
    assert_eq!(b, pair("2021-06-15 03:00:00", "2021-06-15 03:59:59"));
}

#[test]
fn test_month_out_of_range() {
    let err = parse("2021年14月", &year_only(2021), &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, ShikeError::InvalidCalendarDate(_)));
}

#[test]
fn test_two_chinese_digit_year() {
    let (kind, _, b) = bounds("三五年", &year_only(2021));
    assert_eq!(kind, Kind::Point);
    assert_eq!(b, pair("2035-01-01 00:00:00", "2035-12-31 23:59:59"));
}

// ── Spans ───────────────────────────────────────────────────────────────────

#[test]
fn test_year_to_year_is_a_span() {
    for text in ["2008年到2018年", "2008年-2018年", "2008到2018年"] {
        assert_eq!(
            bounds(text, &year_only(2021)),
            (
                Kind::Span,
                Precision::Accurate,
                pair("2008-01-01 00:00:00", "2018-12-31 23:59:59")
            ),
            "{text}"
        );
    }
    let (kind, _, b) = bounds("98年到2005年", &year_only(2021));
    assert_eq!(kind, Kind::Span);
    assert_eq!(b, pair("1998-01-01 00:00:00", "2005-12-31 23:59:59"));
}

#[test]
fn test_reversed_year_span_is_rejected() {
    let err = parse("2021年到2020年", &year_only(2021), &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, ShikeError::InvalidExpression(_)));
}

#[test]
fn test_double_dash_span() {
    assert_eq!(
        bounds("从2008年——2018年", &base_text("2021-06-14 00:00:00")),
        (
            Kind::Span,
            Precision::Accurate,
            pair("2008-01-01 00:00:00", "2018-12-31 23:59:59")
        )
    );
}

#[test]
fn test_midnight_end_rolls_back_one_second() {
    assert_eq!(
        bounds("12月9日零时至12月16日24时", &year_only(2021)),
        (
            Kind::Span,
            Precision::Accurate,
            pair("2021-12-09 00:00:00", "2021-12-16 23:59:59")
        )
    );
}

#[test]
fn test_clock_span() {
    let (kind, _, b) = bounds("9:00至18:00", &base_text("2021-06-14 08:00:00"));
    assert_eq!(kind, Kind::Span);
    assert_eq!(b, pair("2021-06-14 09:00:00", "2021-06-14 18:00:59"));
}

#[test]
fn test_numeric_month_range() {
    let (_, _, b) = bounds("1997.02-2020.12", &year_only(2021));
    assert_eq!(b, pair("1997-02-01 00:00:00", "2020-12-31 23:59:59"));
}

#[test]
fn test_date_literal_is_a_point() {
    let (kind, _, b) = bounds("2018-04-02", &year_only(2021));
    assert_eq!(kind, Kind::Point);
    assert_eq!(b, pair("2018-04-02 00:00:00", "2018-04-02 23:59:59"));
}

// ── Durations ───────────────────────────────────────────────────────────────

#[test]
fn test_delta_conversion_span() {
    assert_eq!(
        bounds("3年后", &year_only(2021)),
        (
            Kind::Span,
            Precision::Blur,
            pair("2024-01-01 00:00:00", "2024-12-31 23:59:59")
        )
    );
}

#[test]
fn test_bare_year_is_not_a_duration() {
    let result = parse("21年", &year_only(2000), &ParseOptions::default()).unwrap();
    assert_eq!(result.kind, Kind::Point);
    assert_eq!(result.bound_strings().unwrap()[0], "2021-01-01 00:00:00");

    let options = ParseOptions {
        type_hint: Some(Kind::Delta),
        ..ParseOptions::default()
    };
    let result = parse("21年", &year_only(2000), &options).unwrap();
    assert_eq!(result.kind, Kind::Delta);
}

#[test]
fn test_threshold_delta() {
    let result = parse("三年以上", &year_only(2021), &ParseOptions::default()).unwrap();
    assert_eq!(result.kind, Kind::Delta);
    assert_eq!(result.precision, Precision::BlurPlus);
    let TimeValue::Delta(DeltaValue::Range([low, high])) = result.value else {
        panic!("expected a threshold pair");
    };
    assert_eq!(low.year, Some(3.0));
    assert!(high.infinite);
}

// ── Recurrences ─────────────────────────────────────────────────────────────

#[test]
fn test_yearly_occurrences() {
    let options = ParseOptions {
        occurrence_count: Some(2),
        ..ParseOptions::default()
    };
    let result = parse("每年9月", &base_text("2021-06-14 10:00:00"), &options).unwrap();
    assert_eq!(result.kind, Kind::Period);
    let TimeValue::Period(period) = result.value else {
        panic!("expected a period");
    };
    assert_eq!(period.delta.year, Some(1.0));
    let point = period.point.unwrap();
    assert_eq!(point.string, "9月");
    let starts: Vec<String> = point
        .occurrences
        .iter()
        .map(|[start, end]| {
            assert!(start.to_string() <= end.to_string());
            start.to_string()
        })
        .collect();
    assert_eq!(starts, vec!["2021-09-01 00:00:00", "2022-09-01 00:00:00"]);
}

#[test]
fn test_weekly_occurrences_lean_forward() {
    let options = ParseOptions {
        occurrence_count: Some(2),
        ..ParseOptions::default()
    };
    // 2021-06-19 is a Saturday; this week's Friday has passed.
    let result = parse("每周五下午4点", &base_text("2021-06-19 10:00:00"), &options).unwrap();
    let TimeValue::Period(period) = result.value else {
        panic!("expected a period");
    };
    let occurrences = period.point.unwrap().occurrences;
    assert_eq!(
        occurrences[0],
        [
            Boundary::Text("2021-06-25 16:00:00".to_string()),
            Boundary::Text("2021-06-25 16:59:59".to_string())
        ]
    );
    assert_eq!(occurrences[1][0].to_string(), "2021-07-02 16:00:00");
}

#[test]
fn test_period_without_sub_expression() {
    let result = parse("每两周", &year_only(2021), &ParseOptions::default()).unwrap();
    let TimeValue::Period(period) = result.value else {
        panic!("expected a period");
    };
    assert_eq!(period.delta.day, Some(14.0));
    assert!(period.point.is_none());
}

// ── Round trips and bases ───────────────────────────────────────────────────

#[test]
fn test_formatted_boundary_reparses_to_itself() {
    let options = ParseOptions {
        type_hint: Some(Kind::Point),
        ..ParseOptions::default()
    };
    let result = parse("2015-08-12 13:04:05", &year_only(2021), &options).unwrap();
    assert_eq!(
        result.bound_strings().unwrap(),
        pair("2015-08-12 13:04:05", "2015-08-12 13:04:05")
    );
}

#[test]
fn test_malformed_sequence_base_is_rejected() {
    let base = TimeBaseInput::Sequence(vec![-1, 11, 29, -1, 23, -1]);
    let err = parse("明天", &base, &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, ShikeError::InvalidTimeBase(_)));
    assert!(!TimeHandler::from_raw([-1, 11, 29, -1, 23, -1]).is_well_formed());
}

#[test]
fn test_epoch_base_and_epoch_result() {
    let options = ParseOptions {
        result_format: ResultFormat::Epoch,
        ..ParseOptions::default()
    };
    // 2021-06-14 08:00:00 in Shanghai.
    let result = parse("明天", &TimeBaseInput::Timestamp(1_623_628_800.0), &options).unwrap();
    assert_eq!(
        result.bounds().unwrap(),
        &[Boundary::Epoch(1_623_686_400), Boundary::Epoch(1_623_772_799)]
    );
}

#[test]
fn test_raw_lunar_fields() {
    let options = ParseOptions {
        resolve_lunar: false,
        ..ParseOptions::default()
    };
    let result = parse("2020年农历八月十五", &year_only(2021), &options).unwrap();
    assert_eq!(result.bound_strings().unwrap()[0], "2020-08-15 00:00:00");
}

#[test]
fn test_parser_is_shareable_across_threads() {
    let parser = TimeParser::new();
    let handles: Vec<_> = ["去年", "下周五", "2015年8月12日"]
        .into_iter()
        .map(|text| {
            std::thread::spawn(move || {
                parser
                    .parse(text, &base_text("2021-06-14 10:00:00"), &ParseOptions::default())
                    .map(|r| r.kind)
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), Kind::Point);
    }
}
