//! Time handlers: the six-field intermediate form every rule produces.
//!
//! A [`TimeHandler`] holds `[year, month, day, hour, minute, second]`, each
//! either set or unset. Rules fill in only what the text says; the rest is
//! completed here:
//!
//! - leading unset fields come from the time base ([`TimeHandler::complete_leading`]),
//! - trailing unset fields become calendar minima for a lower bound and
//!   calendar maxima (leap-aware) for an upper bound.
//!
//! Once completed, unset fields must form a suffix. A handler such as
//! `[?, 11, 29, ?, 23, ?]` mixes set and unset fields and is rejected.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Result, ShikeError};

/// Index of a field inside a [`TimeHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Year = 0,
    Month = 1,
    Day = 2,
    Hour = 3,
    Minute = 4,
    Second = 5,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Year,
        Field::Month,
        Field::Day,
        Field::Hour,
        Field::Minute,
        Field::Second,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Year => "year",
            Field::Month => "month",
            Field::Day => "day",
            Field::Hour => "hour",
            Field::Minute => "minute",
            Field::Second => "second",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// An ordered six-field date-time in which any field may be unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimeHandler {
    fields: [Option<i32>; 6],
}

impl TimeHandler {
    /// A handler with every field unset.
    pub const fn unset() -> Self {
        Self { fields: [None; 6] }
    }

    pub fn new(fields: [Option<i32>; 6]) -> Self {
        Self { fields }
    }

    /// Build from the `-1`-means-unset representation.
    pub fn from_raw(raw: [i32; 6]) -> Self {
        let mut fields = [None; 6];
        for (slot, value) in fields.iter_mut().zip(raw) {
            if value >= 0 {
                *slot = Some(value);
            }
        }
        Self { fields }
    }

    /// Set the leading fields from `values`, leaving the rest unset.
    pub fn from_prefix(values: &[i32]) -> Self {
        let mut fields = [None; 6];
        for (slot, value) in fields.iter_mut().zip(values) {
            *slot = Some(*value);
        }
        Self { fields }
    }

    /// Year, month and day set; time fields unset.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_prefix(&[date.year(), date.month() as i32, date.day() as i32])
    }

    /// Every field set.
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        Self::from_prefix(&[
            dt.year(),
            dt.month() as i32,
            dt.day() as i32,
            dt.hour() as i32,
            dt.minute() as i32,
            dt.second() as i32,
        ])
    }

    pub fn fields(&self) -> &[Option<i32>; 6] {
        &self.fields
    }

    pub fn get(&self, field: Field) -> Option<i32> {
        self.fields[field.index()]
    }

    pub fn set(&mut self, field: Field, value: i32) {
        self.fields[field.index()] = Some(value);
    }

    pub fn with(mut self, field: Field, value: i32) -> Self {
        self.set(field, value);
        self
    }

    pub fn clear(&mut self, field: Field) {
        self.fields[field.index()] = None;
    }

    /// Keep the first `len` fields and unset the rest.
    pub fn truncate(&self, len: usize) -> Self {
        let mut out = *self;
        for slot in out.fields.iter_mut().skip(len) {
            *slot = None;
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(Option::is_none)
    }

    /// Index of the first set field.
    pub fn first_set(&self) -> Option<usize> {
        self.fields.iter().position(Option::is_some)
    }

    /// Number of leading set fields.
    pub fn prefix_len(&self) -> usize {
        self.fields.iter().take_while(|f| f.is_some()).count()
    }

    /// True iff the unset fields form a suffix.
    pub fn is_well_formed(&self) -> bool {
        let len = self.prefix_len();
        self.fields[len..].iter().all(Option::is_none)
    }

    /// Calendar date, when year, month and day are all set and valid.
    pub fn date(&self) -> Option<NaiveDate> {
        let year = self.get(Field::Year)?;
        let month = u32::try_from(self.get(Field::Month)?).ok()?;
        let day = u32::try_from(self.get(Field::Day)?).ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }

    /// Replace the date fields, keeping the time fields.
    pub fn with_date(&self, date: NaiveDate) -> Self {
        let mut out = *self;
        out.set(Field::Year, date.year());
        out.set(Field::Month, date.month() as i32);
        out.set(Field::Day, date.day() as i32);
        out
    }

    /// Fill the unset fields in front of the first set field from `base`.
    ///
    /// # Errors
    ///
    /// Returns [`ShikeError::IncompleteTimeBase`] when the base lacks a field
    /// the expression depends on.
    pub fn complete_leading(&self, base: &TimeHandler) -> Result<TimeHandler> {
        let first = match self.first_set() {
            Some(i) => i,
            None => return Ok(*self),
        };
        let mut out = *self;
        for (i, field) in Field::ALL.iter().enumerate().take(first) {
            let value = base.fields[i].ok_or_else(|| {
                ShikeError::IncompleteTimeBase(format!(
                    "the expression needs the {} of the time base",
                    field.name()
                ))
            })?;
            out.fields[i] = Some(value);
        }
        Ok(out)
    }

    /// The earliest instant this handler covers (unset fields at their minimum).
    pub fn lower_bound(&self) -> Result<NaiveDateTime> {
        self.bound(false)
    }

    /// The latest instant this handler covers (unset fields at their maximum).
    pub fn upper_bound(&self) -> Result<NaiveDateTime> {
        self.bound(true)
    }

    fn bound(&self, upper: bool) -> Result<NaiveDateTime> {
        if !self.is_well_formed() {
            return Err(ShikeError::InvalidExpression(format!(
                "inconsistently specified time: {}",
                self.describe()
            )));
        }
        let year = self.get(Field::Year).ok_or_else(|| {
            ShikeError::IncompleteTimeBase("the year could not be determined".to_string())
        })?;
        let month = self.get(Field::Month).unwrap_or(if upper { 12 } else { 1 });
        if !(1..=12).contains(&month) {
            return Err(ShikeError::InvalidCalendarDate(format!(
                "month {month} in {}",
                self.describe()
            )));
        }
        let last_day = days_in_month(year, month as u32).ok_or_else(|| {
            ShikeError::InvalidCalendarDate(format!("year {year} is out of range"))
        })?;
        let day = self
            .get(Field::Day)
            .unwrap_or(if upper { last_day as i32 } else { 1 });
        if day < 1 || day as u32 > last_day {
            return Err(ShikeError::InvalidCalendarDate(format!(
                "day {day} of {year}-{month:02}"
            )));
        }
        let hour = self.get(Field::Hour).unwrap_or(if upper { 23 } else { 0 });
        let minute = self.get(Field::Minute).unwrap_or(if upper { 59 } else { 0 });
        let second = self.get(Field::Second).unwrap_or(if upper { 59 } else { 0 });
        if !(0..=23).contains(&hour) || !(0..=59).contains(&minute) || !(0..=59).contains(&second)
        {
            return Err(ShikeError::InvalidCalendarDate(format!(
                "time {hour:02}:{minute:02}:{second:02}"
            )));
        }
        NaiveDate::from_ymd_opt(year, month as u32, day as u32)
            .and_then(|d| d.and_hms_opt(hour as u32, minute as u32, second as u32))
            .ok_or_else(|| ShikeError::InvalidCalendarDate(self.describe()))
    }

    /// Compact rendering with `?` for unset fields, for error messages.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|f| f.map_or_else(|| "?".to_string(), |v| v.to_string()))
            .collect();
        format!("[{}]", parts.join(", "))
    }
}

/// Number of days in a Gregorian month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((next - first).num_days() as u32)
}

/// One side of a resolved expression: a handler, or an unbounded end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    NegInf,
    At(TimeHandler),
    PosInf,
}

impl Bound {
    pub fn handler(&self) -> Option<&TimeHandler> {
        match self {
            Bound::At(h) => Some(h),
            _ => None,
        }
    }

    pub fn map<F>(self, f: F) -> Result<Bound>
    where
        F: FnOnce(TimeHandler) -> Result<TimeHandler>,
    {
        match self {
            Bound::At(h) => Ok(Bound::At(f(h)?)),
            other => Ok(other),
        }
    }
}

/// How firmly an hour of 24 rolls into the following day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiasStrength {
    /// Roll whenever the hour is 24 (`24时`).
    Strong,
    /// Roll only when the day comes from the time base (`晚上12点`).
    Weak,
}

/// Day rollover emitted by clock rules that produce an hour of 24.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBias {
    pub offset_days: i64,
    pub strength: BiasStrength,
}

impl DayBias {
    pub const fn strong() -> Self {
        Self {
            offset_days: 1,
            strength: BiasStrength::Strong,
        }
    }

    pub const fn weak() -> Self {
        Self {
            offset_days: 1,
            strength: BiasStrength::Weak,
        }
    }
}

/// Resolve an hour of 24 on a fully dated handler.
///
/// Returns the adjusted handler and whether the date actually moved.
pub(crate) fn roll_hour_24(
    handler: TimeHandler,
    bias: Option<DayBias>,
    day_from_base: bool,
) -> Result<(TimeHandler, bool)> {
    if handler.get(Field::Hour) != Some(24) {
        return Ok((handler, false));
    }
    let bias = bias.unwrap_or(DayBias::strong());
    let mut out = handler.with(Field::Hour, 0);
    let rolls = match bias.strength {
        BiasStrength::Strong => true,
        BiasStrength::Weak => day_from_base,
    };
    if !rolls {
        // An explicit day with a weak bias keeps its date and reads the hour as 0.
        return Ok((out, false));
    }
    let date = handler.date().ok_or_else(|| {
        ShikeError::InvalidCalendarDate(format!("cannot roll {}", handler.describe()))
    })?;
    let next = date + Duration::days(bias.offset_days);
    out = out.with_date(next);
    Ok((out, true))
}
