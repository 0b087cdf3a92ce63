use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FitError, FitResult};

pub const MAX_WEIGHT_KG: f64 = 500.0;

// --- Weight tracking types ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub id: Uuid,
    #[serde(rename = "user_id")]
    pub owner: Uuid,
    pub weight_kg: f64,
    #[serde(rename = "entry_date")]
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWeightEntry {
    pub date: NaiveDate,
    pub weight_kg: f64,
}

// --- Workout types ---

/// The user-editable part of a workout activity row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityFields {
    #[serde(rename = "activity")]
    pub name: String,
    pub reps: Option<i64>,
    pub sets: Option<i64>,
    pub current_weight: Option<f64>,
    pub times_per_week: Option<i64>,
    pub calories: Option<f64>,
}

impl ActivityFields {
    /// Calories burned per week by this activity; absent values count as zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn weekly_calories(&self) -> f64 {
        self.calories.unwrap_or(0.0) * self.times_per_week.unwrap_or(0) as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutActivity {
    pub id: Uuid,
    #[serde(rename = "user_id")]
    pub owner: Uuid,
    #[serde(flatten)]
    pub fields: ActivityFields,
    pub created_at: DateTime<Utc>,
}

/// A persisted row sent back as part of a bulk upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityUpdate {
    pub id: Uuid,
    pub fields: ActivityFields,
}

// --- Week plan types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Monday is 0, Sunday is 6.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 7]
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        Self::from_index(weekday.num_days_from_monday() as usize)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }

    /// Lowercase key used in persisted rows.
    pub fn key(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DayOfWeek {
    type Err = FitError;

    fn from_str(s: &str) -> FitResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "monday" | "mon" => Ok(Self::Monday),
            "tuesday" | "tue" => Ok(Self::Tuesday),
            "wednesday" | "wed" => Ok(Self::Wednesday),
            "thursday" | "thu" => Ok(Self::Thursday),
            "friday" | "fri" => Ok(Self::Friday),
            "saturday" | "sat" => Ok(Self::Saturday),
            "sunday" | "sun" => Ok(Self::Sunday),
            _ => Err(FitError::validation(
                "day_of_week",
                format!("Invalid day '{s}'. Use monday-sunday or mon-sun"),
            )),
        }
    }
}

pub const SLOT_MINUTES: u32 = 30;
pub const SLOTS_PER_DAY: usize = 48;

/// One half-hour slot of a day, labelled "HH:MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot(u8);

impl TimeSlot {
    pub fn from_index(index: usize) -> Option<Self> {
        (index < SLOTS_PER_DAY).then(|| Self(index as u8))
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn all() -> impl Iterator<Item = TimeSlot> {
        (0..SLOTS_PER_DAY as u8).map(TimeSlot)
    }

    /// The slot containing `time`, i.e. `time` rounded down to the half hour.
    pub fn containing(time: NaiveTime) -> Self {
        let minutes = time.hour() * 60 + time.minute();
        Self((minutes / SLOT_MINUTES) as u8)
    }

    pub fn label(self) -> String {
        let minutes = u32::from(self.0) * SLOT_MINUTES;
        format!("{:02}:{:02}", minutes / 60, minutes % 60)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for TimeSlot {
    type Err = FitError;

    fn from_str(s: &str) -> FitResult<Self> {
        let invalid = || {
            FitError::validation(
                "time_slot",
                format!("Invalid time slot '{s}'. Use HH:MM on the hour or half hour"),
            )
        };
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        if m.len() != 2 || hour > 23 || (minute != 0 && minute != 30) {
            return Err(invalid());
        }
        Ok(Self(((hour * 60 + minute) / SLOT_MINUTES) as u8))
    }
}

/// A stored week plan cell. Day and slot stay as the raw persisted keys so a
/// row with an unknown key can be skipped instead of failing the whole load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekPlanEntry {
    #[serde(rename = "user_id")]
    pub owner: Uuid,
    pub day_of_week: String,
    pub time_slot: String,
    pub content: String,
}

impl WeekPlanEntry {
    pub fn new(owner: Uuid, day: DayOfWeek, slot: TimeSlot, content: &str) -> Self {
        Self {
            owner,
            day_of_week: day.key().to_string(),
            time_slot: slot.label(),
            content: content.to_string(),
        }
    }
}

// --- Profile ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = FitError;

    fn from_str(s: &str) -> FitResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            _ => Err(FitError::validation(
                "theme",
                format!("Invalid theme '{s}'. Use light, dark, or system"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "user_id")]
    pub owner: Uuid,
    pub theme: Option<String>,
}

// --- Input validation ---

/// Whether `value` is an acceptable state of the weight input box: digits
/// with at most one decimal separator (`,` or `.`), or empty.
pub fn is_weight_input(value: &str) -> bool {
    let mut separators = 0;
    for c in value.chars() {
        match c {
            '0'..='9' => {}
            ',' | '.' => separators += 1,
            _ => return false,
        }
    }
    separators <= 1
}

/// Parse a weight typed by the user. Accepts `,` or `.` as decimal separator.
pub fn parse_weight(input: &str) -> FitResult<f64> {
    let normalized = input.trim().replace(',', ".");
    let value: f64 = normalized
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| FitError::validation("weight", "Please enter a valid number"))?;
    if value <= 0.0 {
        return Err(FitError::validation(
            "weight",
            "Weight must be greater than 0",
        ));
    }
    if value > MAX_WEIGHT_KG {
        return Err(FitError::validation(
            "weight",
            "Weight must be at most 500 kg",
        ));
    }
    Ok(value)
}

/// Parse an optional whole-number cell: empty means absent.
pub fn parse_optional_count(field: &'static str, input: &str) -> FitResult<Option<i64>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let value: i64 = input
        .parse()
        .map_err(|_| FitError::validation(field, format!("{field} must be a whole number")))?;
    if value < 0 {
        return Err(FitError::validation(
            field,
            format!("{field} must not be negative"),
        ));
    }
    Ok(Some(value))
}

/// Parse an optional decimal cell: empty means absent.
pub fn parse_optional_amount(field: &'static str, input: &str) -> FitResult<Option<f64>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let value: f64 = input
        .replace(',', ".")
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| FitError::validation(field, format!("{field} must be a number")))?;
    if value < 0.0 {
        return Err(FitError::validation(
            field,
            format!("{field} must not be negative"),
        ));
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weight_accepts_dot_and_comma() {
        assert!((parse_weight("75.5").unwrap() - 75.5).abs() < f64::EPSILON);
        assert!((parse_weight("75,5").unwrap() - 75.5).abs() < f64::EPSILON);
        assert!((parse_weight(" 80 ").unwrap() - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_weight_bounds() {
        assert!((parse_weight("500").unwrap() - 500.0).abs() < f64::EPSILON);
        assert!((parse_weight("0.1").unwrap() - 0.1).abs() < f64::EPSILON);
        assert!(parse_weight("500.1").is_err());
        assert!(parse_weight("0").is_err());
        assert!(parse_weight("-5").is_err());
    }

    #[test]
    fn test_parse_weight_rejects_non_numeric() {
        for input in ["", "abc", "7a", "NaN", "inf", "1,2,3"] {
            let err = parse_weight(input).unwrap_err();
            assert_eq!(err.field(), Some("weight"), "input {input:?}");
        }
    }

    #[test]
    fn test_is_weight_input() {
        assert!(is_weight_input(""));
        assert!(is_weight_input("75"));
        assert!(is_weight_input("75,"));
        assert!(is_weight_input("75.5"));
        assert!(is_weight_input(",5"));
        assert!(!is_weight_input("75.5.1"));
        assert!(!is_weight_input("7,5.1"));
        assert!(!is_weight_input("-1"));
        assert!(!is_weight_input("75kg"));
    }

    #[test]
    fn test_day_of_week_indexes() {
        assert_eq!(DayOfWeek::Monday.index(), 0);
        assert_eq!(DayOfWeek::Sunday.index(), 6);
        assert_eq!(DayOfWeek::from_index(7), DayOfWeek::Monday);
        assert_eq!(DayOfWeek::from_weekday(Weekday::Sun), DayOfWeek::Sunday);
        assert_eq!(DayOfWeek::from_weekday(Weekday::Mon), DayOfWeek::Monday);
    }

    #[test]
    fn test_day_of_week_parse() {
        assert_eq!("Tuesday".parse::<DayOfWeek>().unwrap(), DayOfWeek::Tuesday);
        assert_eq!("sun".parse::<DayOfWeek>().unwrap(), DayOfWeek::Sunday);
        assert!("funday".parse::<DayOfWeek>().is_err());
    }

    #[test]
    fn test_day_of_week_serde_uses_lowercase_key() {
        let json = serde_json::to_string(&DayOfWeek::Friday).unwrap();
        assert_eq!(json, "\"friday\"");
    }

    #[test]
    fn test_time_slots_cover_the_day() {
        let labels: Vec<String> = TimeSlot::all().map(TimeSlot::label).collect();
        assert_eq!(labels.len(), SLOTS_PER_DAY);
        assert_eq!(labels[0], "00:00");
        assert_eq!(labels[1], "00:30");
        assert_eq!(labels[15], "07:30");
        assert_eq!(labels[47], "23:30");
    }

    #[test]
    fn test_time_slot_parse() {
        assert_eq!("07:30".parse::<TimeSlot>().unwrap().index(), 15);
        assert_eq!("00:00".parse::<TimeSlot>().unwrap().index(), 0);
        assert!("07:15".parse::<TimeSlot>().is_err());
        assert!("24:00".parse::<TimeSlot>().is_err());
        assert!("7:3".parse::<TimeSlot>().is_err());
        assert!("noon".parse::<TimeSlot>().is_err());
    }

    #[test]
    fn test_time_slot_containing_rounds_down() {
        let t = NaiveTime::from_hms_opt(14, 59, 59).unwrap();
        assert_eq!(TimeSlot::containing(t).label(), "14:30");
        let t = NaiveTime::from_hms_opt(0, 29, 0).unwrap();
        assert_eq!(TimeSlot::containing(t).label(), "00:00");
        let t = NaiveTime::from_hms_opt(23, 45, 0).unwrap();
        assert_eq!(TimeSlot::containing(t).label(), "23:30");
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert_eq!(Theme::System.to_string(), "system");
        assert!("purple".parse::<Theme>().is_err());
    }

    #[test]
    fn test_optional_cells() {
        assert_eq!(parse_optional_count("reps", "").unwrap(), None);
        assert_eq!(parse_optional_count("reps", " 12 ").unwrap(), Some(12));
        assert!(parse_optional_count("reps", "1.5").is_err());
        assert!(parse_optional_count("reps", "-1").is_err());
        assert_eq!(parse_optional_amount("calories", "").unwrap(), None);
        assert_eq!(parse_optional_amount("calories", "250,5").unwrap(), Some(250.5));
        assert!(parse_optional_amount("calories", "lots").is_err());
    }

    #[test]
    fn test_weekly_calories_treats_missing_as_zero() {
        let mut fields = ActivityFields {
            name: "Run".to_string(),
            calories: Some(300.0),
            times_per_week: Some(3),
            ..ActivityFields::default()
        };
        assert!((fields.weekly_calories() - 900.0).abs() < f64::EPSILON);
        fields.times_per_week = None;
        assert!(fields.weekly_calories().abs() < f64::EPSILON);
    }

    #[test]
    fn test_workout_activity_wire_names() {
        let activity = WorkoutActivity {
            id: Uuid::nil(),
            owner: Uuid::nil(),
            fields: ActivityFields {
                name: "Squat".to_string(),
                reps: Some(5),
                ..ActivityFields::default()
            },
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&activity).unwrap();
        assert_eq!(value["activity"], "Squat");
        assert_eq!(value["reps"], 5);
        assert!(value["sets"].is_null());
        assert!(value.get("user_id").is_some());
    }
}
