//! Field validation for user payloads.
//!
//! Every validator takes raw, possibly malformed input and returns either the
//! normalized value or a [`FieldError`]. Bad input is never a panic. The
//! aggregate validators ([`validate_user`] and [`validate_user_patch`]) run
//! every field check independently and collect all failures into a
//! [`ValidationErrors`] map keyed by the JSON field name.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use utoipa::ToSchema;

pub const MIN_NAME_LENGTH: usize = 3;
pub const MAX_NAME_LENGTH: usize = 50;

const DATE_BIRTH_FORMAT: &str = "%d/%m/%Y";

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

static DATE_BIRTH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{2})/([0-9]{2})/([0-9]{4})$").expect("birth date regex is valid")
});

/// JSON field names used as keys in [`ValidationErrors`].
pub mod fields {
    pub const USER_ID: &str = "userId";
    pub const NAME: &str = "name";
    pub const LAST_NAME: &str = "lastName";
    pub const DATE_BIRTH: &str = "dateBirth";
}

/// A birth date as it arrives over the wire.
///
/// JSON clients send either a calendar date (`"1990-05-15"`), a full
/// timestamp (`"1990-05-15T00:00:00Z"`), or a `DD/MM/YYYY` string. Anything
/// else lands in [`DateBirthInput::Text`] and is rejected by
/// [`validate_date_birth`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum DateBirthInput {
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl From<NaiveDate> for DateBirthInput {
    fn from(date: NaiveDate) -> Self {
        DateBirthInput::Date(date)
    }
}

impl From<&str> for DateBirthInput {
    fn from(text: &str) -> Self {
        DateBirthInput::Text(text.to_string())
    }
}

/// Reason a single field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{0} must be at least {min} characters", min = MIN_NAME_LENGTH)]
    TooShort(&'static str),
    #[error("{0} must not exceed {max} characters", max = MAX_NAME_LENGTH)]
    TooLong(&'static str),
    #[error("Invalid email format")]
    InvalidEmailFormat,
    #[error("Invalid date format. Use DD/MM/YYYY")]
    InvalidDateFormat,
    #[error("Invalid date")]
    InvalidDate,
    #[error("Birth date cannot be in the future")]
    FutureDate,
}

/// Per-field validation failures, keyed by JSON field name.
///
/// Serializes as a flat `{ "field": "message" }` object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<&'static str, FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &'static str, error: FieldError) {
        self.0.insert(field, error);
    }

    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the field names that failed, in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{field}: {error}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.0
                .iter()
                .map(|(field, error)| (*field, error.to_string())),
        )
    }
}

/// Borrowed view over raw user fields. `None` means the field was absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserInput<'a> {
    pub user_id: Option<&'a str>,
    pub name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub date_birth: Option<&'a DateBirthInput>,
}

/// A fully validated and normalized user payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidUser {
    pub user_id: String,
    pub name: String,
    pub last_name: String,
    pub date_birth: NaiveDate,
}

/// Normalized values of the fields present in a partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidUserPatch {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub date_birth: Option<NaiveDate>,
}

impl ValidUserPatch {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
            && self.name.is_none()
            && self.last_name.is_none()
            && self.date_birth.is_none()
    }
}

/// Outcome of [`validate_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserValidation {
    /// Every field that failed, empty when the payload is valid.
    pub errors: ValidationErrors,
    /// The normalized birth date, present whenever that field alone passed.
    pub date_birth: Option<NaiveDate>,
    user: Option<ValidUser>,
}

impl UserValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<ValidUser, ValidationErrors> {
        match self.user {
            Some(user) if self.errors.is_empty() => Ok(user),
            _ => Err(self.errors),
        }
    }
}

/// Checks that `email` has a `local@domain.tld` shape. Returns the trimmed email.
pub fn validate_email(email: &str) -> Result<String, FieldError> {
    let trimmed = email.trim();
    if trimmed.is_empty() || !EMAIL_REGEX.is_match(trimmed) {
        return Err(FieldError::InvalidEmailFormat);
    }
    Ok(trimmed.to_string())
}

/// Checks a first name is between 3 and 50 characters once trimmed.
pub fn validate_name(name: &str) -> Result<String, FieldError> {
    validate_length(name, "Name")
}

/// Checks a last name is between 3 and 50 characters once trimmed.
pub fn validate_last_name(last_name: &str) -> Result<String, FieldError> {
    validate_length(last_name, "Last name")
}

fn validate_length(value: &str, label: &'static str) -> Result<String, FieldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Required(label));
    }
    let length = trimmed.chars().count();
    if length < MIN_NAME_LENGTH {
        return Err(FieldError::TooShort(label));
    }
    if length > MAX_NAME_LENGTH {
        return Err(FieldError::TooLong(label));
    }
    Ok(trimmed.to_string())
}

/// Validates a birth date against the current time.
pub fn validate_date_birth(input: &DateBirthInput) -> Result<NaiveDate, FieldError> {
    validate_date_birth_at(input, Utc::now())
}

/// Validates a birth date, treating `now` as the current time.
pub fn validate_date_birth_at(
    input: &DateBirthInput,
    now: DateTime<Utc>,
) -> Result<NaiveDate, FieldError> {
    let date = match input {
        DateBirthInput::Timestamp(timestamp) => {
            if *timestamp > now {
                return Err(FieldError::FutureDate);
            }
            return Ok(timestamp.date_naive());
        }
        DateBirthInput::Date(date) => *date,
        DateBirthInput::Text(text) => parse_date_birth(text)?,
    };

    // A calendar date starts at midnight, so only days after today are future.
    if date > now.date_naive() {
        return Err(FieldError::FutureDate);
    }
    Ok(date)
}

/// Parses a strict `DD/MM/YYYY` string without any day or month rollover.
pub fn parse_date_birth(text: &str) -> Result<NaiveDate, FieldError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Required("Birth date"));
    }
    let captures = DATE_BIRTH_REGEX
        .captures(trimmed)
        .ok_or(FieldError::InvalidDateFormat)?;

    let component = |index: usize| -> Result<u32, FieldError> {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or(FieldError::InvalidDateFormat)
    };
    let day = component(1)?;
    let month = component(2)?;
    let year = component(3)?;

    let year = i32::try_from(year).map_err(|_| FieldError::InvalidDate)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or(FieldError::InvalidDate)
}

/// Renders a date the way [`parse_date_birth`] reads it.
pub fn format_date_birth(date: NaiveDate) -> String {
    date.format(DATE_BIRTH_FORMAT).to_string()
}

/// Validates every user field, collecting all failures.
pub fn validate_user(input: &UserInput<'_>) -> UserValidation {
    validate_user_at(input, Utc::now())
}

pub fn validate_user_at(input: &UserInput<'_>, now: DateTime<Utc>) -> UserValidation {
    let mut errors = ValidationErrors::new();

    let user_id = collect(
        &mut errors,
        fields::USER_ID,
        validate_email(input.user_id.unwrap_or_default()),
    );
    let name = collect(
        &mut errors,
        fields::NAME,
        validate_name(input.name.unwrap_or_default()),
    );
    let last_name = collect(
        &mut errors,
        fields::LAST_NAME,
        validate_last_name(input.last_name.unwrap_or_default()),
    );
    let date_birth = collect(
        &mut errors,
        fields::DATE_BIRTH,
        match input.date_birth {
            Some(date_birth) => validate_date_birth_at(date_birth, now),
            None => Err(FieldError::Required("Birth date")),
        },
    );

    let user = match (user_id, name, last_name, date_birth) {
        (Some(user_id), Some(name), Some(last_name), Some(date_birth)) => Some(ValidUser {
            user_id,
            name,
            last_name,
            date_birth,
        }),
        _ => None,
    };

    UserValidation {
        errors,
        date_birth,
        user,
    }
}

/// Validates only the fields present in a partial update.
///
/// An input with no fields at all is valid and yields an empty patch.
pub fn validate_user_patch(input: &UserInput<'_>) -> Result<ValidUserPatch, ValidationErrors> {
    validate_user_patch_at(input, Utc::now())
}

pub fn validate_user_patch_at(
    input: &UserInput<'_>,
    now: DateTime<Utc>,
) -> Result<ValidUserPatch, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let user_id = input
        .user_id
        .and_then(|value| collect(&mut errors, fields::USER_ID, validate_email(value)));
    let name = input
        .name
        .and_then(|value| collect(&mut errors, fields::NAME, validate_name(value)));
    let last_name = input
        .last_name
        .and_then(|value| collect(&mut errors, fields::LAST_NAME, validate_last_name(value)));
    let date_birth = input.date_birth.and_then(|value| {
        collect(
            &mut errors,
            fields::DATE_BIRTH,
            validate_date_birth_at(value, now),
        )
    });

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(ValidUserPatch {
        user_id,
        name,
        last_name,
        date_birth,
    })
}

fn collect<T>(
    errors: &mut ValidationErrors,
    field: &'static str,
    result: Result<T, FieldError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            errors.insert(field, error);
            None
        }
    }
}
