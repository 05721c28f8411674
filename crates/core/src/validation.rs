//! Field checks applied to caller input and to records before they are stored.

use thiserror::Error;

use crate::input::SalaryInput;
use crate::types::{JobRecord, JobSort, JobStatus, SalaryRange, DEFAULT_CURRENCY};

/// Default look-ahead for the reminders view.
pub const DEFAULT_REMINDER_DAYS: u32 = 7;
/// Upper bound accepted for the reminders look-ahead (about ten years).
pub const MAX_REMINDER_DAYS: u32 = 3650;

/// Field-level rejection of caller input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new<S: Into<String>>(field: &'static str, message: S) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Returns the trimmed value, rejecting missing or whitespace-only input.
pub fn required_text(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Ok(trimmed.to_string()),
        _ => Err(ValidationError::new(field, "is required")),
    }
}

/// Trims optional text; blank values collapse to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

/// Normalizes a submitted salary band.
///
/// Yields `None` when neither bound is supplied; otherwise the bounds are
/// coerced to numbers and the currency defaults to `USD`.
pub fn normalize_salary(
    input: Option<SalaryInput>,
) -> Result<Option<SalaryRange>, ValidationError> {
    let Some(input) = input else {
        return Ok(None);
    };

    let min = match &input.min {
        Some(value) => value.coerce("salaryRange.min")?,
        None => None,
    };
    let max = match &input.max {
        Some(value) => value.coerce("salaryRange.max")?,
        None => None,
    };
    if min.is_none() && max.is_none() {
        return Ok(None);
    }

    let currency = optional_text(input.currency).unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    Ok(Some(SalaryRange { min, max, currency }))
}

/// Checks record-level invariants before a record is persisted.
pub fn validate_record(record: &JobRecord) -> Result<(), ValidationError> {
    required_text("companyName", Some(record.company_name.as_str()))?;
    required_text("jobTitle", Some(record.job_title.as_str()))?;

    if let Some(salary) = &record.salary_range {
        for (field, bound) in [("salaryRange.min", salary.min), ("salaryRange.max", salary.max)] {
            if let Some(value) = bound {
                if !value.is_finite() || value < 0.0 {
                    return Err(ValidationError::new(field, "must be a non-negative number"));
                }
            }
        }
        if salary.min.is_none() && salary.max.is_none() {
            return Err(ValidationError::new("salaryRange", "requires a minimum or maximum"));
        }
        required_text("salaryRange.currency", Some(salary.currency.as_str()))?;
    }

    match record.status_history.last() {
        Some(last) if last.status == record.status => Ok(()),
        Some(_) => Err(ValidationError::new(
            "statusHistory",
            "latest entry must match the current status",
        )),
        None => Err(ValidationError::new("statusHistory", "must not be empty")),
    }
}

/// Resolves the `status` list filter; `All` or an empty value disables it.
pub fn parse_status_filter(raw: Option<&str>) -> Result<Option<JobStatus>, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") | Some("All") => Ok(None),
        Some(value) => value
            .parse::<JobStatus>()
            .map(Some)
            .map_err(|err| ValidationError::new("status", err.to_string())),
    }
}

/// Resolves the `sort` list option, defaulting to newest first.
pub fn parse_sort(raw: Option<&str>) -> Result<JobSort, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(JobSort::default()),
        Some(value) => value
            .parse::<JobSort>()
            .map_err(|err| ValidationError::new("sort", err.to_string())),
    }
}

/// Coerces the raw reminders look-ahead into a bounded day count.
pub fn parse_days_ahead(raw: Option<&str>) -> Result<u32, ValidationError> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(DEFAULT_REMINDER_DAYS);
    };
    let days = value.parse::<u32>().map_err(|_| {
        ValidationError::new("days", format!("'{value}' is not a non-negative integer"))
    })?;
    check_days_ahead(days)
}

pub fn check_days_ahead(days: u32) -> Result<u32, ValidationError> {
    if days > MAX_REMINDER_DAYS {
        return Err(ValidationError::new(
            "days",
            format!("must not exceed {MAX_REMINDER_DAYS}"),
        ));
    }
    Ok(days)
}
