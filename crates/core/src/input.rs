//! Request payloads accepted for creating and updating jobs.
//!
//! Payloads are deliberately lenient at the serde layer (required text fields
//! are optional here, dates accept plain `YYYY-MM-DD`, salary bounds accept
//! numeric strings) so that validation can report a field-level
//! [`ValidationError`] instead of an opaque decode failure.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::types::{ApplicationMethod, JobRecord, JobStatus, StatusEntry};
use crate::validation::{normalize_salary, optional_text, required_text, ValidationError};

/// Payload accepted when creating a job. Ownership fields are never read from it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJobInput {
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub job_description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub application_date: Option<DateTime<Utc>>,
    pub application_method: Option<ApplicationMethod>,
    pub status: Option<JobStatus>,
    pub salary_range: Option<SalaryInput>,
    pub job_url: Option<String>,
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub reminder_date: Option<DateTime<Utc>>,
}

impl NewJobInput {
    /// Builds a fresh record owned by `owner_id`, applying creation defaults.
    pub fn into_record(
        self,
        id: String,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<JobRecord, ValidationError> {
        let company_name = required_text("companyName", self.company_name.as_deref())?;
        let job_title = required_text("jobTitle", self.job_title.as_deref())?;
        let salary_range = normalize_salary(self.salary_range)?;
        let status = self.status.unwrap_or_default();

        Ok(JobRecord {
            id,
            owner_id: owner_id.to_string(),
            company_name,
            job_title,
            job_description: optional_text(self.job_description),
            application_date: self.application_date.unwrap_or(now),
            application_method: self.application_method.unwrap_or_default(),
            status,
            salary_range,
            job_url: optional_text(self.job_url),
            notes: optional_text(self.notes),
            reminder_date: self.reminder_date,
            status_history: vec![StatusEntry::new(status, now)],
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }
}

/// Partial update. Absent fields are left untouched; clearable fields use
/// `Some(None)` for an explicit `null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub company_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub job_title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub job_description: Option<Option<String>>,
    /// `Some(None)` (explicit `null` or blank) is rejected; the date cannot be cleared.
    #[serde(default, deserialize_with = "deserialize_clearable_date")]
    pub application_date: Option<Option<DateTime<Utc>>>,
    pub application_method: Option<ApplicationMethod>,
    pub status: Option<JobStatus>,
    /// Attached to the history entry when `status` changes.
    pub status_note: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub salary_range: Option<Option<SalaryInput>>,
    #[serde(default, deserialize_with = "double_option")]
    pub job_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_clearable_date")]
    pub reminder_date: Option<Option<DateTime<Utc>>>,
    /// Optimistic concurrency token last seen by the caller.
    pub version: Option<i64>,
}

impl JobPatch {
    /// Applies every field except `status` to `record`.
    ///
    /// Status changes carry history bookkeeping and are applied by the caller.
    pub fn apply_details(&self, record: &mut JobRecord) -> Result<(), ValidationError> {
        if let Some(value) = &self.company_name {
            record.company_name = required_text("companyName", value.as_deref())?;
        }
        if let Some(value) = &self.job_title {
            record.job_title = required_text("jobTitle", value.as_deref())?;
        }
        if let Some(value) = &self.job_description {
            record.job_description = optional_text(value.clone());
        }
        match self.application_date {
            Some(Some(value)) => record.application_date = value,
            Some(None) => return Err(ValidationError::new("applicationDate", "is required")),
            None => {}
        }
        if let Some(value) = self.application_method {
            record.application_method = value;
        }
        if let Some(value) = &self.salary_range {
            record.salary_range = normalize_salary(value.clone())?;
        }
        if let Some(value) = &self.job_url {
            record.job_url = optional_text(value.clone());
        }
        if let Some(value) = &self.notes {
            record.notes = optional_text(value.clone());
        }
        if let Some(value) = self.reminder_date {
            record.reminder_date = value;
        }
        Ok(())
    }
}

/// Salary band as submitted by a form: bounds may be numbers, numeric strings or blank.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SalaryInput {
    pub min: Option<NumericInput>,
    pub max: Option<NumericInput>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl NumericInput {
    /// Coerces to a non-negative number; blank text is treated as absent.
    pub fn coerce(&self, field: &'static str) -> Result<Option<f64>, ValidationError> {
        let value = match self {
            Self::Number(value) => *value,
            Self::Text(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed.parse::<f64>().map_err(|_| {
                    ValidationError::new(field, format!("'{trimmed}' is not a number"))
                })?
            }
        };

        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::new(field, "must be a non-negative number"));
        }
        Ok(Some(value))
    }
}

/// Parses an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC).
///
/// Blank input yields `None`.
pub fn parse_date_input(raw: &str) -> Result<Option<DateTime<Utc>>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(value) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Some(value.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| format!("invalid date '{trimmed}', expected RFC 3339 or YYYY-MM-DD"))
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_date_input(&raw).map_err(D::Error::custom),
        None => Ok(None),
    }
}

fn deserialize_clearable_date<'de, D>(
    deserializer: D,
) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_date_input(&raw).map(Some).map_err(D::Error::custom),
        None => Ok(Some(None)),
    }
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn into_record_applies_defaults_and_seeds_history() {
        let input: NewJobInput =
            serde_json::from_value(json!({"companyName": " Acme ", "jobTitle": "Engineer"}))
                .unwrap();
        let record = input.into_record("job-1".into(), "user-1", fixed_now()).unwrap();

        assert_eq!(record.company_name, "Acme");
        assert_eq!(record.status, JobStatus::Applied);
        assert_eq!(record.application_method, ApplicationMethod::CompanyWebsite);
        assert_eq!(record.application_date, fixed_now());
        assert_eq!(record.status_history, vec![StatusEntry::new(JobStatus::Applied, fixed_now())]);
        assert!(record.salary_range.is_none());
        assert_eq!(record.version, 1);
    }

    #[test]
    fn into_record_rejects_blank_title() {
        let input = NewJobInput {
            company_name: Some("Acme".into()),
            job_title: Some("   ".into()),
            ..NewJobInput::default()
        };
        let err = input.into_record("job-1".into(), "user-1", fixed_now()).unwrap_err();
        assert_eq!(err.field, "jobTitle");
    }

    #[test]
    fn spoofed_owner_field_is_ignored() {
        let input: NewJobInput = serde_json::from_value(json!({
            "companyName": "Acme",
            "jobTitle": "Engineer",
            "userId": "someone-else",
            "ownerId": "someone-else"
        }))
        .unwrap();
        let record = input.into_record("job-1".into(), "user-1", fixed_now()).unwrap();
        assert_eq!(record.owner_id, "user-1");
    }

    #[test]
    fn dates_accept_plain_days_and_blank() {
        let input: NewJobInput = serde_json::from_value(json!({
            "companyName": "Acme",
            "jobTitle": "Engineer",
            "applicationDate": "2024-02-10",
            "reminderDate": ""
        }))
        .unwrap();
        assert_eq!(
            input.application_date.unwrap().to_rfc3339(),
            "2024-02-10T00:00:00+00:00"
        );
        assert!(input.reminder_date.is_none());

        let err = serde_json::from_value::<NewJobInput>(json!({"applicationDate": "soon"}));
        assert!(err.is_err());
    }

    #[test]
    fn patch_distinguishes_absent_and_null() {
        let patch: JobPatch =
            serde_json::from_value(json!({"notes": null, "reminderDate": ""})).unwrap();
        assert_eq!(patch.notes, Some(None));
        assert_eq!(patch.reminder_date, Some(None));
        assert!(patch.job_url.is_none());

        let patch: JobPatch = serde_json::from_value(json!({})).unwrap();
        assert!(patch.reminder_date.is_none());
        assert!(patch.salary_range.is_none());
    }

    #[test]
    fn apply_details_leaves_status_alone() {
        let mut record = NewJobInput {
            company_name: Some("Acme".into()),
            job_title: Some("Engineer".into()),
            notes: Some("first".into()),
            ..NewJobInput::default()
        }
        .into_record("job-1".into(), "user-1", fixed_now())
        .unwrap();

        let patch: JobPatch = serde_json::from_value(json!({
            "status": "Rejected",
            "jobTitle": "Staff Engineer",
            "notes": null,
            "salaryRange": {"min": "100000", "max": ""}
        }))
        .unwrap();
        patch.apply_details(&mut record).unwrap();

        assert_eq!(record.status, JobStatus::Applied);
        assert_eq!(record.job_title, "Staff Engineer");
        assert!(record.notes.is_none());
        let salary = record.salary_range.unwrap();
        assert_eq!(salary.min, Some(100000.0));
        assert_eq!(salary.max, None);
        assert_eq!(salary.currency, "USD");
    }

    #[test]
    fn apply_details_rejects_blank_company() {
        let mut record = NewJobInput {
            company_name: Some("Acme".into()),
            job_title: Some("Engineer".into()),
            ..NewJobInput::default()
        }
        .into_record("job-1".into(), "user-1", fixed_now())
        .unwrap();
        let patch = JobPatch {
            company_name: Some(Some(String::new())),
            ..JobPatch::default()
        };
        let err = patch.apply_details(&mut record).unwrap_err();
        assert_eq!(err.field, "companyName");
        assert_eq!(record.company_name, "Acme");
    }

    #[test]
    fn patch_rejects_null_required_fields() {
        let mut record = NewJobInput {
            company_name: Some("Acme".into()),
            job_title: Some("Engineer".into()),
            ..NewJobInput::default()
        }
        .into_record("job-1".into(), "user-1", fixed_now())
        .unwrap();

        let cases = [
            (json!({"companyName": null}), "companyName"),
            (json!({"jobTitle": null}), "jobTitle"),
            (json!({"applicationDate": null}), "applicationDate"),
            (json!({"applicationDate": "  "}), "applicationDate"),
        ];
        for (body, field) in cases {
            let patch: JobPatch = serde_json::from_value(body).unwrap();
            let err = patch.apply_details(&mut record).unwrap_err();
            assert_eq!(err.field, field);
        }
        assert_eq!(record.company_name, "Acme");
        assert_eq!(record.job_title, "Engineer");
        assert_eq!(record.application_date, fixed_now());

        let patch: JobPatch =
            serde_json::from_value(json!({"applicationDate": "2024-02-01"})).unwrap();
        patch.apply_details(&mut record).unwrap();
        assert_eq!(record.application_date.to_rfc3339(), "2024-02-01T00:00:00+00:00");
    }

    #[test]
    fn numeric_input_rejects_garbage_and_negatives() {
        assert!(NumericInput::Text("abc".into()).coerce("salaryRange.min").is_err());
        assert!(NumericInput::Number(-1.0).coerce("salaryRange.min").is_err());
        assert_eq!(
            NumericInput::Text(" 42.5 ".into()).coerce("salaryRange.min").unwrap(),
            Some(42.5)
        );
    }
}
