use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked job application owned by a single principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub owner_id: String,
    pub company_name: String,
    pub job_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    pub application_date: DateTime<Utc>,
    pub application_method: ApplicationMethod,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<SalaryRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_date: Option<DateTime<Utc>>,
    pub status_history: Vec<StatusEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

/// Single entry of the append-only status timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: JobStatus,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StatusEntry {
    pub fn new(status: JobStatus, date: DateTime<Utc>) -> Self {
        Self {
            status,
            date,
            notes: None,
        }
    }
}

/// Advertised compensation band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub currency: String,
}

pub const DEFAULT_CURRENCY: &str = "USD";

/// Pipeline stage of an application. Any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    #[serde(rename = "Applied")]
    Applied,
    #[serde(rename = "Interview Scheduled", alias = "InterviewScheduled")]
    InterviewScheduled,
    #[serde(rename = "Interview Completed", alias = "InterviewCompleted")]
    InterviewCompleted,
    #[serde(rename = "Offer Received", alias = "OfferReceived")]
    OfferReceived,
    #[serde(rename = "Rejected")]
    Rejected,
    #[serde(rename = "Withdrawn")]
    Withdrawn,
    #[serde(rename = "On Hold", alias = "OnHold")]
    OnHold,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        Self::Applied,
        Self::InterviewScheduled,
        Self::InterviewCompleted,
        Self::OfferReceived,
        Self::Rejected,
        Self::Withdrawn,
        Self::OnHold,
    ];

    /// Returns the label used on the wire and in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "Applied",
            Self::InterviewScheduled => "Interview Scheduled",
            Self::InterviewCompleted => "Interview Completed",
            Self::OfferReceived => "Offer Received",
            Self::Rejected => "Rejected",
            Self::Withdrawn => "Withdrawn",
            Self::OnHold => "On Hold",
        }
    }

    fn compact(self) -> &'static str {
        match self {
            Self::InterviewScheduled => "InterviewScheduled",
            Self::InterviewCompleted => "InterviewCompleted",
            Self::OfferReceived => "OfferReceived",
            Self::OnHold => "OnHold",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value || status.compact() == value)
            .ok_or_else(|| UnknownVariant::new("status", value))
    }
}

/// Channel through which the application was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ApplicationMethod {
    #[serde(rename = "LinkedIn")]
    LinkedIn,
    #[default]
    #[serde(rename = "Company Website", alias = "CompanyWebsite")]
    CompanyWebsite,
    #[serde(rename = "Referral")]
    Referral,
    #[serde(rename = "Job Board", alias = "JobBoard")]
    JobBoard,
    #[serde(rename = "Email")]
    Email,
    #[serde(rename = "Other")]
    Other,
}

impl ApplicationMethod {
    pub const ALL: [ApplicationMethod; 6] = [
        Self::LinkedIn,
        Self::CompanyWebsite,
        Self::Referral,
        Self::JobBoard,
        Self::Email,
        Self::Other,
    ];

    /// Returns the label used on the wire and in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinkedIn => "LinkedIn",
            Self::CompanyWebsite => "Company Website",
            Self::Referral => "Referral",
            Self::JobBoard => "Job Board",
            Self::Email => "Email",
            Self::Other => "Other",
        }
    }

    fn compact(self) -> &'static str {
        match self {
            Self::CompanyWebsite => "CompanyWebsite",
            Self::JobBoard => "JobBoard",
            other => other.as_str(),
        }
    }
}

impl FromStr for ApplicationMethod {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == value || method.compact() == value)
            .ok_or_else(|| UnknownVariant::new("applicationMethod", value))
    }
}

/// Returned when a stored or supplied label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Ordering applied when listing an owner's jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobSort {
    /// `createdAt` descending.
    #[default]
    Newest,
    /// `createdAt` ascending.
    Oldest,
    /// `companyName` ascending.
    Company,
}

impl FromStr for JobSort {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "company" => Ok(Self::Company),
            other => Err(UnknownVariant::new("sort", other)),
        }
    }
}

/// Predicates applied when listing an owner's jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    /// Exact status match; `None` lists every status.
    pub status: Option<JobStatus>,
    /// Case-insensitive substring over company, title and description.
    pub search: Option<String>,
}

/// Date columns that support range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    ReminderDate,
    ApplicationDate,
}

/// Per-owner aggregate returned by the stats view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total: u64,
    pub by_status: Vec<StatusCount>,
    pub upcoming_reminders: Vec<JobRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: JobStatus,
    pub count: u64,
}
