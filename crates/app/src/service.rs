use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use jobtrack_core::types::{
    DateField, JobFilter, JobRecord, JobSort, JobStats, StatusEntry,
};
use jobtrack_core::validation::{
    check_days_ahead, optional_text, validate_record, DEFAULT_REMINDER_DAYS,
};
use jobtrack_core::{JobPatch, NewJobInput, ValidationError};
use jobtrack_storage::{Database, JobStoreError};

/// Number of upcoming reminders surfaced by the stats view.
pub const UPCOMING_REMINDER_LIMIT: u32 = 5;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Business operations over job records, scoped to the calling principal.
///
/// Every call is stateless; the database is the only shared state.
#[derive(Clone)]
pub struct JobService {
    database: Database,
    clock: Clock,
}

impl JobService {
    pub fn new(database: Database, clock: Clock) -> Self {
        Self { database, clock }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Creates a record owned by `owner_id` with a single seeded history entry.
    pub async fn create_job(
        &self,
        owner_id: &str,
        input: NewJobInput,
    ) -> Result<JobRecord, JobServiceError> {
        let record = input.into_record(Uuid::new_v4().to_string(), owner_id, self.now())?;
        validate_record(&record)?;

        let stored = self.database.jobs().insert(&record).await?;
        info!(
            stage = "service",
            job_id = %stored.id,
            owner_id,
            status = stored.status.as_str(),
            "job created"
        );
        Ok(stored)
    }

    pub async fn get_job(&self, owner_id: &str, id: &str) -> Result<JobRecord, JobServiceError> {
        self.fetch_owned(owner_id, id).await
    }

    pub async fn list_jobs(
        &self,
        owner_id: &str,
        filter: &JobFilter,
        sort: JobSort,
    ) -> Result<Vec<JobRecord>, JobServiceError> {
        let jobs = self
            .database
            .jobs()
            .find_by_owner(owner_id, filter, sort)
            .await?;
        Ok(jobs)
    }

    /// Applies `patch` and appends a history entry when the status value changes.
    ///
    /// The write is conditional on the version read here, so a concurrent
    /// update of the same record surfaces as [`JobServiceError::Conflict`].
    pub async fn update_job(
        &self,
        owner_id: &str,
        id: &str,
        patch: JobPatch,
    ) -> Result<JobRecord, JobServiceError> {
        let current = self.fetch_owned(owner_id, id).await?;
        if let Some(expected) = patch.version {
            if expected != current.version {
                return Err(JobServiceError::Conflict);
            }
        }

        let now = self.now();
        let mut next = current.clone();
        patch.apply_details(&mut next)?;

        let mut transitioned = false;
        if let Some(status) = patch.status {
            if status != current.status {
                next.status = status;
                next.status_history.push(StatusEntry {
                    status,
                    date: now,
                    notes: optional_text(patch.status_note.clone()),
                });
                transitioned = true;
            }
        }
        validate_record(&next)?;

        let updated = self
            .database
            .jobs()
            .update(id, current.version, &next, now)
            .await?
            .ok_or(JobServiceError::NotFound)?;

        if transitioned {
            counter!("job_status_transitions_total", "status" => updated.status.as_str())
                .increment(1);
            info!(
                stage = "service",
                job_id = %updated.id,
                from = current.status.as_str(),
                to = updated.status.as_str(),
                "job status changed"
            );
        }
        Ok(updated)
    }

    pub async fn delete_job(&self, owner_id: &str, id: &str) -> Result<(), JobServiceError> {
        self.fetch_owned(owner_id, id).await?;
        if !self.database.jobs().delete(id).await? {
            return Err(JobServiceError::NotFound);
        }
        info!(stage = "service", job_id = %id, owner_id, "job deleted");
        Ok(())
    }

    pub async fn get_stats(&self, owner_id: &str) -> Result<JobStats, JobServiceError> {
        let repo = self.database.jobs();
        let total = repo.count_by_owner(owner_id).await?;
        let by_status = repo.aggregate_by_status(owner_id).await?;
        let upcoming_reminders = repo
            .find_by_owner_in_date_range(
                owner_id,
                DateField::ReminderDate,
                self.now(),
                None,
                Some(UPCOMING_REMINDER_LIMIT),
            )
            .await?;

        Ok(JobStats {
            total,
            by_status,
            upcoming_reminders,
        })
    }

    /// Lists records whose reminder falls within `[now, now + days_ahead days]`.
    ///
    /// `days_ahead` defaults to seven days.
    pub async fn get_reminders(
        &self,
        owner_id: &str,
        days_ahead: Option<u32>,
    ) -> Result<Vec<JobRecord>, JobServiceError> {
        let days = check_days_ahead(days_ahead.unwrap_or(DEFAULT_REMINDER_DAYS))?;
        let now = self.now();
        let until = now + Duration::days(i64::from(days));

        let jobs = self
            .database
            .jobs()
            .find_by_owner_in_date_range(owner_id, DateField::ReminderDate, now, Some(until), None)
            .await?;
        Ok(jobs)
    }

    /// Loads a record and checks that `owner_id` owns it.
    ///
    /// Existence is checked before ownership so that a foreign record yields
    /// `Authorization` rather than `NotFound`.
    async fn fetch_owned(&self, owner_id: &str, id: &str) -> Result<JobRecord, JobServiceError> {
        let record = self
            .database
            .jobs()
            .find_by_id(id)
            .await?
            .ok_or(JobServiceError::NotFound)?;

        if record.owner_id != owner_id {
            warn!(stage = "service", job_id = %id, owner_id, "access to foreign job rejected");
            return Err(JobServiceError::Authorization);
        }
        Ok(record)
    }
}

#[derive(Debug, Error)]
pub enum JobServiceError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("job not found")]
    NotFound,
    #[error("job belongs to another user")]
    Authorization,
    #[error("job was modified by another request")]
    Conflict,
    #[error("storage error: {0}")]
    Storage(JobStoreError),
}

impl From<JobStoreError> for JobServiceError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::VersionConflict => Self::Conflict,
            other => Self::Storage(other),
        }
    }
}
