use std::{str::FromStr, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    QueryBuilder, Sqlite, SqlitePool,
};
use thiserror::Error;

use jobtrack_core::types::{
    ApplicationMethod, DateField, JobFilter, JobRecord, JobSort, JobStatus, SalaryRange,
    StatusCount, StatusEntry, DEFAULT_CURRENCY,
};

const JOB_COLUMNS: &str = "id, owner_id, company_name, job_title, job_description, \
     application_date, application_method, status, salary_min, salary_max, salary_currency, \
     job_url, notes, reminder_date, status_history_json, created_at, updated_at, version";

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(5000));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Opens a private in-memory database backed by a single long-lived connection.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle to operate on job records.
    pub fn jobs(&self) -> JobRepository {
        JobRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository responsible for the `jobs` table.
///
/// The repository evaluates queries only; ownership checks belong to the caller.
#[derive(Clone)]
pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    /// Persists a new record and returns it as stored, with `version` reset to 1.
    pub async fn insert(&self, record: &JobRecord) -> Result<JobRecord, JobStoreError> {
        let history = serde_json::to_string(&record.status_history)?;
        let salary = record.salary_range.as_ref();
        let sql = format!(
            "INSERT INTO jobs ({JOB_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1) \
             RETURNING {JOB_COLUMNS}"
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(&record.id)
            .bind(&record.owner_id)
            .bind(&record.company_name)
            .bind(&record.job_title)
            .bind(&record.job_description)
            .bind(to_rfc3339(record.application_date))
            .bind(record.application_method.as_str())
            .bind(record.status.as_str())
            .bind(salary.and_then(|range| range.min))
            .bind(salary.and_then(|range| range.max))
            .bind(salary.map(|range| range.currency.as_str()))
            .bind(&record.job_url)
            .bind(&record.notes)
            .bind(record.reminder_date.map(to_rfc3339))
            .bind(history)
            .bind(to_rfc3339(record.created_at))
            .bind(to_rfc3339(record.updated_at))
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;

        row.into_domain()
    }

    /// Loads a single record regardless of its owner.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<JobRecord>, JobStoreError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?");
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(JobRow::into_domain).transpose()
    }

    /// Lists the owner's records matching `filter`, ordered by `sort`.
    pub async fn find_by_owner(
        &self,
        owner_id: &str,
        filter: &JobFilter,
        sort: JobSort,
    ) -> Result<Vec<JobRecord>, JobStoreError> {
        let select = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE owner_id = ");
        let mut builder = QueryBuilder::<Sqlite>::new(select);
        builder.push_bind(owner_id.to_string());

        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }

        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = like_pattern(term);
            builder
                .push(" AND (company_name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR job_title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR job_description LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }

        builder.push(match sort {
            JobSort::Newest => " ORDER BY created_at DESC, rowid DESC",
            JobSort::Oldest => " ORDER BY created_at ASC, rowid ASC",
            JobSort::Company => " ORDER BY company_name ASC, created_at DESC",
        });

        let rows = builder
            .build_query_as::<JobRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(JobRow::into_domain).collect()
    }

    /// Lists the owner's records whose `field` lies within `[from, to]`, ascending.
    ///
    /// An absent `to` leaves the window open-ended. Records without a value for
    /// `field` never match.
    pub async fn find_by_owner_in_date_range(
        &self,
        owner_id: &str,
        field: DateField,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> Result<Vec<JobRecord>, JobStoreError> {
        let column = match field {
            DateField::ReminderDate => "reminder_date",
            DateField::ApplicationDate => "application_date",
        };

        let select = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE owner_id = ");
        let mut builder = QueryBuilder::<Sqlite>::new(select);
        builder.push_bind(owner_id.to_string());
        builder
            .push(format!(" AND {column} IS NOT NULL AND {column} >= "))
            .push_bind(to_rfc3339(from));
        if let Some(to) = to {
            builder
                .push(format!(" AND {column} <= "))
                .push_bind(to_rfc3339(to));
        }
        builder.push(format!(" ORDER BY {column} ASC, rowid ASC"));
        if let Some(limit) = limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = builder
            .build_query_as::<JobRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(JobRow::into_domain).collect()
    }

    /// Overwrites the mutable columns of a record if it still has `expected_version`.
    ///
    /// Returns `Ok(None)` when the record no longer exists and
    /// [`JobStoreError::VersionConflict`] when another write got there first.
    /// `owner_id` and `created_at` are never rewritten.
    pub async fn update(
        &self,
        id: &str,
        expected_version: i64,
        record: &JobRecord,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<JobRecord>, JobStoreError> {
        let history = serde_json::to_string(&record.status_history)?;
        let salary = record.salary_range.as_ref();
        let sql = format!(
            "UPDATE jobs \
             SET company_name = ?, job_title = ?, job_description = ?, application_date = ?, \
                 application_method = ?, status = ?, salary_min = ?, salary_max = ?, \
                 salary_currency = ?, job_url = ?, notes = ?, reminder_date = ?, \
                 status_history_json = ?, updated_at = ?, version = version + 1 \
             WHERE id = ? AND version = ? \
             RETURNING {JOB_COLUMNS}"
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(&record.company_name)
            .bind(&record.job_title)
            .bind(&record.job_description)
            .bind(to_rfc3339(record.application_date))
            .bind(record.application_method.as_str())
            .bind(record.status.as_str())
            .bind(salary.and_then(|range| range.min))
            .bind(salary.and_then(|range| range.max))
            .bind(salary.map(|range| range.currency.as_str()))
            .bind(&record.job_url)
            .bind(&record.notes)
            .bind(record.reminder_date.map(to_rfc3339))
            .bind(history)
            .bind(to_rfc3339(updated_at))
            .bind(id)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?;

        if let Some(row) = row {
            return row.into_domain().map(Some);
        }

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if exists > 0 {
            Err(JobStoreError::VersionConflict)
        } else {
            Ok(None)
        }
    }

    /// Hard-deletes a record. Returns `false` when nothing matched.
    pub async fn delete(&self, id: &str) -> Result<bool, JobStoreError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_by_owner(&self, owner_id: &str) -> Result<u64, JobStoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Group-counts the owner's records by status.
    pub async fn aggregate_by_status(
        &self,
        owner_id: &str,
    ) -> Result<Vec<StatusCount>, JobStoreError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) AS count FROM jobs WHERE owner_id = ? \
             GROUP BY status ORDER BY status",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| {
                Ok(StatusCount {
                    status: parse_stored(&status)?,
                    count: count as u64,
                })
            })
            .collect()
    }
}

/// Errors that can occur while reading or writing job records.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job violates a storage constraint: {0}")]
    Constraint(String),
    #[error("job was modified concurrently")]
    VersionConflict,
    #[error("failed to decode stored job: {0}")]
    Decode(String),
    #[error("failed to encode status history: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Raw `jobs` row.
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    owner_id: String,
    company_name: String,
    job_title: String,
    job_description: Option<String>,
    application_date: DateTime<Utc>,
    application_method: String,
    status: String,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
    salary_currency: Option<String>,
    job_url: Option<String>,
    notes: Option<String>,
    reminder_date: Option<DateTime<Utc>>,
    status_history_json: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl JobRow {
    fn into_domain(self) -> Result<JobRecord, JobStoreError> {
        let status_history: Vec<StatusEntry> = serde_json::from_str(&self.status_history_json)
            .map_err(|err| JobStoreError::Decode(format!("status history of {}: {err}", self.id)))?;
        let salary_range = match (self.salary_min, self.salary_max, self.salary_currency) {
            (None, None, _) => None,
            (min, max, currency) => Some(SalaryRange {
                min,
                max,
                currency: currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            }),
        };

        Ok(JobRecord {
            application_method: parse_stored::<ApplicationMethod>(&self.application_method)?,
            status: parse_stored::<JobStatus>(&self.status)?,
            id: self.id,
            owner_id: self.owner_id,
            company_name: self.company_name,
            job_title: self.job_title,
            job_description: self.job_description,
            application_date: self.application_date,
            salary_range,
            job_url: self.job_url,
            notes: self.notes,
            reminder_date: self.reminder_date,
            status_history,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

fn parse_stored<T>(value: &str) -> Result<T, JobStoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|err| JobStoreError::Decode(err.to_string()))
}

fn map_write_error(err: sqlx::Error) -> JobStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            // SQLite extended codes: CHECK, NOT NULL, PRIMARY KEY, UNIQUE, FOREIGN KEY.
            let constraint = matches!(
                db_err.code().as_deref(),
                Some("275" | "1299" | "1555" | "2067" | "787")
            );
            if constraint {
                JobStoreError::Constraint(db_err.message().to_string())
            } else {
                JobStoreError::Database(sqlx::Error::Database(db_err))
            }
        }
        other => JobStoreError::Database(other),
    }
}

fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
