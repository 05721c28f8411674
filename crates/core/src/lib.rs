//! Domain model for tracked job applications.
//!
//! The crate is storage- and transport-agnostic: it defines the record shape,
//! the payloads accepted from callers and the validation applied before any
//! record is persisted.

pub mod input;
pub mod types;
pub mod validation;

pub use input::{JobPatch, NewJobInput, SalaryInput};
pub use types::{
    ApplicationMethod, DateField, JobFilter, JobRecord, JobSort, JobStats, JobStatus,
    SalaryRange, StatusCount, StatusEntry,
};
pub use validation::ValidationError;
