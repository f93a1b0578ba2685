//! Error types for the ingestion pipeline.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use crate::parser::ParserError;
use crate::repository::RepositoryError;
use crate::storage::StorageError;
use crate::taxonomy::ValidationError;
use crate::transform::TransformError;

/// Why a single step failed.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] StorageError),

    #[error("source content is empty")]
    EmptyContent,

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("parser error: {0}")]
    Parse(#[from] ParserError),

    #[error("parser did not answer within {0:?}")]
    ParseTimeout(Duration),

    #[error("transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("{0}")]
    CategoryValidation(ValidationReport),

    /// A step ran before the step that produces its input.
    #[error("pipeline state is missing {0}")]
    MissingState(&'static str),
}

impl StepError {
    /// Whether re-running the pipeline may succeed without changing input.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable(),
            Self::Parse(e) => e.is_retryable(),
            Self::ParseTimeout(_) | Self::Repository(_) => true,
            Self::EmptyContent
            | Self::Transform(_)
            | Self::CategoryValidation(_)
            | Self::MissingState(_) => false,
        }
    }
}

/// Error returned by a pipeline run, identifying the failing step.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("step {index} ({name}) failed: {source}")]
    StepFailed {
        /// 1-based position of the step.
        index: usize,
        name: &'static str,
        #[source]
        source: StepError,
    },

    #[error("cancelled at step {index} ({name})")]
    Cancelled { index: usize, name: &'static str },
}

impl PipelineError {
    /// The underlying step error, if the run failed rather than was cancelled.
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::StepFailed { source, .. } => Some(source),
            Self::Cancelled { .. } => None,
        }
    }

    /// Whether the job behind this run is worth another attempt.
    ///
    /// Cancelled runs are retryable: nothing about the input was wrong.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StepFailed { source, .. } => source.is_retryable(),
            Self::Cancelled { .. } => true,
        }
    }

    /// Name of the step the run stopped at.
    pub fn step_name(&self) -> &'static str {
        match self {
            Self::StepFailed { name, .. } | Self::Cancelled { name, .. } => name,
        }
    }
}

/// One transaction whose category pair did not validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFailure {
    pub index: usize,
    pub date: NaiveDate,
    pub description: String,
    pub error: ValidationError,
}

/// Every category failure of a run, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub failures: Vec<CategoryFailure>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} transaction(s) failed category validation",
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(
                f,
                "; [{}] {} {:?}: {}",
                failure.index, failure.date, failure.description, failure.error
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lists_every_failure() {
        let report = ValidationReport {
            failures: vec![
                CategoryFailure {
                    index: 0,
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    description: "Coffee".to_string(),
                    error: ValidationError::UnknownCategory {
                        category: "Nonexistent".to_string(),
                    },
                },
                CategoryFailure {
                    index: 3,
                    date: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
                    description: "Rent".to_string(),
                    error: ValidationError::UnknownSubcategory {
                        category: "Housing".to_string(),
                        subcategory: "Mortgage".to_string(),
                    },
                },
            ],
        };

        let message = report.to_string();
        assert!(message.starts_with("2 transaction(s) failed category validation"));
        assert!(message.contains("[0] 2024-01-01 \"Coffee\": unknown category: \"Nonexistent\""));
        assert!(message.contains("[3] 2024-01-04 \"Rent\""));
        assert!(message.contains("\"Mortgage\""));
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::StepFailed {
            index: 2,
            name: "compute_checksum",
            source: StepError::EmptyContent,
        };
        assert_eq!(
            err.to_string(),
            "step 2 (compute_checksum) failed: source content is empty"
        );
        assert_eq!(err.step_name(), "compute_checksum");
        assert!(matches!(err.step_error(), Some(StepError::EmptyContent)));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(StepError::ParseTimeout(Duration::from_secs(1)).is_retryable());
        assert!(!StepError::EmptyContent.is_retryable());
        assert!(!StepError::CategoryValidation(ValidationReport::default()).is_retryable());
    }

    #[test]
    fn test_pipeline_error_retryable_follows_step() {
        let permanent = PipelineError::StepFailed {
            index: 10,
            name: "validate_categories",
            source: StepError::CategoryValidation(ValidationReport::default()),
        };
        assert!(!permanent.is_retryable());

        let transient = PipelineError::StepFailed {
            index: 6,
            name: "parse_with_ai_service",
            source: StepError::ParseTimeout(Duration::from_secs(1)),
        };
        assert!(transient.is_retryable());

        let cancelled = PipelineError::Cancelled {
            index: 6,
            name: "parse_with_ai_service",
        };
        assert!(cancelled.is_retryable());
    }
}
