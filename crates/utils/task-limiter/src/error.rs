use std::{borrow::Cow, convert::Infallible, fmt::Display};
use thiserror::Error;
use tokio::runtime::TryCurrentError;

/// Error that occurs while building a [`Limiter`](crate::Limiter).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LimitError {
    /// Capacity is not an integer >= 1.
    #[error("invalid argument: expected `concurrency` to be an integer >= 1, got {value}")]
    InvalidArgument { value: String },

    /// No tokio runtime is reachable from the constructing thread.
    #[error("no tokio runtime available to drive the limiter")]
    NoRuntime {
        #[source]
        source: TryCurrentError,
    },
}

impl LimitError {
    /// Create an invalid capacity error.
    pub fn invalid_capacity(value: impl Display) -> Self {
        Self::InvalidArgument {
            value: value.to_string(),
        }
    }

    /// Create a missing runtime error.
    pub fn no_runtime(source: TryCurrentError) -> Self {
        Self::NoRuntime { source }
    }
}

impl From<Infallible> for LimitError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Error delivered to the handle of a single submission.
///
/// Failures never leave their own submission: other queued or running tasks
/// are not affected.
#[derive(Debug, Error)]
#[error("task #{task_id} failed: {kind}")]
#[non_exhaustive]
pub struct TaskError {
    pub task_id: u64,
    #[source]
    pub kind: TaskErrorKind,
}

impl TaskError {
    pub fn new(task_id: u64, kind: TaskErrorKind) -> Self {
        Self { task_id, kind }
    }

    pub fn execution<E>(task_id: u64, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(
            task_id,
            TaskErrorKind::Execution {
                source: source.into(),
            },
        )
    }

    pub fn panic(task_id: u64, message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(
            task_id,
            TaskErrorKind::Panic {
                message: message.into(),
            },
        )
    }

    pub fn dropped(task_id: u64) -> Self {
        Self::new(task_id, TaskErrorKind::Dropped)
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskErrorKind {
    #[error("execution error")]
    #[non_exhaustive]
    Execution {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("task panicked: {message}")]
    #[non_exhaustive]
    Panic { message: Cow<'static, str> },

    /// The runtime went away before the task settled.
    #[error("task dropped before it settled")]
    Dropped,
}

pub type LimitResult<T> = Result<T, LimitError>;

pub type TaskResult<T> = Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_task_error_display() {
        let err = TaskError::execution(7, std::io::Error::from(std::io::ErrorKind::NotFound));
        let display = err.to_string();
        assert!(display.contains("#7"));
        assert!(display.contains("failed"));
    }

    #[test]
    fn test_task_error_kinds() {
        let err = TaskError::panic(3, "unexpected panic");
        assert!(matches!(err.kind, TaskErrorKind::Panic { .. }));
        assert_eq!(err.task_id, 3);
        assert_eq!(
            err.source().unwrap().to_string(),
            "task panicked: unexpected panic"
        );

        let err = TaskError::dropped(4);
        assert!(matches!(err.kind, TaskErrorKind::Dropped));
    }

    #[test]
    fn test_error_source_chain() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let task_err = TaskError::execution(1, io_err);

        let kind_err = task_err.source().unwrap();
        let root = kind_err.source().unwrap();
        assert_eq!(root.to_string(), "access denied");
    }

    #[test]
    fn test_invalid_capacity_message() {
        let err = LimitError::invalid_capacity(-3);
        assert!(matches!(err, LimitError::InvalidArgument { ref value } if value == "-3"));
        assert!(err.to_string().contains("integer >= 1"));
    }
}
