pub mod capacity;
mod entry;
pub mod error;
pub mod handle;
pub mod limiter;

pub use capacity::Capacity;
pub use error::{LimitError, LimitResult, TaskError, TaskErrorKind, TaskResult};
pub use handle::{TaskHandle, TaskOutcome};
pub use limiter::{Limiter, LimiterSnapshot};
