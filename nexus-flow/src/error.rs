use thiserror::Error;

/// Errors raised while executing a task graph
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Graph '{0}' has no start task")]
    MissingStartTask(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Task '{task_id}' failed: {message}")]
    TaskExecutionFailed { task_id: String, message: String },
}

impl FlowError {
    /// Shorthand used by task implementations to report a failure
    pub fn task_failed(task_id: impl Into<String>, message: impl ToString) -> Self {
        Self::TaskExecutionFailed {
            task_id: task_id.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
