use crate::context::Context;

/// One walk through a graph: where it is and what it has produced so far
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub current_task_id: String,
    /// Status line reported by the last task that ran
    pub status_message: Option<String>,
    pub context: Context,
}

impl Session {
    pub fn new_from_task(sid: impl Into<String>, task_name: &str) -> Self {
        Self {
            id: sid.into(),
            current_task_id: task_name.to_string(),
            status_message: None,
            context: Context::new(),
        }
    }
}
