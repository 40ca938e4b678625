use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use crate::{
    error::{FlowError, Result},
    session::Session,
    task::{NextAction, Task},
};

/// An immutable graph of tasks connected by single-successor edges
pub struct Graph {
    pub id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: HashMap<String, String>,
    start_task_id: Option<String>,
}

impl Graph {
    /// Run the session's current task and advance it.
    ///
    /// `Continue` returns after exactly one task so the caller can
    /// observe the session between steps. `ContinueAndExecute` keeps going
    /// within the same call.
    pub async fn execute_session(&self, session: &mut Session) -> Result<ExecutionResult> {
        loop {
            let task_id = session.current_task_id.clone();
            let task = self
                .get_task(&task_id)
                .ok_or_else(|| FlowError::TaskNotFound(task_id.clone()))?;

            debug!(graph_id = %self.id, session_id = %session.id, task_id = %task_id, "Running task");
            let mut result = task.run(session.context.clone()).await?;
            result.task_id = task_id.clone();

            if result.status_message.is_some() {
                session.status_message = result.status_message.take();
            }

            match result.next_action {
                NextAction::End => {
                    return Ok(ExecutionResult {
                        response: result.response,
                        status: ExecutionStatus::Completed,
                    });
                }
                NextAction::Continue => {
                    let status = match self.next_task_id(&task_id) {
                        Some(next) => {
                            session.current_task_id = next.to_string();
                            ExecutionStatus::Paused
                        }
                        // A task without an outgoing edge finishes the walk
                        None => ExecutionStatus::Completed,
                    };
                    return Ok(ExecutionResult {
                        response: result.response,
                        status,
                    });
                }
                NextAction::ContinueAndExecute => match self.next_task_id(&task_id) {
                    Some(next) => session.current_task_id = next.to_string(),
                    None => {
                        return Ok(ExecutionResult {
                            response: result.response,
                            status: ExecutionStatus::Completed,
                        });
                    }
                },
            }
        }
    }

    /// Find the task that follows `current_task_id`
    pub fn next_task_id(&self, current_task_id: &str) -> Option<&str> {
        self.edges.get(current_task_id).map(String::as_str)
    }

    pub fn start_task_id(&self) -> Result<&str> {
        self.start_task_id
            .as_deref()
            .ok_or_else(|| FlowError::MissingStartTask(self.id.clone()))
    }

    pub fn get_task(&self, task_id: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(task_id).cloned()
    }

    /// Open a fresh session positioned at the start task
    pub fn new_session(&self, session_id: impl Into<String>) -> Result<Session> {
        Ok(Session::new_from_task(session_id, self.start_task_id()?))
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: HashMap<String, String>,
    start_task_id: Option<String>,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: HashMap::new(),
            edges: HashMap::new(),
            start_task_id: None,
        }
    }

    /// Add a task. The first task added becomes the start task.
    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let task_id = task.id().to_string();
        if self.start_task_id.is_none() {
            self.start_task_id = Some(task_id.clone());
        }
        self.tasks.insert(task_id, task);
        self
    }

    /// Connect `from` to `to`, replacing any earlier edge out of `from`
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.insert(from.into(), to.into());
        self
    }

    pub fn build(self) -> Graph {
        Graph {
            id: self.id,
            tasks: self.tasks,
            edges: self.edges,
            start_task_id: self.start_task_id,
        }
    }
}

/// Outcome of one `execute_session` call
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The session moved on and the next task is waiting to run
    Paused,
    /// The walk finished
    Completed,
}
