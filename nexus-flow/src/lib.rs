//! Step-wise execution of small task graphs.
//!
//! A [`Graph`] holds tasks connected by single-successor edges. A [`Session`]
//! remembers which task runs next and carries the shared [`Context`].
//! [`Graph::execute_session`] runs one step (or a chain of
//! `ContinueAndExecute` steps) and leaves the session positioned for the next
//! call, so a driver can publish progress between tasks.

pub mod context;
pub mod error;
pub mod graph;
pub mod session;
pub mod task;

pub use context::Context;
pub use error::{FlowError, Result};
pub use graph::{ExecutionResult, ExecutionStatus, Graph, GraphBuilder};
pub use session::Session;
pub use task::{NextAction, Task, TaskResult};
