use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{any::Any, sync::Arc};

use crate::error::{FlowError, Result};

type Attachment = Arc<dyn Any + Send + Sync>;

/// Data shared between the tasks of one session.
///
/// Serializable values live in a JSON map. Large binary payloads such as an
/// uploaded file are stored as typed attachments so they are never copied
/// through `serde_json`.
#[derive(Clone, Default)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
    attachments: Arc<DashMap<String, Attachment>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value)
            .map_err(|e| FlowError::ContextError(format!("cannot store '{key}': {e}")))?;
        self.data.insert(key, value);
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.value().clone()).ok())
    }

    pub fn attach<T: Any + Send + Sync>(&self, key: impl Into<String>, value: Arc<T>) {
        self.attachments.insert(key.into(), value);
    }

    pub fn attachment<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let entry = self.attachments.get(key)?;
        Arc::clone(entry.value()).downcast::<T>().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key) || self.attachments.contains_key(key)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.data.iter().map(|e| e.key().clone()).collect();
        let attachments: Vec<String> = self.attachments.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("Context")
            .field("keys", &keys)
            .field("attachments", &attachments)
            .finish()
    }
}
