use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::dao::{preferences::PreferenceStore, storage::StoreResult};

/// Volatile store used in tests and when no preference file is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    values: Arc<DashMap<String, String>>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> BoxFuture<'static, StoreResult<Option<String>>> {
        let value = self.values.get(key).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(value) })
    }

    fn set(&self, key: &str, value: Option<String>) -> BoxFuture<'static, StoreResult<()>> {
        match value {
            Some(value) => {
                self.values.insert(key.to_string(), value);
            }
            None => {
                self.values.remove(key);
            }
        }
        Box::pin(async { Ok(()) })
    }
}
