//! Key-value persistence for the two operator preferences that survive restarts.

pub mod file;
pub mod memory;

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;

use crate::{dao::storage::StoreResult, state::clock::ClockMode};

pub use self::file::JsonFilePreferenceStore;
pub use self::memory::MemoryPreferenceStore;

const CLOCK_MODE_KEY: &str = "clock_mode";
const RACE_ID_KEY: &str = "race_id";

/// Abstraction over a string key-value store.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> BoxFuture<'static, StoreResult<Option<String>>>;
    /// Store `value` under `key`; `None` removes the key.
    fn set(&self, key: &str, value: Option<String>) -> BoxFuture<'static, StoreResult<()>>;
}

/// Typed view over a [`PreferenceStore`].
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Stored clock mode; an unreadable value falls back to the default.
    pub async fn clock_mode(&self) -> StoreResult<ClockMode> {
        let raw = self.store.get(CLOCK_MODE_KEY).await?;
        Ok(match raw.as_deref() {
            None => ClockMode::default(),
            Some(text) => text.parse::<ClockMode>().unwrap_or_else(|_| {
                warn!(value = text, "ignoring unknown stored clock mode");
                ClockMode::default()
            }),
        })
    }

    pub async fn set_clock_mode(&self, mode: ClockMode) -> StoreResult<()> {
        self.store
            .set(CLOCK_MODE_KEY, Some(mode.as_str().to_string()))
            .await
    }

    /// Last race the operator chose to follow.
    pub async fn race_id(&self) -> StoreResult<Option<String>> {
        self.store.get(RACE_ID_KEY).await
    }

    pub async fn set_race_id(&self, race_id: Option<String>) -> StoreResult<()> {
        self.store.set(RACE_ID_KEY, race_id).await
    }
}
