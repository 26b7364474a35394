use std::{collections::BTreeMap, io::ErrorKind, path::PathBuf, sync::Arc};

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::debug;

use crate::dao::{
    preferences::PreferenceStore,
    storage::{StoreError, StoreResult},
};

type Entries = BTreeMap<String, String>;

/// Preferences kept in a small JSON object on disk.
///
/// The file is read on first access and rewritten in full on every change. A
/// missing file is an empty store.
#[derive(Clone)]
pub struct JsonFilePreferenceStore {
    path: Arc<PathBuf>,
    cache: Arc<Mutex<Option<Entries>>>,
}

impl JsonFilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            cache: Arc::new(Mutex::new(None)),
        }
    }

    async fn load(&self) -> StoreResult<Entries> {
        match tokio::fs::read(self.path.as_path()).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Entries::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
                path: self.path.to_path_buf(),
                source,
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no preference file yet");
                Ok(Entries::new())
            }
            Err(source) => Err(StoreError::Io {
                path: self.path.to_path_buf(),
                source,
            }),
        }
    }

    async fn persist(&self, entries: &Entries) -> StoreResult<()> {
        let encoded =
            serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Encode { source })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(self.path.as_path(), encoded)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.to_path_buf(),
                source,
            })
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn get(&self, key: &str) -> BoxFuture<'static, StoreResult<Option<String>>> {
        let store = self.clone();
        let key = key.to_string();
        Box::pin(async move {
            let mut cache = store.cache.lock().await;
            if cache.is_none() {
                *cache = Some(store.load().await?);
            }
            Ok(cache.as_ref().and_then(|entries| entries.get(&key).cloned()))
        })
    }

    fn set(&self, key: &str, value: Option<String>) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        let key = key.to_string();
        Box::pin(async move {
            let mut cache = store.cache.lock().await;
            let mut entries = match cache.take() {
                Some(entries) => entries,
                None => store.load().await?,
            };
            match value {
                Some(value) => {
                    entries.insert(key, value);
                }
                None => {
                    entries.remove(&key);
                }
            }
            let written = store.persist(&entries).await;
            *cache = Some(entries);
            written
        })
    }
}
