use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};
use tokio::{fs, sync::Mutex};

struct Cache<T> {
    value: Option<T>,
    dirty: bool,
}

/// A single JSON document on disk, cached in memory after the first read.
///
/// Writes go to a sibling `.tmp` file which is then renamed over the target, so a reader never
/// observes a half-written document. Concurrent updates are serialized by the cache lock.
pub struct JsonStore<T> {
    path: PathBuf,
    cache: Mutex<Cache<T>>,
}

impl<T> JsonStore<T>
where
    T: Clone + Default + Serialize + DeserializeOwned,
{
    /// Binds the store to `<dir>/<name>.json`. Nothing is read until first use.
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        let path = dir.as_ref().join(format!("{name}.json"));
        Self { path, cache: Mutex::new(Cache { value: None, dirty: false }) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a snapshot of the document. A missing or malformed file reads as the default.
    pub async fn read(&self) -> T {
        let mut cache = self.cache.lock().await;
        self.load(&mut cache).await.clone()
    }

    /// Applies `mutator` and persists the result before returning.
    pub async fn update<R>(&self, mutator: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut cache = self.cache.lock().await;
        let value = self.load(&mut cache).await;
        let output = mutator(value);
        let bytes = serde_json::to_vec_pretty(value)?;
        self.persist(&bytes).await?;
        cache.dirty = false;
        Ok(output)
    }

    /// Applies `mutator` in memory only. The change reaches disk on the next [`flush`](Self::flush).
    pub async fn modify<R>(&self, mutator: impl FnOnce(&mut T) -> R) -> R {
        let mut cache = self.cache.lock().await;
        let output = mutator(self.load(&mut cache).await);
        cache.dirty = true;
        output
    }

    /// Persists pending in-memory changes, if any.
    pub async fn flush(&self) -> Result<()> {
        let mut cache = self.cache.lock().await;
        if !cache.dirty {
            return Ok(());
        }

        let Some(value) = cache.value.as_ref() else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(value)?;
        self.persist(&bytes).await?;
        cache.dirty = false;
        Ok(())
    }

    async fn load<'c>(&self, cache: &'c mut Cache<T>) -> &'c mut T {
        if cache.value.is_none() {
            let value = match fs::read(&self.path).await {
                Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                    log::warn!("discarding malformed document {}: {err}", self.path.display());
                    T::default()
                }),
                Err(err) => {
                    log::debug!("starting {} from scratch: {err}", self.path.display());
                    T::default()
                }
            };
            cache.value = Some(value);
        }
        cache.value.get_or_insert_with(T::default)
    }

    async fn persist(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|err| {
                log::error!("cannot create {}: {err}", parent.display());
                err
            })?;
        }

        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, bytes).await.map_err(|err| {
            log::error!("cannot write {}: {err}", tmp.display());
            err
        })?;
        fs::rename(&tmp, &self.path).await.map_err(|err| {
            log::error!("cannot replace {}: {err}", self.path.display());
            err
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::JsonStore;
    use std::collections::BTreeMap;

    type Doc = BTreeMap<String, u64>;

    #[tokio::test(flavor = "current_thread")]
    async fn missing_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::<Doc>::new(dir.path(), "absent");
        assert!(store.read().await.is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), b"{ not json").unwrap();
        let store = JsonStore::<Doc>::new(dir.path(), "broken");
        assert!(store.read().await.is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn update_persists_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::<Doc>::new(dir.path(), "doc");
        let total = store
            .update(|doc| {
                *doc.entry(String::from("hits")).or_default() += 3;
                doc["hits"]
            })
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert!(!dir.path().join("doc.json.tmp").exists());

        // A fresh store sees what the first one wrote.
        let reopened = JsonStore::<Doc>::new(dir.path(), "doc");
        assert_eq!(reopened.read().await.get("hits"), Some(&3));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn modify_waits_for_flush() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::<Doc>::new(dir.path(), "lazy");
        store.modify(|doc| doc.insert(String::from("seen"), 1)).await;
        assert!(!store.path().exists());
        assert_eq!(store.read().await.get("seen"), Some(&1));

        store.flush().await.unwrap();
        let reopened = JsonStore::<Doc>::new(dir.path(), "lazy");
        assert_eq!(reopened.read().await.get("seen"), Some(&1));
    }
}
