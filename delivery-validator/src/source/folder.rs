use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::io::AsyncReadExt;

use crate::error::SinkError;

use super::{ObjectBody, ObjectListing, ObjectStoreClient};

const LISTING_PAGE_SIZE: usize = 1000;
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// A directory laid out like a bucket: object keys are `/`-separated paths
/// relative to the root. The bucket argument of the client calls is ignored.
/// Listings are paged like S3's, the continuation token being the last key of
/// the previous page.
pub struct FolderObjectStore {
    pub path: PathBuf,
    page_size: usize,
}

impl FolderObjectStore {
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, SinkError> {
        let root = root.as_ref();
        let path = tokio::fs::canonicalize(root).await.map_err(|e| {
            SinkError::unavailable_from(format!("Local directory {root:?} is not accessible"), e)
        })?;
        Ok(Self {
            path,
            page_size: LISTING_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn all_keys(&self) -> Result<Vec<String>, std::io::Error> {
        let mut keys = vec![];
        let mut dirs = vec![self.path.clone()];
        while let Some(dir) = dirs.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    dirs.push(path);
                } else if let Ok(relative) = path.strip_prefix(&self.path) {
                    let key: Vec<_> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect();
                    keys.push(key.join("/"));
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, SinkError> {
        if key.split('/').any(|part| part == "..") {
            return Err(SinkError::unavailable(format!(
                "Key {key:?} points outside {:?}",
                self.path
            )));
        }
        Ok(self.path.join(key))
    }
}

#[async_trait]
impl ObjectStoreClient for FolderObjectStore {
    async fn list_objects(
        &self,
        _bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectListing, SinkError> {
        let keys = self.all_keys().await.map_err(|e| {
            SinkError::unavailable_from(format!("Failed to list {:?}", self.path), e)
        })?;

        let mut matching = keys
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .filter(|k| match &continuation_token {
                Some(after) => k.as_str() > after.as_str(),
                None => true,
            });

        let page: Vec<String> = matching.by_ref().take(self.page_size).collect();
        let is_truncated = matching.next().is_some();
        Ok(ObjectListing {
            next_continuation_token: if is_truncated { page.last().cloned() } else { None },
            keys: page,
            is_truncated,
        })
    }

    async fn open_object(&self, _bucket: &str, key: &str) -> Result<ObjectBody, SinkError> {
        let path = self.resolve(key)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| SinkError::unavailable_from(format!("Error to open {path:?}"), e))?;

        let body = stream::try_unfold((file, path), |(mut file, path)| async move {
            let mut buffer = vec![0u8; READ_CHUNK_SIZE];
            match file.read(&mut buffer).await {
                Ok(0) => Ok(None),
                Ok(bytes_read) => {
                    buffer.truncate(bytes_read);
                    Ok(Some((Bytes::from(buffer), (file, path))))
                }
                Err(e) => Err(SinkError::unavailable_from(
                    format!("Error to read {path:?}"),
                    e,
                )),
            }
        });
        Ok(body.boxed())
    }
}
