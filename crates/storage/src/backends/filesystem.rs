//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    BlobObject, BlobStore, ListingOptions, ListingPage, PutOptions, StoredBlob, join_url,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Marker embedded in in-flight temp file names; such files never appear in listings.
const TEMP_MARKER: &str = ".tmp.";

/// Filesystem blob store rooted at a directory.
pub struct FilesystemBackend {
    root: PathBuf,
    public_base_url: String,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating the root if needed.
    pub async fn new(root: impl AsRef<Path>, public_base_url: impl Into<String>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_base_url: public_base_url.into(),
        })
    }

    /// Resolve a pathname inside the root off the runtime threads.
    async fn object_path(&self, pathname: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let pathname = pathname.to_string();
        tokio::task::spawn_blocking(move || Self::object_path_sync(&root, &pathname))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Map a pathname to a file path, refusing anything that escapes the root.
    ///
    /// Symlinks are resolved for the path itself and for its nearest existing
    /// ancestor, so writes through a linked directory are rejected too.
    fn object_path_sync(root: &Path, pathname: &str) -> StorageResult<PathBuf> {
        if pathname.is_empty()
            || pathname.contains("..")
            || pathname.starts_with('/')
            || pathname.starts_with('\\')
        {
            return Err(StorageError::InvalidPathname(format!(
                "path traversal not allowed: {pathname:?}"
            )));
        }
        if Path::new(pathname)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidPathname(format!(
                "contains unsafe path component: {pathname}"
            )));
        }

        let path = root.join(pathname);
        let root_canonical = root.canonicalize()?;

        let mut probe = Some(path.as_path());
        while let Some(candidate) = probe {
            match std::fs::symlink_metadata(candidate) {
                Ok(meta) => {
                    let canonical = candidate.canonicalize().map_err(|e| {
                        if meta.file_type().is_symlink() {
                            StorageError::InvalidPathname(format!(
                                "symlink target missing or invalid: {pathname}"
                            ))
                        } else {
                            StorageError::Io(e)
                        }
                    })?;
                    if !canonical.starts_with(&root_canonical) {
                        return Err(StorageError::InvalidPathname(format!(
                            "resolved path escapes storage root: {pathname}"
                        )));
                    }
                    return Ok(path);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    probe = candidate.parent();
                }
                Err(err) => return Err(StorageError::Io(err)),
            }
        }

        Ok(path)
    }

    fn not_found(pathname: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
        move |e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(pathname.to_string())
            } else {
                StorageError::Io(e)
            }
        }
    }

    /// Every stored pathname under `dir`, relative to the root.
    async fn walk(&self, dir: PathBuf) -> StorageResult<Vec<String>> {
        let mut results = Vec::new();
        match fs::try_exists(&dir).await {
            Ok(true) => {}
            Ok(false) => return Ok(results),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(results),
            Err(e) => return Err(StorageError::Io(e)),
        }

        let mut stack = vec![dir];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                // file_type() does not follow symlinks; links are never listed.
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file()
                    && let Ok(rel) = path.strip_prefix(&self.root)
                {
                    let rel = rel.to_string_lossy().replace('\\', "/");
                    if !rel.contains(TEMP_MARKER) {
                        results.push(rel);
                    }
                }
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl BlobStore for FilesystemBackend {
    // Content types are not persisted; readers derive them from the extension.
    #[instrument(skip(self, data, _options), fields(backend = "filesystem", size = data.len()))]
    async fn put(
        &self,
        pathname: &str,
        data: Bytes,
        _options: PutOptions,
    ) -> StorageResult<StoredBlob> {
        let path = self.object_path(pathname).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write beside the target, fsync, then rename so readers never see a partial file.
        let temp_path = path.with_file_name(format!(
            "{}{TEMP_MARKER}{}",
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            Uuid::new_v4()
        ));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        Ok(StoredBlob {
            url: self.url_for(pathname),
            pathname: pathname.to_string(),
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, pathname: &str) -> StorageResult<BlobObject> {
        let path = self.object_path(pathname).await?;
        let data = fs::read(&path).await.map_err(Self::not_found(pathname))?;
        Ok(BlobObject {
            data: Bytes::from(data),
            content_type: None,
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, pathname: &str) -> StorageResult<bool> {
        let path = self.object_path(pathname).await?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self, options), fields(backend = "filesystem", limit = options.limit))]
    async fn list(&self, prefix: &str, options: ListingOptions) -> StorageResult<ListingPage> {
        // Walk the directory part of the prefix and filter on the remainder.
        let dir = match prefix.rfind('/') {
            Some(idx) => self.object_path(&prefix[..idx]).await?,
            None => self.root.clone(),
        };
        let mut pathnames: Vec<String> = self
            .walk(dir)
            .await?
            .into_iter()
            .filter(|p| p.starts_with(prefix))
            .collect();
        pathnames.sort();

        Ok(ListingPage::from_sorted(
            pathnames,
            options.normalized_limit(),
            |p| self.url_for(p),
        ))
    }

    fn url_for(&self, pathname: &str) -> String {
        join_url(&self.public_base_url, pathname)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}
