//! Upload pipeline: validate, store the blob, record it in the index.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use gallery_core::config::{FilenamePolicy, UploadConfig};
use gallery_core::media::{blob_pathname, generate_blob_name, validate_image_mime};
use gallery_core::{IMAGES_LIST_KEY, Identity, ImageRecord, RecordId};
use gallery_index::IndexStore;
use gallery_storage::{BlobStore, PutOptions};
use std::fmt::Display;
use std::pin::pin;
use time::OffsetDateTime;
use tracing::instrument;

/// What the client declared about the file.
#[derive(Clone, Debug, Default)]
pub struct DeclaredFile {
    pub mime_type: Option<String>,
    pub filename: Option<String>,
}

/// Upload pipeline over the configured stores.
pub struct UploadPipeline<'a> {
    storage: &'a dyn BlobStore,
    index: &'a dyn IndexStore,
    config: &'a UploadConfig,
}

impl<'a> UploadPipeline<'a> {
    pub fn new(storage: &'a dyn BlobStore, index: &'a dyn IndexStore, config: &'a UploadConfig) -> Self {
        Self {
            storage,
            index,
            config,
        }
    }

    /// Run one upload end to end and return the stored record.
    ///
    /// The type is checked before any bytes are read; the body is rejected as
    /// soon as it crosses `max_file_size`.
    #[instrument(skip(self, body), fields(uploader = %identity.name))]
    pub async fn upload<S, E>(
        &self,
        identity: &Identity,
        declared: DeclaredFile,
        body: S,
    ) -> ApiResult<ImageRecord>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mime_type = validate_image_mime(declared.mime_type.as_deref().unwrap_or_default())
            .inspect_err(|_| metrics::record_upload_rejection("invalid_type"))?;

        let data = read_limited(body, self.config.max_file_size).await?;
        if data.is_empty() {
            metrics::record_upload_rejection("empty");
            return Err(ApiError::BadRequest("no file uploaded".to_string()));
        }
        let size = data.len() as u64;

        let name = generate_blob_name(&mime_type);
        let pathname = blob_pathname(&self.config.prefix, &name);
        let stored = self
            .storage
            .put(&pathname, data, PutOptions::with_content_type(&mime_type))
            .await?;

        let filename = match (self.config.filename_policy, declared.filename) {
            (FilenamePolicy::Original, Some(original)) if !original.trim().is_empty() => original,
            _ => name,
        };

        let now = OffsetDateTime::now_utc();
        let record = ImageRecord {
            id: RecordId::generate(now).into_string(),
            url: stored.url,
            pathname: stored.pathname,
            filename,
            mime_type,
            size,
            uploaded_by: identity.name.clone(),
            uploaded_at: now,
        };

        let encoded = gallery_core::encode(&record)?;
        if let Err(e) = self
            .index
            .insert_listed(IMAGES_LIST_KEY, &record.id, &encoded)
            .await
        {
            tracing::error!(
                pathname = %record.pathname,
                error = %e,
                "Index write failed after blob was stored; blob is orphaned"
            );
            return Err(e.into());
        }

        metrics::IMAGES_UPLOADED.inc();
        metrics::BYTES_UPLOADED.inc_by(size);
        tracing::info!(id = %record.id, pathname = %record.pathname, size, "Image uploaded");

        Ok(record)
    }
}

/// Collect a byte stream, failing as soon as it grows past `limit`.
pub async fn read_limited<S, E>(body: S, limit: u64) -> ApiResult<Bytes>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut body = pin!(body);
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        if (buf.len() + chunk.len()) as u64 > limit {
            metrics::record_upload_rejection("too_large");
            return Err(ApiError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_core::Role;
    use gallery_index::{KeyRepo, ListRepo, MemoryStore};
    use gallery_storage::MemoryBackend;
    use std::convert::Infallible;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, Infallible>> {
        let parts: Vec<_> = parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        futures::stream::iter(parts)
    }

    fn declared(mime: &str, filename: &str) -> DeclaredFile {
        DeclaredFile {
            mime_type: Some(mime.to_string()),
            filename: Some(filename.to_string()),
        }
    }

    #[tokio::test]
    async fn stores_blob_and_listed_record() {
        let storage = MemoryBackend::new("http://blobs.test");
        let index = MemoryStore::new();
        let config = UploadConfig::default();
        let pipeline = UploadPipeline::new(&storage, &index, &config);
        let identity = Identity::new("a@example.com", Role::User);

        let payload: &'static [u8] = &[7u8; 2048];
        let record = pipeline
            .upload(&identity, declared("image/png", "photo.PNG"), chunks(&[payload]))
            .await
            .unwrap();

        assert_eq!(record.mime_type, "image/png");
        assert_eq!(record.uploaded_by, "a@example.com");
        assert_eq!(record.filename, "photo.PNG");
        assert_eq!(record.size, 2048);
        assert!(record.pathname.starts_with("images/"));
        assert!(record.pathname.ends_with(".png"));
        assert_eq!(record.url, format!("http://blobs.test/{}", record.pathname));
        let parts: Vec<_> = record.id.split(':').collect();
        assert_eq!(parts.len(), 3, "{}", record.id);
        assert_eq!(parts[0], "image");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));

        assert_eq!(
            index.list_range(IMAGES_LIST_KEY, 0, -1).await.unwrap(),
            vec![record.id.clone()]
        );
        let stored = index.get(&record.id).await.unwrap().unwrap();
        assert_eq!(gallery_core::decode(&stored).unwrap(), record);
        assert!(storage.exists(&record.pathname).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_non_images_before_reading() {
        let storage = MemoryBackend::new("http://blobs.test");
        let index = MemoryStore::new();
        let config = UploadConfig::default();
        let pipeline = UploadPipeline::new(&storage, &index, &config);
        let identity = Identity::new("a@example.com", Role::User);

        let err = pipeline
            .upload(&identity, declared("text/plain", "a.txt"), chunks(&[b"hi"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidType(_)));
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn rejects_oversized_stream_midway() {
        let storage = MemoryBackend::new("http://blobs.test");
        let index = MemoryStore::new();
        let config = UploadConfig {
            max_file_size: 4,
            ..UploadConfig::default()
        };
        let pipeline = UploadPipeline::new(&storage, &index, &config);
        let identity = Identity::new("a@example.com", Role::User);

        let err = pipeline
            .upload(
                &identity,
                declared("image/gif", "a.gif"),
                chunks(&[b"ab", b"cd", b"e"]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge { limit: 4 }));
        assert_eq!(index.list_len(IMAGES_LIST_KEY).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn exact_limit_is_accepted() {
        let body = chunks(&[b"ab", b"cd"]);
        assert_eq!(read_limited(body, 4).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let storage = MemoryBackend::new("http://blobs.test");
        let index = MemoryStore::new();
        let config = UploadConfig::default();
        let pipeline = UploadPipeline::new(&storage, &index, &config);
        let identity = Identity::new("a@example.com", Role::User);

        let err = pipeline
            .upload(&identity, declared("image/png", "a.png"), chunks(&[]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no file uploaded");
    }

    #[tokio::test]
    async fn generated_policy_and_blank_names_use_object_name() {
        let storage = MemoryBackend::new("http://blobs.test");
        let index = MemoryStore::new();
        let identity = Identity::new("a@example.com", Role::User);

        let config = UploadConfig {
            filename_policy: FilenamePolicy::Generated,
            ..UploadConfig::default()
        };
        let record = UploadPipeline::new(&storage, &index, &config)
            .upload(&identity, declared("image/webp", "mine.webp"), chunks(&[b"w"]))
            .await
            .unwrap();
        assert_eq!(Some(record.filename.as_str()), record.pathname.strip_prefix("images/"));

        let config = UploadConfig::default();
        let record = UploadPipeline::new(&storage, &index, &config)
            .upload(&identity, declared("image/x-icon", "  "), chunks(&[b"i"]))
            .await
            .unwrap();
        assert!(record.filename.ends_with(".jpg"));
        assert_eq!(index.list_len(IMAGES_LIST_KEY).await.unwrap(), 2);
    }
}
