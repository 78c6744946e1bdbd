//! Index/blob reconciliation: check, fix, reupload and delete-all.
//!
//! Every pass reads `images:list` once and visits records in list order.
//! Per-record problems are counted in the report and never abort the pass;
//! only failures to read the list or the blob listing surface as errors.

use crate::error::ApiResult;
use crate::fetcher::RemoteFetcher;
use crate::metrics;
use crate::state::AppState;
use gallery_core::config::ReconcileConfig;
use gallery_core::media::{
    DEFAULT_CONTENT_TYPE, blob_pathname, generate_blob_name, validate_image_mime,
};
use gallery_core::{IMAGES_LIST_KEY, ImageRecord, RecordLookup, encode, lookup};
use gallery_index::{IndexStore, KeyRepo, ListRepo};
use gallery_storage::{BlobStore, ListingOptions, PutOptions};
use serde::Serialize;
use std::collections::HashSet;
use tracing::instrument;

/// Url reported for a listed id with nothing stored under it.
pub const RECORD_NOT_FOUND_MARKER: &str = "<record not found>";

/// Url reported for a listed id whose value cannot be decoded.
pub const UNREADABLE_RECORD_MARKER: &str = "<unreadable record>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub total: usize,
    pub found: usize,
    pub missing: usize,
    pub missing_images: Vec<MissingImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingImage {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixReport {
    pub total: usize,
    pub fixed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReuploadStatus {
    #[serde(rename = "re-uploaded")]
    Reuploaded,
    #[serde(rename = "skipped")]
    Skipped,
    #[serde(rename = "failed")]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReuploadResult {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_url: Option<String>,
    pub status: ReuploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReuploadResult {
    fn skipped(id: &str, old_url: Option<String>, reason: &str) -> Self {
        Self {
            id: id.to_string(),
            old_url,
            new_url: None,
            status: ReuploadStatus::Skipped,
            reason: Some(reason.to_string()),
        }
    }

    fn failed(id: &str, old_url: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            old_url,
            new_url: None,
            status: ReuploadStatus::Failed,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReuploadReport {
    pub total: usize,
    pub reuploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<ReuploadResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteStatus {
    Deleted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub id: String,
    pub status: DeleteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteAllReport {
    pub total: usize,
    pub deleted: usize,
    pub failed: usize,
    pub results: Vec<DeleteResult>,
}

/// Reconciliation engine over the index, the blob store and a fetcher.
pub struct Reconciler<'a> {
    index: &'a dyn IndexStore,
    storage: &'a dyn BlobStore,
    fetcher: &'a dyn RemoteFetcher,
    config: &'a ReconcileConfig,
    prefix: &'a str,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        index: &'a dyn IndexStore,
        storage: &'a dyn BlobStore,
        fetcher: &'a dyn RemoteFetcher,
        config: &'a ReconcileConfig,
        prefix: &'a str,
    ) -> Self {
        Self {
            index,
            storage,
            fetcher,
            config,
            prefix,
        }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(
            state.index.as_ref(),
            state.storage.as_ref(),
            state.fetcher.as_ref(),
            &state.config.reconcile,
            &state.config.upload.prefix,
        )
    }

    async fn listed_ids(&self) -> ApiResult<Vec<String>> {
        Ok(self.index.list_range(IMAGES_LIST_KEY, 0, -1).await?)
    }

    /// URLs of every blob in one bounded listing under the upload prefix.
    async fn present_urls(&self) -> ApiResult<HashSet<String>> {
        let limit = self.config.normalized_list_limit();
        let page = self
            .storage
            .list(self.prefix, ListingOptions::new(limit))
            .await?;
        if page.has_more {
            tracing::warn!(
                limit,
                "Blob listing truncated; records beyond the limit will be reported missing"
            );
        }
        Ok(page.blobs.into_iter().map(|b| b.url).collect())
    }

    async fn read(&self, id: &str) -> Result<RecordLookup, gallery_index::IndexError> {
        Ok(lookup(self.index.get(id).await?))
    }

    /// Report which listed records have a blob behind their url.
    #[instrument(skip(self))]
    pub async fn check(&self) -> ApiResult<CheckReport> {
        let ids = self.listed_ids().await?;
        let present = self.present_urls().await?;

        let mut found = 0;
        let mut missing_images = Vec::new();
        for id in &ids {
            let url = match self.read(id).await? {
                RecordLookup::Found(record) if present.contains(&record.url) => {
                    found += 1;
                    continue;
                }
                RecordLookup::Found(record) => record.url,
                RecordLookup::NotFound => RECORD_NOT_FOUND_MARKER.to_string(),
                RecordLookup::Malformed(reason) => {
                    tracing::warn!(id = %id, reason = %reason, "Unreadable record");
                    UNREADABLE_RECORD_MARKER.to_string()
                }
            };
            missing_images.push(MissingImage {
                id: id.clone(),
                url,
            });
        }

        let report = CheckReport {
            total: ids.len(),
            found,
            missing: missing_images.len(),
            missing_images,
        };
        metrics::record_reconcile(
            "check",
            &[("found", report.found), ("missing", report.missing)],
        );
        tracing::info!(
            total = report.total,
            found = report.found,
            missing = report.missing,
            "Check finished"
        );
        Ok(report)
    }

    /// Strip the `-undefined-` marker from record urls and filenames.
    #[instrument(skip(self))]
    pub async fn fix(&self) -> ApiResult<FixReport> {
        let ids = self.listed_ids().await?;

        let mut fixed = 0;
        for id in &ids {
            let mut record = match self.read(id).await {
                Ok(RecordLookup::Found(record)) => record,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Skipping record that could not be read");
                    continue;
                }
            };
            if !record.strip_undefined_marker() {
                continue;
            }
            match self.write_back(id, &record).await {
                Ok(()) => fixed += 1,
                Err(e) => tracing::warn!(id = %id, error = %e, "Failed to write fixed record"),
            }
        }

        let report = FixReport {
            total: ids.len(),
            fixed,
            skipped: ids.len() - fixed,
        };
        metrics::record_reconcile("fix", &[("fixed", report.fixed), ("skipped", report.skipped)]);
        tracing::info!(total = report.total, fixed = report.fixed, "Fix finished");
        Ok(report)
    }

    /// Re-store missing images by fetching them from their recorded url.
    #[instrument(skip(self))]
    pub async fn reupload(&self) -> ApiResult<ReuploadReport> {
        let ids = self.listed_ids().await?;
        let present = self.present_urls().await?;

        let mut results = Vec::with_capacity(ids.len());
        for id in &ids {
            let result = match self.read(id).await {
                Ok(RecordLookup::Found(record)) if present.contains(&record.url) => {
                    ReuploadResult::skipped(id, Some(record.url), "already exists")
                }
                Ok(RecordLookup::Found(record)) => self.reupload_one(id, record).await,
                Ok(RecordLookup::NotFound) => ReuploadResult::skipped(id, None, "record not found"),
                Ok(RecordLookup::Malformed(reason)) => {
                    ReuploadResult::failed(id, None, format!("unreadable record: {reason}"))
                }
                Err(e) => ReuploadResult::failed(id, None, e.to_string()),
            };
            if result.status == ReuploadStatus::Failed {
                tracing::warn!(id = %id, reason = ?result.reason, "Reupload failed");
            }
            results.push(result);
        }

        let count = |status: ReuploadStatus| results.iter().filter(|r| r.status == status).count();
        let report = ReuploadReport {
            total: ids.len(),
            reuploaded: count(ReuploadStatus::Reuploaded),
            skipped: count(ReuploadStatus::Skipped),
            failed: count(ReuploadStatus::Failed),
            results,
        };
        metrics::record_reconcile(
            "reupload",
            &[
                ("reuploaded", report.reuploaded),
                ("skipped", report.skipped),
                ("failed", report.failed),
            ],
        );
        tracing::info!(
            total = report.total,
            reuploaded = report.reuploaded,
            skipped = report.skipped,
            failed = report.failed,
            "Reupload finished"
        );
        Ok(report)
    }

    /// Fetch one missing image and point the record stored under `id` at the new blob.
    async fn reupload_one(&self, id: &str, mut record: ImageRecord) -> ReuploadResult {
        let old_url = record.url.clone();
        let image = match self.fetcher.fetch(&old_url).await {
            Ok(image) => image,
            Err(e) => return ReuploadResult::failed(id, Some(old_url), e.to_string()),
        };

        // Recorded type first, then what the remote served, then JPEG.
        let content_type = validate_image_mime(&record.mime_type)
            .or_else(|_| validate_image_mime(image.content_type.as_deref().unwrap_or_default()))
            .unwrap_or_else(|_| DEFAULT_CONTENT_TYPE.to_string());
        let name = generate_blob_name(&content_type);
        let pathname = blob_pathname(self.prefix, &name);
        let stored = match self
            .storage
            .put(&pathname, image.data, PutOptions::with_content_type(content_type))
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                return ReuploadResult::failed(
                    id,
                    Some(old_url),
                    format!("failed to store blob: {e}"),
                );
            }
        };

        record.relocate(stored.url, stored.pathname, name);
        if let Err(e) = self.write_back(id, &record).await {
            return ReuploadResult::failed(
                id,
                Some(old_url),
                format!("failed to update record: {e}"),
            );
        }

        tracing::info!(id = %id, old_url = %old_url, new_url = %record.url, "Image re-uploaded");
        ReuploadResult {
            id: id.to_string(),
            old_url: Some(old_url),
            new_url: Some(record.url),
            status: ReuploadStatus::Reuploaded,
            reason: None,
        }
    }

    /// Delete every listed record, then the list itself. Blobs are left alone.
    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> ApiResult<DeleteAllReport> {
        let ids = self.listed_ids().await?;

        let mut results = Vec::with_capacity(ids.len());
        for id in &ids {
            let url = match self.read(id).await {
                Ok(RecordLookup::Found(record)) => Some(record.url),
                _ => None,
            };
            let (status, reason) = match self.index.delete(id).await {
                Ok(true) => (DeleteStatus::Deleted, None),
                Ok(false) => (DeleteStatus::Failed, Some("record not found".to_string())),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Failed to delete record");
                    (DeleteStatus::Failed, Some(e.to_string()))
                }
            };
            results.push(DeleteResult {
                id: id.clone(),
                status,
                reason,
                url,
            });
        }

        self.index.delete(IMAGES_LIST_KEY).await?;

        let deleted = results
            .iter()
            .filter(|r| r.status == DeleteStatus::Deleted)
            .count();
        let report = DeleteAllReport {
            total: ids.len(),
            deleted,
            failed: ids.len() - deleted,
            results,
        };
        metrics::record_reconcile(
            "delete_all",
            &[("deleted", report.deleted), ("failed", report.failed)],
        );
        tracing::info!(
            total = report.total,
            deleted = report.deleted,
            failed = report.failed,
            "Delete-all finished"
        );
        Ok(report)
    }

    /// Replace the value under the listed key, whatever id the record itself carries.
    async fn write_back(&self, key: &str, record: &ImageRecord) -> ApiResult<()> {
        let encoded = encode(record)?;
        self.index.set(key, &encoded).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{FetchError, FetchedImage};
    use async_trait::async_trait;
    use bytes::Bytes;
    use gallery_index::MemoryStore;
    use gallery_storage::MemoryBackend;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use time::macros::datetime;

    const BASE: &str = "http://blobs.test";

    /// Serves a fixed set of urls and records every request.
    #[derive(Default)]
    struct StubFetcher {
        bodies: HashMap<String, Bytes>,
        content_types: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            match self.bodies.get(url) {
                Some(data) => Ok(FetchedImage {
                    data: data.clone(),
                    content_type: self.content_types.get(url).cloned(),
                }),
                None => Err(FetchError::Status {
                    status: "404 Not Found".to_string(),
                }),
            }
        }
    }

    struct Fixture {
        index: MemoryStore,
        storage: MemoryBackend,
        fetcher: StubFetcher,
        config: ReconcileConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                index: MemoryStore::new(),
                storage: MemoryBackend::new(BASE),
                fetcher: StubFetcher::default(),
                config: ReconcileConfig::default(),
            }
        }

        fn reconciler(&self) -> Reconciler<'_> {
            Reconciler::new(
                &self.index,
                &self.storage,
                &self.fetcher,
                &self.config,
                "images/",
            )
        }

        fn record(id: &str, name: &str) -> ImageRecord {
            ImageRecord {
                id: id.to_string(),
                url: format!("{BASE}/images/{name}"),
                pathname: format!("images/{name}"),
                filename: name.to_string(),
                mime_type: "image/png".to_string(),
                size: 3,
                uploaded_by: "a@example.com".to_string(),
                uploaded_at: datetime!(2024-01-02 03:04:05 UTC),
            }
        }

        /// List and store a record; optionally store its blob too.
        async fn add(&self, record: &ImageRecord, with_blob: bool) {
            self.add_under(&record.id, record, with_blob).await;
        }

        /// Like `add`, but list and store the record under `key`.
        async fn add_under(&self, key: &str, record: &ImageRecord, with_blob: bool) {
            self.index
                .insert_listed(IMAGES_LIST_KEY, key, &encode(record).unwrap())
                .await
                .unwrap();
            if with_blob {
                self.storage
                    .put(&record.pathname, Bytes::from_static(b"img"), PutOptions::default())
                    .await
                    .unwrap();
            }
        }
    }

    #[tokio::test]
    async fn check_counts_found_and_missing() {
        let fx = Fixture::new();
        fx.add(&Fixture::record("image:1:a", "a.png"), true).await;
        fx.add(&Fixture::record("image:2:b", "b.png"), true).await;
        fx.add(&Fixture::record("image:3:c", "c.png"), false).await;

        let report = fx.reconciler().check().await.unwrap();
        assert_eq!((report.total, report.found, report.missing), (3, 2, 1));
        assert_eq!(
            report.missing_images,
            vec![MissingImage {
                id: "image:3:c".to_string(),
                url: format!("{BASE}/images/c.png"),
            }]
        );
    }

    #[tokio::test]
    async fn check_reports_orphaned_and_unreadable_ids() {
        let fx = Fixture::new();
        fx.index.list_push(IMAGES_LIST_KEY, "image:9:gone").await.unwrap();
        fx.index
            .insert_listed(IMAGES_LIST_KEY, "image:8:bad", "not json")
            .await
            .unwrap();

        let report = fx.reconciler().check().await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.found + report.missing, report.total);
        let urls: Vec<_> = report.missing_images.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(urls, vec![UNREADABLE_RECORD_MARKER, RECORD_NOT_FOUND_MARKER]);
    }

    #[tokio::test]
    async fn fix_strips_marker_and_is_idempotent() {
        let fx = Fixture::new();
        let mut broken = Fixture::record("image:1:a", "abc-undefined-123.jpg");
        broken.filename = "abc-undefined-123.jpg".to_string();
        fx.add(&broken, false).await;

        let report = fx.reconciler().fix().await.unwrap();
        assert_eq!(report, FixReport { total: 1, fixed: 1, skipped: 0 });

        let stored = gallery_core::decode(&fx.index.get("image:1:a").await.unwrap().unwrap()).unwrap();
        assert_eq!(stored.url, format!("{BASE}/images/abc-123.jpg"));
        assert_eq!(stored.filename, "abc-123.jpg");
        assert_eq!(stored.uploaded_at, broken.uploaded_at);

        let report = fx.reconciler().fix().await.unwrap();
        assert_eq!(report, FixReport { total: 1, fixed: 0, skipped: 1 });
    }

    #[tokio::test]
    async fn fix_skips_absent_and_malformed() {
        let fx = Fixture::new();
        fx.index.list_push(IMAGES_LIST_KEY, "image:9:gone").await.unwrap();
        fx.index
            .insert_listed(IMAGES_LIST_KEY, "image:8:bad", "{")
            .await
            .unwrap();

        let report = fx.reconciler().fix().await.unwrap();
        assert_eq!(report, FixReport { total: 2, fixed: 0, skipped: 2 });
    }

    #[tokio::test]
    async fn reupload_partitions_every_entry() {
        let mut fx = Fixture::new();
        let present = Fixture::record("image:1:a", "a.png");
        let recoverable = Fixture::record("image:2:b", "b.png");
        let lost = Fixture::record("image:3:c", "c.png");
        fx.fetcher
            .bodies
            .insert(recoverable.url.clone(), Bytes::from_static(b"recovered"));

        fx.add(&present, true).await;
        fx.add(&recoverable, false).await;
        fx.add(&lost, false).await;
        fx.index.list_push(IMAGES_LIST_KEY, "image:4:gone").await.unwrap();

        let report = fx.reconciler().reupload().await.unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.reuploaded + report.skipped + report.failed, report.total);
        assert_eq!((report.reuploaded, report.skipped, report.failed), (1, 2, 1));

        let by_id: HashMap<_, _> = report.results.iter().map(|r| (r.id.as_str(), r)).collect();
        assert_eq!(by_id["image:1:a"].reason.as_deref(), Some("already exists"));
        assert_eq!(by_id["image:4:gone"].reason.as_deref(), Some("record not found"));
        assert_eq!(by_id["image:3:c"].status, ReuploadStatus::Failed);

        let moved = by_id["image:2:b"];
        assert_eq!(moved.status, ReuploadStatus::Reuploaded);
        assert_eq!(moved.old_url.as_deref(), Some(recoverable.url.as_str()));
        let new_url = moved.new_url.clone().unwrap();
        assert_ne!(new_url, recoverable.url);

        let stored = gallery_core::decode(&fx.index.get("image:2:b").await.unwrap().unwrap()).unwrap();
        assert_eq!(stored.url, new_url);
        assert!(stored.pathname.starts_with("images/") && stored.pathname.ends_with(".png"));
        assert_eq!(Some(stored.filename.as_str()), stored.pathname.strip_prefix("images/"));
        assert_eq!(stored.id, recoverable.id);
        assert_eq!(stored.uploaded_by, recoverable.uploaded_by);
        assert_eq!(stored.uploaded_at, recoverable.uploaded_at);
        assert_eq!(
            fx.storage.get(&stored.pathname).await.unwrap().content_type.as_deref(),
            Some("image/png")
        );

        // A failed fetch leaves the record untouched.
        let untouched = gallery_core::decode(&fx.index.get("image:3:c").await.unwrap().unwrap()).unwrap();
        assert_eq!(untouched, lost);

        // The recovered record now checks as present.
        let check = fx.reconciler().check().await.unwrap();
        assert_eq!(check.found, 2);
    }

    #[tokio::test]
    async fn reupload_defaults_content_type_to_jpeg() {
        let mut fx = Fixture::new();
        let mut record = Fixture::record("image:1:a", "a.bin");
        record.mime_type = String::new();
        fx.fetcher
            .bodies
            .insert(record.url.clone(), Bytes::from_static(b"raw"));
        fx.add(&record, false).await;

        let report = fx.reconciler().reupload().await.unwrap();
        assert_eq!(report.reuploaded, 1);

        let stored = gallery_core::decode(&fx.index.get("image:1:a").await.unwrap().unwrap()).unwrap();
        assert!(stored.pathname.ends_with(".jpg"));
        let object = fx.storage.get(&stored.pathname).await.unwrap();
        assert_eq!(object.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn reupload_falls_back_to_served_content_type() {
        let mut fx = Fixture::new();
        let mut record = Fixture::record("image:1:a", "a");
        record.mime_type = " ".to_string();
        fx.fetcher
            .bodies
            .insert(record.url.clone(), Bytes::from_static(b"raw"));
        fx.fetcher
            .content_types
            .insert(record.url.clone(), "image/webp".to_string());
        fx.add(&record, false).await;

        let report = fx.reconciler().reupload().await.unwrap();
        assert_eq!(report.reuploaded, 1);

        let stored = gallery_core::decode(&fx.index.get("image:1:a").await.unwrap().unwrap()).unwrap();
        assert!(stored.pathname.ends_with(".webp"));
        let object = fx.storage.get(&stored.pathname).await.unwrap();
        assert_eq!(object.content_type.as_deref(), Some("image/webp"));
    }

    #[tokio::test]
    async fn fix_writes_under_the_listed_key() {
        let fx = Fixture::new();
        let mut record = Fixture::record("image:legacy:x", "abc-undefined-123.jpg");
        record.filename = "abc-undefined-123.jpg".to_string();
        fx.add_under("image:1:a", &record, false).await;

        let first = fx.reconciler().fix().await.unwrap();
        assert_eq!(first.fixed, 1);
        let second = fx.reconciler().fix().await.unwrap();
        assert_eq!(second, FixReport { total: 1, fixed: 0, skipped: 1 });

        let stored = gallery_core::decode(&fx.index.get("image:1:a").await.unwrap().unwrap()).unwrap();
        assert_eq!(stored.url, format!("{BASE}/images/abc-123.jpg"));
        assert_eq!(stored.id, "image:legacy:x");
        assert!(fx.index.get("image:legacy:x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reupload_writes_under_the_listed_key() {
        let mut fx = Fixture::new();
        let record = Fixture::record("image:legacy:x", "a.png");
        fx.fetcher
            .bodies
            .insert(record.url.clone(), Bytes::from_static(b"recovered"));
        fx.add_under("image:1:a", &record, false).await;

        let report = fx.reconciler().reupload().await.unwrap();
        assert_eq!(report.reuploaded, 1);
        let result = &report.results[0];
        assert_eq!(result.id, "image:1:a");

        let stored = gallery_core::decode(&fx.index.get("image:1:a").await.unwrap().unwrap()).unwrap();
        assert_eq!(Some(stored.url.as_str()), result.new_url.as_deref());
        assert!(fx.index.get("image:legacy:x").await.unwrap().is_none());

        let check = fx.reconciler().check().await.unwrap();
        assert_eq!((check.found, check.missing), (1, 0));
    }

    #[tokio::test]
    async fn reupload_does_not_fetch_present_records() {
        let fx = Fixture::new();
        fx.add(&Fixture::record("image:1:a", "a.png"), true).await;

        fx.reconciler().reupload().await.unwrap();
        assert!(fx.fetcher.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_all_removes_records_and_list() {
        let fx = Fixture::new();
        fx.add(&Fixture::record("image:1:a", "a.png"), true).await;
        fx.add(&Fixture::record("image:2:b", "b.png"), false).await;
        fx.index.list_push(IMAGES_LIST_KEY, "image:3:gone").await.unwrap();

        let report = fx.reconciler().delete_all().await.unwrap();
        assert_eq!((report.total, report.deleted, report.failed), (3, 2, 1));
        let gone = report.results.iter().find(|r| r.id == "image:3:gone").unwrap();
        assert_eq!(gone.status, DeleteStatus::Failed);
        let kept_url = report.results.iter().find(|r| r.id == "image:1:a").unwrap();
        assert_eq!(kept_url.url.as_deref(), Some("http://blobs.test/images/a.png"));

        assert_eq!(fx.index.list_len(IMAGES_LIST_KEY).await.unwrap(), 0);
        assert!(fx.index.get("image:1:a").await.unwrap().is_none());
        // Blobs are not touched.
        assert!(fx.storage.exists("images/a.png").await.unwrap());

        let check = fx.reconciler().check().await.unwrap();
        assert_eq!(check.total, 0);
    }

    #[test]
    fn reports_serialize_with_wire_names() {
        let report = CheckReport {
            total: 1,
            found: 0,
            missing: 1,
            missing_images: vec![MissingImage {
                id: "i".into(),
                url: "u".into(),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["missingImages"][0]["url"], "u");

        let result = ReuploadResult {
            id: "i".into(),
            old_url: Some("o".into()),
            new_url: None,
            status: ReuploadStatus::Reuploaded,
            reason: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "re-uploaded");
        assert_eq!(json["oldUrl"], "o");
        assert!(json.get("newUrl").is_none());
    }
}
