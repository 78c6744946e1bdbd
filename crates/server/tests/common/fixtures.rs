//! Test fixtures for generating test data.

use super::server::TestServer;
use bytes::Bytes;
use gallery_core::{IMAGES_LIST_KEY, ImageRecord, encode};
use gallery_index::{IndexStore, KeyRepo};
use gallery_storage::{BlobStore, PutOptions};
use time::macros::datetime;

/// Bearer token of `user@example.com` in the test configuration.
#[allow(dead_code)]
pub const USER_TOKEN: &str = "test-user-token";

/// Bearer token of `admin@example.com` in the test configuration.
#[allow(dead_code)]
pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Generate deterministic test data based on a seed.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// A record for `images/<name>` as served by the test blob store.
#[allow(dead_code)]
pub fn record_for(server: &TestServer, id: &str, name: &str) -> ImageRecord {
    let pathname = format!("images/{name}");
    ImageRecord {
        id: id.to_string(),
        url: server.state.storage.url_for(&pathname),
        pathname,
        filename: name.to_string(),
        mime_type: "image/png".to_string(),
        size: 16,
        uploaded_by: "user@example.com".to_string(),
        uploaded_at: datetime!(2024-03-05 10:00:00 UTC),
    }
}

/// Store and list a record, optionally with its blob.
#[allow(dead_code)]
pub async fn seed_record(server: &TestServer, record: &ImageRecord, with_blob: bool) {
    server
        .state
        .index
        .insert_listed(IMAGES_LIST_KEY, &record.id, &encode(record).unwrap())
        .await
        .unwrap();
    if with_blob {
        server
            .state
            .storage
            .put(
                &record.pathname,
                seeded_bytes(1, record.size as usize),
                PutOptions::with_content_type(record.mime_type.clone()),
            )
            .await
            .unwrap();
    }
}

/// Read a record back from the index.
#[allow(dead_code)]
pub async fn stored_record(server: &TestServer, id: &str) -> Option<ImageRecord> {
    let raw = server.state.index.get(id).await.unwrap()?;
    Some(gallery_core::decode(&raw).unwrap())
}
