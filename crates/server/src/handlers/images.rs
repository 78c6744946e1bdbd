//! Image listing endpoints.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult, Envelope};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, Request, State};
use gallery_core::{IMAGES_LIST_KEY, ImageRecord, RecordLookup, lookup};
use gallery_index::{KeyRepo, ListRepo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::{Month, UtcOffset};

const DEFAULT_PAGE_LIMIT: usize = 20;
const MAX_PAGE_LIMIT: usize = 100;
const MIN_CALENDAR_YEAR: i32 = 1970;

#[derive(Debug, Default, Deserialize)]
pub struct ListImagesQuery {
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub has_more: bool,
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct ListImagesResponse {
    pub images: Vec<ImageRecord>,
    pub total: usize,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    pub month: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub year: i32,
    pub month: u8,
    /// Day of month to the records uploaded that day, oldest first.
    pub days: BTreeMap<u8, Vec<ImageRecord>>,
}

fn parse_query<T: serde::de::DeserializeOwned>(req: &Request) -> ApiResult<T> {
    Query::<T>::try_from_uri(req.uri())
        .map(|Query(q)| q)
        .map_err(|e| ApiError::BadRequest(format!("invalid query: {}", e.body_text())))
}

/// Read the records behind `ids`, dropping entries that are absent or unreadable.
async fn load_records(state: &AppState, ids: &[String]) -> ApiResult<Vec<ImageRecord>> {
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        match lookup(state.index.get(id).await?) {
            RecordLookup::Found(record) => records.push(record),
            RecordLookup::NotFound => {
                tracing::warn!(id = %id, "Listed image has no record; skipping");
            }
            RecordLookup::Malformed(reason) => {
                tracing::warn!(id = %id, reason = %reason, "Unreadable image record; skipping");
            }
        }
    }
    Ok(records)
}

/// GET /api/images - One page of records, newest first.
pub async fn list_images(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Envelope<ListImagesResponse>>> {
    require_auth(&req)?;
    let query: ListImagesQuery = parse_query(&req)?;

    let skip = query.skip.unwrap_or(0);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);

    let total = state.index.list_len(IMAGES_LIST_KEY).await? as usize;
    let ids = if skip >= total {
        Vec::new()
    } else {
        let start = skip as i64;
        state
            .index
            .list_range(IMAGES_LIST_KEY, start, start + limit as i64 - 1)
            .await?
    };
    let images = load_records(&state, &ids).await?;

    Ok(Envelope::ok(ListImagesResponse {
        images,
        total,
        pagination: Pagination {
            has_more: skip.saturating_add(limit) < total,
            total,
            skip,
            limit,
        },
    }))
}

/// GET /api/images/calendar - Records uploaded in one month, grouped by day.
pub async fn images_calendar(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Envelope<CalendarResponse>>> {
    require_auth(&req)?.require_admin()?;
    let query: CalendarQuery = parse_query(&req)?;

    let (Some(year), Some(month)) = (query.year, query.month) else {
        return Err(ApiError::BadRequest("year and month are required".to_string()));
    };
    if year < MIN_CALENDAR_YEAR {
        return Err(ApiError::BadRequest(format!(
            "year must be {MIN_CALENDAR_YEAR} or later"
        )));
    }
    let month = Month::try_from(month)
        .map_err(|_| ApiError::BadRequest("month must be between 1 and 12".to_string()))?;

    let ids = state.index.list_range(IMAGES_LIST_KEY, 0, -1).await?;
    let mut days: BTreeMap<u8, Vec<ImageRecord>> = BTreeMap::new();
    for record in load_records(&state, &ids).await? {
        let at = record.uploaded_at.to_offset(UtcOffset::UTC);
        if at.year() == year && at.month() == month {
            days.entry(at.day()).or_default().push(record);
        }
    }
    for records in days.values_mut() {
        records.sort_by_key(|r| r.uploaded_at);
    }

    Ok(Envelope::ok(CalendarResponse {
        year,
        month: month as u8,
        days,
    }))
}
