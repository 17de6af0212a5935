//! Community Listing Service
//!
//! Cursor pagination: the cursor is the id of the last row on the previous
//! page. One row beyond the page size is fetched; when it arrives it is
//! popped and the id of the page's last row becomes `next_cursor`.

use crate::store::CommunityStore;
use crate::types::{CommunitySummary, ListQuery, Page, SortKey};
use crate::{CommunityError, CommunityResult};
use std::sync::Arc;
use threadhive_core::EntityId;
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 50;

/// Clamp a caller-supplied page size: absent or non-positive means the
/// default, anything above the maximum is capped.
pub fn page_size(requested: Option<i64>) -> usize {
    match requested {
        Some(n) if n > 0 => (n as u64).min(MAX_PAGE_SIZE as u64) as usize,
        _ => DEFAULT_PAGE_SIZE,
    }
}

/// Listing parameters after boundary parsing
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<EntityId>,
    pub mine: bool,
    pub sort: SortKey,
}

#[derive(Clone)]
pub struct ListingService {
    store: Arc<dyn CommunityStore>,
}

impl ListingService {
    pub fn new(store: Arc<dyn CommunityStore>) -> Self {
        Self { store }
    }

    /// One page of communities projected for `viewer`
    pub async fn list(
        &self,
        viewer: Option<EntityId>,
        params: ListParams,
    ) -> CommunityResult<Page<CommunitySummary>> {
        let only_member_of = if params.mine {
            Some(viewer.ok_or(CommunityError::Unauthenticated)?)
        } else {
            None
        };

        let size = page_size(params.limit);
        let query = ListQuery {
            search: params
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            only_member_of,
            viewer,
            sort: params.sort,
            cursor: params.cursor,
            fetch: size + 1,
        };

        let mut rows = self.store.list_communities(&query).await?;
        let next_cursor = if rows.len() > size {
            rows.truncate(size);
            rows.last().map(|row| row.community.id)
        } else {
            None
        };

        debug!(
            rows = rows.len(),
            sort = ?query.sort,
            has_more = next_cursor.is_some(),
            "Listed communities"
        );

        Ok(Page {
            data: rows,
            next_cursor,
        })
    }

    /// A single community projected for `viewer`
    pub async fn detail(
        &self,
        viewer: Option<EntityId>,
        id: EntityId,
    ) -> CommunityResult<CommunitySummary> {
        self.store
            .community_detail(id, viewer)
            .await?
            .ok_or_else(|| CommunityError::not_found(format!("community {}", id)))
    }
}
