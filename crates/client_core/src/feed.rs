//! Cursor-paginated review queue with a local text filter.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{domain::UserId, protocol::CursorPage};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    approvals::{Decision, Searchable, DEFAULT_PENDING_LIMIT},
    error::ClientResult,
};

#[async_trait]
pub trait CursorSource: Send + Sync + 'static {
    type Item: Searchable + Clone + Send + Sync + 'static;

    async fn fetch_cursor_page(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> ClientResult<CursorPage<Self::Item>>;

    async fn decide(&self, user_id: &UserId, decision: Decision) -> ClientResult<()>;

    async fn pending_count(&self) -> ClientResult<u64>;
}

#[derive(Debug, Clone)]
pub struct FeedView<T> {
    /// Everything loaded so far, in server order.
    pub items: Vec<T>,
    /// `items` narrowed by `search`.
    pub visible: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
    /// Applicant whose decision is in flight.
    pub acting: Option<UserId>,
    pub search: String,
}

impl<T> FeedView<T> {
    pub fn is_empty(&self) -> bool {
        !self.loading && self.visible.is_empty()
    }
}

pub struct CursorFeed<S: CursorSource> {
    source: Arc<S>,
    limit: u32,
    items: Vec<S::Item>,
    has_more: bool,
    next_cursor: Option<String>,
    loading: bool,
    error: Option<String>,
    acting: Option<UserId>,
    search: String,
    view: watch::Sender<FeedView<S::Item>>,
}

impl<S: CursorSource> CursorFeed<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self::with_limit(source, DEFAULT_PENDING_LIMIT)
    }

    pub fn with_limit(source: Arc<S>, limit: u32) -> Self {
        let (view, _) = watch::channel(FeedView {
            items: Vec::new(),
            visible: Vec::new(),
            has_more: false,
            next_cursor: None,
            loading: false,
            error: None,
            acting: None,
            search: String::new(),
        });
        Self {
            source,
            limit: limit.max(1),
            items: Vec::new(),
            has_more: false,
            next_cursor: None,
            loading: false,
            error: None,
            acting: None,
            search: String::new(),
            view,
        }
    }

    /// Replaces the queue with its first page.
    pub async fn reload(&mut self) {
        self.load(None).await;
    }

    /// Appends the next page. Does nothing once the server reported no more.
    pub async fn load_more(&mut self) {
        let Some(cursor) = self.next_cursor.clone().filter(|_| self.has_more) else {
            debug!("no further pending page");
            return;
        };
        self.load(Some(cursor)).await;
    }

    async fn load(&mut self, cursor: Option<String>) {
        self.loading = true;
        self.error = None;
        self.publish();

        match self
            .source
            .fetch_cursor_page(cursor.as_deref(), self.limit)
            .await
        {
            Ok(page) => {
                if cursor.is_some() {
                    self.items.extend(page.items);
                } else {
                    self.items = page.items;
                }
                self.has_more = page.has_more;
                self.next_cursor = page.next_cursor;
            }
            Err(err) => {
                warn!(error = %err, cursor = ?cursor, "pending list fetch failed");
                self.error = Some(err.to_string());
            }
        }
        self.loading = false;
        self.publish();
    }

    /// Narrows the loaded items; never fetches.
    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
        self.publish();
    }

    pub fn filtered(&self) -> Vec<S::Item> {
        let needle = self.search.trim().to_lowercase();
        self.items
            .iter()
            .filter(|item| item.matches(&needle))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        !self.loading && self.filtered().is_empty()
    }

    pub async fn approve(&mut self, user_id: &UserId) -> ClientResult<()> {
        self.decide(user_id, Decision::Approve).await
    }

    pub async fn reject(&mut self, user_id: &UserId) -> ClientResult<()> {
        self.decide(user_id, Decision::Reject).await
    }

    /// On success the queue is reloaded from its first page.
    async fn decide(&mut self, user_id: &UserId, decision: Decision) -> ClientResult<()> {
        self.acting = Some(user_id.clone());
        self.error = None;
        self.publish();

        let outcome = self.source.decide(user_id, decision).await;
        self.acting = None;
        match outcome {
            Ok(()) => {
                info!(user_id = %user_id, ?decision, "applicant reviewed");
                self.reload().await;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, user_id = %user_id, ?decision, "review failed");
                self.error = Some(err.to_string());
                self.publish();
                Err(err)
            }
        }
    }

    pub async fn pending_count(&self) -> ClientResult<u64> {
        self.source.pending_count().await
    }

    pub fn items(&self) -> &[S::Item] {
        &self.items
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn snapshot(&self) -> FeedView<S::Item> {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedView<S::Item>> {
        self.view.subscribe()
    }

    fn publish(&self) {
        self.view.send_replace(FeedView {
            items: self.items.clone(),
            visible: self.filtered(),
            has_more: self.has_more,
            next_cursor: self.next_cursor.clone(),
            loading: self.loading,
            error: self.error.clone(),
            acting: self.acting.clone(),
            search: self.search.clone(),
        });
    }
}

#[cfg(test)]
#[path = "tests/feed_tests.rs"]
mod tests;
