//! Admin approval queues for influencer and advertiser sign-ups.
//!
//! These endpoints are cursor-paginated (`{items, hasMore, nextCursor}`) and are
//! consumed through [`crate::feed::CursorFeed`].

use std::{fmt, marker::PhantomData, str::FromStr};

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use shared::{
    domain::{UnknownVariant, UserId},
    protocol::{CursorPage, PendingAdvertiser, PendingCount, PendingInfluencer},
};

use crate::{error::ClientResult, feed::CursorSource, ApiClient};

pub const DEFAULT_PENDING_LIMIT: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingKind {
    Influencers,
    Advertisers,
}

impl PendingKind {
    pub fn segment(self) -> &'static str {
        match self {
            Self::Influencers => "influencers",
            Self::Advertisers => "advertisers",
        }
    }
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

impl FromStr for PendingKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "influencer" | "influencers" => Ok(Self::Influencers),
            "advertiser" | "advertisers" => Ok(Self::Advertisers),
            _ => Err(UnknownVariant {
                kind: "applicant kind",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// Action path segment. Advertisers are approved through `verify`.
    pub fn segment(self, kind: PendingKind) -> &'static str {
        match (self, kind) {
            (Self::Approve, PendingKind::Influencers) => "approve",
            (Self::Approve, PendingKind::Advertisers) => "verify",
            (Self::Reject, _) => "reject",
        }
    }

    pub fn past_tense(self, kind: PendingKind) -> &'static str {
        match (self, kind) {
            (Self::Approve, PendingKind::Influencers) => "approved",
            (Self::Approve, PendingKind::Advertisers) => "verified",
            (Self::Reject, _) => "rejected",
        }
    }
}

/// Text a reviewer can filter a loaded queue by.
pub trait Searchable {
    fn search_fields(&self) -> Vec<String>;

    /// `needle` must already be trimmed and lower-cased.
    fn matches(&self, needle: &str) -> bool {
        needle.is_empty()
            || self
                .search_fields()
                .join(" ")
                .to_lowercase()
                .contains(needle)
    }
}

impl Searchable for PendingInfluencer {
    fn search_fields(&self) -> Vec<String> {
        vec![
            self.email.clone().unwrap_or_default(),
            self.display_name.clone().unwrap_or_default(),
            self.categories.as_deref().unwrap_or_default().join(","),
        ]
    }
}

impl Searchable for PendingAdvertiser {
    fn search_fields(&self) -> Vec<String> {
        vec![
            self.email.clone().unwrap_or_default(),
            self.company_name.clone().unwrap_or_default(),
            self.industry.clone().unwrap_or_default(),
            self.business_registration_number.clone().unwrap_or_default(),
        ]
    }
}

pub trait PendingApplicant: DeserializeOwned + Searchable + Clone + Send + Sync + 'static {
    const KIND: PendingKind;

    fn user_id(&self) -> &UserId;
}

impl PendingApplicant for PendingInfluencer {
    const KIND: PendingKind = PendingKind::Influencers;

    fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

impl PendingApplicant for PendingAdvertiser {
    const KIND: PendingKind = PendingKind::Advertisers;

    fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

impl ApiClient {
    pub async fn list_pending<T: PendingApplicant>(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> ClientResult<CursorPage<T>> {
        let mut query = vec![("limit", limit.max(1).to_string())];
        if let Some(cursor) = cursor.filter(|cursor| !cursor.is_empty()) {
            query.push(("cursor", cursor.to_string()));
        }
        self.get_json(&["admin", T::KIND.segment(), "pending"], &query)
            .await
    }

    pub async fn pending_count(&self, kind: PendingKind) -> ClientResult<u64> {
        let body: PendingCount = self
            .get_json(&["admin", kind.segment(), "pending", "count"], &[] as &[(&str, &str)])
            .await?;
        Ok(body.count)
    }

    pub async fn decide_applicant(
        &self,
        kind: PendingKind,
        user_id: &UserId,
        decision: Decision,
    ) -> ClientResult<()> {
        self.send_empty(
            Method::PATCH,
            &["admin", kind.segment(), &user_id.0, decision.segment(kind)],
        )
        .await
    }
}

/// One approval queue as a [`CursorSource`].
#[derive(Debug, Clone)]
pub struct PendingApplicants<T> {
    client: ApiClient,
    _applicant: PhantomData<fn() -> T>,
}

impl<T: PendingApplicant> PendingApplicants<T> {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            _applicant: PhantomData,
        }
    }
}

#[async_trait]
impl<T: PendingApplicant> CursorSource for PendingApplicants<T> {
    type Item = T;

    async fn fetch_cursor_page(&self, cursor: Option<&str>, limit: u32) -> ClientResult<CursorPage<T>> {
        self.client.list_pending(cursor, limit).await
    }

    async fn decide(&self, user_id: &UserId, decision: Decision) -> ClientResult<()> {
        self.client
            .decide_applicant(T::KIND, user_id, decision)
            .await
    }

    async fn pending_count(&self) -> ClientResult<u64> {
        self.client.pending_count(T::KIND).await
    }
}
