use async_trait::async_trait;
use serde_json::Value;
use shared::protocol::UserListItem;

use crate::{
    controller::PageSource,
    error::ClientResult,
    pagination::{normalize_offset_page, unwrap_envelope, PageResult},
    query::PageParams,
    ApiClient,
};

impl ApiClient {
    /// `GET /users` with the offset-pagination parameters of `params`.
    pub async fn fetch_users(&self, params: &PageParams) -> ClientResult<PageResult<UserListItem>> {
        let payload: Value = self.get_json(&["users"], &params.query_pairs()).await?;
        Ok(normalize_offset_page(unwrap_envelope(payload)?))
    }
}

/// The user directory as a [`PageSource`] for list controllers.
#[derive(Debug, Clone)]
pub struct UserDirectory {
    client: ApiClient,
}

impl UserDirectory {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for UserDirectory {
    type Item = UserListItem;

    async fn fetch_page(&self, params: &PageParams) -> ClientResult<PageResult<UserListItem>> {
        self.client.fetch_users(params).await
    }
}
