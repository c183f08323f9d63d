use std::time::Duration;

use shared::domain::{Filter, SortKey, UserRole, UserStatus};

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// User-editable state behind a list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub role: Filter<UserRole>,
    pub status: Filter<UserStatus>,
    /// What the search box shows right now.
    pub raw_search: String,
    /// What the last fetch was (or will be) issued with.
    pub debounced_search: String,
    pub sort: SortKey,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ListQuery {
    pub fn new(limit: u32) -> Self {
        Self {
            page: 1,
            limit: limit.max(1),
            role: Filter::All,
            status: Filter::All,
            raw_search: String::new(),
            debounced_search: String::new(),
            sort: SortKey::Newest,
        }
    }

    /// Seeds both search fields, skipping the debounce window.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.raw_search.clone_from(&search);
        self.debounced_search = search;
        self
    }

    pub fn with_role(mut self, role: Filter<UserRole>) -> Self {
        self.role = role;
        self
    }

    pub fn with_status(mut self, status: Filter<UserStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page(mut self, page: i64) -> Self {
        self.page = clamp_page(page);
        self
    }

    /// Defaults for everything except the page size.
    pub fn reset(&self) -> Self {
        Self::new(self.limit)
    }

    pub fn params(&self) -> PageParams {
        let search = self.debounced_search.trim();
        PageParams {
            page: self.page,
            limit: self.limit,
            role: self.role.value(),
            status: self.status.value(),
            search: (!search.is_empty()).then(|| search.to_string()),
        }
    }
}

pub(crate) fn clamp_page(page: i64) -> u32 {
    u32::try_from(page.max(1)).unwrap_or(u32::MAX)
}

/// The fetch-relevant part of a [`ListQuery`]; doubles as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageParams {
    pub page: u32,
    pub limit: u32,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub search: Option<String>,
}

impl PageParams {
    /// Query string pairs; unset filters are omitted rather than sent as `ALL`.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(role) = self.role {
            pairs.push(("role", role.as_str().to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        pairs
    }

    pub fn cache_key(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query_pairs())
            .finish()
    }
}
