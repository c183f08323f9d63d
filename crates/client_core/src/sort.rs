use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use shared::{
    domain::{SortKey, UserStatus},
    protocol::UserListItem,
};

/// Fields list views sort and summarize on.
pub trait ListItem {
    fn created_at(&self) -> DateTime<Utc>;

    fn display_name(&self) -> Option<&str>;

    fn is_active(&self) -> bool {
        false
    }

    fn last_login_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

impl ListItem for UserListItem {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }
}

/// Orders one page of items for display. The sort is stable, so ties keep the
/// server's order.
pub fn sort_page<T: ListItem + Clone>(items: &[T], key: SortKey) -> Vec<T> {
    let mut sorted = items.to_vec();
    match key {
        SortKey::Newest => sorted.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
        SortKey::Oldest => sorted.sort_by(|a, b| a.created_at().cmp(&b.created_at())),
        SortKey::Name => sorted.sort_by(|a, b| compare_names(a.display_name(), b.display_name())),
    }
    sorted
}

// Missing names sort as the empty string; case only breaks ties.
fn compare_names(a: Option<&str>, b: Option<&str>) -> Ordering {
    let a = a.unwrap_or_default();
    let b = b.unwrap_or_default();
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
