use chrono::{DateTime, Duration, Utc};
use shared::protocol::PageMeta;

use crate::sort::ListItem;

/// Summary cards above a list. Derived from the current page only, except
/// `total` which comes from the server when it reports one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DerivedSummary {
    pub total: u64,
    pub page_count: usize,
    pub active_count: usize,
    pub recent_count: usize,
}

pub fn recent_login_window() -> Duration {
    Duration::days(7)
}

impl DerivedSummary {
    pub fn compute<T: ListItem>(items: &[T], meta: Option<&PageMeta>, now: DateTime<Utc>) -> Self {
        let window = recent_login_window();
        Self {
            total: meta.map_or(items.len() as u64, |meta| meta.total),
            page_count: items.len(),
            active_count: items.iter().filter(|item| item.is_active()).count(),
            recent_count: items
                .iter()
                .filter_map(|item| item.last_login_at())
                .filter(|login| now.signed_duration_since(*login) <= window)
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        domain::{UserId, UserRole, UserStatus},
        protocol::UserListItem,
    };

    fn user(status: UserStatus, last_login_at: Option<&str>) -> UserListItem {
        UserListItem {
            id: UserId::from("u"),
            email: None,
            display_name: None,
            avatar: None,
            role: UserRole::Influencer,
            status,
            bio: None,
            website: None,
            created_at: "2024-01-01T00:00:00Z".parse().expect("timestamp"),
            updated_at: "2024-01-01T00:00:00Z".parse().expect("timestamp"),
            last_login_at: last_login_at.map(|raw| raw.parse().expect("timestamp")),
        }
    }

    #[test]
    fn counts_active_and_recent_users_on_the_page() {
        let now: DateTime<Utc> = "2024-03-10T00:00:00Z".parse().expect("now");
        let items = vec![
            user(UserStatus::Active, Some("2024-03-09T00:00:00Z")),
            user(UserStatus::Active, Some("2024-02-01T00:00:00Z")),
            user(UserStatus::Suspended, Some("2024-03-03T00:00:00Z")),
            user(UserStatus::Inactive, None),
        ];
        let meta = PageMeta {
            total: 57,
            ..PageMeta::default()
        };

        let summary = DerivedSummary::compute(&items, Some(&meta), now);
        assert_eq!(
            summary,
            DerivedSummary {
                total: 57,
                page_count: 4,
                active_count: 2,
                recent_count: 2,
            }
        );
    }

    #[test]
    fn total_falls_back_to_page_length_without_meta() {
        let now = Utc::now();
        let items = vec![user(UserStatus::Active, None)];
        assert_eq!(DerivedSummary::compute(&items, None, now).total, 1);
    }
}
