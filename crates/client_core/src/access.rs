//! Role gating and admin-host routing.

use shared::domain::UserRole;

use crate::auth::CurrentUser;

pub const LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_FALLBACK_PATH: &str = "/";

const ADMIN_HOST_PREFIXES: [&str; 2] = ["admin.localhost", "admin.allinfluencer"];
const PASSTHROUGH_PREFIXES: [&str; 6] = [
    "api",
    "_next",
    "static",
    "favicon.ico",
    "sitemap.xml",
    "robots.txt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Session lookup still in flight.
    Loading,
    SignInRequired,
    Forbidden { required: UserRole },
    Allowed,
}

/// `session` is `None` while the lookup has not completed.
pub fn gate(session: Option<&CurrentUser>, allowed: UserRole) -> GateDecision {
    let Some(session) = session else {
        return GateDecision::Loading;
    };
    match session.role() {
        None => GateDecision::SignInRequired,
        Some(role) if role == allowed => GateDecision::Allowed,
        Some(_) => GateDecision::Forbidden { required: allowed },
    }
}

pub fn is_admin_host(host: &str) -> bool {
    let host = host.trim().to_ascii_lowercase();
    ADMIN_HOST_PREFIXES
        .iter()
        .any(|prefix| host.starts_with(prefix))
}

/// Internal path to serve for a request on `host`, or `None` when the path is
/// served as-is.
pub fn rewrite_admin_path(host: &str, path: &str) -> Option<String> {
    if !is_admin_host(host) || path.starts_with("/admin") {
        return None;
    }
    let relative = path.strip_prefix('/').unwrap_or(path);
    if PASSTHROUGH_PREFIXES
        .iter()
        .any(|prefix| relative.starts_with(prefix))
    {
        return None;
    }
    Some(format!("/admin/{relative}"))
}
