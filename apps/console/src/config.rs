use std::{env, fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::{debug, warn};

pub const SETTINGS_FILE: &str = "console.toml";
pub const ENV_FILE: &str = "env.local";

#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleSettings {
    pub api_url: String,
    pub api_prefix: String,
    pub page_size: u32,
    pub debounce_ms: u64,
    pub session_cookie: Option<String>,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".into(),
            api_prefix: "/api/v1".into(),
            page_size: 12,
            debounce_ms: 300,
            session_cookie: None,
        }
    }
}

impl ConsoleSettings {
    /// Origin plus prefix, e.g. `http://localhost:8080/api/v1`.
    pub fn api_base(&self) -> String {
        let origin = self.api_url.trim().trim_end_matches('/');
        let prefix = self.api_prefix.trim().trim_matches('/');
        if prefix.is_empty() {
            origin.to_string()
        } else {
            format!("{origin}/{prefix}")
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    api_prefix: Option<String>,
    page_size: Option<u32>,
    debounce_ms: Option<u64>,
    session_cookie: Option<String>,
}

pub fn load_settings() -> ConsoleSettings {
    let mut settings = ConsoleSettings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw);
    }
    load_env_file(Path::new(ENV_FILE));
    apply_env(&mut settings, |key| env::var(key).ok());

    settings
}

fn apply_file(settings: &mut ConsoleSettings, raw: &str) {
    let file_cfg = match toml::from_str::<FileSettings>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!(error = %err, file = SETTINGS_FILE, "ignoring unreadable settings file");
            return;
        }
    };

    if let Some(v) = file_cfg.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file_cfg.api_prefix {
        settings.api_prefix = v;
    }
    if let Some(v) = file_cfg.page_size {
        settings.page_size = v;
    }
    if let Some(v) = file_cfg.debounce_ms {
        settings.debounce_ms = v;
    }
    if file_cfg.session_cookie.is_some() {
        settings.session_cookie = file_cfg.session_cookie;
    }
}

/// Exports `KEY=VALUE` lines from `path`. Variables already set win.
///
/// Must run before any other thread is started, since it writes the process
/// environment.
fn load_env_file(path: &Path) {
    match dotenvy::from_filename(path) {
        Ok(loaded) => debug!(file = %loaded.display(), "loaded env file"),
        Err(err) if err.not_found() => {}
        Err(err) => warn!(error = %err, file = %path.display(), "ignoring unreadable env file"),
    }
}

fn apply_env(settings: &mut ConsoleSettings, lookup: impl Fn(&str) -> Option<String>) {
    for key in ["NEXT_PUBLIC_API_URL", "API_URL", "APP__API_URL"] {
        if let Some(v) = lookup(key) {
            settings.api_url = v;
        }
    }

    if let Some(v) = lookup("APP__API_PREFIX") {
        settings.api_prefix = v;
    }

    if let Some(v) = lookup("APP__PAGE_SIZE") {
        match v.trim().parse::<u32>() {
            Ok(parsed) => settings.page_size = parsed,
            Err(_) => warn!(value = %v, "APP__PAGE_SIZE is not a number"),
        }
    }

    if let Some(v) = lookup("APP__DEBOUNCE_MS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.debounce_ms = parsed;
        }
    }

    if let Some(v) = lookup("APP__SESSION_COOKIE") {
        settings.session_cookie = Some(v).filter(|v| !v.trim().is_empty());
    }
}
