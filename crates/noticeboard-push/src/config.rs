pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_WORKER_SCRIPT: &str = "/sw.js";
pub const DEFAULT_WORKER_SCOPE: &str = "/";

/// Where the backend lives and which worker receives pushes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConfig {
    /// Backend origin; the push API lives under `{api_url}/api/push`.
    pub api_url: String,
    /// Worker script, served from the site root.
    pub worker_script: String,
    /// Root scope so the worker handles pushes for the whole origin.
    pub worker_scope: String,
    pub user_visible_only: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            worker_script: DEFAULT_WORKER_SCRIPT.into(),
            worker_scope: DEFAULT_WORKER_SCOPE.into(),
            user_visible_only: true,
        }
    }
}

impl PushConfig {
    /// Read `NOTICEBOARD_API_URL`, `NOTICEBOARD_WORKER_SCRIPT` and
    /// `NOTICEBOARD_WORKER_SCOPE`, falling back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            api_url: get("NOTICEBOARD_API_URL", DEFAULT_API_URL),
            worker_script: get("NOTICEBOARD_WORKER_SCRIPT", DEFAULT_WORKER_SCRIPT),
            worker_scope: get("NOTICEBOARD_WORKER_SCOPE", DEFAULT_WORKER_SCOPE),
            user_visible_only: true,
        }
    }
}
