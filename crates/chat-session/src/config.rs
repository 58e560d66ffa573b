use std::{env, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use which::which;

/// Options for opening one browser session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    pub url: String,
    pub headless: bool,
    pub navigation_timeout_ms: u64,
    /// Wait after navigation before the page counts as interactive; the
    /// target app renders client-side with no observable ready signal.
    pub page_settle_ms: u64,
    pub chrome_executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            headless: resolve_headless_default(),
            navigation_timeout_ms: 30_000,
            page_settle_ms: 3_000,
            chrome_executable: None,
            user_data_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }
}

fn resolve_headless_default() -> bool {
    // FURROW_HEADLESS: "0", "false", "no", "off" means headful
    match env::var("FURROW_HEADLESS") {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

pub(crate) fn resolve_chrome_executable(cfg: &SessionConfig) -> Option<PathBuf> {
    if let Some(path) = &cfg.chrome_executable {
        if path.exists() {
            return Some(path.clone());
        }
    }
    detect_chrome_executable()
}

fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("FURROW_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    for candidate in os_specific_chrome_paths() {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "freebsd"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        &["chrome"]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(value) = env::var(key) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    let root = PathBuf::from(trimmed);
                    paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                    paths.push(root.join("Chromium/Application/chrome.exe"));
                    paths.push(root.join("Microsoft/Edge/Application/msedge.exe"));
                }
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        Vec::new()
    }
}
