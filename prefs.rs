/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Shell preferences: TOML file, then `TABSHELL_*` environment overrides.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::tab::{DEFAULT_MAX_TABS, LastTabPolicy};
use crate::services::page_cache::DEFAULT_MAX_CACHED_PAGES;
use crate::shell::lifecycle::MaterializerKind;
use crate::shell::workbench::tab_bar::DEFAULT_SCROLL_STEP;

const ENV_PREFIX: &str = "TABSHELL_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Endpoints {
    /// Origin every relative location is resolved against. `None` in the
    /// browser, where the document's own origin is used.
    pub base_url: Option<String>,
    pub menus: String,
    pub auth_user: String,
    pub login_page: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            base_url: None,
            menus: "/api/menus/active".to_owned(),
            auth_user: "/api/auth/user".to_owned(),
            login_page: "/login".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellPrefs {
    pub max_cached_pages: usize,
    pub max_tabs: usize,
    pub materializer: MaterializerKind,
    pub last_tab_policy: LastTabPolicy,
    /// Tabs rendered without a close button.
    pub permanent_tabs: Vec<String>,
    pub frame_load_timeout_ms: u64,
    pub fetch_timeout_ms: u64,
    pub tab_scroll_step: f32,
    /// Extra menu fetch attempts before falling back to the built-in menu.
    pub menu_retries: usize,
    pub app_title: String,
    pub endpoints: Endpoints,
}

impl Default for ShellPrefs {
    fn default() -> Self {
        Self {
            max_cached_pages: DEFAULT_MAX_CACHED_PAGES,
            max_tabs: DEFAULT_MAX_TABS,
            materializer: MaterializerKind::default(),
            last_tab_policy: LastTabPolicy::default(),
            permanent_tabs: Vec::new(),
            frame_load_timeout_ms: 10_000,
            fetch_timeout_ms: 30_000,
            tab_scroll_step: DEFAULT_SCROLL_STEP,
            menu_retries: 0,
            app_title: "Work System".to_owned(),
            endpoints: Endpoints::default(),
        }
    }
}

#[derive(Debug)]
pub enum PrefsError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for PrefsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {}: {source}", path.display()),
            Self::Parse(err) => write!(f, "invalid preferences file: {err}"),
            Self::Invalid(message) => write!(f, "invalid preferences: {message}"),
        }
    }
}

impl std::error::Error for PrefsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl ShellPrefs {
    pub fn from_toml_str(raw: &str) -> Result<Self, PrefsError> {
        toml::from_str(raw).map_err(PrefsError::Parse)
    }

    pub fn load(path: &Path) -> Result<Self, PrefsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PrefsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `TABSHELL_*` overrides from `lookup`. Values that do not parse are
    /// reported and leave the current setting in place.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        override_parsed(&mut self.max_cached_pages, "MAX_CACHED_PAGES", get("MAX_CACHED_PAGES"));
        override_parsed(&mut self.max_tabs, "MAX_TABS", get("MAX_TABS"));
        override_parsed(&mut self.materializer, "MATERIALIZER", get("MATERIALIZER"));
        override_parsed(
            &mut self.frame_load_timeout_ms,
            "FRAME_LOAD_TIMEOUT_MS",
            get("FRAME_LOAD_TIMEOUT_MS"),
        );
        override_parsed(&mut self.fetch_timeout_ms, "FETCH_TIMEOUT_MS", get("FETCH_TIMEOUT_MS"));
        override_parsed(&mut self.menu_retries, "MENU_RETRIES", get("MENU_RETRIES"));

        if let Some(policy) = get("LAST_TAB_POLICY") {
            match policy.as_str() {
                "allow-empty" => self.last_tab_policy = LastTabPolicy::AllowEmpty,
                "keep-one" => self.last_tab_policy = LastTabPolicy::KeepOne,
                other => warn!(
                    "Ignoring {ENV_PREFIX}LAST_TAB_POLICY='{other}' (expected allow-empty or keep-one)"
                ),
            }
        }
        if let Some(ids) = get("PERMANENT_TABS") {
            self.permanent_tabs = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(title) = get("APP_TITLE") {
            self.app_title = title;
        }
        if let Some(base) = get("BASE_URL") {
            self.endpoints.base_url = Some(base);
        }
    }

    pub fn validate(&self) -> Result<(), PrefsError> {
        if self.max_cached_pages == 0 {
            return Err(PrefsError::Invalid("max_cached_pages must be at least 1".into()));
        }
        if self.max_tabs == 0 {
            return Err(PrefsError::Invalid("max_tabs must be at least 1".into()));
        }
        if self.frame_load_timeout_ms == 0 || self.fetch_timeout_ms == 0 {
            return Err(PrefsError::Invalid("timeouts must be positive".into()));
        }
        if !(self.tab_scroll_step.is_finite() && self.tab_scroll_step > 0.0) {
            return Err(PrefsError::Invalid("tab_scroll_step must be positive".into()));
        }
        self.base_url()?;
        Ok(())
    }

    pub fn base_url(&self) -> Result<Option<Url>, PrefsError> {
        self.endpoints
            .base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|err| PrefsError::Invalid(format!("base_url '{raw}': {err}")))
            })
            .transpose()
    }

    pub fn frame_load_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_load_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn override_parsed<T>(slot: &mut T, name: &str, raw: Option<String>)
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(raw) = raw else {
        return;
    };
    match raw.parse() {
        Ok(value) => *slot = value,
        Err(err) => warn!("Ignoring {ENV_PREFIX}{name}='{raw}': {err}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let prefs = ShellPrefs::default();
        assert_eq!(prefs.max_cached_pages, 10);
        assert_eq!(prefs.max_tabs, 10);
        assert_eq!(prefs.frame_load_timeout(), Duration::from_secs(10));
        assert_eq!(prefs.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(prefs.last_tab_policy, LastTabPolicy::AllowEmpty);
        assert_eq!(prefs.endpoints.menus, "/api/menus/active");
        assert!(prefs.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let prefs = ShellPrefs::from_toml_str(
            r#"
            max_cached_pages = 4
            materializer = "injection"
            last_tab_policy = "keep-one"
            permanent_tabs = ["dashboard"]

            [endpoints]
            base_url = "http://localhost:8080/"
            "#,
        )
        .unwrap();
        assert_eq!(prefs.max_cached_pages, 4);
        assert_eq!(prefs.materializer, MaterializerKind::Injection);
        assert_eq!(prefs.last_tab_policy, LastTabPolicy::KeepOne);
        assert_eq!(prefs.permanent_tabs, vec!["dashboard"]);
        assert_eq!(prefs.max_tabs, 10);
        assert_eq!(prefs.endpoints.auth_user, "/api/auth/user");
        assert_eq!(
            prefs.base_url().unwrap().unwrap().as_str(),
            "http://localhost:8080/"
        );
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(matches!(
            ShellPrefs::from_toml_str("max_cache = 3"),
            Err(PrefsError::Parse(_))
        ));
    }

    #[test]
    fn test_load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabshell.toml");
        std::fs::write(&path, "max_tabs = 6\napp_title = \"Ops\"\n").unwrap();

        let prefs = ShellPrefs::load(&path).unwrap();
        assert_eq!(prefs.max_tabs, 6);
        assert_eq!(prefs.app_title, "Ops");

        assert!(matches!(
            ShellPrefs::load(&dir.path().join("missing.toml")),
            Err(PrefsError::Io { .. })
        ));
    }

    #[test]
    fn test_env_overrides_apply_and_bad_values_are_ignored() {
        let mut prefs = ShellPrefs::default();
        prefs.apply_overrides(lookup(&[
            ("TABSHELL_MAX_CACHED_PAGES", "3"),
            ("TABSHELL_MAX_TABS", "many"),
            ("TABSHELL_MATERIALIZER", "injection"),
            ("TABSHELL_LAST_TAB_POLICY", "sometimes"),
            ("TABSHELL_PERMANENT_TABS", "dashboard, settings,"),
            ("TABSHELL_BASE_URL", "http://intranet/"),
        ]));

        assert_eq!(prefs.max_cached_pages, 3);
        assert_eq!(prefs.max_tabs, 10);
        assert_eq!(prefs.materializer, MaterializerKind::Injection);
        assert_eq!(prefs.last_tab_policy, LastTabPolicy::AllowEmpty);
        assert_eq!(prefs.permanent_tabs, vec!["dashboard", "settings"]);
        assert_eq!(prefs.endpoints.base_url.as_deref(), Some("http://intranet/"));
    }

    #[test]
    fn test_validate_rejects_zero_capacity_and_bad_base() {
        let prefs = ShellPrefs {
            max_cached_pages: 0,
            ..ShellPrefs::default()
        };
        assert!(matches!(prefs.validate(), Err(PrefsError::Invalid(_))));

        let mut prefs = ShellPrefs::default();
        prefs.endpoints.base_url = Some("not a url".into());
        assert!(prefs.validate().is_err());
    }
}
