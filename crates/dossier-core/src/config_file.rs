use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub service: Option<ServiceConfig>,
    pub search: Option<SearchConfig>,
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the tagging service, e.g. `http://localhost:5000/api`.
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Comma-separated tags, or `"all"`.
    pub enabled_types: Option<String>,
    pub custom_term: Option<String>,
    pub custom_term_regex: Option<bool>,
    /// Match the custom term with exact case.
    pub case_sensitive: Option<bool>,
    pub bulk_batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub color: Option<bool>,
}

/// Platform config directory path: `<config_dir>/dossier/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dossier").join("config.toml"))
}

/// Load config by cascading CWD `.dossier.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".dossier.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let service = |f: fn(&ServiceConfig) -> Option<String>| {
        overlay
            .service
            .as_ref()
            .and_then(f)
            .or_else(|| base.service.as_ref().and_then(f))
    };
    let search = |f: fn(&SearchConfig) -> Option<String>| {
        overlay
            .search
            .as_ref()
            .and_then(f)
            .or_else(|| base.search.as_ref().and_then(f))
    };

    ConfigFile {
        service: Some(ServiceConfig {
            url: service(|s| s.url.clone()),
            timeout_secs: overlay
                .service
                .as_ref()
                .and_then(|s| s.timeout_secs)
                .or_else(|| base.service.as_ref().and_then(|s| s.timeout_secs)),
        }),
        search: Some(SearchConfig {
            enabled_types: search(|s| s.enabled_types.clone()),
            custom_term: search(|s| s.custom_term.clone()),
            custom_term_regex: overlay
                .search
                .as_ref()
                .and_then(|s| s.custom_term_regex)
                .or_else(|| base.search.as_ref().and_then(|s| s.custom_term_regex)),
            case_sensitive: overlay
                .search
                .as_ref()
                .and_then(|s| s.case_sensitive)
                .or_else(|| base.search.as_ref().and_then(|s| s.case_sensitive)),
            bulk_batch_size: overlay
                .search
                .as_ref()
                .and_then(|s| s.bulk_batch_size)
                .or_else(|| base.search.as_ref().and_then(|s| s.bulk_batch_size)),
        }),
        display: Some(DisplayConfig {
            color: overlay
                .display
                .as_ref()
                .and_then(|d| d.color)
                .or_else(|| base.display.as_ref().and_then(|d| d.color)),
        }),
    }
}
