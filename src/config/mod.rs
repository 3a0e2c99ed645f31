#[cfg(feature = "cli")]
pub mod cli;

use crate::core::exporter::ExportOptions;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_identifier, validate_non_empty_string, validate_path, validate_range,
    validate_required_field, validate_table_prefix, validate_url, Validate,
};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_WEBSITE: &str = "default";
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// WooCommerce rejects `per_page` above this.
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_DELAY_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DATA_DIR: &str = "data";

/// One website as written in the sites file or the environment. Every field is optional
/// here; [`SiteEntry::rest_config`] and [`SiteEntry::database_config`] check what each
/// export target actually needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteEntry {
    #[serde(rename = "CONSUMER_KEY", default)]
    pub consumer_key: Option<String>,
    #[serde(rename = "CONSUMER_SECRET", default)]
    pub consumer_secret: Option<String>,
    #[serde(rename = "SITE_URL", default)]
    pub site_url: Option<String>,
    #[serde(rename = "DOMAIN", default)]
    pub domain: Option<String>,
    #[serde(rename = "DATABASE_HOST", alias = "IP", default)]
    pub database_host: Option<String>,
    #[serde(rename = "DATABASE_PORT", default)]
    pub database_port: Option<u16>,
    #[serde(rename = "DATABASE_NAME", default)]
    pub database_name: Option<String>,
    #[serde(rename = "DATABASE_USER", default)]
    pub database_user: Option<String>,
    #[serde(rename = "DATABASE_PASSWORD", default)]
    pub database_password: Option<String>,
    #[serde(rename = "DATABASE_TABLE_PREFIX", default)]
    pub database_table_prefix: Option<String>,
}

/// Validated credentials for the WooCommerce REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub name: String,
    pub site_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub domain: Option<String>,
}

/// Validated connection settings for a WordPress MySQL database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub table_prefix: String,
}

impl SiteEntry {
    /// Reads the single-site environment layout (`CONSUMER_KEY`, `SITE_URL`, `IP_1`, ...).
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            consumer_key: get("CONSUMER_KEY"),
            consumer_secret: get("CONSUMER_SECRET"),
            site_url: get("SITE_URL"),
            domain: get("DOMAIN_1"),
            database_host: get("IP_1"),
            database_port: get("DATABASE_PORT_1").and_then(|p| p.trim().parse().ok()),
            database_name: get("DATABASE_NAME_1"),
            database_user: get("DATABASE_USER_1"),
            database_password: get("DATABASE_PASSWORD_1"),
            database_table_prefix: get("DATABASE_TABLE_PREFIX_1"),
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn rest_config(&self, name: &str) -> Result<SiteConfig> {
        let config = SiteConfig {
            name: name.to_string(),
            site_url: validate_required_field("SITE_URL", &self.site_url)?,
            consumer_key: validate_required_field("CONSUMER_KEY", &self.consumer_key)?,
            consumer_secret: validate_required_field(
                "CONSUMER_SECRET",
                &self.consumer_secret,
            )?,
            domain: self.domain.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn database_config(&self) -> Result<DatabaseConfig> {
        let config = DatabaseConfig {
            host: validate_required_field("DATABASE_HOST", &self.database_host)?,
            port: self.database_port.unwrap_or(3306),
            name: validate_required_field("DATABASE_NAME", &self.database_name)?,
            user: validate_required_field("DATABASE_USER", &self.database_user)?,
            password: self.database_password.clone().unwrap_or_default(),
            table_prefix: self
                .database_table_prefix
                .clone()
                .unwrap_or_else(|| "wp_".to_string()),
        };
        config.validate()?;
        Ok(config)
    }
}

impl Validate for SiteConfig {
    fn validate(&self) -> Result<()> {
        validate_identifier("website", &self.name)?;
        validate_url("SITE_URL", &self.site_url)?;
        validate_non_empty_string("CONSUMER_KEY", &self.consumer_key)?;
        validate_non_empty_string("CONSUMER_SECRET", &self.consumer_secret)?;
        Ok(())
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("DATABASE_HOST", &self.host)?;
        validate_non_empty_string("DATABASE_NAME", &self.name)?;
        validate_non_empty_string("DATABASE_USER", &self.user)?;
        validate_table_prefix("DATABASE_TABLE_PREFIX", &self.table_prefix)?;
        Ok(())
    }
}

/// Optional `export` section of the sites file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSection {
    pub page_size: Option<u32>,
    pub page_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub data_dir: Option<String>,
}

/// The multi-website registry, read from `config.json` or a `.toml` equivalent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitesFile {
    #[serde(default)]
    pub default_website: Option<String>,
    #[serde(default)]
    pub websites: BTreeMap<String, SiteEntry>,
    #[serde(default)]
    pub export: Option<ExportSection>,
}

impl SitesFile {
    /// Loads a sites file; `.toml` files are parsed as TOML, anything else as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let content = substitute_env_vars_with(&content, |key| std::env::var(key).ok());
        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    /// `Ok(None)` when the file does not exist; the environment is used instead.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No sites file at {}", path.display());
            return Ok(None);
        }
        let file = Self::from_file(path)?;
        tracing::info!("✓ Loaded configuration from {}", path.display());
        Ok(Some(file))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| EtlError::ConfigValidationError {
            field: "json_parsing".to_string(),
            message: format!("JSON parsing error: {}", e),
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn website_names(&self) -> Vec<&str> {
        self.websites.keys().map(String::as_str).collect()
    }
}

/// Replaces `${VAR}` with the variable's value; unknown variables are left as written.
pub fn substitute_env_vars_with<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(content, |caps: &Captures| {
        let var_name = &caps[1];
        lookup(var_name).unwrap_or_else(|| format!("${{{}}}", var_name))
    })
    .into_owned()
}

/// Picks the website entry to export from.
///
/// An explicit name must exist in the sites file unless it is `default`, which (like no
/// name at all, when the file has no `default_website`) falls back to the environment.
pub fn resolve_site(
    file: Option<&SitesFile>,
    website: Option<&str>,
    env: SiteEntry,
) -> Result<(String, SiteEntry)> {
    if let Some(file) = file {
        match website {
            Some(name) => {
                if let Some(entry) = file.websites.get(name) {
                    return Ok((name.to_string(), entry.clone()));
                }
                if name != DEFAULT_WEBSITE {
                    return Err(EtlError::ConfigError {
                        message: format!(
                            "website '{}' is not configured (available: {})",
                            name,
                            file.website_names().join(", ")
                        ),
                    });
                }
            }
            None => {
                if let Some(default) = file.default_website.as_deref() {
                    if let Some(entry) = file.websites.get(default) {
                        tracing::info!("✓ Using default website '{}'", default);
                        return Ok((default.to_string(), entry.clone()));
                    }
                    tracing::warn!(
                        "⚠️ default_website '{}' is not in the websites list",
                        default
                    );
                }
            }
        }
    } else if let Some(name) = website.filter(|name| *name != DEFAULT_WEBSITE) {
        return Err(EtlError::ConfigError {
            message: format!(
                "website '{}' requested but no sites file was found",
                name
            ),
        });
    }

    tracing::info!("✓ Loaded configuration from environment variables");
    Ok((DEFAULT_WEBSITE.to_string(), env))
}

/// Command-line values that take precedence over the sites file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub data_dir: Option<PathBuf>,
    pub page_size: Option<u32>,
    pub page_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub max_records: Option<usize>,
    pub output: Option<PathBuf>,
}

/// Everything the exporter and its adapters need, resolved once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    pub data_dir: PathBuf,
    pub page_size: u32,
    pub page_delay: Duration,
    /// HTTP/database timeout; reqwest has none by default.
    pub request_timeout: Duration,
    pub max_records: Option<usize>,
    pub output: Option<PathBuf>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_records: None,
            output: None,
        }
    }
}

impl ExportSettings {
    pub fn resolve(section: Option<&ExportSection>, overrides: &SettingsOverrides) -> Self {
        let section = section.cloned().unwrap_or_default();
        let defaults = Self::default();

        Self {
            data_dir: overrides
                .data_dir
                .clone()
                .or_else(|| section.data_dir.map(PathBuf::from))
                .unwrap_or(defaults.data_dir),
            page_size: overrides
                .page_size
                .or(section.page_size)
                .unwrap_or(defaults.page_size),
            page_delay: overrides
                .page_delay_ms
                .or(section.page_delay_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.page_delay),
            request_timeout: overrides
                .request_timeout_secs
                .or(section.request_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_records: overrides.max_records,
            output: overrides.output.clone(),
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            page_size: self.page_size,
            page_delay: self.page_delay,
            max_records: self.max_records,
        }
    }
}

impl Validate for ExportSettings {
    fn validate(&self) -> Result<()> {
        validate_path("data_dir", &self.data_dir.to_string_lossy())?;
        validate_range("page_size", self.page_size, 1, MAX_PAGE_SIZE)?;
        validate_range("request_timeout_secs", self.request_timeout.as_secs(), 1, 3600)?;
        if let Some(max) = self.max_records {
            validate_range("max_records", max, 1, usize::MAX)?;
        }
        if let Some(output) = &self.output {
            validate_path("output", &output.to_string_lossy())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SITES_JSON: &str = r#"{
        "default_website": "shop",
        "websites": {
            "shop": {
                "CONSUMER_KEY": "ck_shop",
                "CONSUMER_SECRET": "cs_shop",
                "SITE_URL": "https://shop.example",
                "DOMAIN": "shop.example"
            },
            "outlet": {
                "CONSUMER_KEY": "ck_outlet",
                "CONSUMER_SECRET": "cs_outlet",
                "SITE_URL": "https://outlet.example",
                "IP": "10.0.0.5",
                "DATABASE_NAME": "outlet_wp",
                "DATABASE_USER": "reader"
            }
        },
        "export": { "page_size": 25 }
    }"#;

    fn env_map(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_parse_json_sites_file() {
        let file = SitesFile::from_json_str(SITES_JSON).unwrap();
        assert_eq!(file.website_names(), vec!["outlet", "shop"]);
        assert_eq!(file.export.as_ref().unwrap().page_size, Some(25));

        let outlet = &file.websites["outlet"];
        let db = outlet.database_config().unwrap();
        assert_eq!(db.host, "10.0.0.5");
        assert_eq!(db.port, 3306);
        assert_eq!(db.table_prefix, "wp_");
    }

    #[test]
    fn test_parse_toml_with_substitution() {
        let toml = r#"
            default_website = "shop"

            [websites.shop]
            CONSUMER_KEY = "${SHOP_KEY}"
            CONSUMER_SECRET = "${SHOP_SECRET}"
            SITE_URL = "https://shop.example"

            [export]
            page_delay_ms = 0
        "#;
        let content = substitute_env_vars_with(
            toml,
            env_map(&[("SHOP_KEY", "ck_live"), ("SHOP_SECRET", "cs_live")]),
        );
        let file = SitesFile::from_toml_str(&content).unwrap();

        let site = file.websites["shop"].rest_config("shop").unwrap();
        assert_eq!(site.consumer_key, "ck_live");
        assert_eq!(site.consumer_secret, "cs_live");
        assert_eq!(file.export.unwrap().page_delay_ms, Some(0));
    }

    #[test]
    fn test_unknown_variables_are_kept() {
        let out = substitute_env_vars_with("key=${NOPE}", |_| None);
        assert_eq!(out, "key=${NOPE}");
    }

    #[test]
    fn test_resolve_prefers_named_then_default_website() {
        let file = SitesFile::from_json_str(SITES_JSON).unwrap();

        let (name, entry) = resolve_site(Some(&file), Some("outlet"), SiteEntry::default()).unwrap();
        assert_eq!(name, "outlet");
        assert_eq!(entry.consumer_key.as_deref(), Some("ck_outlet"));

        let (name, _) = resolve_site(Some(&file), None, SiteEntry::default()).unwrap();
        assert_eq!(name, "shop");

        let err = resolve_site(Some(&file), Some("missing"), SiteEntry::default()).unwrap_err();
        assert!(matches!(err, EtlError::ConfigError { .. }));
    }

    #[test]
    fn test_resolve_falls_back_to_environment() {
        let env = SiteEntry::from_env_with(env_map(&[
            ("CONSUMER_KEY", "ck_env"),
            ("CONSUMER_SECRET", "cs_env"),
            ("SITE_URL", "https://env.example/"),
            ("DOMAIN_1", "env.example"),
        ]));

        let (name, entry) = resolve_site(None, None, env).unwrap();
        assert_eq!(name, "default");
        let site = entry.rest_config(&name).unwrap();
        assert_eq!(site.domain.as_deref(), Some("env.example"));
    }

    #[test]
    fn test_missing_credentials_are_reported_by_name() {
        let env = SiteEntry::from_env_with(env_map(&[
            ("CONSUMER_KEY", "ck_env"),
            ("SITE_URL", "https://env.example"),
        ]));
        let err = env.rest_config("default").unwrap_err();
        assert!(matches!(
            err,
            EtlError::MissingConfigError { ref field } if field == "CONSUMER_SECRET"
        ));
    }

    #[test]
    fn test_settings_precedence() {
        let section = ExportSection {
            page_size: Some(25),
            page_delay_ms: Some(250),
            request_timeout_secs: None,
            data_dir: Some("exports".to_string()),
        };
        let overrides = SettingsOverrides {
            page_size: Some(100),
            max_records: Some(500),
            ..Default::default()
        };

        let settings = ExportSettings::resolve(Some(&section), &overrides);
        assert_eq!(settings.page_size, 100);
        assert_eq!(settings.page_delay, Duration::from_millis(250));
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.data_dir, PathBuf::from("exports"));
        assert_eq!(settings.export_options().max_records, Some(500));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_reject_oversized_pages() {
        let settings = ExportSettings {
            page_size: 250,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
