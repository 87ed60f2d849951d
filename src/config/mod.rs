//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{num::NonZeroU32, str::FromStr};

use chrono_tz::Tz;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::{CliArgs, Command, GetArgs, GlobalOverrides, IdArgs, QueryArgs, ResolveArgs};

use crate::application::content::ContentSettings;
use crate::application::query::{
    DEFAULT_FULLTEXT_FIELD_CAP, DEFAULT_FULLTEXT_THRESHOLD, QueryTuning,
};
use crate::cache::CacheConfig;
use crate::util::timezone::{DEFAULT_DATE_FORMAT, is_valid_format};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const ENV_PREFIX: &str = "FOLIO";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_SITE_URL: &str = "http://localhost/";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub content: ContentSection,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: usize,
    pub list_ttl_secs: u64,
    pub count_ttl_secs: u64,
    pub single_ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ContentSection {
    /// Always ends with `/`.
    pub site_url: Url,
    pub time_zone: Tz,
    pub date_format: String,
    pub fulltext_threshold: u64,
    pub fulltext_field_cap: usize,
}

impl Settings {
    /// Settings handed to the content service.
    pub fn content_settings(&self) -> ContentSettings {
        ContentSettings {
            site_url: self.content.site_url.clone(),
            time_zone: self.content.time_zone,
            date_format: self.content.date_format.clone(),
            tuning: QueryTuning {
                fulltext_threshold: self.content.fulltext_threshold,
                fulltext_field_cap: self.content.fulltext_field_cap,
            },
            cache: CacheConfig::from(&self.cache),
            ..ContentSettings::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    content: RawContentSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(url) = overrides.site_url.as_ref() {
            self.content.site_url = Some(url.clone());
        }
        if let Some(zone) = overrides.time_zone.as_ref() {
            self.content.time_zone = Some(zone.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            cache,
            content,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache),
            content: build_content_settings(content)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_connections).ok_or_else(|| {
        LoadError::invalid("database.max_connections", "must be greater than zero")
    })?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> CacheSettings {
    let defaults = CacheConfig::default();
    CacheSettings {
        enabled: cache.enabled.unwrap_or(defaults.enabled),
        capacity: cache.capacity.unwrap_or(defaults.capacity),
        list_ttl_secs: cache.list_ttl_secs.unwrap_or(defaults.list_ttl_secs),
        count_ttl_secs: cache.count_ttl_secs.unwrap_or(defaults.count_ttl_secs),
        single_ttl_secs: cache.single_ttl_secs.unwrap_or(defaults.single_ttl_secs),
    }
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSection, LoadError> {
    let site_url = parse_site_url(
        content
            .site_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_SITE_URL),
    )?;

    let time_zone = match content.time_zone.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Tz::from_str(name).map_err(|err| {
            LoadError::invalid("content.time_zone", format!("unknown time zone: {err}"))
        })?,
        _ => Tz::UTC,
    };

    let date_format = content
        .date_format
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
    if !is_valid_format(&date_format) {
        return Err(LoadError::invalid(
            "content.date_format",
            format!("`{date_format}` is not a valid strftime pattern"),
        ));
    }

    let fulltext_field_cap = content
        .fulltext_field_cap
        .unwrap_or(DEFAULT_FULLTEXT_FIELD_CAP);
    if fulltext_field_cap == 0 {
        return Err(LoadError::invalid(
            "content.fulltext_field_cap",
            "must be greater than zero",
        ));
    }

    Ok(ContentSection {
        site_url,
        time_zone,
        date_format,
        fulltext_threshold: content
            .fulltext_threshold
            .unwrap_or(DEFAULT_FULLTEXT_THRESHOLD),
        fulltext_field_cap,
    })
}

fn parse_site_url(value: &str) -> Result<Url, LoadError> {
    let normalized = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };
    let url = Url::parse(&normalized)
        .map_err(|err| LoadError::invalid("content.site_url", err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(LoadError::invalid(
            "content.site_url",
            "must be an absolute base URL",
        ));
    }
    Ok(url)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
    list_ttl_secs: Option<u64>,
    count_ttl_secs: Option<u64>,
    single_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    site_url: Option<String>,
    time_zone: Option<String>,
    date_format: Option<String>,
    fulltext_threshold: Option<u64>,
    fulltext_field_cap: Option<usize>,
}
