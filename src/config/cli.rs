use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Folio binary.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Folio content store")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Print one content item as JSON.
    Get(GetArgs),
    /// Run a content query and print the matching items.
    Query(QueryArgs),
    /// Count the items a query would return.
    Count(QueryArgs),
    /// Resolve a link path to its content id.
    Resolve(ResolveArgs),
    /// Increment the view counter of a content item.
    Hit(IdArgs),
    /// Delete a content item together with its link and extension row.
    Delete(IdArgs),
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    /// Content id.
    pub id: i64,

    /// Include items whose publish date lies in the future.
    #[arg(long = "allow-future", action = clap::ArgAction::SetTrue)]
    pub allow_future: bool,
}

#[derive(Debug, Args, Clone)]
pub struct QueryArgs {
    /// Filter set as a JSON object, e.g. `{"type_id": 2, "limit": 10}`.
    #[arg(value_name = "FILTER", default_value = "{}")]
    pub filter: String,
}

#[derive(Debug, Args, Clone)]
pub struct ResolveArgs {
    /// Link path such as `news/launch`.
    #[arg(value_name = "PATH")]
    pub path: String,
}

#[derive(Debug, Args, Clone)]
pub struct IdArgs {
    /// Content id.
    pub id: i64,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT", global = true)]
    pub database_max_connections: Option<u32>,

    /// Enable or disable the query cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_enabled: Option<bool>,

    /// Override the cache capacity.
    #[arg(long = "cache-capacity", value_name = "COUNT", global = true)]
    pub cache_capacity: Option<usize>,

    /// Override the base URL used for absolute content links.
    #[arg(long = "site-url", value_name = "URL", global = true)]
    pub site_url: Option<String>,

    /// Override the display time zone (IANA name).
    #[arg(long = "time-zone", value_name = "TZ", global = true)]
    pub time_zone: Option<String>,
}
