//! CLI module for flink-sd
//!
//! 引数は全て `FLINK_SD_*` 環境変数でも指定できる。

use std::path::PathBuf;

use clap::Parser;

use crate::extractor::{NoReporterPolicy, PartialPolicy};

/// Prometheus file-based service discovery for Flink applications on YARN
#[derive(Parser, Debug, Clone)]
#[command(name = "flink-sd")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    FLINK_SD_RM_ADDR              ResourceManager address (host:port or URL)
    FLINK_SD_APP_ID               Resolve a single application and exit
    FLINK_SD_NAME_FILTER          Application name pattern (anchored at start)
    FLINK_SD_APPLICATION_TYPE     Application type (default: Apache Flink)
    FLINK_SD_TARGET_DIR           Target file directory (default: stdout)
    FLINK_SD_POLL_INTERVAL        Poll interval in seconds (default: 5)
    FLINK_SD_SCRAPE_RETRIES       Extraction attempts per cycle, 0 = unlimited (default: 5)
    FLINK_SD_RETRY_INTERVAL       Seconds between extraction attempts (default: 1)
    FLINK_SD_REQUEST_TIMEOUT      HTTP request timeout in seconds (default: 30)
    FLINK_SD_LOG_LINE_BUDGET      Maximum log lines scanned per process
    FLINK_SD_PARTIAL_POLICY       require-all | allow-partial (default: require-all)
    FLINK_SD_NO_REPORTER_POLICY   exclude | block (default: exclude)
    FLINK_SD_NO_REFRESH           Do not re-derive already registered applications
    FLINK_SD_LOG_LEVEL            Log filter (default: info, falls back to RUST_LOG)
"#)]
pub struct Cli {
    /// YARN ResourceManager address
    #[arg(value_name = "RM_ADDR", env = "FLINK_SD_RM_ADDR")]
    pub rm_addr: String,

    /// Resolve this application once, write its targets and exit
    #[arg(long, env = "FLINK_SD_APP_ID")]
    pub app_id: Option<String>,

    /// Regex matched against the start of application names
    #[arg(long, env = "FLINK_SD_NAME_FILTER")]
    pub name_filter: Option<String>,

    /// Application type to watch (empty string watches all types)
    #[arg(long, default_value = "Apache Flink", env = "FLINK_SD_APPLICATION_TYPE")]
    pub application_type: String,

    /// Directory for `{app_id}.json` target files
    #[arg(long, env = "FLINK_SD_TARGET_DIR")]
    pub target_dir: Option<PathBuf>,

    /// Seconds between ResourceManager polls
    #[arg(long, default_value_t = 5.0, env = "FLINK_SD_POLL_INTERVAL")]
    pub poll_interval: f64,

    /// Extraction attempts per application and cycle (0 = unlimited)
    #[arg(long, default_value_t = 5, env = "FLINK_SD_SCRAPE_RETRIES")]
    pub scrape_retries: u32,

    /// Seconds between extraction attempts
    #[arg(long, default_value_t = 1.0, env = "FLINK_SD_RETRY_INTERVAL")]
    pub retry_interval: f64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30.0, env = "FLINK_SD_REQUEST_TIMEOUT")]
    pub request_timeout: f64,

    /// Maximum number of log lines scanned per process
    #[arg(long, env = "FLINK_SD_LOG_LINE_BUDGET")]
    pub log_line_budget: Option<usize>,

    /// How to treat applications where only some endpoints were found
    #[arg(
        long,
        value_enum,
        default_value_t = PartialPolicy::RequireAll,
        env = "FLINK_SD_PARTIAL_POLICY"
    )]
    pub partial_policy: PartialPolicy,

    /// How to treat processes that log "No metrics reporter configured"
    #[arg(
        long,
        value_enum,
        default_value_t = NoReporterPolicy::Exclude,
        env = "FLINK_SD_NO_REPORTER_POLICY"
    )]
    pub no_reporter_policy: NoReporterPolicy,

    /// Do not re-derive endpoints of already registered applications
    #[arg(long, default_value_t = false, env = "FLINK_SD_NO_REFRESH")]
    pub no_refresh: bool,
}
