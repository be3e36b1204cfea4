use crate::proxy::ProxyProtocol;
use crate::storage::WriteMode;
use serde::Deserialize;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    pub proxy: ProxyConfig,
    pub storage: StorageConfig,
    pub report: ReportConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(rename = "category", default)]
    pub categories: Vec<CategoryEntry>,
}

/// HTTP fetch and retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Maximum attempts per URL, each through a different proxy
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Whole-request timeout per attempt (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// TCP/TLS connect timeout per attempt (seconds)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Pause between two attempts on the same URL (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

/// Which proxy backend to use and the settings of each backend
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    pub backend: ProxyBackend,
    pub residential: Option<ResidentialConfig>,
    pub relay: Option<RelayConfig>,
    #[serde(rename = "public-list")]
    pub public_list: Option<PublicListConfig>,
}

/// Proxy backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyBackend {
    Residential,
    Relay,
    PublicList,
}

/// Residential gateway (rotating exit IP behind a single endpoint)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResidentialConfig {
    pub host: String,
    pub port: u16,
    pub username: String,

    /// Inline password; prefer `password-env` for real deployments
    pub password: Option<String>,

    /// Name of the environment variable holding the password
    pub password_env: Option<String>,

    /// Exit country codes, e.g. `["kz", "ru"]`
    #[serde(default)]
    pub countries: Vec<String>,

    /// Tag every handle with a fresh session id
    #[serde(default)]
    pub sticky_sessions: bool,
}

/// Local anonymizing relay (SOCKS5, e.g. Tor)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelayConfig {
    #[serde(default = "default_relay_host")]
    pub host: String,

    #[serde(default = "default_relay_port")]
    pub port: u16,
}

/// Plain list of public proxies
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PublicListConfig {
    /// Inline `host:port` entries
    #[serde(default)]
    pub proxies: Vec<String>,

    /// File with one `host:port` per line, merged into `proxies` at load time
    pub file: Option<String>,

    #[serde(default)]
    pub protocol: ProxyProtocol,

    /// Shuffle the list once before use
    #[serde(default = "default_true")]
    pub shuffle: bool,

    /// Consecutive retryable failures before a proxy is dropped from rotation
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
}

/// Output database configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// What to do when a scraped id is already stored
    #[serde(default)]
    pub write_mode: WriteMode,
}

/// Skip report configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportConfig {
    /// Path of the JSON skip report
    pub skip_report_path: String,

    /// Also flush after every N recorded entries
    pub flush_every: Option<usize>,
}

/// How category pages are addressed and when a category gives up
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PaginationConfig {
    /// Path appended to the category URL; `{page}` is replaced by the page number
    #[serde(default = "default_page_path")]
    pub page_path: String,

    /// Hard cap on pages per category
    pub max_pages: Option<u32>,

    /// Stop a category after this many failed pages in a row
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_path: default_page_path(),
            max_pages: None,
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

/// Category entry point
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    pub url: String,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()
}

fn default_relay_host() -> String {
    "127.0.0.1".to_string()
}

fn default_relay_port() -> u16 {
    9050
}

fn default_true() -> bool {
    true
}

fn default_max_failures() -> u32 {
    3
}

fn default_page_path() -> String {
    "page-{page}/?sort=date".to_string()
}

fn default_max_consecutive_failures() -> u32 {
    3
}
