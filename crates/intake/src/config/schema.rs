use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where a secret comes from: a direct value, a file, or an environment variable.
/// Resolved in that order by [`crate::secrets::resolve_secret`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretSource {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub env_var: Option<String>,
}

impl SecretSource {
    pub fn from_env_var(name: &str) -> Self {
        Self {
            value: None,
            file: None,
            env_var: Some(name.to_string()),
        }
    }

    pub fn resolve(&self) -> crate::secrets::Result<secrecy::SecretString> {
        crate::secrets::resolve_secret(
            self.value.as_deref(),
            self.file.as_deref(),
            self.env_var.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Base URL prepended to stored object paths. Defaults to a `file://` URL of `root`.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

fn default_storage_root() -> String {
    "uploads".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            public_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrProviderKind {
    Vision,
    Tesseract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_provider")]
    pub provider: OcrProviderKind,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_vision_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_vision_key")]
    pub api_key: SecretSource,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_ocr_provider() -> OcrProviderKind {
    OcrProviderKind::Vision
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_vision_endpoint() -> String {
    "https://vision.googleapis.com/v1/images:annotate".to_string()
}

fn default_vision_key() -> SecretSource {
    SecretSource::from_env_var("GOOGLE_VISION_API_KEY")
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            provider: default_ocr_provider(),
            languages: default_languages(),
            endpoint: default_vision_endpoint(),
            api_key: default_vision_key(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_key")]
    pub api_key: SecretSource,
    #[serde(default = "default_generation_timeout")]
    pub request_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_generation_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_generation_key() -> SecretSource {
    SecretSource::from_env_var("OPENAI_API_KEY")
}

fn default_generation_timeout() -> u64 {
    60
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_generation_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            api_key: default_generation_key(),
            request_timeout_secs: default_generation_timeout(),
        }
    }
}

/// Which FieldClassifier strategy the scan flow uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierStrategy {
    Table,
    LanguageModel,
}

/// Which preprocessing policy runs before OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreprocessPolicy {
    /// Grayscale, 5x5 Gaussian smoothing, contrast stretch x1.5.
    #[default]
    SmoothContrast,
    /// Grayscale, 1.5x upsample, adaptive mean threshold.
    UpsampleThreshold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_strategy")]
    pub strategy: ClassifierStrategy,
    #[serde(default)]
    pub preprocess: PreprocessPolicy,
    #[serde(default = "default_scan_timeout")]
    pub timeout_secs: u64,
}

fn default_strategy() -> ClassifierStrategy {
    ClassifierStrategy::LanguageModel
}

fn default_scan_timeout() -> u64 {
    60
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            preprocess: PreprocessPolicy::default(),
            timeout_secs: default_scan_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Number of entry blocks in the multi-entry expense form.
    #[serde(default = "default_form_entries")]
    pub form_entries: usize,
    /// Lifetime of a login session token.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

fn default_form_entries() -> usize {
    5
}

fn default_session_ttl() -> u64 {
    3600
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            form_entries: default_form_entries(),
            session_ttl_secs: default_session_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Header row written to a newly created expense record.
    #[serde(default = "default_template_header")]
    pub template_header: Vec<String>,
}

fn default_template_header() -> Vec<String> {
    ["Description", "Date", "Vendor", "Receipt", "Amount"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            template_header: default_template_header(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_summary_table")]
    pub summary_table: String,
    #[serde(default = "default_expenses_table")]
    pub expenses_table: String,
}

fn default_summary_table() -> String {
    "report_summaries".to_string()
}

fn default_expenses_table() -> String {
    "report_expenses".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            summary_table: default_summary_table(),
            expenses_table: default_expenses_table(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Resolves the SQLite path: the configured one, or `~/.intake/data/intake.db`.
    pub fn database_path(&self) -> Option<std::path::PathBuf> {
        self.database_path
            .as_ref()
            .map(std::path::PathBuf::from)
            .or_else(crate::db::default_database_path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            storage: StorageConfig::default(),
            ocr: OcrConfig::default(),
            generation: GenerationConfig::default(),
            scan: ScanConfig::default(),
            conversation: ConversationConfig::default(),
            directory: DirectoryConfig::default(),
            persistence: PersistenceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
