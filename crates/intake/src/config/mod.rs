pub mod loader;
pub mod schema;

pub use loader::{is_valid_table_name, load_config, load_config_from_str};
pub use schema::{
    ClassifierStrategy, Config, ConversationConfig, DirectoryConfig, GenerationConfig,
    LoggingConfig, OcrConfig, OcrProviderKind, PersistenceConfig, PreprocessPolicy, ScanConfig,
    SecretSource, StorageConfig,
};
