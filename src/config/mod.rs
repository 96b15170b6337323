mod collection_config;

pub use collection_config::{
    load_or_create_config,
    CollectionConfig,
    CompressionConfig,
    HashingConfig,
    ModuleSettings,
    ReportConfig,
};
