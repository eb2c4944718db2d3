// Adapters - External system implementations

pub mod json_store;
pub mod status_file;
pub mod toml_config;

// Re-export adapters
pub use json_store::JsonProjectStore;
pub use status_file::FileStatusSink;
pub use toml_config::{ConfigLoader, MixerConfig};
