//! Application configuration

mod settings;

pub use settings::{
    DatabaseSettings, EngineSettings, FmpSettings, ProviderSettings, Settings, StorageSettings,
    UniverseSettings,
};
