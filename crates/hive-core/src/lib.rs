pub mod config;
pub mod registry;
pub mod types;

pub use config::EngineConfig;
pub use registry::RegistryError;
pub use types::*;
