pub mod config;
pub mod paths;

pub use config::{ApiConfig, CacheConfig, CleanTargetConfig, Config, InputConfig, ListKind, LookupKind, TaskConfig};
pub use paths::{PathManager, container_base_path};
