//! Installation-wide configuration.
//!
//! - `paths`: where per-host and default-server state lives on disk
//! - `settings`: environment-derived switches and timeouts
//! - `server`: default server/user resolution and persistence

pub mod paths;
pub mod server;
pub mod settings;

pub use paths::ConfigPaths;
pub use server::{ResolvedServer, ServerDefaults, ServerDefaultsStore, resolve_server};
pub use settings::Settings;
