//! Per-host trust material: certificate bundles, connection settings and the
//! interactive flow that acquires them.

pub mod bootstrap;
pub mod connection;
pub mod recovery;
pub mod shell;
pub mod ssh;
pub mod store;

pub use bootstrap::{TrustBootstrap, Verification, check_bootstrapped};
pub use connection::{ConnectionConfig, SocksVersion};
pub use recovery::with_trust_recovery;
pub use shell::{CommandOutput, ConnectError, RemoteShell, RemoteShellConnector};
pub use ssh::Ssh2Connector;
pub use store::{BundleStatus, TrustRecord, TrustStore};
