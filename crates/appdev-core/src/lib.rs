//! Appdev Core Library
//!
//! Domain logic for developing apps against a remote app server: per-host
//! trust bootstrap, development-app registration and package deployment.

pub mod api;
pub mod config;
pub mod container;
pub mod context;
pub mod deploy;
pub mod error;
pub mod manifest;
pub mod operator;
pub mod registration;
pub mod trust;
pub mod workspace;

pub use error::{Error, Result};

/// Re-exports of commonly used types
pub mod prelude {
    // Context and configuration
    pub use crate::config::{ConfigPaths, ResolvedServer, ServerDefaults, Settings};
    pub use crate::context::AppContext;
    pub use crate::error::{Error, Result, strip_errno_prefix};
    pub use crate::operator::Operator;

    // Trust
    pub use crate::trust::{
        BundleStatus, ConnectionConfig, Ssh2Connector, TrustBootstrap, TrustRecord, TrustStore,
        Verification, check_bootstrapped, with_trust_recovery,
    };

    // Remote API
    pub use crate::api::{AppServer, AppStatus, RemoteId, RestAppClient, UPLOAD_TIMEOUT};

    // Workflows
    pub use crate::container::{ContainerRuntime, DockerCli};
    pub use crate::deploy::{DeployOutcome, DeploymentCoordinator, Submission};
    pub use crate::registration::{
        DeregisterOutcome, RegistrationCoordinator, finish_deregister, instance_id_for,
    };
    pub use crate::workspace::Workspace;
}
