//! Development-app registration lifecycle per (workspace, server).
//!
//! Unregistered -> Preregistered -> Registered. The local record is only a
//! hint; the server's list of development apps decides what exists.

pub mod coordinator;
pub mod dev_app;
pub mod record;

pub use coordinator::{
    DeregisterOutcome, MIN_DEV_APP_VERSION, RegistrationCoordinator, finish_deregister,
};
pub use dev_app::DevApp;
pub use record::{LocalRegistrationRecord, instance_id_for};
