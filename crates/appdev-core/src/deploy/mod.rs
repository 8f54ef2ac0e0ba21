//! Packaged app deployment and post-deploy operations.

pub mod coordinator;
pub mod pause;

pub use coordinator::{
    AppStatusReport, DeployOutcome, DeploymentCoordinator, FinalState, POLL_INTERVAL, Submission,
};
pub use pause::{Pause, ThreadSleep};
