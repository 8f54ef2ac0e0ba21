//! Remote application API.
//!
//! [`AppServer`] is the seam the coordinators depend on; [`RestAppClient`]
//! implements it over HTTPS with [`HttpClient`].

pub mod client;
pub mod endpoints;
pub mod http;
pub mod types;

pub use client::{AppServer, RestAppClient};
pub use http::{HttpClient, UPLOAD_TIMEOUT};
pub use types::{
    AppStatus, Application, ApplicationState, CapableUser, DevAppEntry, RemoteId, TaskResponse,
};
