//! `OpenStack` service access.
//!
//! The reconciler talks to the cloud through the traits in [`api`];
//! [`OpenStackClient`] implements them over the REST APIs.

pub mod api;
mod client;
mod services;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use api::{
    BareMetalApi, CloudApi, CloudConnector, ComputeApi, IdentityApi, NetworkApi, ObjectStoreApi,
    OrchestrationApi, WorkflowApi,
};
pub use client::{OpenStackClient, OpenStackConnector, identity_base, versioned, with_query};
pub use types::Credentials;
