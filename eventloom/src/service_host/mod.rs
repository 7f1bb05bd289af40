//! Supervision of long-running polling services.
//!
//! A [`ServiceHost`] repeatedly drives a set of [`Service`]s. Failures are logged
//! and followed by an exponential [`Backoff`] rather than ending the process.

mod backoff;
mod host;
mod service;

pub use backoff::Backoff;
pub use host::{RunSummary, ServiceHost, ServiceSummary};
pub use service::{Service, ServiceError};
