//! Video lifecycle services shared by the API and worker processes.
//!
//! [`LifecycleService`] owns create / trigger-process / get against the
//! authoritative store; [`CachedVideoService`] decorates it with a TTL
//! cache, per-key request coalescing, and CDN URL enrichment.

mod cached;
mod error;
mod lifecycle;
mod service;
mod singleflight;

#[cfg(test)]
mod testutil;

pub use cached::{CachedVideoConfig, CachedVideoService};
pub use error::{ServiceError, ServiceResult};
pub use lifecycle::{LifecycleConfig, LifecycleService};
pub use service::{CreateVideoInput, CreateVideoOutput, VideoService};
pub use singleflight::Singleflight;
