//! RabbitMQ client for publishing and consuming transcode tasks.

mod client;
mod error;

pub use client::{AmqpClient, AmqpConfig, TranscodeQueue};
pub use error::{QueueError, QueueResult};
