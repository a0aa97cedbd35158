#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod agent;
pub mod chain;
mod error;
pub mod execution;
pub mod executor;
pub mod registry;
pub mod store;
pub mod tools;
pub mod workflow;

#[doc(hidden)]
pub mod prelude;

pub use error::{ServiceError, ServiceResult};

/// Tracing target for service operations.
pub const TRACING_TARGET: &str = "weft_service";
