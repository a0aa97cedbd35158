#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod convert;
pub mod definition;
pub mod engine;
mod error;
pub mod provider;
pub mod retry;
pub mod schema;
pub mod transform;

#[doc(hidden)]
pub mod prelude;

pub use error::{WorkflowError, WorkflowResult};

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "weft_runtime";
