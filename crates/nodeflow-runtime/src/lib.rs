#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod definition;
pub mod engine;
mod error;
pub mod graph;
pub mod handler;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

#[doc(hidden)]
pub mod prelude;

pub use error::{
    BoxedError, NodeError, NodeErrorKind, NodeResult, WorkflowError, WorkflowResult,
};

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "nodeflow_runtime";
