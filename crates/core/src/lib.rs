//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise agent runtime.
//! This crate performs **no I/O**. It defines the model that the backend,
//! tool, and loop crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the ReAct loop is a trait here. Implementations live
//! in their respective crates:
//! - [`Backend`]: implemented by `stepwise-providers`
//! - [`Tool`]: implemented by built-in and plugin tools in `stepwise-tools`
//!
//! Run bookkeeping ([`RunState`], [`Transcript`], [`Step`]) and the immutable
//! [`RunConfig`] are plain data shared by all crates.

pub mod backend;
pub mod error;
pub mod run_config;
pub mod tool;
pub mod transcript;

// Re-export key types at crate root for ergonomics
pub use backend::Backend;
pub use error::{BackendError, Error, Result, StateError, ToolError};
pub use run_config::{BackendKind, BackendSettings, RunConfig};
pub use tool::{ActionInput, Tool, ToolDescriptor};
pub use transcript::{
    FailureReason, ObservationKind, RunState, RunStatus, Step, Transcript, truncate_text,
};
