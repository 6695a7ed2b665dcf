//! Ask Data - conversational data exploration client
//!
//! A chat engine for asking natural-language questions about a dataset or
//! dashboard. One engine drives every surface: the session runtime owns the
//! conversation and request lifecycle, and thin views render it.

pub mod action;
pub mod backend;
pub mod config;
pub mod context;
pub mod conversation;
pub mod presentation;
pub mod runtime;
pub mod state_machine;

pub use backend::{ChatBackend, HttpBackend, LoggingBackend};
pub use config::ClientConfig;
pub use context::{ContextProvider, ContextSynchronizer};
pub use runtime::{mount, MountParams, SessionHandle, SessionView, SubmitOutcome};
