//! # Procflow
//!
//! Procflow is an embeddable workflow orchestration engine written in Rust.
//! Business processes are directed graphs of typed nodes connected by
//! conditional, priority-ordered transitions.
//!
//! ## Core Features
//!
//! - **Pluggable executors**: every node type is a [`NodeExecutor`] in a registry
//! - **Suspend and resume**: nodes may park an instance until `continue_workflow`
//! - **Async nodes and parallel fan-out**: bounded concurrency with fail-fast
//! - **Templates**: reusable workflows materialized from `${key}` parameters
//! - **Events**: subscribe to instance and node lifecycle through [`ChannelEvent`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use procflow::{ManagerBuilder, Vars, WorkflowDefinition};
//!
//! let manager = ManagerBuilder::new().build()?;
//! manager.launch();
//!
//! let definition = WorkflowDefinition::from_json(json_str)?;
//! manager.register_workflow_definition(definition)?;
//! let instance = manager.start_workflow("order", Vars::new().with("amount", 150)).await?;
//! ```

mod builder;
mod common;
mod config;
mod dispatcher;
mod engine;
mod error;
mod manager;
mod model;
mod runtime;
mod utils;

pub mod events;
pub mod workflow;

pub use builder::ManagerBuilder;
pub use common::{Registry, Vars};
pub use config::{Config, EngineConfig, ExpressionConfig, ParallelConfig};
pub use engine::Engine;
pub use error::ProcflowError;
pub use manager::WorkflowManager;
pub use model::*;
pub use runtime::{Channel, ChannelEvent, ChannelOptions, Context};
pub use workflow::{
    actions::{ExecutionResult, ExecutionStatus, NodeExecutor, NotificationMessage, Notifier, ServiceInvoker},
    expression::{ExpressionEvaluator, JsExpressionEvaluator},
};

/// Result type alias for Procflow operations.
pub type Result<T> = std::result::Result<T, ProcflowError>;
