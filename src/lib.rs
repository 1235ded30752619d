//! DeckForge: a workflow orchestration engine for the multi-stage
//! presentation-authoring pipeline (clarify → outline → research →
//! write → design → critique → polish).
//!
//! The engine itself is domain-agnostic: it walks a declarative
//! [`workflow::WorkflowDefinition`] against a [`model::WorkflowState`],
//! delegating all actual content generation to remote or in-process
//! workers through [`worker::WorkerClient`]. This crate owns the graph
//! execution, resilience, evidence retrieval, quality scoring,
//! telemetry and the thin HTTP surface above it — not the worker
//! prompts or model providers themselves.

pub mod api;
pub mod config;
pub mod error;
pub mod evidence;
pub mod ids;
pub mod model;
pub mod quality;
pub mod session;
pub mod state_store;
pub mod telemetry;
pub mod worker;
pub mod workflow;

pub use config::AppConfig;
pub use error::{WorkflowError, WorkflowResult};
