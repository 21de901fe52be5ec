//! Flowport Core Library
//!
//! This crate provides the front half of workflow translation:
//! - Workflow model (tools, connections, tool configuration)
//! - Tool capability registry and risk patterns
//! - XML workflow parsing
//! - Validation into a translation verdict
//! - Project configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Document   │────▶│   Parser    │────▶│  Validator  │────▶ flowport-codegen
//! │   (XML)     │     │             │     │ (Registry)  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use flowport_core::{Parser, Registry, validate};
//!
//! let workflow = Parser::new().parse_file("orders.yxmd")?;
//! let report = validate(&workflow, Registry::global());
//! println!("{}: {}", workflow.name, report.status);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod parser;
pub mod registry;
pub mod validator;
pub mod workflow;

pub use config::{Config, CyclePolicy, ProjectConfig};
pub use error::{Error, Result};
pub use parser::Parser;
pub use registry::{Capability, Operation, Registry};
pub use validator::{RiskLevel, Status, ToolVerdict, WorkflowReport, validate};
pub use workflow::{Connection, Tool, ToolConfig, ToolId, Workflow};
