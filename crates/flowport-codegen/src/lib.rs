//! Flowport Code Generation
//!
//! This crate handles the back half of workflow translation: ordering the
//! validated workflow and emitting a pandas pipeline with its configuration.
//!
//! # Pipeline Overview
//!
//! ```text
//! ┌──────────┐     ┌─────────┐     ┌─────────────┐     ┌──────────────┐
//! │ Workflow │────▶│   DAG   │────▶│ Externalize │────▶│  Generator   │
//! │ + Report │     │ (Order) │     │ (I/O,params)│     │ (pipeline.py)│
//! └──────────┘     └─────────┘     └─────────────┘     └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use flowport_codegen::{Converter, ConvertOptions};
//!
//! let converter = Converter::new(ConvertOptions::default());
//! let conversion = converter.convert_file("workflows/orders.yxmd")?;
//! conversion.write_artifacts("converted/orders", &converter.options().artifacts)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod compiler;
pub mod dag;
pub mod error;
pub mod expr;
pub mod externalize;
pub mod generator;
pub mod report;
pub mod transforms;

pub use compiler::{Conversion, ConvertOptions, Converter};
pub use dag::{Anomaly, Dag, DagBuilder, DagNode};
pub use error::{Error, Result};
pub use externalize::{PipelineConfig, externalize};
pub use generator::{GeneratedPipeline, Generator};
pub use report::ConversionReport;
