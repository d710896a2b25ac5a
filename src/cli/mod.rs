//! CLI command handlers

pub mod commands;

pub use commands::{
    columns, export, parse_filter, plot, serve, sheets, show, OutputFormat, PipelineOptions,
};
