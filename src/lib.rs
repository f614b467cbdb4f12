//! Repository compliance analysis.
//!
//! Scans an extracted source snapshot for security signals, maps them onto
//! compliance framework controls and stores graded findings with remediation
//! tasks. The [`pipeline::AnalysisOrchestrator`] drives a run through its
//! fixed phase sequence; [`findings::FindingsService`] serves and reviews
//! the results.

pub mod api;
pub mod audit;
pub mod cli;
pub mod config;
pub mod db;
pub mod detector;
pub mod errors;
pub mod findings;
pub mod mapper;
pub mod models;
pub mod pipeline;
