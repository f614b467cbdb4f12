pub mod service;
pub mod tasks;

pub use service::{CreatedFindings, FindingsService};
