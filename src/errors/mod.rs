pub mod types;
pub mod classification;

pub use types::AttestorError;
pub use classification::ErrorClassification;
