pub mod analysis;
pub mod findings;
pub mod health;
