pub mod audit;
pub mod connection;
pub mod findings;
pub mod runs;
pub mod schema;
pub mod snapshots;
pub mod tasks;

pub use connection::Database;
pub use findings::FindingQuery;
pub use runs::StaleRun;
