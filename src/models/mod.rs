pub mod finding;
pub mod framework;
pub mod run;
pub mod signal;
pub mod snapshot;
pub mod task;

pub use finding::*;
pub use framework::*;
pub use run::*;
pub use signal::*;
pub use snapshot::*;
pub use task::*;
