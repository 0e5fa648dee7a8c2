pub mod batch;
pub mod common;
pub mod events;
pub mod intent;
pub mod solution;
pub mod solver;

pub use batch::*;
pub use common::*;
pub use events::*;
pub use intent::*;
pub use solution::*;
pub use solver::*;
