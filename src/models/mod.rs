pub mod catalog;
pub mod generation;
pub mod task;

pub use catalog::*;
pub use generation::*;
pub use task::*;
