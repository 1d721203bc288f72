pub mod controller;
pub mod schedule;

pub use controller::{Failure, GenerationPhase, PollController, TIMEOUT_MESSAGE};
pub use schedule::PollSchedule;
