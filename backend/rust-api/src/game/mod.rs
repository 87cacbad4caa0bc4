pub mod driver;
pub mod engine;
pub mod scheduler;

pub use driver::{DriverTiming, SessionDriver};
pub use engine::{EngineError, GameEngine, TickOutcome};
pub use scheduler::{Scheduler, TaskHandle, TokioScheduler};
