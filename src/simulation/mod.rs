pub mod engine;

pub use engine::{ProgressSink, RouteSimulator, RunOutcome};
