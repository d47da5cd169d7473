//! Logging setup and the engine status board.

mod logging;
mod status;

pub use logging::setup_logging;
pub use status::{EngineStatus, PositionStatus, StatusBoard};
