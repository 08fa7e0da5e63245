pub mod command;
pub mod telemetry;
pub mod threat;

pub use command::OperatorCommand;
pub use telemetry::{FcHealth, StatusReport};
pub use threat::Threat;
