pub mod confirmation;
pub mod progress;
pub mod telemetry;
pub mod types;
pub mod utils;
