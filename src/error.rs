use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("traffic light is already running")]
    AlreadyRunning,

    #[error("traffic light has been stopped")]
    Stopped,

    #[error("invalid cycle timing: min {min:?}, max {max:?}")]
    InvalidTiming { min: Duration, max: Duration },

    #[error("failed to start the traffic light thread")]
    Spawn(#[from] std::io::Error),
}
