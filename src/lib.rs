/*
 * A traffic light that other threads can synchronise on.
 *
 * The light flips between red and green on a random timer in a background
 * thread, and publishes each change through a `BlockingQueue`. Vehicles call
 * `TrafficLight::wait_for_green` to hold until it is their turn.
 */

pub mod blocking_queue;
pub mod error;
pub mod trafficlight;

pub use blocking_queue::BlockingQueue;
pub use error::SignalError;
pub use trafficlight::timing::CycleTiming;
pub use trafficlight::{Phase, TrafficLight};
