// A few vehicles queueing at one traffic light. Each vehicle crosses a couple
// of times, waiting for green before every crossing. Set RUST_LOG=debug to
// see every phase change.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use traffic_signal::{CycleTiming, TrafficLight};

const NUM_VEHICLES: usize = 3;
const CROSSINGS_PER_VEHICLE: usize = 2;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let trafficlight = Arc::new(TrafficLight::with_timing(CycleTiming::default()));
    trafficlight.simulate().context("starting the traffic light")?;

    let vehicles = (0..NUM_VEHICLES)
        .map(|id| {
            let trafficlight = Arc::clone(&trafficlight);
            thread::Builder::new()
                .name(format!("vehicle-{id}"))
                .spawn(move || -> Result<()> {
                    for crossing in 0..CROSSINGS_PER_VEHICLE {
                        let phase = trafficlight.current_phase();
                        info!(id, crossing, ?phase, "waiting at the light");
                        trafficlight.wait_for_green()?;
                        info!(id, crossing, "crossing");
                        thread::sleep(Duration::from_millis(500));
                    }
                    Ok(())
                })
                .context("starting a vehicle")
        })
        .collect::<Result<Vec<_>>>()?;

    for vehicle in vehicles {
        vehicle
            .join()
            .map_err(|_| anyhow::anyhow!("vehicle thread panicked"))??;
    }

    trafficlight.stop();
    Ok(())
}
