pub mod timing;

use core::sync::atomic::{AtomicU8, Ordering};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embassy_futures::select::{Either, select};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use embassy_time::Timer;
use enum_ordinalize::Ordinalize;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, info, trace, warn};

use crate::blocking_queue::BlockingQueue;
use crate::error::SignalError;
use timing::CycleTiming;

#[derive(Debug, Ordinalize, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Phase {
    Red,
    Green,
}

impl Phase {
    pub fn toggled(self) -> Phase {
        match self {
            Phase::Red => Phase::Green,
            Phase::Green => Phase::Red,
        }
    }

    pub fn red(&self) -> bool {
        *self == Phase::Red
    }

    pub fn green(&self) -> bool {
        *self == Phase::Green
    }
}

/*
 * Everything the background thread and the callers have in common. The phase
 * is written only by the background thread, so an atomic is all the
 * synchronisation the snapshot read needs. Phase changes are stored before
 * they are sent, so a consumer that received a phase will never read an older
 * one afterwards.
 */
struct Shared {
    phase: AtomicU8,
    queue: BlockingQueue<Phase>,
    stop: Signal<CriticalSectionRawMutex, ()>,
}

impl Shared {
    fn current_phase(&self) -> Phase {
        Phase::from_ordinal(self.phase.load(Ordering::Acquire)).unwrap_or(Phase::Red)
    }

    fn publish(&self, phase: Phase) {
        self.phase.store(phase.ordinal(), Ordering::Release);
        self.queue.send(phase);
    }
}

enum Worker {
    Idle,
    Running(JoinHandle<()>),
    Stopped,
}

/*
 * A traffic light that changes between red and green on its own, on a random
 * timer, once `simulate` has been called.
 *
 * Vehicles call `wait_for_green` to hold until the light turns green. Each
 * change to green is handed to exactly one waiting vehicle; the others keep
 * waiting for the next green. This mirrors a real crossing, where one car
 * goes at a time.
 */
pub struct TrafficLight {
    shared: Arc<Shared>,
    timing: CycleTiming,
    worker: Mutex<Worker>,
}

impl TrafficLight {
    pub fn new() -> Self {
        Self::with_timing(CycleTiming::default())
    }

    pub fn with_timing(timing: CycleTiming) -> Self {
        TrafficLight {
            shared: Arc::new(Shared {
                phase: AtomicU8::new(Phase::Red.ordinal()),
                queue: BlockingQueue::new(),
                stop: Signal::new(),
            }),
            timing,
            worker: Mutex::new(Worker::Idle),
        }
    }

    pub fn timing(&self) -> CycleTiming {
        self.timing
    }

    /// Snapshot of the phase the light shows right now. Never blocks.
    pub fn current_phase(&self) -> Phase {
        self.shared.current_phase()
    }

    pub fn is_running(&self) -> bool {
        match &*self.lock_worker() {
            Worker::Running(handle) => !handle.is_finished(),
            Worker::Idle | Worker::Stopped => false,
        }
    }

    /// Block until this caller sees the light change to green.
    ///
    /// Red changes are skipped. Fails with [`SignalError::Stopped`] when the
    /// light is stopped while waiting.
    pub fn wait_for_green(&self) -> Result<(), SignalError> {
        loop {
            match self.shared.queue.receive() {
                Some(Phase::Green) => return Ok(()),
                Some(phase) => trace!(?phase, "still waiting for green"),
                None => return Err(SignalError::Stopped),
            }
        }
    }

    /// Like [`wait_for_green`](Self::wait_for_green), but returns `Ok(false)`
    /// when no green arrives within `timeout`.
    pub fn wait_for_green_timeout(&self, timeout: Duration) -> Result<bool, SignalError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.shared.queue.receive_timeout(remaining) {
                Some(Phase::Green) => return Ok(true),
                Some(phase) => trace!(?phase, "still waiting for green"),
                None if self.shared.queue.is_closed() => return Err(SignalError::Stopped),
                None => return Ok(false),
            }
        }
    }

    /// Start changing phases on a background thread. A light runs at most
    /// once: starting it again, or after `stop`, is an error.
    pub fn simulate(&self) -> Result<(), SignalError> {
        let mut worker = self.lock_worker();
        match &*worker {
            Worker::Idle => {}
            // A producer that exited on its own has closed the queue.
            Worker::Running(handle) if handle.is_finished() => return Err(SignalError::Stopped),
            Worker::Running(_) => return Err(SignalError::AlreadyRunning),
            Worker::Stopped => return Err(SignalError::Stopped),
        }

        let shared = Arc::clone(&self.shared);
        let timing = self.timing;
        let handle = thread::Builder::new()
            .name("traffic-light".into())
            .spawn(move || {
                let _close_on_exit = CloseOnExit(&shared.queue);
                futures::executor::block_on(cycle_through_phases(
                    &shared,
                    timing,
                    StdRng::from_entropy(),
                ))
            })?;

        *worker = Worker::Running(handle);
        info!(min = ?timing.min(), max = ?timing.max(), "traffic light started");
        Ok(())
    }

    /// Stop the background thread and release every waiting caller.
    /// Idempotent; also called on drop.
    pub fn stop(&self) {
        let previous = mem::replace(&mut *self.lock_worker(), Worker::Stopped);

        self.shared.stop.signal(());
        self.shared.queue.close();

        if let Worker::Running(handle) = previous {
            if handle.join().is_err() {
                warn!("traffic light thread panicked");
            }
            info!(phase = ?self.current_phase(), "traffic light stopped");
        }
    }

    fn lock_worker(&self) -> MutexGuard<'_, Worker> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TrafficLight {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrafficLight {
    fn drop(&mut self) {
        self.stop();
    }
}

// Runs on every way out of the producer thread, panics included, so waiting
// callers are never left behind a producer that is gone.
struct CloseOnExit<'a>(&'a BlockingQueue<Phase>);

impl Drop for CloseOnExit<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/*
 * The producer. Each cycle races a timer for the drawn duration against the
 * stop signal, so stopping never has to wait out a cycle.
 */
async fn cycle_through_phases<R: Rng>(shared: &Shared, timing: CycleTiming, mut rng: R) {
    loop {
        let cycle = timing.draw(&mut rng);
        let timer = Timer::after(embassy_time::Duration::from_millis(
            u64::try_from(cycle.as_millis()).unwrap_or(u64::MAX),
        ));

        match select(timer, shared.stop.wait()).await {
            Either::First(()) => {
                let phase = shared.current_phase().toggled();
                shared.publish(phase);
                debug!(?phase, ?cycle, "phase changed");
            }
            Either::Second(()) => break,
        }
    }
}
