/*
 * A blocking queue to hand values from one thread to another.
 *
 * Producers never wait: `send` only takes the lock long enough to push. A
 * consumer that finds the queue empty is suspended on a condition variable
 * until a producer hands it something, or until the queue is closed.
 *
 * Values come out newest-first. That sounds odd for a queue, but our values
 * describe *current state*, not events. A consumer that fell behind does not
 * want to replay a backlog of stale phases, it wants to know what the light
 * shows right now. So the most recently sent value is always the next one to
 * be received.
 */

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct BlockingQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        BlockingQueue {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    // A panicking holder cannot leave the deque half-updated, so a poisoned
    // lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a value and wake one waiting consumer.
    ///
    /// Values sent after [`close`](Self::close) are still stored and can be
    /// taken with [`try_receive`](Self::try_receive) or `receive`.
    pub fn send(&self, value: T) {
        self.lock().items.push_back(value);
        self.available.notify_one();
    }

    /// Block until a value is available and return the newest one.
    ///
    /// Returns `None` only once the queue is both closed and empty. On a
    /// queue that is never closed this waits for as long as it takes.
    pub fn receive(&self) -> Option<T> {
        let inner = self
            .available
            .wait_while(self.lock(), |inner| {
                inner.items.is_empty() && !inner.closed
            })
            .unwrap_or_else(PoisonError::into_inner);
        Self::take_newest(inner)
    }

    /// Like [`receive`](Self::receive), but give up after `timeout`.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        while inner.items.is_empty() && !inner.closed {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            inner = self
                .available
                .wait_timeout(inner, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Self::take_newest(inner)
    }

    pub fn try_receive(&self) -> Option<T> {
        self.lock().items.pop_back()
    }

    fn take_newest(mut inner: MutexGuard<'_, Inner<T>>) -> Option<T> {
        inner.items.pop_back()
    }

    /// Release every blocked consumer. Idempotent.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn newest_value_comes_out_first() {
        let queue = BlockingQueue::new();
        for i in 0..5 {
            queue.send(i);
        }
        assert_eq!(queue.receive(), Some(4));
        assert_eq!(queue.receive(), Some(3));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn try_receive_does_not_block_on_empty_queue() {
        let queue: BlockingQueue<u8> = BlockingQueue::default();
        assert_eq!(queue.try_receive(), None);
        queue.send(7);
        assert_eq!(queue.try_receive(), Some(7));
        assert!(queue.is_empty());
    }

    #[test]
    fn receive_waits_for_a_send() {
        let queue = Arc::new(BlockingQueue::new());
        let (done_tx, done_rx) = mpsc::channel();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let value = queue.receive();
                done_tx.send(()).unwrap();
                value
            })
        };

        // Nothing was sent, so the consumer must still be parked.
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

        queue.send("hello");
        assert_eq!(consumer.join().unwrap(), Some("hello"));
    }

    #[test]
    fn receive_timeout_gives_up() {
        let queue: BlockingQueue<u32> = BlockingQueue::new();
        let started = Instant::now();
        assert_eq!(queue.receive_timeout(Duration::from_millis(50)), None);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn receive_timeout_returns_value_sent_while_waiting() {
        let queue = Arc::new(BlockingQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.send(42);
            })
        };
        assert_eq!(queue.receive_timeout(Duration::from_secs(5)), Some(42));
        producer.join().unwrap();
    }

    #[test]
    fn close_releases_blocked_consumers() {
        let queue: Arc<BlockingQueue<u32>> = Arc::new(BlockingQueue::new());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.receive())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        queue.close();
        queue.close();

        for consumer in consumers {
            assert_eq!(consumer.join().unwrap(), None);
        }
        assert!(queue.is_closed());
    }

    #[test]
    fn closed_queue_still_drains() {
        let queue = BlockingQueue::new();
        queue.send(1);
        queue.send(2);
        queue.close();
        assert_eq!(queue.receive(), Some(2));
        assert_eq!(queue.receive_timeout(Duration::from_secs(1)), Some(1));
        assert_eq!(queue.receive(), None);
    }
}
