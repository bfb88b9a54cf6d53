use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Bounded multi-producer/multi-consumer work queue.
///
/// `push` blocks while the queue is full; `pop` waits at most `timeout`. The
/// queue owns both channel ends, so it never disconnects while alive.
pub struct WorkQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> WorkQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    pub fn push(&self, item: T) {
        // both ends live in self, so send cannot observe a disconnect
        let _ = self.tx.send(item);
    }

    pub fn pop(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_pop_times_out_on_empty_queue() {
        let queue: WorkQueue<u32> = WorkQueue::new(4);
        let start = Instant::now();
        assert_eq!(queue.pop(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_fifo_single_consumer() {
        let queue = WorkQueue::new(4);
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(Duration::from_millis(10)), Some(1));
        assert_eq!(queue.pop(Duration::from_millis(10)), Some(2));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_consumers_drain_everything_before_exit() {
        let queue = WorkQueue::new(2);
        let consumed = AtomicUsize::new(0);
        let producing = AtomicBool::new(true);
        thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| loop {
                    match queue.pop(Duration::from_millis(10)) {
                        Some(_) => {
                            consumed.fetch_add(1, Ordering::Relaxed);
                        }
                        None if !producing.load(Ordering::Acquire) => break,
                        None => {}
                    }
                });
            }
            for i in 0..100 {
                queue.push(i);
            }
            producing.store(false, Ordering::Release);
        });
        assert_eq!(consumed.load(Ordering::Relaxed), 100);
    }
}
