use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::debug;

/// One-shot delayed messages, at most one pending per key.
///
/// A repeating timer is built by having the receiver schedule the next firing
/// after handling the current one; dropping the reschedule ends the chain.
pub struct TimerSupervisor<K, M> {
    tx: mpsc::UnboundedSender<M>,
    pending: HashMap<K, JoinHandle<()>>,
}

impl<K, M> TimerSupervisor<K, M>
where
    K: Eq + Hash + std::fmt::Debug,
    M: Send + 'static,
{
    pub fn new(tx: mpsc::UnboundedSender<M>) -> Self {
        Self {
            tx,
            pending: HashMap::new(),
        }
    }

    /// Delivers `message` after `after`, replacing any firing pending for `key`.
    pub fn schedule(&mut self, key: K, after: Duration, message: M) {
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            sleep(after).await;
            let _ = tx.send(message);
        });
        if let Some(previous) = self.pending.insert(key, task) {
            previous.abort();
        }
    }

    pub fn cancel(&mut self, key: &K) {
        if let Some(task) = self.pending.remove(key) {
            debug!(timer = ?key, "timer cancelled");
            task.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, task) in self.pending.drain() {
            task.abort();
        }
    }

    pub fn pending(&mut self) -> usize {
        self.pending.retain(|_, task| !task.is_finished());
        self.pending.len()
    }
}

impl<K, M> Drop for TimerSupervisor<K, M> {
    fn drop(&mut self) {
        for (_, task) in self.pending.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TimerSupervisor;
    use tokio::sync::mpsc;
    use tokio::time::{Duration, advance};

    #[tokio::test(start_paused = true)]
    async fn scheduled_message_arrives_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerSupervisor::new(tx);
        timers.schedule("logs", Duration::from_secs(2), 7_u64);

        advance(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(rx.recv().await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_a_key_replaces_the_pending_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerSupervisor::new(tx);
        timers.schedule("logs", Duration::from_secs(2), 1_u64);
        timers.schedule("logs", Duration::from_secs(2), 2_u64);
        assert_eq!(timers.pending(), 1);

        assert_eq!(rx.recv().await, Some(2));
        advance(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerSupervisor::new(tx);
        timers.schedule("logs", Duration::from_secs(1), 1_u64);
        timers.schedule("poll", Duration::from_secs(2), 2_u64);
        timers.cancel(&"logs");

        assert_eq!(rx.recv().await, Some(2));
        advance(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
