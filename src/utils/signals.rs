use parking_lot::Mutex;
use tokio::sync::watch;

/// Stop signals of long running producers.
///
/// Each producer holds a receiver and returns once it changes; the run
/// fires all of them together when it ends.
#[derive(Debug, Default)]
pub struct StopSignals {
    senders: Mutex<Vec<watch::Sender<()>>>,
}

impl StopSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> watch::Receiver<()> {
        let (tx, rx) = watch::channel(());
        self.senders.lock().push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signals every subscriber; returns how many were still listening
    pub fn fire(&self) -> usize {
        self.senders.lock().iter().filter(|tx| tx.send(()).is_ok()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fire_wakes_every_subscriber() {
        let signals = StopSignals::new();
        let mut a = signals.subscribe();
        let mut b = signals.subscribe();
        let c = signals.subscribe();
        drop(c);

        assert_eq!(signals.len(), 3);
        assert_eq!(signals.fire(), 2);
        assert!(a.changed().await.is_ok());
        assert!(b.changed().await.is_ok());
    }
}
