//! In-process simulated peer
//!
//! Stands in for the companion device when no peer address is configured.
//! Replies arrive after a random latency, so consecutive requests can
//! complete out of order, exactly like a real flaky link.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;

use sunface_core::prelude::*;
use sunface_core::{FetchOutcome, PeerEvent, RequestId, WeatherIcon, WeatherSnapshot};

use crate::transport::{PeerEventSender, PeerTransport};

/// Conditions the simulated peer reports, used as icon payloads
const CONDITIONS: &[&str] = &["clear", "partly-cloudy", "cloudy", "rain", "storm", "snow"];

/// Behaviour of the simulated peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackConfig {
    /// Delay before a connect attempt succeeds
    pub connect_delay: Duration,
    /// Replies take a uniformly random latency in `0..=max_latency`
    pub max_latency: Duration,
    /// Push fresh temperatures this often while connected (`None` = never)
    pub push_interval: Option<Duration>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            connect_delay: Duration::from_millis(50),
            max_latency: Duration::from_millis(800),
            push_interval: None,
        }
    }
}

/// Simulated companion device implementing [`PeerTransport`]
pub struct LoopbackPeer {
    config: LoopbackConfig,
    events: PeerEventSender,
    tasks: Vec<JoinHandle<()>>,
}

impl fmt::Debug for LoopbackPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackPeer")
            .field("config", &self.config)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl LoopbackPeer {
    pub fn new(config: LoopbackConfig, events: PeerEventSender) -> Self {
        Self {
            config,
            events,
            tasks: Vec::new(),
        }
    }

    fn spawn(&mut self, task: impl std::future::Future<Output = ()> + Send + 'static) {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(tokio::spawn(task));
    }
}

/// Generate a plausible full snapshot
pub fn sample_snapshot<R: Rng + ?Sized>(rng: &mut R) -> WeatherSnapshot {
    let high = f64::from(rng.gen_range(12..=32_i32));
    let low = high - f64::from(rng.gen_range(4..=12_i32));
    let condition = CONDITIONS[rng.gen_range(0..CONDITIONS.len())];
    WeatherSnapshot::temperatures(high, low).with_icon(WeatherIcon::new(condition.as_bytes()))
}

fn random_latency(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

impl PeerTransport for LoopbackPeer {
    fn connect(&mut self, attempt: u64) {
        self.disconnect();

        let delay = self.config.connect_delay;
        let push_interval = self.config.push_interval;
        let events = self.events.clone();

        debug!("Loopback peer connecting (attempt #{})", attempt);
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(PeerEvent::Connected { attempt }).await.is_err() {
                return;
            }

            let Some(every) = push_interval else {
                return;
            };
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let snapshot = {
                    let mut rng = rand::thread_rng();
                    let high = f64::from(rng.gen_range(12..=32_i32));
                    WeatherSnapshot::temperatures(high, high - 8.0)
                };
                if events.send(PeerEvent::Push(snapshot)).await.is_err() {
                    return;
                }
            }
        });
    }

    fn send_request(&mut self, id: RequestId) {
        let latency = random_latency(self.config.max_latency);
        let snapshot = sample_snapshot(&mut rand::thread_rng());
        let events = self.events.clone();

        trace!("Loopback peer answers #{} in {:?}", id, latency);
        self.spawn(async move {
            tokio::time::sleep(latency).await;
            let _ = events
                .send(PeerEvent::Response {
                    id,
                    outcome: FetchOutcome::Snapshot(snapshot),
                })
                .await;
        });
    }

    fn disconnect(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for LoopbackPeer {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::sync::mpsc;

    fn instant_config() -> LoopbackConfig {
        LoopbackConfig {
            connect_delay: Duration::ZERO,
            max_latency: Duration::ZERO,
            push_interval: None,
        }
    }

    #[test]
    fn test_sample_snapshot_is_complete_and_ordered() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let snap = sample_snapshot(&mut rng);
            let (high, low) = (snap.high.unwrap(), snap.low.unwrap());
            assert!(low < high);
            assert!((12.0..=32.0).contains(&high));
            assert!(snap.icon.is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_then_answer_request() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut peer = LoopbackPeer::new(instant_config(), tx);

        peer.connect(1);
        assert_eq!(rx.recv().await, Some(PeerEvent::Connected { attempt: 1 }));

        peer.send_request(1);
        match rx.recv().await {
            Some(PeerEvent::Response {
                id: 1,
                outcome: FetchOutcome::Snapshot(snap),
            }) => assert!(snap.high.is_some()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pushes_while_connected() {
        let (tx, mut rx) = mpsc::channel(8);
        let config = LoopbackConfig {
            push_interval: Some(Duration::from_secs(60)),
            ..instant_config()
        };
        let mut peer = LoopbackPeer::new(config, tx);

        peer.connect(1);
        assert!(matches!(rx.recv().await, Some(PeerEvent::Connected { .. })));
        assert!(matches!(rx.recv().await, Some(PeerEvent::Push(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_replies() {
        let (tx, mut rx) = mpsc::channel(8);
        let config = LoopbackConfig {
            max_latency: Duration::from_secs(1),
            ..instant_config()
        };
        let mut peer = LoopbackPeer::new(config, tx);
        peer.connect(1);
        assert!(matches!(rx.recv().await, Some(PeerEvent::Connected { .. })));

        peer.send_request(1);
        peer.disconnect();
        drop(peer);

        assert_eq!(rx.recv().await, None);
    }
}
