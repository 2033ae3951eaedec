use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::client_config::PingConfig;

/// Keeps at most one ping in flight and turns each answer into a round trip
/// time and an estimate of the server's clock
pub struct PingManager {
    ping_interval: Duration,
    ping_timeout: Duration,
    last_sent: Option<Instant>,
    in_flight: Option<Instant>,
    rtt: Option<Duration>,
    offset_millis: Option<i64>,
}

impl PingManager {
    pub fn new(config: &PingConfig) -> Self {
        Self {
            ping_interval: config.ping_interval,
            ping_timeout: config.ping_timeout,
            last_sent: None,
            in_flight: None,
            rtt: None,
            offset_millis: None,
        }
    }

    /// Whether a ping should go out now. A ping that has waited longer than
    /// the timeout is given up on.
    pub fn should_send(&mut self, now: Instant) -> bool {
        if let Some(sent_at) = self.in_flight {
            if now.saturating_duration_since(sent_at) < self.ping_timeout {
                return false;
            }
            debug!("Ping sent {:?} ago was lost", now.saturating_duration_since(sent_at));
            self.in_flight = None;
        }
        match self.last_sent {
            Some(last_sent) => now.saturating_duration_since(last_sent) >= self.ping_interval,
            None => true,
        }
    }

    pub fn on_sent(&mut self, now: Instant) {
        self.in_flight = Some(now);
        self.last_sent = Some(now);
    }

    /// Records the server's answer. `local_unix_millis` is this machine's wall
    /// clock at the time the answer arrived. Returns false when no ping was in
    /// flight.
    pub fn on_pong(&mut self, now: Instant, server_unix_millis: u64, local_unix_millis: u64) -> bool {
        let Some(sent_at) = self.in_flight.take() else {
            return false;
        };
        let rtt = now.saturating_duration_since(sent_at);
        let half_rtt = i64::try_from(rtt.as_millis() / 2).unwrap_or(i64::MAX);
        let offset = server_unix_millis as i64 - local_unix_millis as i64 - half_rtt;
        trace!("rtt {:?}, server clock offset {}ms", rtt, offset);

        self.rtt = Some(rtt);
        self.offset_millis = Some(offset);
        true
    }

    pub fn rtt(&self) -> Option<Duration> {
        self.rtt
    }

    /// Server clock minus local clock, in milliseconds
    pub fn offset_millis(&self) -> Option<i64> {
        self.offset_millis
    }

    /// Estimated server unix time for a local unix time, once a pong arrived
    pub fn server_unix_millis(&self, local_unix_millis: u64) -> Option<u64> {
        let offset = self.offset_millis?;
        let estimate = local_unix_millis as i64 + offset;
        u64::try_from(estimate).ok()
    }
}
