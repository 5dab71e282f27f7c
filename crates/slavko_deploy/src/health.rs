//! Health-check strategy.
//!
//! After a successful deploy that asked for a follow-up check, the
//! orchestrator emits the PING immediately and the PONG only once the
//! probe returns. The probe owns the delay, so the PONG can never
//! precede it.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Outcome of probing a deployed URL, with the human-readable line that
/// travels in the PONG payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy(String),
    Unhealthy(String),
}

impl HealthVerdict {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthVerdict::Healthy(_))
    }

    pub fn message(&self) -> &str {
        match self {
            HealthVerdict::Healthy(msg) | HealthVerdict::Unhealthy(msg) => msg,
        }
    }
}

/// Replaceable probe strategy. Real implementations should issue an HTTP
/// request with a bounded timeout and retry policy.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, url: &str) -> HealthVerdict;
}

/// Stand-in probe: waits a fixed delay, then draws a random pass/fail.
pub struct SimulatedProbe {
    delay: Duration,
    failure_rate: f64,
}

impl SimulatedProbe {
    pub fn new(delay: Duration, failure_rate: f64) -> Self {
        Self {
            delay,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl Default for SimulatedProbe {
    fn default() -> Self {
        Self::new(Duration::from_millis(2500), 0.05)
    }
}

#[async_trait]
impl HealthProbe for SimulatedProbe {
    async fn probe(&self, url: &str) -> HealthVerdict {
        tokio::time::sleep(self.delay).await;
        let failed = rand::thread_rng().gen_bool(self.failure_rate);
        if failed {
            HealthVerdict::Unhealthy(format!("Health check failed for {url}"))
        } else {
            HealthVerdict::Healthy(format!("Application is live at {url}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_probe_always_passes_at_zero_failure_rate() {
        let probe = SimulatedProbe::new(Duration::from_millis(10), 0.0);
        let verdict = probe.probe("https://site.vercel.app").await;
        assert!(verdict.is_healthy());
        assert_eq!(
            verdict.message(),
            "Application is live at https://site.vercel.app"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_probe_always_fails_at_full_failure_rate() {
        let probe = SimulatedProbe::new(Duration::from_millis(10), 1.0);
        let verdict = probe.probe("https://site.vercel.app").await;
        assert!(!verdict.is_healthy());
        assert_eq!(
            verdict.message(),
            "Health check failed for https://site.vercel.app"
        );
    }
}
