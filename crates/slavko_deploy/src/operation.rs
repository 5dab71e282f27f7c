//! External deploy operation seam.
//!
//! The orchestrator never performs network calls itself: it hands a
//! [`DeployRequest`] to a [`DeployOperation`], which must eventually emit
//! a terminal DEPLOY message (DONE or ERROR, action REPORT) back onto the
//! bus, including on failure. Nothing may propagate out of the operation
//! as an error.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use slavko_protocol::{Module, ProtocolBus, SlavkoMessage, Status};

use crate::config::{DeployConfig, EnvVar};
use crate::provider::DeployProvider;

/// Everything an operation needs to perform one deployment attempt.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Attempt this request belongs to.
    pub attempt_id: String,
    /// Resolved provider (never `"auto"`).
    pub provider: DeployProvider,
    /// Target repository identifier, e.g. `my-org/my-repo`.
    pub target_repo: String,
    /// Deploy configuration snapshot.
    pub config: DeployConfig,
    /// Environment variables, in order.
    pub env_vars: Vec<EnvVar>,
}

impl DeployRequest {
    /// Project name derived from the repository identifier.
    pub fn project(&self) -> &str {
        self.target_repo
            .rsplit('/')
            .next()
            .unwrap_or(&self.target_repo)
    }
}

/// Opaque asynchronous deploy operation.
#[async_trait]
pub trait DeployOperation: Send + Sync {
    /// Perform the deployment and report the outcome on the bus.
    async fn run(&self, request: DeployRequest, bus: Arc<ProtocolBus>);
}

/// Stand-in deploy operation: waits a fixed latency, then reports a
/// success with a plausible destination URL, or an error for an empty
/// target. Replace with a real pipeline driver per provider.
pub struct SimulatedDeploy {
    latency: Duration,
    request_health_check: bool,
}

impl SimulatedDeploy {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            request_health_check: true,
        }
    }

    /// Whether the success report asks for a follow-up health check.
    pub fn with_health_check(mut self, request: bool) -> Self {
        self.request_health_check = request;
        self
    }

    fn deploy_url(provider: DeployProvider, project: &str) -> String {
        match provider {
            DeployProvider::Vercel => format!("https://{project}.vercel.app"),
            DeployProvider::Netlify => format!("https://{project}.netlify.app"),
            other => format!("https://{project}.{}.example.dev", other.as_str()),
        }
    }
}

impl Default for SimulatedDeploy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}

#[async_trait]
impl DeployOperation for SimulatedDeploy {
    async fn run(&self, request: DeployRequest, bus: Arc<ProtocolBus>) {
        let started = Instant::now();

        if request.target_repo.trim().is_empty() {
            bus.emit(
                SlavkoMessage::new(Module::Deploy, Status::Error)
                    .with_action("REPORT")
                    .with_payload(json!({
                        "project": "unknown-project",
                        "provider": request.provider.as_str(),
                        "error": "no target repository selected",
                    })),
            );
            return;
        }

        tracing::info!(
            provider = %request.provider,
            repo = %request.target_repo,
            env_vars = request.env_vars.len(),
            "simulated deploy started"
        );
        tokio::time::sleep(self.latency).await;

        let project = request.project().to_string();
        let url = Self::deploy_url(request.provider, &project);
        bus.emit(
            SlavkoMessage::new(Module::Deploy, Status::Done)
                .with_action("REPORT")
                .with_payload(json!({
                    "project": project,
                    "durationSec": started.elapsed().as_secs_f64(),
                    "provider": request.provider.as_str(),
                    "deployUrl": url,
                    "healthCheck": self.request_health_check,
                })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn request(repo: &str) -> DeployRequest {
        DeployRequest {
            attempt_id: "attempt-1".to_string(),
            provider: DeployProvider::Vercel,
            target_repo: repo.to_string(),
            config: DeployConfig::default(),
            env_vars: vec![EnvVar::new("NODE_ENV", "production")],
        }
    }

    fn collect(bus: &Arc<ProtocolBus>) -> Arc<Mutex<Vec<SlavkoMessage>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        std::mem::forget(bus.subscribe(move |m| sink.lock().unwrap().push(m.clone())));
        seen
    }

    #[test]
    fn test_project_derived_from_repo() {
        assert_eq!(request("my-org/my-repo").project(), "my-repo");
        assert_eq!(request("standalone").project(), "standalone");
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_deploy_reports_success() {
        let bus = ProtocolBus::new();
        let seen = collect(&bus);

        SimulatedDeploy::default()
            .run(request("my-org/site"), Arc::clone(&bus))
            .await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].module, Module::Deploy);
        assert_eq!(seen[0].status, Status::Done);
        assert_eq!(seen[0].action.as_deref(), Some("REPORT"));
        let payload = seen[0].payload.as_ref().unwrap();
        assert_eq!(payload["project"], "site");
        assert_eq!(payload["deployUrl"], "https://site.vercel.app");
        assert_eq!(payload["healthCheck"], true);
    }

    #[tokio::test]
    async fn test_simulated_deploy_reports_error_for_empty_target() {
        let bus = ProtocolBus::new();
        let seen = collect(&bus);

        SimulatedDeploy::default().run(request(""), Arc::clone(&bus)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].status, Status::Error);
        assert!(seen[0].payload.as_ref().unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("no target repository"));
    }
}
