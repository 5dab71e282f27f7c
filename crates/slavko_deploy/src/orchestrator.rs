//! Deployment orchestrator.
//!
//! A set of reactive state machines keyed by deployment attempt,
//! subscribed to the protocol bus:
//!
//! - `DEPLOY` with status INIT or READY resolves a provider and launches
//!   the external deploy operation. Every such message starts an
//!   independent attempt; concurrent attempts for one project are not
//!   deduplicated and a never-reporting operation leaves its attempt in
//!   `Running`.
//! - A terminal `DEPLOY` message (action REPORT or absent) derives one
//!   stat record (whether or not this orchestrator started the attempt)
//!   and, for a success that carries a URL and asks for it, chains the
//!   health-check follow-up: PING/WAITING immediately, PONG once the
//!   probe returns.
//! - `CLEANUP`/DONE clears the whole stat collection.
//!
//! The orchestrator never raises to its caller; failures surface as
//! `DEPLOY`/ERROR messages carrying an `error` payload field.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use slavko_protocol::{
    Module, Notifier, ProtocolBus, SlavkoMessage, Status, Subscription, ToastLevel,
};

use crate::config::{DeployConfig, EnvVar};
use crate::health::HealthProbe;
use crate::operation::{DeployOperation, DeployRequest};
use crate::provider::DeployProvider;
use crate::stats::{DeploymentStat, ReportPayload, StatsStore};

/// Session-scoped deployment inputs: what to deploy and with what.
#[derive(Debug, Clone, Default)]
pub struct DeployContext {
    pub target_repo: String,
    pub config: DeployConfig,
    pub env_vars: Vec<EnvVar>,
}

impl DeployContext {
    pub fn new(target_repo: impl Into<String>) -> Self {
        Self {
            target_repo: target_repo.into(),
            config: DeployConfig::default(),
            env_vars: Vec::new(),
        }
    }

    fn project(&self) -> String {
        self.target_repo
            .rsplit('/')
            .next()
            .unwrap_or(&self.target_repo)
            .to_string()
    }
}

/// Primary state of one deployment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    PendingInit,
    Running,
    Succeeded,
    Failed,
}

/// Secondary state chained off a succeeded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Pending,
    Ok,
    Failed,
}

/// One deployment attempt as tracked by the orchestrator.
#[derive(Debug, Clone)]
pub struct DeployAttempt {
    pub id: String,
    pub project: String,
    pub provider: DeployProvider,
    pub state: AttemptState,
    pub health: Option<HealthState>,
    pub started_at: DateTime<Utc>,
}

/// The orchestrator proper. Construct with [`DeployOrchestrator::attach`].
pub struct DeployOrchestrator {
    bus: Arc<ProtocolBus>,
    stats: Arc<StatsStore>,
    operation: Arc<dyn DeployOperation>,
    probe: Arc<dyn HealthProbe>,
    notifier: Arc<dyn Notifier>,
    context: Mutex<DeployContext>,
    attempts: Mutex<Vec<DeployAttempt>>,
    runtime: tokio::runtime::Handle,
}

impl DeployOrchestrator {
    /// Subscribe an orchestrator to the bus. Must be called within a
    /// Tokio runtime; deploy operations and health probes run as spawned
    /// tasks on it.
    pub fn attach(
        bus: Arc<ProtocolBus>,
        stats: Arc<StatsStore>,
        operation: Arc<dyn DeployOperation>,
        probe: Arc<dyn HealthProbe>,
        notifier: Arc<dyn Notifier>,
        context: DeployContext,
    ) -> OrchestratorHandle {
        let orchestrator = Arc::new(Self {
            bus: Arc::clone(&bus),
            stats,
            operation,
            probe,
            notifier,
            context: Mutex::new(context),
            attempts: Mutex::new(Vec::new()),
            runtime: tokio::runtime::Handle::current(),
        });

        let launch_target = Arc::downgrade(&orchestrator);
        let launch_sub = bus.subscribe(move |message| {
            if let Some(orchestrator) = launch_target.upgrade() {
                orchestrator.on_launch(message);
            }
        });

        let report_target = Arc::downgrade(&orchestrator);
        let report_sub = bus.subscribe(move |message| {
            if let Some(orchestrator) = report_target.upgrade() {
                orchestrator.on_report(message);
            }
        });

        OrchestratorHandle {
            inner: orchestrator,
            launch_sub,
            report_sub,
        }
    }

    // DEPLOY / INIT|READY: resolve provider, launch the operation.
    fn on_launch(self: &Arc<Self>, message: &SlavkoMessage) {
        if message.module != Module::Deploy
            || !matches!(message.status, Status::Init | Status::Ready)
        {
            return;
        }

        let Some(requested) = message
            .payload
            .as_ref()
            .and_then(|p| p.get("provider"))
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            tracing::debug!("deploy initiation without a provider, ignoring");
            return;
        };

        let context = self.context.lock().expect("context lock").clone();
        let project = context.project();
        let attempt_id = format!("deploy-{}", uuid::Uuid::new_v4());

        let provider = match DeployProvider::resolve(&requested) {
            Ok(provider) => provider,
            Err(err) => {
                self.record_attempt(DeployAttempt {
                    id: attempt_id,
                    project: project.clone(),
                    provider: DeployProvider::default_provider(),
                    state: AttemptState::Failed,
                    health: None,
                    started_at: Utc::now(),
                });
                self.bus.emit(
                    SlavkoMessage::new(Module::Deploy, Status::Error)
                        .with_action("REPORT")
                        .with_payload(json!({
                            "project": project,
                            "provider": requested,
                            "error": err.to_string(),
                        })),
                );
                return;
            }
        };

        self.record_attempt(DeployAttempt {
            id: attempt_id.clone(),
            project: project.clone(),
            provider,
            state: AttemptState::Running,
            health: None,
            started_at: Utc::now(),
        });

        let request = DeployRequest {
            attempt_id,
            provider,
            target_repo: context.target_repo,
            config: context.config,
            env_vars: context.env_vars,
        };
        tracing::info!(provider = %provider, project = %project, "deployment launched");

        let operation = Arc::clone(&self.operation);
        let bus = Arc::clone(&self.bus);
        self.runtime.spawn(async move {
            operation.run(request, bus).await;
        });
    }

    // Terminal DEPLOY reports and CLEANUP.
    fn on_report(self: &Arc<Self>, message: &SlavkoMessage) {
        match (&message.module, message.status) {
            (Module::Deploy, status) if status.is_terminal() => {
                // Only a REPORT (or action-less terminal) derives a stat;
                // a bare status ping under another action does not.
                if !matches!(message.action.as_deref(), None | Some("REPORT")) {
                    return;
                }

                let report = ReportPayload::from_value(message.payload.as_ref());
                let succeeded = status == Status::Done;
                let stat = DeploymentStat::from_report(succeeded, &report);
                let project = stat.project.clone();
                self.stats.record(stat);
                let attempt_id = self.complete_attempt(&project, succeeded);

                if succeeded {
                    self.notifier.toast(
                        ToastLevel::Success,
                        &format!("Deployment for '{project}' succeeded!"),
                    );
                } else {
                    self.notifier.toast(
                        ToastLevel::Error,
                        &format!("Deployment for '{project}' failed."),
                    );
                }

                if succeeded && report.wants_health_check() {
                    if let Some(url) = report.deploy_url.clone() {
                        self.begin_health_check(attempt_id, url);
                    }
                }
            }
            (Module::Cleanup, Status::Done) => {
                self.stats.clear();
                self.notifier
                    .toast(ToastLevel::Info, "Deployment history and stats cleared.");
            }
            _ => {}
        }
    }

    fn begin_health_check(self: &Arc<Self>, attempt_id: Option<String>, url: String) {
        if let Some(id) = &attempt_id {
            self.set_health(id, Some(HealthState::Pending));
        }

        self.bus.emit(
            SlavkoMessage::new(Module::HealthCheck, Status::Waiting)
                .with_action("PING")
                .with_payload(json!({ "url": url })),
        );

        let probe = Arc::clone(&self.probe);
        let bus = Arc::clone(&self.bus);
        let target = Arc::downgrade(self);
        self.runtime.spawn(async move {
            let verdict = probe.probe(&url).await;
            let status = if verdict.is_healthy() {
                Status::Done
            } else {
                Status::Error
            };
            bus.emit(
                SlavkoMessage::new(Module::HealthCheck, status)
                    .with_action("PONG")
                    .with_payload(Value::String(verdict.message().to_string())),
            );
            if let (Some(orchestrator), Some(id)) = (target.upgrade(), attempt_id) {
                orchestrator.set_health(
                    &id,
                    Some(if verdict.is_healthy() {
                        HealthState::Ok
                    } else {
                        HealthState::Failed
                    }),
                );
            }
        });
    }

    fn record_attempt(&self, attempt: DeployAttempt) {
        let mut attempts = self.attempts.lock().expect("attempts lock");
        if attempt.state == AttemptState::Running
            && attempts
                .iter()
                .any(|a| a.state == AttemptState::Running && a.project == attempt.project)
        {
            tracing::warn!(
                project = %attempt.project,
                "starting a deployment while another is still running for the same project"
            );
        }
        attempts.push(attempt);
    }

    // Transition the newest running attempt for the project, if any. A
    // terminal report can also originate outside this orchestrator, in
    // which case there is nothing to transition.
    fn complete_attempt(&self, project: &str, succeeded: bool) -> Option<String> {
        let mut attempts = self.attempts.lock().expect("attempts lock");
        let attempt = attempts
            .iter_mut()
            .rev()
            .find(|a| a.state == AttemptState::Running && a.project == project)?;
        attempt.state = if succeeded {
            AttemptState::Succeeded
        } else {
            AttemptState::Failed
        };
        Some(attempt.id.clone())
    }

    fn set_health(&self, attempt_id: &str, health: Option<HealthState>) {
        let mut attempts = self.attempts.lock().expect("attempts lock");
        if let Some(attempt) = attempts.iter_mut().find(|a| a.id == attempt_id) {
            attempt.health = health;
        }
    }

    fn attempts_snapshot(&self) -> Vec<DeployAttempt> {
        self.attempts.lock().expect("attempts lock").clone()
    }
}

/// Keeps the orchestrator subscribed; detach to remove both
/// subscriptions.
pub struct OrchestratorHandle {
    inner: Arc<DeployOrchestrator>,
    launch_sub: Subscription,
    report_sub: Subscription,
}

impl OrchestratorHandle {
    /// Copy of the attempt table, in creation order.
    pub fn attempts(&self) -> Vec<DeployAttempt> {
        self.inner.attempts_snapshot()
    }

    /// Replace the deployment inputs used by subsequent attempts.
    pub fn set_context(&self, context: DeployContext) {
        *self.inner.context.lock().expect("context lock") = context;
    }

    pub fn context(&self) -> DeployContext {
        self.inner.context.lock().expect("context lock").clone()
    }

    /// Unsubscribe from the bus. In-flight spawned operations still
    /// complete and report.
    pub fn detach(self) {
        self.launch_sub.unsubscribe();
        self.report_sub.unsubscribe();
    }
}
