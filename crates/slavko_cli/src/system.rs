//! Shell system wiring.
//!
//! Builds the full stack for a workspace: file store, protocol bus,
//! orchestrator with the simulated deploy/probe stand-ins, and the chat
//! shell over the environment-configured LLM.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use slavko_chat::{ChatShell, ChatView, LlmClient};
use slavko_deploy::{
    AttemptState, DeployConfig, DeployContext, DeployOrchestrator, EnvVar, OrchestratorHandle,
    SimulatedDeploy, SimulatedProbe, StatsStore,
};
use slavko_protocol::{Notifier, ProtocolBus, SlavkoMessage, Subscription, ToastLevel};
use slavko_store::{keys, FileStore, KvStore, KvStoreExt};

/// System prompt handed to the LLM: the persona plus the directive
/// vocabulary the shell understands.
pub const SYSTEM_PROMPT: &str = "\
You are SlavkoShell, a deployment operations terminal. Reply in short \
plain prose. When an operation is required, emit exactly one directive \
on its own line, in the form {MODULE|ACTION|STATUS|PAYLOAD}. Known \
modules: KERNEL, DEPLOY, HEALTH_CHECK, CLEANUP, SESSION. Statuses: \
INIT, READY, WAITING, DONE, ERROR. To start a deployment emit \
{DEPLOY|INIT|READY|{provider:\"auto\"}} and nothing else on that line.";

/// Prompt streamed when a fresh session boots.
pub const BOOT_PROMPT: &str =
    "Boot the session: greet the operator in two sentences and confirm which \
     repository is selected.";

/// Toast sink for the terminal.
pub struct CliNotifier;

impl Notifier for CliNotifier {
    fn toast(&self, level: ToastLevel, message: &str) {
        match level {
            ToastLevel::Success => println!("✅ {message}"),
            ToastLevel::Error => println!("❌ {message}"),
            ToastLevel::Info => println!("ℹ️  {message}"),
        }
    }
}

/// Streams model prose straight to the terminal.
pub struct CliView;

impl ChatView for CliView {
    fn prose(&self, _message_id: &str, chunk: &str) {
        print!("{chunk}");
        let _ = std::io::stdout().flush();
    }
}

/// Everything a command needs, wired together.
pub struct ShellSystem {
    pub bus: Arc<ProtocolBus>,
    pub stats: Arc<StatsStore>,
    pub orchestrator: OrchestratorHandle,
    store: Arc<dyn KvStore>,
    protocol_printer: Option<Subscription>,
}

impl ShellSystem {
    /// Wire the store, bus and orchestrator for the workspace rooted at
    /// the current directory.
    pub fn build(target_repo: Option<String>) -> Result<Self> {
        let root = std::env::current_dir()?;
        let store: Arc<dyn KvStore> = Arc::new(FileStore::new(&root));

        let bus = ProtocolBus::new();
        let stats = Arc::new(StatsStore::load(Arc::clone(&store)));

        let target_repo = target_repo
            .or_else(|| std::env::var("SLAVKO_TARGET_REPO").ok())
            .unwrap_or_default();
        let config = load_deploy_config(store.as_ref());
        let env_vars = load_env_vars(store.as_ref());

        let orchestrator = DeployOrchestrator::attach(
            Arc::clone(&bus),
            Arc::clone(&stats),
            Arc::new(SimulatedDeploy::default()),
            Arc::new(SimulatedProbe::default()),
            Arc::new(CliNotifier),
            DeployContext {
                target_repo,
                config,
                env_vars,
            },
        );

        Ok(Self {
            bus,
            stats,
            orchestrator,
            store,
            protocol_printer: None,
        })
    }

    /// Print protocol traffic as one-line notices, the way the original
    /// log panel renders directives.
    pub fn print_protocol_traffic(&mut self) {
        if self.protocol_printer.is_some() {
            return;
        }
        self.protocol_printer = Some(self.bus.subscribe(|message: &SlavkoMessage| {
            let action = message.action.as_deref().unwrap_or("-");
            println!("⟨{}⟩ {} {}", message.module, action, message.status);
        }));
    }

    /// Build the chat shell on top of this system. Fails when no LLM key
    /// is configured.
    pub fn chat_shell(&self) -> Result<Arc<ChatShell>> {
        let llm = LlmClient::from_env()?.with_system_prompt(SYSTEM_PROMPT);
        Ok(Arc::new(ChatShell::new(
            Arc::clone(&self.bus),
            Arc::new(llm),
            Arc::clone(&self.store),
            Arc::new(CliView),
            Arc::new(CliNotifier),
        )))
    }

    /// Wait until no attempt is left running (deploys report, health
    /// checks land), bounded by `timeout`.
    pub async fn settle(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let busy = self.orchestrator.attempts().iter().any(|a| {
                a.state == AttemptState::Running
                    || a.health == Some(slavko_deploy::HealthState::Pending)
            });
            if !busy || tokio::time::Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

fn load_deploy_config(store: &dyn KvStore) -> DeployConfig {
    match store.load(keys::DEPLOY_CONFIG) {
        Ok(Some(text)) => match DeployConfig::from_text(&text) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("deploy config unreadable, using defaults: {err}");
                DeployConfig::default()
            }
        },
        _ => DeployConfig::default(),
    }
}

fn load_env_vars(store: &dyn KvStore) -> Vec<EnvVar> {
    store
        .load_json::<Vec<EnvVar>>(keys::ENV_VARS)
        .ok()
        .flatten()
        .unwrap_or_default()
}
