//! # slavko_deploy - Deployment orchestration for SlavkoShell
//!
//! Reacts to `DEPLOY`, `HEALTH_CHECK` and `CLEANUP` traffic on the
//! protocol bus:
//!
//! - resolves the requested provider and launches the external deploy
//!   operation for `DEPLOY`/INIT directives,
//! - derives a persisted [`DeploymentStat`] from every terminal deploy
//!   report, wherever it originated,
//! - chains the delayed health-check follow-up off successful deploys,
//! - clears the stat collection on `CLEANUP`/DONE.
//!
//! The real cloud calls live behind [`DeployOperation`] and
//! [`HealthProbe`]; the simulated implementations shipped here are
//! stand-ins for development and tests.

pub mod config;
pub mod error;
pub mod health;
pub mod operation;
pub mod orchestrator;
pub mod provider;
pub mod stats;

pub use config::{DeployConfig, EnvVar};
pub use error::{DeployError, DeployResult};
pub use health::{HealthProbe, HealthVerdict, SimulatedProbe};
pub use operation::{DeployOperation, DeployRequest, SimulatedDeploy};
pub use orchestrator::{
    AttemptState, DeployAttempt, DeployContext, DeployOrchestrator, HealthState,
    OrchestratorHandle,
};
pub use provider::{DeployProvider, AUTO_PROVIDER};
pub use stats::{DeploymentStat, ReportPayload, StatStatus, StatsStore};
