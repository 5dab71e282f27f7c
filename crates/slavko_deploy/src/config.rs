//! Deploy configuration and environment variables.
//!
//! The configuration is persisted as editable JSON text; per-provider
//! tables carry whatever that provider's pipeline needs.

use serde::{Deserialize, Serialize};

use crate::error::DeployResult;
use crate::provider::AUTO_PROVIDER;

/// Deploy configuration, one table per provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployConfig {
    /// Requested provider tag, or `"auto"` for the default.
    pub provider: String,
    #[serde(default)]
    pub vercel: VercelConfig,
    #[serde(default)]
    pub netlify: NetlifyConfig,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub docker: DockerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VercelConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NetlifyConfig {
    #[serde(rename = "siteId", skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AwsConfig {
    #[serde(rename = "pipelineName", skip_serializing_if = "Option::is_none")]
    pub pipeline_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AzureConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(rename = "pipelineId", skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DockerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            provider: AUTO_PROVIDER.to_string(),
            vercel: VercelConfig {
                org: Some("slavko-kernel".to_string()),
            },
            netlify: NetlifyConfig::default(),
            aws: AwsConfig {
                pipeline_name: Some("my-aws-codepipeline-name".to_string()),
            },
            azure: AzureConfig {
                org: Some("my-azure-devops-org".to_string()),
                project: Some("my-azure-project".to_string()),
                pipeline_id: Some("123".to_string()),
            },
            docker: DockerConfig::default(),
        }
    }
}

impl DeployConfig {
    /// Parse the persisted configuration text.
    pub fn from_text(text: &str) -> DeployResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the configuration as editable JSON text.
    pub fn to_text(&self) -> String {
        serde_json::to_string_pretty(self).expect("deploy config serializes")
    }
}

/// A single environment variable handed to the deploy operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvVar {
    pub id: String,
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: format!("env-{}", uuid::Uuid::new_v4()),
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips() {
        let config = DeployConfig::default();
        assert_eq!(config.provider, "auto");
        let text = config.to_text();
        let parsed = DeployConfig::from_text(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_tables_default() {
        let parsed = DeployConfig::from_text(r#"{"provider":"netlify"}"#).unwrap();
        assert_eq!(parsed.provider, "netlify");
        assert_eq!(parsed.vercel.org, None);
    }

    #[test]
    fn test_malformed_text_is_an_error() {
        assert!(DeployConfig::from_text("not json").is_err());
    }

    #[test]
    fn test_env_var_ids_are_unique() {
        let a = EnvVar::new("KEY", "1");
        let b = EnvVar::new("KEY", "1");
        assert_ne!(a.id, b.id);
    }
}
