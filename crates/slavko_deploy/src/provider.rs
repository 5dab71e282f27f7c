//! Deployment target providers.

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};

/// Sentinel provider value that resolves to the fixed default.
pub const AUTO_PROVIDER: &str = "auto";

/// Supported deployment providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployProvider {
    Vercel,
    Netlify,
    Aws,
    Azure,
    Docker,
}

impl DeployProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployProvider::Vercel => "vercel",
            DeployProvider::Netlify => "netlify",
            DeployProvider::Aws => "aws",
            DeployProvider::Azure => "azure",
            DeployProvider::Docker => "docker",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "vercel" => Some(DeployProvider::Vercel),
            "netlify" => Some(DeployProvider::Netlify),
            "aws" => Some(DeployProvider::Aws),
            "azure" => Some(DeployProvider::Azure),
            "docker" => Some(DeployProvider::Docker),
            _ => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            DeployProvider::Vercel,
            DeployProvider::Netlify,
            DeployProvider::Aws,
            DeployProvider::Azure,
            DeployProvider::Docker,
        ]
    }

    /// The default provider `"auto"` resolves to. There is no selection
    /// logic behind the sentinel, by contract.
    pub fn default_provider() -> Self {
        DeployProvider::Vercel
    }

    /// Resolve a requested provider string, honoring the `"auto"`
    /// sentinel.
    pub fn resolve(requested: &str) -> DeployResult<Self> {
        if requested == AUTO_PROVIDER {
            return Ok(Self::default_provider());
        }
        Self::from_str(requested).ok_or_else(|| DeployError::UnknownProvider(requested.to_string()))
    }
}

impl std::fmt::Display for DeployProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for provider in DeployProvider::all() {
            assert_eq!(DeployProvider::from_str(provider.as_str()), Some(provider));
        }
    }

    #[test]
    fn test_auto_resolves_to_default() {
        assert_eq!(
            DeployProvider::resolve("auto").unwrap(),
            DeployProvider::Vercel
        );
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!(matches!(
            DeployProvider::resolve("heroku"),
            Err(DeployError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_resolve_is_case_insensitive_for_known_tags() {
        assert_eq!(
            DeployProvider::resolve("Vercel").unwrap(),
            DeployProvider::Vercel
        );
    }
}
