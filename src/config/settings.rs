// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Settings management for Brook
//!
//! The service is configured entirely from environment variables. Missing
//! required variables are a startup failure: the process must refuse to
//! serve without a provider endpoint and agent identity.

use std::net::SocketAddr;

use crate::error::{BrookError, Result};

/// Environment variable naming the provider endpoint base URL.
pub const ENV_AGENT_ENDPOINT: &str = "AGENT_ENDPOINT";
/// Environment variable naming the agent to load from the provider.
pub const ENV_AGENT_ID: &str = "AGENT_ID";
/// Optional bearer token for the provider API.
pub const ENV_AGENT_API_KEY: &str = "AGENT_API_KEY";
/// Deployment environment name, `development` by default.
pub const ENV_ENVIRONMENT: &str = "ENVIRONMENT";

/// Service settings loaded from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    /// Provider endpoint base URL, e.g. `https://agents.example.com`
    pub agent_endpoint: String,

    /// Identifier of the agent definition to load
    pub agent_id: String,

    /// Optional bearer token sent to the provider
    pub agent_api_key: Option<String>,

    /// Deployment environment (`development`, `production`, ...)
    pub environment: String,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    ///
    /// Collects every missing required variable into a single
    /// `BrookError::Config` so operators see the full list at once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut missing = Vec::new();

        let mut require = |name: &'static str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => Some(value),
            _ => {
                missing.push(name);
                None
            }
        };

        let agent_endpoint = require(ENV_AGENT_ENDPOINT);
        let agent_id = require(ENV_AGENT_ID);

        if !missing.is_empty() {
            return Err(BrookError::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            agent_endpoint: agent_endpoint.unwrap(),
            agent_id: agent_id.unwrap(),
            agent_api_key: lookup(ENV_AGENT_API_KEY).filter(|v| !v.is_empty()),
            environment: lookup(ENV_ENVIRONMENT).unwrap_or_else(|| "development".to_string()),
        })
    }

    /// Whether the service runs in development mode.
    ///
    /// Controls error detail redaction: development surfaces provider error
    /// detail to the client, production does not.
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

/// Default bind address for the HTTP server.
pub fn default_bind_addr() -> SocketAddr {
    "127.0.0.1:8000".parse().expect("static address")
}
