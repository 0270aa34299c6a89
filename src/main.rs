// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Brook - streaming chat gateway server
//!
//! Entry point for the gateway binary. Configuration comes from the
//! environment; missing provider settings abort startup before the
//! listener is bound.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use brook::agent::{AgentGateway, RemoteProvider};
use brook::config::{default_bind_addr, Settings};
use brook::error::Result;
use brook::server::{router, AppState};

#[derive(Parser, Debug)]
#[command(name = "brook", version, about = "Streaming chat gateway for a hosted AI agent")]
struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Fatal before serving: the gateway is useless without a provider
    // endpoint and agent identity.
    let settings = Settings::from_env()?;
    tracing::info!(
        endpoint = %settings.agent_endpoint,
        agent_id = %settings.agent_id,
        environment = %settings.environment,
        "Starting brook gateway"
    );

    let provider = Arc::new(RemoteProvider::from_settings(&settings));
    let gateway = AgentGateway::new(provider, settings.agent_id.clone());

    // Warm the agent cache; failures are logged and retried on first use.
    gateway.preload().await;

    let state = Arc::new(AppState::new(gateway, settings.is_development()));
    let app = router(state);

    let addr = cli.bind.unwrap_or_else(default_bind_addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}
