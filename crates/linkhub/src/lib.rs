// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Linkhub: link third-party accounts through a cross-window OAuth handshake
//! and load their records.

pub mod client;
pub mod config;
pub mod console;
pub mod credential;
pub mod error;
pub mod loader;
pub mod provider;
pub mod record;
pub mod registry;
pub mod session;
pub mod test_support;
pub mod window;

use std::sync::Arc;

use crate::client::ServiceClient;
use crate::config::Config;
use crate::console::Console;
use crate::registry::IntegrationRegistry;
use crate::session::Session;
use crate::window::{CommandOpener, ManualOpener, WindowOpener};

/// Build a session from `config` and drive it from stdin until `quit`.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let client = ServiceClient::new(&config.base_url, config.request_timeout());
    tracing::info!(base_url = %client.base_url(), "using integration service");

    let (opener, manual) = match &config.browser {
        Some(template) => (Arc::new(CommandOpener::new(template.clone())) as Arc<dyn WindowOpener>, None),
        None => {
            let manual = Arc::new(ManualOpener::new());
            (Arc::clone(&manual) as Arc<dyn WindowOpener>, Some(manual))
        }
    };

    let session =
        Session::new(IntegrationRegistry::default(), client, opener, config.poll_interval());
    let subject = config.subject();
    if let Some(provider) = config.initial_provider()? {
        session.select(provider.display_name(), subject.clone())?;
    }

    let mut console = Console::new(session, subject, manual);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    console.run(stdin, tokio::io::stdout()).await?;

    console.session().logout();
    Ok(())
}
