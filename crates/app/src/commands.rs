//! Subcommand implementations.

use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::task::JoinHandle;
use tracing::info;
use tradepoint_application::{ApplicationError, SessionContext};
use tradepoint_domain::{ApiRequest, SessionSettings, SessionState, UserProfile};
use tradepoint_infrastructure::{OriginStorage, ReqwestTransport};

use crate::cli::Command;

/// A running session: the context plus its background tasks.
struct Session {
    context: SessionContext,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Attaches one tab to the origin storage and wires the session over it.
    async fn open(settings: &SessionSettings) -> anyhow::Result<Self> {
        let origin = match &settings.storage_path {
            Some(path) => OriginStorage::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?,
            None => OriginStorage::in_memory(),
        };
        let tab = Arc::new(origin.open_tab());
        let transport = Arc::new(ReqwestTransport::new(settings.clone())?);

        let context = SessionContext::assemble(transport, tab.clone(), settings.refresh_timeout());
        let mut tasks = vec![context.spawn_event_loop()];
        if let Some(changes) = tab.changes() {
            tasks.push(context.broadcaster().spawn_storage_forwarder(changes));
        }

        let state = context.initialize().await;
        info!(state = state.label(), "session initialized");
        Ok(Self { context, tasks })
    }

    fn require_user(&self) -> anyhow::Result<UserProfile> {
        match self.context.state() {
            SessionState::Authenticated(profile) => Ok(*profile),
            _ => bail!("not logged in; run `tradepoint login <username>` first"),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn print_profile(profile: &UserProfile) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(profile)?);
    Ok(())
}

/// Runs one subcommand to completion.
///
/// # Errors
///
/// Returns an error if the command failed; the message is meant for the user.
pub async fn run(command: Command, settings: &SessionSettings) -> anyhow::Result<()> {
    let session = Session::open(settings).await?;
    let context = &session.context;

    match command {
        Command::Login { username, password } => {
            let profile = context.login(&username, &password).await.map_err(|e| match e {
                ApplicationError::InvalidCredentials { detail } => anyhow::anyhow!(detail),
                other => other.into(),
            })?;
            println!("logged in as {}", profile.display_name());
        }
        Command::Logout => {
            context.logout();
            println!("logged out");
        }
        Command::Whoami => {
            print_profile(&session.require_user()?)?;
        }
        Command::SwitchOrg { organization } => {
            session.require_user()?;
            let profile = context.switch_organization(organization.as_deref()).await?;
            print_profile(&profile)?;
        }
        Command::SwitchTp { trading_point } => {
            session.require_user()?;
            let profile = context.switch_trading_point(trading_point.as_deref()).await?;
            print_profile(&profile)?;
        }
        Command::Get { path, query } => {
            session.require_user()?;
            let request = query
                .into_iter()
                .fold(ApiRequest::get(path), |request, (k, v)| request.with_query(k, v));
            let response = context.pipeline().send(request).await?;
            if !response.is_success() {
                bail!("{} {}", response.status, response.text());
            }
            println!("{}", response.text());
        }
        Command::ChangePassword { old, new } => {
            session.require_user()?;
            context.change_password(&old, &new).await?;
            println!("password changed");
        }
    }
    Ok(())
}
