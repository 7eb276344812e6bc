use anyhow::{ensure, Result};
use clap::{Parser, Subcommand};
use courier_core::backend::MockReply;
use courier_core::redirect::RecordingNavigator;
use courier_core::{
    reconcile, refresh_routes, telemetry, AssistantDescriptor, AuthRecovery, CancellationToken,
    ClientSettings, CookieRedirectStore, DispatchError, Dispatcher, MockBackend,
    OutgoingChatMessage, RedirectStore, RouteEntry, RouteNode,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for Courier")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a lightweight smoke test that exercises the Courier core logic.
    Smoke,
}

fn main() -> Result<()> {
    telemetry::init_tracing(EnvFilter::new("info"))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke => smoke_test(),
    }
}

fn smoke_test() -> Result<()> {
    let runtime = Runtime::new()?;
    let temp_dir = TempDir::new()?;
    let settings = ClientSettings::new("http://localhost:8080", "http://localhost:8080/login")?;
    let store = Arc::new(CookieRedirectStore::new(
        temp_dir.path().join("cookies"),
        settings.redirect_key.clone(),
    ));
    let navigator = RecordingNavigator::at("/assistants/smoke");
    let recovery = AuthRecovery::new(&settings, store.clone(), Arc::new(navigator.clone()));

    let backend = Arc::new(
        MockBackend::new().with_assistants(vec![AssistantDescriptor::new("smoke", "Smoke Test")]),
    );
    let table: Vec<RouteNode> = vec![RouteEntry::new("", "Home", "Home").into()];
    let routes = runtime.block_on(refresh_routes(&recovery.wrap(backend.clone()), &table))?;
    ensure!(routes.len() == 2, "expected one assistant route to be added");
    ensure!(
        reconcile(&routes, &[AssistantDescriptor::new("smoke", "Smoke Test")]) == routes,
        "reconciliation should be idempotent"
    );

    let dispatcher = Dispatcher::guarded(backend.clone(), &recovery);
    let reply = runtime.block_on(async {
        let events = dispatcher
            .dispatch(
                &OutgoingChatMessage::new("smoke", "ping from xtask"),
                CancellationToken::new(),
            )
            .await?;
        anyhow::Ok(events.collect_reply().await?)
    })?;
    info!(reply = %reply.text, "smoke dispatch completed");

    backend.push_reply(MockReply::Fail(settings.session_expired_status));
    let expired = runtime.block_on(
        dispatcher.send(&OutgoingChatMessage::new("smoke", "again"), &CancellationToken::new()),
    );
    ensure!(
        matches!(expired, Err(DispatchError::SessionExpired)),
        "expected session expiry to surface"
    );
    ensure!(
        store.get().as_deref() == Some("/assistants/smoke"),
        "expected the return path to be stored"
    );
    info!(
        "routes" = routes.len(),
        "sign_in_redirects" = navigator.visits().len(),
        "smoke test passed"
    );

    Ok(())
}
