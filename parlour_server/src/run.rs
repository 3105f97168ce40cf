use crate::config::ServerConfig;

use parlour_chat::{ChatServer, ShutdownOutcome};
use parlour_listener::{Connection, Listener, ListenerIdGenerator, ListenerError};

use anyhow::Context;
use tokio::{
    select,
    signal::unix::{signal, SignalKind},
    sync::{broadcast, mpsc},
};
use tracing_subscriber::util::SubscriberInitExt;

use std::{
    future::Future,
    net::SocketAddr,
    path::Path,
    sync::Arc,
    time::Duration,
};

/// Time given to connection tasks to flush the farewell before the runtime stops
const DRAIN_TIME: Duration = Duration::from_millis(100);

/// A chat server with its listening sockets bound, ready to accept clients
pub struct Parlour
{
    chat: Arc<ChatServer>,
    listeners: Vec<Listener>,
}

impl Parlour
{
    /// Load the ban list and bind every configured listener.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn bind(config: &ServerConfig) -> Result<Self, anyhow::Error>
    {
        let chat = ChatServer::new(config.chat.clone())?;

        let id_gen = ListenerIdGenerator::new(1);
        let mut listeners = Vec::new();
        for listener in &config.listeners
        {
            listeners.push(Listener::bind(id_gen.next(), listener.address).await?);
        }

        Ok(Self { chat, listeners })
    }

    pub fn chat(&self) -> &Arc<ChatServer>
    {
        &self.chat
    }

    pub fn local_addrs(&self) -> Result<Vec<SocketAddr>, ListenerError>
    {
        self.listeners.iter().map(Listener::local_addr).collect()
    }

    /// Serve clients until `stop` completes, then say goodbye to everyone.
    pub async fn run(self, stop: impl Future<Output = ()>) -> ShutdownOutcome
    {
        self.chat.spawn_maintenance();

        let (shutdown_send, _) = broadcast::channel(1);
        let (connection_send, mut connection_recv) = mpsc::channel::<Connection>(32);

        for listener in self.listeners
        {
            tokio::spawn(listener.run(connection_send.clone(), shutdown_send.subscribe()));
        }
        drop(connection_send);

        tokio::pin!(stop);

        loop
        {
            select! {
                connection = connection_recv.recv() => {
                    let Some(connection) = connection else {
                        tracing::warn!("All listeners have stopped");
                        break;
                    };
                    let chat = Arc::clone(&self.chat);
                    tokio::spawn(async move {
                        chat.handle_connection(Arc::new(connection)).await;
                    });
                },
                _ = &mut stop => {
                    break;
                }
            }
        }

        // No receivers means the listeners are already gone
        let _ = shutdown_send.send(());

        let outcome = self.chat.shutdown().await;
        if outcome == ShutdownOutcome::Clean
        {
            tokio::time::sleep(DRAIN_TIME).await;
        }
        outcome
    }
}

/// Resolves on the first SIGINT or SIGTERM
async fn termination_signal() -> Result<(), std::io::Error>
{
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    select! {
        _ = interrupt.recv() => tracing::info!("Got SIGINT"),
        _ = terminate.recv() => tracing::info!("Got SIGTERM"),
    }
    Ok(())
}

async fn do_run_server(config: ServerConfig) -> Result<ShutdownOutcome, anyhow::Error>
{
    crate::tracing_config::build_subscriber(config.log.clone()).init();

    let parlour = Parlour::bind(&config).await?;
    let signals = termination_signal();

    let outcome = parlour.run(async move {
        if let Err(e) = signals.await
        {
            tracing::error!(error=%e, "Couldn't install signal handlers");
            std::future::pending::<()>().await;
        }
    }).await;

    tracing::info!(?outcome, "Shut down");
    Ok(outcome)
}

/// Run the chat server described by the config file at `config_path`.
///
/// Creates its own tokio runtime, so must not be called from within one.
/// Returns the process exit code once the server has shut down.
pub fn run_server(config_path: impl AsRef<Path>) -> Result<i32, anyhow::Error>
{
    let config = ServerConfig::load_file(&config_path)?;

    if config.log.uses_dir() && !config.log.dir.is_dir()
    {
        std::fs::create_dir_all(&config.log.dir)
            .with_context(|| format!("Couldn't create log directory {}", config.log.dir.display()))?;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(do_run_server(config))?;

    // Don't wait for sessions still blocked on input
    runtime.shutdown_timeout(Duration::from_millis(0));

    Ok(outcome.exit_code())
}
