use parlour_chat::{ChatConfig, ChatServer, Terminal};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub mod terminal;
pub use terminal::MockTerminal;

pub const WAIT: Duration = Duration::from_secs(5);

pub fn test_config(dir: &TempDir) -> ChatConfig {
    ChatConfig {
        ban_file: dir.path().join("bans.json"),
        ..ChatConfig::default()
    }
}

pub struct TestClient {
    pub terminal: Arc<MockTerminal>,
    pub task: tokio::task::JoinHandle<()>,
}

impl std::ops::Deref for TestClient {
    type Target = MockTerminal;

    fn deref(&self) -> &MockTerminal {
        &self.terminal
    }
}

/// Start serving a mock client without waiting for it to join.
pub fn connect(server: &Arc<ChatServer>, terminal: Arc<MockTerminal>) -> TestClient {
    let server = Arc::clone(server);
    let dyn_terminal: Arc<dyn Terminal> = terminal.clone();
    let task = tokio::spawn(async move { server.handle_connection(dyn_terminal).await });
    TestClient { terminal, task }
}

/// Connect a client with the given login and wait for its welcome.
pub async fn join(server: &Arc<ChatServer>, address: &str, login: &str) -> TestClient {
    let client = connect(server, MockTerminal::new(address, Some(login)));
    client.wait_for("Welcome to the chat").await;
    client
}

pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
