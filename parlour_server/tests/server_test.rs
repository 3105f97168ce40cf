use parlour_chat::ShutdownOutcome;
use parlour_server::{config::*, Parlour};

use std::net::SocketAddr;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

const WAIT: Duration = Duration::from_secs(5);

fn test_config(dir: &TempDir) -> ServerConfig
{
    let mut config = ServerConfig::default();
    config.listeners = vec![ListenerConfig { address: "127.0.0.1:0".parse().unwrap() }];
    config.chat.ban_file = dir.path().join("bans.json");
    config
}

struct Client
{
    stream: TcpStream,
    received: String,
}

impl Client
{
    async fn connect(addr: SocketAddr) -> Self
    {
        Self { stream: TcpStream::connect(addr).await.unwrap(), received: String::new() }
    }

    async fn send(&mut self, line: &str)
    {
        self.stream.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
    }

    async fn wait_for(&mut self, needle: &str)
    {
        let deadline = tokio::time::Instant::now() + WAIT;
        let mut buf = [0u8; 4096];
        while !self.received.contains(needle)
        {
            let n = tokio::time::timeout_at(deadline, self.stream.read(&mut buf))
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {:?}; got {:?}", needle, self.received))
                .unwrap();
            assert!(n > 0, "connection closed waiting for {:?}; got {:?}", needle, self.received);
            self.received.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    }

    async fn join(addr: SocketAddr, name: &str) -> Self
    {
        let mut client = Self::connect(addr).await;
        client.wait_for("Pick a username:").await;
        client.send(name).await;
        client.wait_for("Welcome to the chat").await;
        client
    }
}

#[tokio::test]
async fn clients_chat_over_tcp_and_hear_the_farewell()
{
    let dir = TempDir::new().unwrap();
    let parlour = Parlour::bind(&test_config(&dir)).await.unwrap();
    let addr = parlour.local_addrs().unwrap()[0];

    let (stop_send, stop_recv) = oneshot::channel::<()>();
    let server = tokio::spawn(parlour.run(async move {
        let _ = stop_recv.await;
    }));

    let mut alice = Client::join(addr, "alice").await;
    let mut bob = Client::join(addr, "bob").await;
    alice.wait_for("bob").await;

    bob.send("hello there").await;
    alice.wait_for("hello there").await;

    stop_send.send(()).unwrap();
    alice.wait_for("Server going down!").await;
    bob.wait_for("Server going down!").await;

    let outcome = tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::Clean);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(std::fs::read_to_string(dir.path().join("bans.json")).unwrap(), "[]\n");
}

#[tokio::test]
async fn occupied_address_fails_to_bind()
{
    let dir = TempDir::new().unwrap();
    let first = Parlour::bind(&test_config(&dir)).await.unwrap();

    let mut config = test_config(&dir);
    config.listeners[0].address = first.local_addrs().unwrap()[0];

    assert!(Parlour::bind(&config).await.is_err());
}

#[tokio::test]
async fn malformed_ban_file_fails_startup()
{
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bans.json"), "not json").unwrap();

    assert!(Parlour::bind(&test_config(&dir)).await.is_err());
}
