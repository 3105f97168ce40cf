mod utils;

use parlour_chat::{ban::BanStore, ChatServer, Identity};
use pretty_assertions::assert_eq;
use utils::*;

#[tokio::test]
async fn spamming_gets_warned_then_banned() {
    let dir = tempfile::tempdir().unwrap();
    let ban_file = dir.path().join("bans.json");
    let server = ChatServer::new(test_config(&dir)).unwrap();

    let alice = join(&server, "10.0.0.1", "alice").await;
    let bob = join(&server, "10.0.0.2", "bob").await;
    alice.wait_for("bob has joined the chat").await;

    for i in 0..50 {
        alice.send_line(&format!("message {}", i));
    }

    alice.wait_for("anti-spam triggered").await;
    let output = bob.wait_for("alice has been banned for spamming").await;

    // Messages 30 through 50 each draw a warning
    assert_eq!(count(&output, "alice, stop spamming or you could get banned."), 21);
    assert!(output.contains("alice: message 48"));
    assert!(!output.contains("alice: message 49"));
    alice.wait_closed().await;

    let bans = BanStore::load(&ban_file).unwrap();
    assert_eq!(bans.len(), 1);
    assert!(bans.contains(&Identity::new("10.0.0.1".parse().unwrap(), None)));
}

#[tokio::test]
async fn warnings_alone_do_not_ban() {
    let dir = tempfile::tempdir().unwrap();
    let server = ChatServer::new(test_config(&dir)).unwrap();

    let alice = join(&server, "10.0.0.1", "alice").await;
    for i in 0..49 {
        alice.send_line(&format!("message {}", i));
    }

    let output = alice.wait_for("alice: message 48").await;
    assert_eq!(count(&output, "stop spamming"), 20);
    assert!(!alice.is_closed());
    assert!(server.bans().is_empty());
}

#[tokio::test]
async fn rapid_reconnects_are_banned() {
    let dir = tempfile::tempdir().unwrap();
    let ban_file = dir.path().join("bans.json");
    let server = ChatServer::new(test_config(&dir)).unwrap();
    assert!(!ban_file.exists());

    let watcher = join(&server, "10.0.0.50", "watcher").await;

    let mut clients = Vec::new();
    for i in 0..6 {
        clients.push(join(&server, "10.0.0.9", &format!("user{}", i)).await);
    }

    let seventh = connect(&server, MockTerminal::new("10.0.0.9", Some("user6")));
    seventh.wait_closed().await;
    watcher.wait_for("user6 has been banned automatically. ID: ").await;
    assert!(!seventh.output().contains("Welcome"));

    let persisted = BanStore::load(&ban_file).unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted.entries()[0].address, "10.0.0.9");

    let eighth = connect(&server, MockTerminal::new("10.0.0.9", Some("user7")));
    eighth.wait_for("You are banned").await;
    eighth.wait_closed().await;
}

#[tokio::test]
async fn bans_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let server = ChatServer::new(test_config(&dir)).unwrap();
        server.bans().add_if_absent(&Identity::new("10.0.0.7".parse().unwrap(), None));
        server.bans().save().unwrap();
    }

    let server = ChatServer::new(test_config(&dir)).unwrap();
    let client = connect(&server, MockTerminal::new("10.0.0.7", Some("mallory")));
    let output = client.wait_for("You are banned").await;
    assert!(output.contains(&Identity::new("10.0.0.7".parse().unwrap(), None).fingerprint));
    client.wait_closed().await;
    assert!(server.rooms().default_room().is_empty());
}

#[tokio::test]
async fn malformed_ban_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bans.json"), "not json").unwrap();

    assert!(ChatServer::new(test_config(&dir)).is_err());
}

#[tokio::test]
async fn unwritable_ban_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.ban_file = dir.path().join("no_such_dir").join("bans.json");

    assert!(ChatServer::new(config).is_err());
}

#[tokio::test]
async fn denied_names_are_banned_quietly() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.denied_name_words = vec!["rude".to_owned()];
    let server = ChatServer::new(config).unwrap();

    let watcher = join(&server, "10.0.0.1", "watcher").await;

    let client = connect(&server, MockTerminal::new("10.0.0.2", Some("RudeDude")));
    client.wait_closed().await;

    assert!(server.bans().contains(&Identity::new("10.0.0.2".parse().unwrap(), None)));
    assert!(!watcher.output().contains("RudeDude"));
    assert_eq!(server.rooms().default_room().member_count(), 1);
}
