use parlour_listener::*;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::io::{AsyncReadExt, AsyncWriteExt, AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

fn test_id() -> ConnectionId
{
    ConnectionId::new(ListenerId::new(0), 1)
}

fn localhost() -> IpAddr
{
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

#[tokio::test]
async fn reads_lines_and_reports_eof()
{
    let (client, server) = tokio::io::duplex(1024);
    let conn = Connection::spawn(test_id(), localhost(), server);
    let (_client_read, mut client_write) = tokio::io::split(client);

    client_write.write_all(b"hello\r\nworld\n").await.unwrap();
    client_write.shutdown().await.unwrap();

    assert_eq!(conn.read_line().await.unwrap(), Input::Line("hello".to_owned()));
    assert_eq!(conn.read_line().await.unwrap(), Input::Line("world".to_owned()));
    assert_eq!(conn.read_line().await.unwrap(), Input::Eof);
}

#[tokio::test]
async fn sends_are_written_whole()
{
    let (client, server) = tokio::io::duplex(1024);
    let conn = Connection::spawn(test_id(), localhost(), server);
    let (mut client_read, _client_write) = tokio::io::split(client);

    conn.send("one\n".to_owned()).unwrap();
    conn.send("two\n".to_owned()).unwrap();
    conn.close();

    let mut received = String::new();
    client_read.read_to_string(&mut received).await.unwrap();
    assert_eq!(received, "one\ntwo\n");
}

#[tokio::test]
async fn send_after_close_fails()
{
    let (_client, server) = tokio::io::duplex(64);
    let conn = Connection::spawn(test_id(), localhost(), server);

    conn.close();
    conn.close();
    assert_eq!(conn.send("late".to_owned()), Err(ConnectionError::Closed));
    assert!(conn.is_closed());
}

#[tokio::test]
async fn window_reports_update_watch()
{
    let (client, server) = tokio::io::duplex(1024);
    let conn = Connection::spawn(test_id(), localhost(), server);
    let (_client_read, mut client_write) = tokio::io::split(client);
    let mut window = conn.window_size();

    assert_eq!(*window.borrow(), WindowSize::default());

    client_write.write_all(b"\x1b[8;50;132t\nafter\n").await.unwrap();

    assert_eq!(conn.read_line().await.unwrap(), Input::Line("after".to_owned()));
    window.changed().await.unwrap();
    assert_eq!(*window.borrow(), WindowSize { width: 132, height: 50 });
}

#[tokio::test]
async fn tab_requests_completion()
{
    let (client, server) = tokio::io::duplex(1024);
    let conn = Connection::spawn(test_id(), localhost(), server);
    let (client_read, mut client_write) = tokio::io::split(client);
    let mut client_lines = BufReader::new(client_read).lines();

    conn.set_autocomplete(Box::new(|line, pos| {
        if line == "@ali" { Some(("@alice ".to_owned(), pos + 3)) } else { None }
    }));

    client_write.write_all(b"@ali\t\nsent\n").await.unwrap();

    assert_eq!(conn.read_line().await.unwrap(), Input::Line("sent".to_owned()));
    let echoed = client_lines.next_line().await.unwrap().unwrap();
    assert!(echoed.ends_with("@alice "), "unexpected echo {:?}", echoed);
}

#[tokio::test]
async fn listener_accepts_tcp_connections()
{
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let listener = Listener::bind(ListenerId::new(3), addr).await.unwrap();
    let bound = listener.local_addr().unwrap();

    let (conn_send, mut conn_recv) = mpsc::channel(4);
    let (shutdown_send, shutdown_recv) = broadcast::channel(1);
    let task = tokio::spawn(listener.run(conn_send, shutdown_recv));

    let mut stream = tokio::net::TcpStream::connect(bound).await.unwrap();
    stream.write_all(b"hi\n").await.unwrap();

    let conn = conn_recv.recv().await.unwrap();
    assert_eq!(conn.id.listener(), ListenerId::new(3));
    assert_eq!(conn.read_line().await.unwrap(), Input::Line("hi".to_owned()));

    shutdown_send.send(()).unwrap();
    task.await.unwrap();
}
