use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use arena_duel::net::protocol::{parse_line, Command};
use arena_duel::net::relay::RelayServer;

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn recv(&mut self) -> String {
        timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
            .expect("connection closed")
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn assert_silent(&mut self) {
        assert!(
            timeout(Duration::from_millis(100), self.lines.next_line())
                .await
                .is_err(),
            "expected no traffic"
        );
    }
}

async fn start_relay(max_connections: usize) -> std::net::SocketAddr {
    let server = RelayServer::bind("127.0.0.1:0".parse().unwrap(), max_connections)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

#[tokio::test]
async fn test_handshake_tagging_and_leave() {
    let addr = start_relay(4).await;

    let mut a = Client::connect(addr).await;
    assert_eq!(a.recv().await, "START 1");
    assert_eq!(a.recv().await, "USERS 1");

    let mut b = Client::connect(addr).await;
    assert_eq!(b.recv().await, "START 2");
    assert_eq!(b.recv().await, "USERS 1 2");
    assert_eq!(a.recv().await, "ENTER 2");

    a.send("MOVE 100 180 0.5 90 0 0 2").await;
    let line = b.recv().await;
    assert_eq!(line, "MOVE 100 180 0.5 90 0 0 2 1");
    match parse_line(&line).unwrap() {
        Command::Move { state, sender } => {
            assert_eq!(sender, 1);
            assert_eq!(state.hp, 90);
        }
        other => panic!("unexpected {other:?}"),
    }
    a.assert_silent().await;

    b.send("ABILITY Speed Up").await;
    assert_eq!(
        parse_line(&a.recv().await).unwrap(),
        Command::Ability {
            name: "Speed Up".to_string(),
            sender: 2
        }
    );

    drop(b);
    assert_eq!(a.recv().await, "LEAVE 2");
}

#[tokio::test]
async fn test_freed_slot_is_reused() {
    let addr = start_relay(2).await;

    let mut a = Client::connect(addr).await;
    assert_eq!(a.recv().await, "START 1");
    a.recv().await;

    let mut b = Client::connect(addr).await;
    assert_eq!(b.recv().await, "START 2");
    a.recv().await;

    drop(a);
    b.recv().await;
    assert_eq!(b.recv().await, "LEAVE 1");

    let mut c = Client::connect(addr).await;
    assert_eq!(c.recv().await, "START 1");
    assert_eq!(c.recv().await, "USERS 1 2");
}

#[tokio::test]
async fn test_full_relay_closes_extra_connection() {
    let addr = start_relay(1).await;

    let mut a = Client::connect(addr).await;
    assert_eq!(a.recv().await, "START 1");

    let mut extra = Client::connect(addr).await;
    let closed = timeout(Duration::from_secs(2), extra.lines.next_line())
        .await
        .unwrap()
        .unwrap();
    assert!(closed.is_none());
}
