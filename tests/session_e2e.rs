//! End-to-end tests: a real listener on an ephemeral port, driven by plain
//! TCP clients speaking the line protocol.

use std::net::SocketAddr;
use std::time::Duration;

use tictactoe_server::config::{OccupiedCellPolicy, ServerConfig};
use tictactoe_server::server::{SessionHandle, serve, start_session};
use tictactoe_server::session::{Phase, Position, Seat};
use tictactoe_server::{ClientToServer, ServerToClient};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

const STEP: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    session: SessionHandle,
}

async fn start_server(policy: OccupiedCellPolicy) -> TestServer {
    start_server_with(ServerConfig {
        occupied_cell_policy: policy,
        ..ServerConfig::default()
    })
    .await
}

/// Binds `config` on an ephemeral loopback port.
async fn start_server_with(config: ServerConfig) -> TestServer {
    let config = ServerConfig {
        bind_address: "127.0.0.1".into(),
        port: 0,
        ..config
    };
    let listener = tictactoe_server::bind(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let session = start_session(&config);
    tokio::spawn(serve(
        listener,
        session.clone(),
        config,
        std::future::pending(),
    ));
    TestServer { addr, session }
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Connects and reads the ID line.
    async fn join(addr: SocketAddr) -> (Self, Seat) {
        let mut client = Self::connect(addr).await;
        match client.recv().await {
            Some(ServerToClient::Id(seat)) => (client, seat),
            other => panic!("expected ID, got {other:?}"),
        }
    }

    async fn send_bytes(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn send(&mut self, command: ClientToServer) {
        self.send_raw(&command.to_string()).await;
    }

    async fn play(&mut self, row: u8, col: u8) {
        self.send(ClientToServer::Move(Position::new(row, col).unwrap()))
            .await;
    }

    /// Next server line, or None at end of stream.
    async fn recv(&mut self) -> Option<ServerToClient> {
        let mut line = String::new();
        let read = tokio::time::timeout(STEP, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a server line")
            .unwrap();
        if read == 0 {
            return None;
        }
        Some(line.parse().unwrap())
    }

    async fn expect(&mut self, expected: ServerToClient) {
        assert_eq!(self.recv().await, Some(expected));
    }

    async fn expect_closed(&mut self) {
        assert_eq!(self.recv().await, None);
    }

    /// True if nothing arrives within a short window.
    async fn is_quiet(&mut self) -> bool {
        let mut line = String::new();
        tokio::time::timeout(
            Duration::from_millis(200),
            self.reader.read_line(&mut line),
        )
        .await
        .is_err()
    }
}

fn mv(seat: Seat, row: u8, col: u8) -> ServerToClient {
    ServerToClient::Move {
        seat,
        pos: Position::new(row, col).unwrap(),
    }
}

async fn seated_pair(server: &TestServer) -> (TestClient, TestClient) {
    let (one, seat_one) = TestClient::join(server.addr).await;
    let (two, seat_two) = TestClient::join(server.addr).await;
    assert_eq!(seat_one, Seat::One);
    assert_eq!(seat_two, Seat::Two);
    (one, two)
}

/// Waits until the session reports `count` seated connections.
async fn wait_for_active(session: &SessionHandle, count: usize) {
    for _ in 0..100 {
        if session.snapshot().await.unwrap().active_count == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session never reached {count} active seats");
}

#[tokio::test]
async fn test_third_connection_is_busy() {
    let server = start_server(OccupiedCellPolicy::Reject).await;
    let (_one, _two) = seated_pair(&server).await;

    let mut third = TestClient::connect(server.addr).await;
    third.expect(ServerToClient::Busy).await;
    third.expect_closed().await;

    let snapshot = server.session.snapshot().await.unwrap();
    assert_eq!(snapshot.active_count, 2);
    assert_eq!(snapshot.phase, Phase::InProgress);
}

#[tokio::test]
async fn test_win_scenario_over_tcp() {
    let server = start_server(OccupiedCellPolicy::Reject).await;
    let (mut one, mut two) = seated_pair(&server).await;

    let script = [
        (Seat::One, 0, 0),
        (Seat::Two, 1, 1),
        (Seat::One, 0, 1),
        (Seat::Two, 2, 2),
        (Seat::One, 0, 2),
    ];
    for (seat, row, col) in script {
        match seat {
            Seat::One => one.play(row, col).await,
            Seat::Two => two.play(row, col).await,
        }
        one.expect(mv(seat, row, col)).await;
        two.expect(mv(seat, row, col)).await;
    }
    one.expect(ServerToClient::Win(Seat::One)).await;
    two.expect(ServerToClient::Win(Seat::One)).await;

    let snapshot = server.session.snapshot().await.unwrap();
    assert!(snapshot.board.is_empty());
    assert_eq!(snapshot.board.turn_owner(), Seat::One);
    assert_eq!(snapshot.rounds_completed, 1);

    // The next round starts without any confirmation.
    one.play(1, 1).await;
    one.expect(mv(Seat::One, 1, 1)).await;
    two.expect(mv(Seat::One, 1, 1)).await;
}

#[tokio::test]
async fn test_draw_over_tcp() {
    let server = start_server(OccupiedCellPolicy::Reject).await;
    let (mut one, mut two) = seated_pair(&server).await;

    // X O X / X O O / O X X
    let cells = [
        (0, 0),
        (0, 1),
        (0, 2),
        (1, 1),
        (1, 0),
        (1, 2),
        (2, 1),
        (2, 0),
        (2, 2),
    ];
    for (i, (row, col)) in cells.into_iter().enumerate() {
        let seat = if i % 2 == 0 { Seat::One } else { Seat::Two };
        match seat {
            Seat::One => one.play(row, col).await,
            Seat::Two => two.play(row, col).await,
        }
        one.expect(mv(seat, row, col)).await;
        two.expect(mv(seat, row, col)).await;
    }
    one.expect(ServerToClient::Draw).await;
    two.expect(ServerToClient::Draw).await;
}

#[tokio::test]
async fn test_out_of_turn_move_gets_wait() {
    let server = start_server(OccupiedCellPolicy::Reject).await;
    let (mut one, mut two) = seated_pair(&server).await;

    two.play(1, 1).await;
    two.expect(ServerToClient::Wait).await;
    assert!(one.is_quiet().await);

    let snapshot = server.session.snapshot().await.unwrap();
    assert!(snapshot.board.is_empty());
}

#[tokio::test]
async fn test_lone_player_is_told_to_wait() {
    let server = start_server(OccupiedCellPolicy::Reject).await;
    let (mut one, _) = TestClient::join(server.addr).await;

    one.play(0, 0).await;
    one.expect(ServerToClient::Wait).await;
    assert_eq!(
        server.session.snapshot().await.unwrap().phase,
        Phase::Waiting
    );
}

#[tokio::test]
async fn test_occupied_cell_policies() {
    let server = start_server(OccupiedCellPolicy::Reject).await;
    let (mut one, mut two) = seated_pair(&server).await;
    one.play(1, 1).await;
    one.expect(mv(Seat::One, 1, 1)).await;
    two.expect(mv(Seat::One, 1, 1)).await;
    two.play(1, 1).await;
    two.expect(ServerToClient::Occupied(Position::new(1, 1).unwrap()))
        .await;
    assert!(one.is_quiet().await);

    let server = start_server(OccupiedCellPolicy::Ignore).await;
    let (mut one, mut two) = seated_pair(&server).await;
    one.play(1, 1).await;
    one.expect(mv(Seat::One, 1, 1)).await;
    two.expect(mv(Seat::One, 1, 1)).await;
    two.play(1, 1).await;
    assert!(two.is_quiet().await);
    assert!(one.is_quiet().await);
}

#[tokio::test]
async fn test_quit_is_echoed_and_frees_the_seat() {
    let server = start_server(OccupiedCellPolicy::Reject).await;
    let (mut one, mut two) = seated_pair(&server).await;
    one.play(0, 0).await;
    one.expect(mv(Seat::One, 0, 0)).await;
    two.expect(mv(Seat::One, 0, 0)).await;

    one.send(ClientToServer::Quit).await;
    one.expect(ServerToClient::Quit(Seat::One)).await;
    one.expect_closed().await;
    two.expect(ServerToClient::Quit(Seat::One)).await;

    wait_for_active(&server.session, 1).await;
    let snapshot = server.session.snapshot().await.unwrap();
    assert!(snapshot.board.is_empty());
    assert_eq!(snapshot.phase, Phase::Waiting);

    let (mut newcomer, seat) = TestClient::join(server.addr).await;
    assert_eq!(seat, Seat::One);
    newcomer.play(2, 2).await;
    newcomer.expect(mv(Seat::One, 2, 2)).await;
    two.expect(mv(Seat::One, 2, 2)).await;
}

#[tokio::test]
async fn test_abrupt_disconnect_informs_peer() {
    let server = start_server(OccupiedCellPolicy::Reject).await;
    let (one, mut two) = seated_pair(&server).await;

    drop(one);
    two.expect(ServerToClient::Quit(Seat::One)).await;
    wait_for_active(&server.session, 1).await;

    // Seat 2 stays registered and seat 1 is offered to the next comer.
    let (_again, seat) = TestClient::join(server.addr).await;
    assert_eq!(seat, Seat::One);
}

#[tokio::test]
async fn test_malformed_line_ends_only_that_connection() {
    let server = start_server(OccupiedCellPolicy::Reject).await;
    let (mut one, mut two) = seated_pair(&server).await;

    two.send_raw("JUMP 1 1").await;
    two.expect(ServerToClient::Error("unknown command 'JUMP'".into()))
        .await;
    two.expect(ServerToClient::Quit(Seat::Two)).await;
    two.expect_closed().await;
    one.expect(ServerToClient::Quit(Seat::Two)).await;

    wait_for_active(&server.session, 1).await;
}

#[tokio::test]
async fn test_non_utf8_line_is_a_protocol_violation() {
    let server = start_server(OccupiedCellPolicy::Reject).await;
    let (mut one, mut two) = seated_pair(&server).await;

    two.send_bytes(b"MOVE \xff\xfe 1\n").await;
    two.expect(ServerToClient::Error("line is not valid UTF-8".into()))
        .await;
    two.expect(ServerToClient::Quit(Seat::Two)).await;
    two.expect_closed().await;
    one.expect(ServerToClient::Quit(Seat::Two)).await;

    wait_for_active(&server.session, 1).await;
}

#[tokio::test]
async fn test_overlong_line_is_a_protocol_violation() {
    let server = start_server_with(ServerConfig {
        max_line_bytes: 32,
        ..ServerConfig::default()
    })
    .await;
    let (mut one, mut two) = seated_pair(&server).await;

    // Exactly the limit, no terminator: the server has read all of it.
    one.send_bytes(&[b'A'; 32]).await;
    one.expect(ServerToClient::Error("line exceeds 32 bytes".into()))
        .await;
    one.expect(ServerToClient::Quit(Seat::One)).await;
    one.expect_closed().await;
    two.expect(ServerToClient::Quit(Seat::One)).await;
}

#[tokio::test]
async fn test_line_within_limit_is_accepted() {
    let server = start_server_with(ServerConfig {
        max_line_bytes: 16,
        ..ServerConfig::default()
    })
    .await;
    let (mut one, mut two) = seated_pair(&server).await;

    one.send_raw("MOVE   1   1").await;
    one.expect(mv(Seat::One, 1, 1)).await;
    two.expect(mv(Seat::One, 1, 1)).await;
}

#[tokio::test]
async fn test_blank_lines_are_ignored() {
    let server = start_server(OccupiedCellPolicy::Reject).await;
    let (mut one, mut two) = seated_pair(&server).await;

    one.send_raw("").await;
    one.send_raw("MOVE 2 0\r").await;
    one.expect(mv(Seat::One, 2, 0)).await;
    two.expect(mv(Seat::One, 2, 0)).await;
}
