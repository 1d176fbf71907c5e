use backend_manager::BackendId;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::AppState;
use crate::config::ServerConfig;

/// Build a fully-wired `AppState` with default configuration.
pub fn test_app_state() -> AppState {
    AppState::new(ServerConfig::default())
}

/// A minimal MPD: greets, answers `status`, closes on `close`, and says `OK`
/// to anything else.
pub struct FakeMpd {
    pub id: BackendId,
    lines: mpsc::UnboundedReceiver<String>,
}

impl FakeMpd {
    pub async fn next_line(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(5), self.lines.recv())
            .await
            .expect("timed out waiting for a line")
            .expect("fake server stopped")
    }
}

pub async fn spawn_fake_mpd() -> FakeMpd {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, lines) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let (read_half, mut write_half) = stream.into_split();
                if write_half.write_all(b"OK MPD 0.23.5\n").await.is_err() {
                    return;
                }
                let mut lines = BufReader::new(read_half).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let reply: &[u8] = match line.as_str() {
                        "close" => b"",
                        "status" => b"state: stop\nOK\n",
                        _ => b"OK\n",
                    };
                    let closing = reply.is_empty();
                    let _ = tx.send(line);
                    if closing {
                        return;
                    }
                    if write_half.write_all(reply).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    FakeMpd {
        id: BackendId::new("127.0.0.1", port),
        lines,
    }
}

/// Next message pushed to a client, failing the test after a few seconds.
pub async fn recv_text(rx: &mut mpsc::Receiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a broadcast")
        .expect("client channel closed")
}
