//! In-process stand-in for an MPD server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::id::BackendId;

pub(crate) const GREETING: &str = "OK MPD 0.23.5\n";

/// How the fake server answers one received line
pub(crate) enum FakeReply {
    Ok,
    Text(String),
    Raw(Vec<u8>),
    /// Close the connection without replying
    Close,
}

pub(crate) struct FakeMpd {
    pub id: BackendId,
    lines: mpsc::UnboundedReceiver<String>,
    accepted: Arc<AtomicUsize>,
}

impl FakeMpd {
    /// Next line the server received, across all connections.
    pub async fn next_line(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(5), self.lines.recv())
            .await
            .expect("timed out waiting for a line")
            .expect("fake server stopped")
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// Bind on an ephemeral port and serve connections one after another.
pub(crate) async fn spawn_fake_mpd<F>(respond: F) -> FakeMpd
where
    F: Fn(&str) -> FakeReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, lines) = mpsc::unbounded_channel();
    let accepted = Arc::new(AtomicUsize::new(0));
    let respond = Arc::new(respond);

    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let tx = tx.clone();
            let respond = respond.clone();
            tokio::spawn(async move {
                let (read_half, mut write_half) = stream.into_split();
                if write_half.write_all(GREETING.as_bytes()).await.is_err() {
                    return;
                }
                let mut lines = BufReader::new(read_half).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let reply = respond(&line);
                    let _ = tx.send(line);
                    let bytes = match reply {
                        FakeReply::Ok => b"OK\n".to_vec(),
                        FakeReply::Text(text) => text.into_bytes(),
                        FakeReply::Raw(bytes) => bytes,
                        FakeReply::Close => return,
                    };
                    if write_half.write_all(&bytes).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    FakeMpd {
        id: BackendId::new("127.0.0.1", port),
        lines,
        accepted,
    }
}
