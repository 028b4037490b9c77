//! A scripted bus peer listening on a unix socket in a temp directory.

use std::path::PathBuf;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

pub struct FakeBus {
    // Keeps the socket directory alive for the test's duration
    _dir: TempDir,
    pub path: PathBuf,
    pub handle: JoinHandle<Vec<String>>,
}

impl FakeBus {
    /// Accept one connection, answer each received line with the next reply,
    /// and return every line received once the client hangs up.
    pub fn start(replies: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus");
        let listener = UnixListener::bind(&path).unwrap();
        let replies: Vec<String> = replies.iter().map(|reply| reply.to_string()).collect();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            assert_eq!(reader.read_u8().await.unwrap(), 0, "Expected leading NUL");

            let mut received = Vec::new();
            let mut replies = replies.into_iter();
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => received.push(line.trim_end().to_string()),
                }
                if let Some(reply) = replies.next() {
                    let stream = reader.get_mut();
                    if stream
                        .write_all(format!("{reply}\r\n").as_bytes())
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
            received
        });

        Self {
            _dir: dir,
            path,
            handle,
        }
    }

    pub fn address(&self) -> String {
        format!("unix:path={}", self.path.display())
    }

    pub async fn received(self) -> Vec<String> {
        self.handle.await.unwrap()
    }
}
