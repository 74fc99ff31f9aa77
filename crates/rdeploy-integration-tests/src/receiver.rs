//! In-process rdeploy receiver
//!
//! Listens on an ephemeral localhost port and decodes every frame it is
//! sent, so tests can check what actually went over the wire.

use rdeploy::deploy::{RemoteFileRecord, read_frame};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Largest frame the receiver accepts (64 MiB)
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Result type for receiver operations
pub type Result<T> = std::result::Result<T, ReceiverError>;

/// Error type for receiver operations
#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] rdeploy::Error),

    #[error("Timed out waiting for {expected} files, got {received}")]
    Timeout { expected: usize, received: usize },
}

/// A file decoded from one connection
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    /// The record as it was sent
    pub record: RemoteFileRecord,
    /// Original file contents
    pub contents: Vec<u8>,
}

/// Accepts connections and records decoded files
pub struct Receiver {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<ReceivedFile>>>,
    errors: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl Receiver {
    /// Bind to an ephemeral port on 127.0.0.1 and start accepting
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let received = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));

        let handle = tokio::spawn({
            let received = Arc::clone(&received);
            let errors = Arc::clone(&errors);
            async move {
                loop {
                    let Ok((mut socket, peer)) = listener.accept().await else {
                        break;
                    };

                    match receive_one(&mut socket).await {
                        Ok(file) => {
                            tracing::debug!(%peer, name = %file.record.name, "Received file");
                            received.lock().unwrap().push(file);
                        }
                        Err(e) => errors.lock().unwrap().push(e.to_string()),
                    }
                }
            }
        });

        Ok(Self {
            addr,
            received,
            errors,
            handle,
        })
    }

    /// Port the receiver listens on
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Host specifier pointing at this receiver
    pub fn host_spec(&self) -> String {
        format!("127.0.0.1:{}", self.port())
    }

    /// Files received so far
    pub fn received(&self) -> Vec<ReceivedFile> {
        self.received.lock().unwrap().clone()
    }

    /// Decoding errors seen so far
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    /// Wait until at least `count` files have arrived
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Result<Vec<ReceivedFile>> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let received = self.received();
            if received.len() >= count {
                return Ok(received);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ReceiverError::Timeout {
                    expected: count,
                    received: received.len(),
                });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop accepting connections
    pub fn stop(self) {
        self.handle.abort();
    }
}

async fn receive_one(socket: &mut tokio::net::TcpStream) -> Result<ReceivedFile> {
    let payload = read_frame(socket, MAX_FRAME_LEN).await?;
    let record = RemoteFileRecord::from_json(&payload)?;
    let contents = record.decode_contents()?;
    Ok(ReceivedFile { record, contents })
}
