use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;

use haichi_ipc::{Command, Response};

use super::SOCKET_PATH;

pub type CommandSender = mpsc::Sender<(Command, mpsc::Sender<Response>)>;

/// Command socket. Each line is one `Command`; each gets exactly one
/// `Response` line back, even when the display context never answers.
pub struct IpcServer {
    socket_path: PathBuf,
    cmd_tx: CommandSender,
    reply_timeout: Duration,
}

impl IpcServer {
    /// `reply_timeout` must cover a restore that waits out its retry.
    pub fn new(cmd_tx: CommandSender, reply_timeout: Duration) -> Self {
        Self {
            socket_path: PathBuf::from(SOCKET_PATH),
            cmd_tx,
            reply_timeout,
        }
    }

    pub async fn run(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .with_context(|| format!("Failed to remove stale socket {:?}", self.socket_path))?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind {:?}", self.socket_path))?;
        tracing::info!(
            "IPC server listening on {:?} (reply timeout {:?})",
            self.socket_path,
            self.reply_timeout
        );

        loop {
            let (stream, _addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                    continue;
                }
            };
            let (reader, writer) = stream.into_split();
            let cmd_tx = self.cmd_tx.clone();
            let reply_timeout = self.reply_timeout;
            tokio::spawn(async move {
                if let Err(e) = serve_client(reader, writer, cmd_tx, reply_timeout).await {
                    tracing::warn!("IPC client error: {}", e);
                }
            });
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn serve_client<R, W>(
    reader: R,
    mut writer: W,
    cmd_tx: CommandSender,
    reply_timeout: Duration,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Command>(line) {
            Ok(cmd) => request(cmd, &cmd_tx, reply_timeout).await,
            Err(e) => Response::Error {
                message: format!("Invalid command: {}", e),
            },
        };

        let mut json = serde_json::to_string(&response)?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Hand a command to the display context and wait for its answer.
async fn request(cmd: Command, cmd_tx: &CommandSender, reply_timeout: Duration) -> Response {
    tracing::debug!("Received command: {:?}", cmd);
    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    if cmd_tx.send((cmd, resp_tx)).await.is_err() {
        return Response::Error {
            message: "haichi is shutting down".to_string(),
        };
    }

    match tokio::time::timeout(reply_timeout, resp_rx.recv()).await {
        Ok(Some(response)) => response,
        Ok(None) => Response::Error {
            message: "Command dropped without a reply".to_string(),
        },
        Err(_) => {
            tracing::warn!("No reply within {:?}", reply_timeout);
            Response::Error {
                message: format!("No reply within {} ms", reply_timeout.as_millis()),
            }
        }
    }
}
