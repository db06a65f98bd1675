//! TCP front end: one task per connection, one reply per request line.

use crate::protocol::{Command, ParseError, Reply};
use futures::{SinkExt, StreamExt};
use libchainfs::{BlockStore, FileSystemManager};
use std::future::Future;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Framed};
use tracing::{error, info, warn};

/// Accept connections until `shutdown` resolves. Connections already being
/// served keep running on their own tasks.
pub async fn serve<S, F>(
    listener: TcpListener,
    fs: Arc<FileSystemManager<S>>,
    max_line_length: usize,
    shutdown: F,
) where
    S: BlockStore + 'static,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!(%peer, "client connected");
                    let fs = fs.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, fs, max_line_length).await {
                            warn!(%peer, error = %e, "connection aborted");
                        }
                        info!(%peer, "client disconnected");
                    });
                }
                Err(e) => error!(error = %e, "failed to accept connection"),
            }
        }
    }
}

/// Serve one client until it sends QUIT or closes its side.
///
/// Lines are split on `\n` and decoded as lossy UTF-8, so stray bytes never
/// end a session. An over-long line is answered as malformed and ends the
/// session, since the rest of that line can no longer be framed reliably.
pub async fn handle_connection<S: BlockStore>(
    stream: TcpStream,
    fs: Arc<FileSystemManager<S>>,
    max_line_length: usize,
) -> Result<(), AnyDelimiterCodecError> {
    let codec =
        AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max_line_length);
    let mut lines = Framed::new(stream, codec);

    while let Some(chunk) = lines.next().await {
        let line = match chunk {
            Ok(chunk) => String::from_utf8_lossy(&chunk).into_owned(),
            Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => {
                warn!(max_line_length, "request line too long");
                lines
                    .send(Reply::Error(ParseError::Malformed.to_string()).to_string())
                    .await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let reply = match line.parse::<Command>() {
            Ok(Command::Quit) => {
                lines.send(Reply::Closing.to_string()).await?;
                return Ok(());
            }
            Ok(cmd) => dispatch(&fs, cmd).await,
            Err(e) => {
                warn!(%line, error = %e, "rejected request");
                Reply::Error(e.to_string())
            }
        };
        lines.send(reply.to_string()).await?;
    }
    Ok(())
}

/// Run one parsed command against the store and render its reply.
pub async fn dispatch<S: BlockStore>(fs: &FileSystemManager<S>, cmd: Command) -> Reply {
    let verb = cmd.verb();
    let result = match cmd {
        Command::Create { name } => fs.create_file(&name).await.map(|_| Reply::Ok),
        Command::Read { name } => fs
            .read_file(&name)
            .await
            .map(|data| Reply::Data(String::from_utf8_lossy(&data).into_owned())),
        Command::Write { name, payload } => fs
            .write_file(&name, payload.as_bytes())
            .await
            .map(|_| Reply::Ok),
        Command::Delete { name } => fs.delete_file(&name).await.map(|_| Reply::Ok),
        Command::List => Ok(Reply::Data(fs.list_files().await.join(","))),
        Command::Quit => Ok(Reply::Closing),
    };
    result.unwrap_or_else(|e| {
        warn!(verb, kind = e.kind(), error = %e, "request failed");
        Reply::Error(e.to_string())
    })
}

/// Resolve on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down...");
}
