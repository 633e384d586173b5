//! TCP server and client for the external command socket.
//!
//! The server answers each received line with exactly one line. Echo is
//! answered in place; pushes are forwarded to the deck loop as
//! [`CommandRequest`]s and answered once the loop has accepted or refused them.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader as AsyncBufReader,
};
use tokio::net::{TcpListener, TcpStream as AsyncTcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use super::external::ExternalCommandMessage;
use crate::error::{DpError, Result};

/// Longest request line accepted, newline included.
pub const MAX_LINE_BYTES: u64 = 64 * 1024;

/// Pause after a failed accept so descriptor exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A command the server needs the deck loop to carry out.
#[derive(Debug)]
pub enum CommandRequest {
    Push {
        key: u32,
        duration: Duration,
        reply: oneshot::Sender<std::result::Result<(), String>>,
    },
}

/// Bind the command listener.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DpError::CommandServer {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;
    info!(addr = %addr, "Command server listening");
    Ok(listener)
}

/// Accept connections until the request channel closes.
pub async fn serve(listener: TcpListener, requests: mpsc::Sender<CommandRequest>) -> Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        if requests.is_closed() {
            debug!("Deck loop gone, stopping command server");
            return Ok(());
        }
        debug!(%peer, "Command connection accepted");
        let requests = requests.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, requests).await {
                warn!(%peer, error = %e, "Command connection failed");
            }
        });
    }
}

async fn handle_connection(
    stream: AsyncTcpStream,
    requests: mpsc::Sender<CommandRequest>,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    serve_lines(AsyncBufReader::new(read_half), write_half, &requests).await
}

/// Answer every line of `reader` on `writer`.
///
/// A line longer than [`MAX_LINE_BYTES`] is answered with an error and ends
/// the conversation.
async fn serve_lines<R, W>(mut reader: R, mut writer: W, requests: &mpsc::Sender<CommandRequest>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = (&mut reader).take(MAX_LINE_BYTES).read_until(b'\n', &mut buf).await?;
        if read == 0 {
            return Ok(());
        }
        if buf.last() != Some(&b'\n') && read as u64 == MAX_LINE_BYTES {
            warn!(limit = MAX_LINE_BYTES, "Command line too long, closing connection");
            let reply = ExternalCommandMessage::error(format!("line exceeds {MAX_LINE_BYTES} bytes"));
            write_line(&mut writer, &reply).await?;
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }
        let reply = respond(&line, requests).await;
        write_line(&mut writer, &reply).await?;
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, message: &ExternalCommandMessage) -> Result<()> {
    let mut out = message.to_json();
    out.push('\n');
    writer.write_all(out.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Produce the reply for one request line.
#[instrument(skip(requests))]
pub async fn respond(line: &str, requests: &mpsc::Sender<CommandRequest>) -> ExternalCommandMessage {
    let message = match ExternalCommandMessage::parse_line(line) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Rejected command line");
            return ExternalCommandMessage::error(e.to_string());
        }
    };
    respond_to(message, requests).await
}

/// Produce the reply for one parsed message.
pub async fn respond_to(
    message: ExternalCommandMessage,
    requests: &mpsc::Sender<CommandRequest>,
) -> ExternalCommandMessage {
    match message {
        ExternalCommandMessage::Echo { message } => ExternalCommandMessage::pong(Some(message)),
        ExternalCommandMessage::Push { key, duration } => {
            let Ok(hold) = Duration::try_from_secs_f64(duration) else {
                return ExternalCommandMessage::push_ack(key, duration, Err(format!("invalid duration {duration}")));
            };
            let (reply, outcome) = oneshot::channel();
            let request = CommandRequest::Push {
                key,
                duration: hold,
                reply,
            };
            let result = if requests.send(request).await.is_err() {
                Err("deck is shutting down".to_string())
            } else {
                outcome
                    .await
                    .unwrap_or_else(|_| Err("deck dropped the request".to_string()))
            };
            ExternalCommandMessage::push_ack(key, duration, result)
        }
        other => ExternalCommandMessage::error(format!(
            "unsupported message_type {}",
            other.message_type()
        )),
    }
}

/// Send one message and wait for one reply line (blocking).
pub fn send_command(
    host: &str,
    port: u16,
    message: &ExternalCommandMessage,
    timeout: Duration,
) -> Result<ExternalCommandMessage> {
    let addr = format!("{host}:{port}");
    let connect_err = |reason: String| DpError::CommandConnect {
        addr: addr.clone(),
        reason,
    };

    let targets = (host, port)
        .to_socket_addrs()
        .map_err(|e| connect_err(e.to_string()))?;
    let mut last_error = "no address resolved".to_string();
    let mut stream = None;
    for target in targets {
        match TcpStream::connect_timeout(&target, timeout) {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    let mut stream = stream.ok_or_else(|| connect_err(last_error))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let mut payload = message.to_json();
    payload.push('\n');
    stream.write_all(payload.as_bytes())?;
    stream.flush()?;

    let mut line = String::new();
    BufReader::new(&stream)
        .read_line(&mut line)
        .map_err(|e| connect_err(e.to_string()))?;
    if line.trim().is_empty() {
        return Err(connect_err("connection closed without a response".into()));
    }
    ExternalCommandMessage::parse_line(&line)
}
