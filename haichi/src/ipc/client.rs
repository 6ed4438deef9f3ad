use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use haichi_ipc::{Command, EventFilter, Response, StateEvent, SubscribeRequest};

use super::{EVENT_SOCKET_PATH, SOCKET_PATH};

/// Blocking command client. The daemon answers every command with one
/// line, so a `restore` may block until its retry has run.
pub struct IpcClient {
    writer: UnixStream,
    reader: BufReader<UnixStream>,
}

impl IpcClient {
    pub fn connect() -> Result<Self> {
        let writer = UnixStream::connect(SOCKET_PATH)
            .context("Failed to connect to haichi daemon (is `haichi start` running?)")?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self { writer, reader })
    }

    pub fn send(&mut self, cmd: &Command) -> Result<Response> {
        write_line(&mut self.writer, cmd)?;
        read_line(&mut self.reader)?.context("Daemon closed the connection before answering")
    }
}

/// Client for subscribing to state events
pub struct EventClient {
    reader: BufReader<UnixStream>,
}

impl EventClient {
    pub fn connect(request: &SubscribeRequest) -> Result<Self> {
        let mut stream = UnixStream::connect(EVENT_SOCKET_PATH)
            .context("Failed to connect to haichi event server")?;
        write_line(&mut stream, request)?;
        Ok(Self {
            reader: BufReader::new(stream),
        })
    }

    /// Blocks for the next event. `None` once the daemon hangs up.
    pub fn next_event(&mut self) -> Result<Option<StateEvent>> {
        read_line(&mut self.reader)
    }
}

/// Subscribe and print events to stdout
pub fn subscribe_and_print(filter: Option<EventFilter>) -> Result<()> {
    let request = SubscribeRequest {
        filter: filter.unwrap_or_default(),
    };

    let mut client = EventClient::connect(&request)?;
    while let Some(event) = client.next_event()? {
        println!("{}", serde_json::to_string(&event)?);
    }

    Ok(())
}

fn write_line<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer.write_all(json.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Next JSON line, skipping blank ones. `None` at end of stream.
fn read_line<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            let message = serde_json::from_str(trimmed)
                .with_context(|| format!("Malformed message from daemon: {}", trimmed))?;
            return Ok(Some(message));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use haichi_ipc::RestoreOutcome;

    #[test]
    fn test_read_line_keeps_buffered_messages() {
        // Two responses arriving in one packet must both be readable
        let mut reader = Cursor::new(
            b"{\"type\":\"ok\"}\n\n{\"type\":\"restore\",\"outcome\":{\"type\":\"success\"}}\n"
                .to_vec(),
        );

        let first: Option<Response> = read_line(&mut reader).unwrap();
        assert_eq!(first, Some(Response::Ok));
        let second: Option<Response> = read_line(&mut reader).unwrap();
        assert_eq!(
            second,
            Some(Response::Restore {
                outcome: RestoreOutcome::Success
            })
        );
        let end: Option<Response> = read_line(&mut reader).unwrap();
        assert_eq!(end, None);
    }

    #[test]
    fn test_read_line_rejects_garbage() {
        let mut reader = Cursor::new(b"garbage\n".to_vec());
        let result: Result<Option<StateEvent>> = read_line(&mut reader);
        assert!(result.is_err());
    }

    #[test]
    fn test_write_line_is_newline_terminated() {
        let mut out = Vec::new();
        write_line(&mut out, &Command::SetAutoRestore { enabled: true }).unwrap();
        assert_eq!(out, b"{\"type\":\"set_auto_restore\",\"enabled\":true}\n");
    }
}
