//! Stdio transport: newline-delimited JSON-RPC over stdin/stdout.
//!
//! Log output must go to stderr when this transport is active; stdout
//! belongs to the protocol.

use std::io::{self, BufRead, Write};

use crate::protocol::{JsonRpcMessage, JsonRpcResponse};

/// Transport for reading/writing JSON-RPC messages over stdio.
pub struct StdioTransport {
    reader: Box<dyn BufRead + Send>,
    writer: Box<dyn Write + Send>,
}

impl StdioTransport {
    /// Create a transport using stdin/stdout.
    pub fn stdio() -> Self {
        Self {
            reader: Box::new(io::BufReader::new(io::stdin())),
            writer: Box::new(io::stdout()),
        }
    }

    /// Create a transport with custom reader/writer (for testing).
    #[cfg(test)]
    pub fn new(reader: Box<dyn BufRead + Send>, writer: Box<dyn Write + Send>) -> Self {
        Self { reader, writer }
    }

    /// Read a single JSON-RPC message, skipping blank lines. `None` signals
    /// EOF.
    pub fn read_message(&mut self) -> io::Result<Option<JsonRpcMessage>> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None); // EOF
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            tracing::debug!("Received: {}", line);

            return serde_json::from_str::<JsonRpcMessage>(line)
                .map(Some)
                .map_err(|e| {
                    tracing::warn!("Failed to parse message: {}", line);
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Invalid JSON-RPC message: {}", e),
                    )
                });
        }
    }

    /// Write a JSON-RPC response.
    pub fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )
        })?;

        tracing::debug!("Sending: {}", json);

        writeln!(self.writer, "{}", json)?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestId;
    use std::io::Cursor;

    #[test]
    fn read_request() {
        let input = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#;
        let reader = Box::new(Cursor::new(format!("{}\n", input)));
        let writer = Box::new(Vec::new());

        let mut transport = StdioTransport::new(reader, writer);
        let msg = transport.read_message().unwrap().unwrap();

        assert_eq!(msg.method, "tools/list");
        assert_eq!(msg.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn read_notification() {
        let input = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let reader = Box::new(Cursor::new(format!("{}\n", input)));
        let writer = Box::new(Vec::new());

        let mut transport = StdioTransport::new(reader, writer);
        let msg = transport.read_message().unwrap().unwrap();

        assert!(msg.is_notification());
        assert_eq!(msg.method, "notifications/initialized");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let input = "\n\n{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}\n";
        let reader = Box::new(Cursor::new(input.to_string()));
        let writer = Box::new(Vec::new());

        let mut transport = StdioTransport::new(reader, writer);
        let msg = transport.read_message().unwrap().unwrap();
        assert_eq!(msg.method, "ping");
    }

    #[test]
    fn read_eof() {
        let reader = Box::new(Cursor::new(Vec::new()));
        let writer = Box::new(Vec::new());

        let mut transport = StdioTransport::new(reader, writer);
        assert!(transport.read_message().unwrap().is_none());
    }

    #[test]
    fn read_invalid_json_is_an_error() {
        let reader = Box::new(Cursor::new("not json\n".to_string()));
        let writer = Box::new(Vec::new());

        let mut transport = StdioTransport::new(reader, writer);
        let err = transport.read_message().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn write_response_is_newline_delimited() {
        use std::sync::{Arc, Mutex};

        struct SharedWriter(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedWriter {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let reader = Box::new(Cursor::new(Vec::new()));
        let writer = Box::new(SharedWriter(buffer.clone()));

        let mut transport = StdioTransport::new(reader, writer);
        let response =
            JsonRpcResponse::success(RequestId::Number(1), serde_json::json!({"ok": true}));
        transport.write_response(&response).unwrap();

        let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(output.ends_with('\n'));
        assert!(output.contains("\"jsonrpc\":\"2.0\""));
        assert!(output.contains("\"id\":1"));
    }
}
