//! Socket transport for the two REPL streams.
//!
//! The primary stream is a bare line-oriented REPL; the backchannel is a
//! structured EDN stream. Both are read by decoding values directly off the
//! socket: bytes accumulate in a buffer that the restartable reader is
//! retried against as more data arrives, so no framing beyond the notation
//! itself is needed.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tether_edn::{ReadError, Value, read_partial};
use tracing::trace;

use crate::errors::{ClientError, StreamKind};

/// Log target for transport reads and writes.
pub(crate) const TRANSPORT_TARGET: &str = "tether_client::transport";

const READ_CHUNK: usize = 4096;

/// Opens a TCP connection with a bounded connect timeout.
pub(crate) fn connect_tcp(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<TcpStream, ClientError> {
    let address = resolve_address(host, port)
        .map_err(|source| ClientError::connect(host, port, source))?;
    TcpStream::connect_timeout(&address, timeout)
        .map_err(|source| ClientError::connect(host, port, source))
}

fn resolve_address(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    let mut addresses = (host, port).to_socket_addrs()?;
    addresses
        .find(|address| matches!(address, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no resolved addresses")
        })
}

/// Shuts down both directions of a stream, releasing any blocked reader.
pub(crate) fn shutdown(stream: &TcpStream) {
    let _ = stream.shutdown(Shutdown::Both);
}

/// Writes raw text to a stream and flushes it.
pub(crate) fn write_text(
    stream: &mut TcpStream,
    kind: StreamKind,
    text: &str,
) -> Result<(), ClientError> {
    trace!(target: TRANSPORT_TARGET, stream = %kind, text, "writing");
    stream
        .write_all(text.as_bytes())
        .and_then(|()| stream.flush())
        .map_err(|source| ClientError::io(kind, source))
}

/// Decodes a socket's bytes into a sequence of top-level values.
pub(crate) struct ValueStream {
    stream: TcpStream,
    kind: StreamKind,
    buffer: Vec<u8>,
}

impl ValueStream {
    pub(crate) fn new(stream: TcpStream, kind: StreamKind) -> Self {
        Self {
            stream,
            kind,
            buffer: Vec::new(),
        }
    }

    /// Blocks until the next complete value arrives, the peer closes the
    /// stream (`Ok(None)`), or an error occurs.
    ///
    /// A read timeout configured on the socket surfaces as
    /// [`ClientError::Io`]; syntax errors are fatal
    /// [`ClientError::Protocol`] failures, since a corrupted stream cannot
    /// be resynchronised.
    pub(crate) fn next_value(&mut self) -> Result<Option<Value>, ClientError> {
        loop {
            match self.parse_buffered()? {
                Parsed::Value(value) => return Ok(Some(value)),
                Parsed::NeedMore => {}
            }

            let mut chunk = [0u8; READ_CHUNK];
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(count) => self.buffer.extend_from_slice(&chunk[..count]),
                Err(source) => return Err(ClientError::io(self.kind, source)),
            }
        }
    }

    /// Tries to decode one value from the front of the buffer.
    fn parse_buffered(&mut self) -> Result<Parsed, ClientError> {
        let valid_prefix = match std::str::from_utf8(&self.buffer) {
            Ok(text) => text,
            Err(error) if error.error_len().is_none() => {
                // A multi-byte character split across reads; parse up to it.
                let valid = error.valid_up_to();
                std::str::from_utf8(&self.buffer[..valid]).unwrap_or_default()
            }
            Err(error) => {
                return Err(ClientError::Protocol {
                    stream: self.kind,
                    source: ReadError::Syntax {
                        position: error.valid_up_to(),
                        message: "invalid UTF-8".to_owned(),
                    },
                });
            }
        };

        match read_partial(valid_prefix) {
            Ok(Some((value, consumed))) => {
                self.buffer.drain(..consumed);
                Ok(Parsed::Value(value))
            }
            Ok(None) => {
                // Nothing but trivia; discard it and wait for more.
                let trivia = valid_prefix.len();
                self.buffer.drain(..trivia);
                Ok(Parsed::NeedMore)
            }
            Err(ReadError::UnexpectedEof { .. }) => Ok(Parsed::NeedMore),
            Err(source @ ReadError::Syntax { .. }) => Err(ClientError::Protocol {
                stream: self.kind,
                source,
            }),
        }
    }
}

enum Parsed {
    Value(Value),
    NeedMore,
}
