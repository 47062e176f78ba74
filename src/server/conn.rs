//! A buffered, line-oriented connection to one peer.
//!
//! The server writes whole protocol lines and tolerates write failures:
//! a broadcast to a dead peer is silently dropped and the disconnect is
//! discovered at that peer's next read. Readers and writers are boxed so
//! game tasks can run over real sockets or in-memory test streams alike.

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;

use crate::protocol::ServerMsg;

pub type BoxedReader = Box<dyn AsyncBufRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct Conn {
    reader: BoxedReader,
    writer: BoxedWriter,
}

impl Conn {
    pub fn from_stream(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: Box::new(BufReader::new(reader)),
            writer: Box::new(writer),
        }
    }

    /// Wrap any read/write pair. The tests use this to drive a game task
    /// over `tokio::io::duplex` streams.
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(BufReader::new(reader)),
            writer: Box::new(writer),
        }
    }

    /// Read one newline-terminated line, without its newline. `None` means
    /// the peer is gone: EOF, a read error, or a final unterminated
    /// fragment.
    pub async fn recv(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) | Err(_) => None,
            Ok(_) => line.strip_suffix('\n').map(str::to_string),
        }
    }

    /// Write one protocol message. Returns whether the write succeeded;
    /// broadcast paths ignore the result.
    pub async fn send(&mut self, msg: &ServerMsg) -> bool {
        self.send_line(&msg.to_string()).await
    }

    pub async fn send_line(&mut self, line: &str) -> bool {
        let framed = format!("{line}\n");
        self.writer.write_all(framed.as_bytes()).await.is_ok()
    }
}
