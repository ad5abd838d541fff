//! TCP connection to the RS-485 gateway.
//!
//! The gateway is a transparent serial-to-TCP bridge: every byte on the
//! bus is forwarded to the socket and every byte written is put on the
//! bus. There is no handshake.
//!
//! # Example
//!
//! ```ignore
//! use kocom_wallpad::transport::GatewayStream;
//!
//! let stream = GatewayStream::connect("192.168.0.40:8899", Duration::from_secs(10)).await?;
//! let (reader, writer) = stream.into_split();
//! ```

use std::io;
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{Result, WallpadError};

/// Connected gateway socket.
pub struct GatewayStream {
    stream: TcpStream,
    addr: String,
}

impl GatewayStream {
    /// Dial `addr` (`host:port`), giving up after `timeout`.
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(WallpadError::Connection {
                    addr: addr.to_string(),
                    source,
                })
            }
            Err(_elapsed) => {
                return Err(WallpadError::Connection {
                    addr: addr.to_string(),
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                })
            }
        };
        // frames are tiny and latency-sensitive
        let _ = stream.set_nodelay(true);

        Ok(Self {
            stream,
            addr: addr.to_string(),
        })
    }

    /// Address that was dialed.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Split into read and write halves.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_and_split() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let stream = GatewayStream::connect(&addr, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(stream.addr(), addr);
        let (_reader, mut writer) = stream.into_split();
        writer.write_all(&[0xAA, 0x55, 0x30, 0xBC]).await.unwrap();

        assert_eq!(server.await.unwrap(), [0xAA, 0x55, 0x30, 0xBC]);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = GatewayStream::connect(&addr, Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, WallpadError::Connection { addr: a, .. } if a == addr));
    }
}
