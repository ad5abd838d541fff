//! Bus writer and send/ack coordinator.
//!
//! The bus is half-duplex and shared with the wallpad itself, so every
//! outbound exchange runs under one exclusive lock:
//!
//! ```text
//! for seq in c, d, e, f:
//!     wait out the read/write gap
//!     transmit frame(send, seq, dest, src, cmd, value)
//!     sleep settle_delay
//!     reply src == dest && reply dest == src since transmit? → done
//! ```
//!
//! The reader side feeds the same [`BusWriter`] through
//! [`note_read`](BusWriter::note_read) and [`record`](BusWriter::record),
//! so replies show up in the recent-frame cache while the sender sleeps.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::cache::{FrameCache, Lookup};
use crate::config::Timing;
use crate::error::{Result, WallpadError};
use crate::protocol::{build_frame, hex_string, Address, Cmd, Frame, FrameKind, Sequence, Value};

/// Type-erased write half of the gateway connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Writer half of the bus plus the state the coordinator needs from the
/// reader: the frame cache and the time of the last inbound read.
pub struct BusWriter {
    /// Held for a whole semantic exchange.
    exchange: tokio::sync::Mutex<()>,
    /// Held only while bytes are written.
    sink: tokio::sync::Mutex<Option<BoxedWriter>>,
    cache: Mutex<FrameCache>,
    last_read: Mutex<Option<Instant>>,
    read_write_gap: Duration,
    settle_delay: Duration,
}

impl BusWriter {
    pub fn new(cache: FrameCache, timing: &Timing) -> Self {
        Self {
            exchange: tokio::sync::Mutex::new(()),
            sink: tokio::sync::Mutex::new(None),
            cache: Mutex::new(cache),
            last_read: Mutex::new(None),
            read_write_gap: timing.read_write_gap,
            settle_delay: timing.settle_delay,
        }
    }

    /// Install the write half of a fresh connection.
    pub async fn install<W>(&self, writer: W)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        *self.sink.lock().await = Some(Box::new(writer));
    }

    /// Drop the current write half; sends fail until the next install.
    pub async fn uninstall(&self) {
        if let Some(mut writer) = self.sink.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.sink.lock().await.is_some()
    }

    /// Record that bytes were just read from the bus.
    pub fn note_read(&self) {
        *lock(&self.last_read) = Some(Instant::now());
    }

    /// Insert a decoded inbound frame into the cache.
    pub fn record(&self, frame: Frame) {
        lock(&self.cache).push_front(frame);
    }

    /// Newest fresh acknowledgment addressed to `device`.
    pub fn find_fresh(&self, device: Address) -> Lookup {
        lock(&self.cache).find_fresh(device)
    }

    pub fn cache_len(&self) -> usize {
        lock(&self.cache).len()
    }

    /// Take the exclusive send lock.
    ///
    /// Anything done while the guard is alive is serialized with every
    /// other exchange on the bus.
    pub async fn lock(&self) -> BusGuard<'_> {
        BusGuard {
            bus: self,
            _exchange: self.exchange.lock().await,
        }
    }

    /// Convenience for a single exchange without holding the guard after.
    pub async fn send_semantic(&self, dest: Address, cmd: Cmd, value: Value) -> Option<Frame> {
        self.lock().await.send_semantic(dest, cmd, value).await
    }

    async fn wait_for_gap(&self) {
        let last = *lock(&self.last_read);
        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < self.read_write_gap {
                tokio::time::sleep(self.read_write_gap - elapsed).await;
            }
        }
    }

    async fn transmit(&self, bytes: &[u8]) -> Result<()> {
        let mut sink = self.sink.lock().await;
        let writer = sink.as_mut().ok_or(WallpadError::ConnectionClosed)?;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Exclusive access to the bus for one or more exchanges.
pub struct BusGuard<'a> {
    bus: &'a BusWriter,
    _exchange: tokio::sync::MutexGuard<'a, ()>,
}

impl BusGuard<'_> {
    /// Send from the wallpad address to `dest` and wait for its reply.
    pub async fn send_semantic(&mut self, dest: Address, cmd: Cmd, value: Value) -> Option<Frame> {
        self.send_semantic_from(Address::WALLPAD, dest, cmd, value)
            .await
    }

    /// Send `cmd`/`value` to `dest`, retrying with each sequence code.
    ///
    /// Returns the reply (`src == dest`, `dest == src`) received after the
    /// successful attempt's transmit, or `None` when all four attempts go
    /// unanswered or the connection fails.
    pub async fn send_semantic_from(
        &mut self,
        src: Address,
        dest: Address,
        cmd: Cmd,
        value: Value,
    ) -> Option<Frame> {
        let bus = self.bus;
        for sequence in Sequence::ALL {
            bus.wait_for_gap().await;

            let bytes = build_frame(FrameKind::Send, sequence, dest, src, cmd, value);
            let sent_at = Instant::now();
            if let Err(e) = bus.transmit(&bytes).await {
                tracing::warn!("Send to {} failed: {}", dest, e);
                return None;
            }
            tracing::debug!("Sent {}", hex_string(&bytes));

            tokio::time::sleep(bus.settle_delay).await;

            let reply = lock(&bus.cache).find_reply_since(dest, src, sent_at);
            if let Lookup::Found(frame) = reply {
                tracing::debug!("Reply from {} on attempt {:?}", dest, sequence);
                return Some(frame);
            }
        }
        tracing::debug!("No reply from {} after {} attempts", dest, Sequence::ALL.len());
        None
    }
}

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
