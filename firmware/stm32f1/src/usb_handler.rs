//! Bridges the synchronous [`nand_engine::transport::Transport`] trait to
//! the async CDC-ACM class, via two non-blocking queues.
//!
//! The engine's event loop is plain, blocking-free Rust — it never awaits
//! anything. USB, on the other hand, is inherently async under embassy.
//! A dedicated pump task does the actual `read_packet`/`write_packet`
//! awaiting and hands frames across `embassy_sync::channel::Channel`,
//! whose `try_send`/`try_receive` are non-blocking and safe to call from
//! the engine's `tick()`.

use defmt::warn;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_usb::class::cdc_acm::CdcAcmClass;
use embassy_usb::driver::Driver;
use nand_engine::transport::{Transport, PACKET_BUF_SIZE};

pub type Frame = heapless::Vec<u8, PACKET_BUF_SIZE>;

/// Inbound and outbound frame queues. Depth 4 is enough slack for the
/// engine to fall behind the host by a few packets without stalling USB.
pub struct UsbChannels {
    rx: Channel<CriticalSectionRawMutex, Frame, 4>,
    tx: Channel<CriticalSectionRawMutex, Frame, 4>,
}

impl UsbChannels {
    pub const fn new() -> Self {
        Self {
            rx: Channel::new(),
            tx: Channel::new(),
        }
    }
}

impl Default for UsbChannels {
    fn default() -> Self {
        Self::new()
    }
}

/// Async task: reads USB packets as they arrive and forwards them to the
/// engine via `channels.rx`. Drops a frame (with a log) rather than block
/// if the engine has fallen too far behind.
pub async fn usb_rx_task<'d, D: Driver<'d>>(
    mut class_rx: embassy_usb::class::cdc_acm::Receiver<'d, D>,
    channels: &'static UsbChannels,
) -> ! {
    let mut buf = [0u8; PACKET_BUF_SIZE];
    loop {
        class_rx.wait_connection().await;
        loop {
            match class_rx.read_packet(&mut buf).await {
                Ok(n) if n > 0 => {
                    let mut frame: Frame = heapless::Vec::new();
                    let _ = frame.extend_from_slice(&buf[..n]);
                    if channels.rx.try_send(frame).is_err() {
                        warn!("engine rx queue full, dropping inbound frame");
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    }
}

/// Async task: drains `channels.tx` and writes each frame out over USB.
pub async fn usb_tx_task<'d, D: Driver<'d>>(
    mut class_tx: embassy_usb::class::cdc_acm::Sender<'d, D>,
    channels: &'static UsbChannels,
) -> ! {
    loop {
        let frame = channels.tx.receive().await;
        let _ = class_tx.write_packet(&frame).await;
    }
}

/// The `Transport` the engine is driven through. Non-blocking by
/// construction: every method is a direct `try_send`/`try_receive` or a
/// capacity check against the channels above.
pub struct UsbTransport {
    channels: &'static UsbChannels,
    pending: Option<Frame>,
}

impl UsbTransport {
    pub fn new(channels: &'static UsbChannels) -> Self {
        Self {
            channels,
            pending: None,
        }
    }
}

impl Transport for UsbTransport {
    fn peek(&mut self, buf: &mut [u8; PACKET_BUF_SIZE]) -> Option<usize> {
        if self.pending.is_none() {
            self.pending = self.channels.rx.try_receive().ok();
        }
        let frame = self.pending.as_ref()?;
        buf[..frame.len()].copy_from_slice(frame);
        Some(frame.len())
    }

    fn consume(&mut self) {
        self.pending = None;
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), ()> {
        let mut frame: Frame = heapless::Vec::new();
        frame.extend_from_slice(bytes).map_err(|_| ())?;
        self.channels.tx.try_send(frame).map_err(|_| ())
    }

    fn send_ready(&mut self) -> bool {
        !self.channels.tx.is_full()
    }
}
