//! Byte-oriented point-to-point link between the two nodes.

use std::{
    fmt,
    io::{self, Read, Write},
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    time::{Duration, Instant},
};

use log::{debug, trace};
use serialport::{ClearBuffer, SerialPort};

use crate::error::LinkError;

/// A reliable, in-order, one-byte-at-a-time link to the peer node.
pub trait SerialLink {
    fn send(&mut self, byte: u8) -> Result<(), LinkError>;

    /// Block for the next byte. `None` waits forever.
    fn receive(&mut self, timeout: Option<Duration>) -> Result<u8, LinkError>;

    /// Drop whatever was received but not read yet.
    fn discard_pending(&mut self) -> Result<(), LinkError>;

    fn send_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        for byte in bytes {
            self.send(*byte)?;
        }
        Ok(())
    }
}

impl<L: SerialLink + ?Sized> SerialLink for Box<L> {
    fn send(&mut self, byte: u8) -> Result<(), LinkError> {
        (**self).send(byte)
    }

    fn receive(&mut self, timeout: Option<Duration>) -> Result<u8, LinkError> {
        (**self).receive(timeout)
    }

    fn discard_pending(&mut self) -> Result<(), LinkError> {
        (**self).discard_pending()
    }
}

// SerialPortLink ==============================================================

/// How long a single read on the port may block before we re-check the
/// caller's deadline.
const PORT_POLL: Duration = Duration::from_millis(100);

/// [`SerialLink`] over a real serial port (UART, USB serial adapter).
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
}

impl SerialPortLink {
    pub fn new(mut port: Box<dyn SerialPort>) -> Result<Self, LinkError> {
        port.set_timeout(PORT_POLL)?;
        Ok(SerialPortLink { port })
    }
}

impl SerialLink for SerialPortLink {
    fn send(&mut self, byte: u8) -> Result<(), LinkError> {
        trace!("tx {:#04x}", byte);
        self.port.write_all(&[byte])?;
        self.port.flush()?;
        Ok(())
    }

    fn receive(&mut self, timeout: Option<Duration>) -> Result<u8, LinkError> {
        let started = Instant::now();
        let mut buffer = [0_u8; 1];
        loop {
            match self.port.read(&mut buffer) {
                Ok(1) => {
                    trace!("rx {:#04x}", buffer[0]);
                    return Ok(buffer[0]);
                }
                Ok(_) => {}
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(LinkError::Timeout(limit));
                }
            }
        }
    }

    fn discard_pending(&mut self) -> Result<(), LinkError> {
        debug!("discarding pending input on the serial port");
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

impl fmt::Debug for SerialPortLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_fmt_serialport!("SerialPortLink", self.port, f).finish()
    }
}

// ChannelLink =================================================================

/// In-process [`SerialLink`] built on a pair of channels. Used to run both
/// nodes in one process.
#[derive(Debug)]
pub struct ChannelLink {
    tx: Sender<u8>,
    rx: Receiver<u8>,
}

impl ChannelLink {
    /// Two connected ends of the same wire.
    pub fn pair() -> (ChannelLink, ChannelLink) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            ChannelLink { tx: a_tx, rx: a_rx },
            ChannelLink { tx: b_tx, rx: b_rx },
        )
    }
}

impl SerialLink for ChannelLink {
    fn send(&mut self, byte: u8) -> Result<(), LinkError> {
        self.tx.send(byte).map_err(|_| LinkError::Closed)
    }

    fn receive(&mut self, timeout: Option<Duration>) -> Result<u8, LinkError> {
        match timeout {
            None => self.rx.recv().map_err(|_| LinkError::Closed),
            Some(limit) => self.rx.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => LinkError::Timeout(limit),
                RecvTimeoutError::Disconnected => LinkError::Closed,
            }),
        }
    }

    fn discard_pending(&mut self) -> Result<(), LinkError> {
        let dropped = self.rx.try_iter().count();
        debug!("discarded {} pending byte(s)", dropped);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn channel_pair_is_crossed() {
    let (mut a, mut b) = ChannelLink::pair();
    a.send_all(&[1, 2, 3]).unwrap();
    b.send(0xF0).unwrap();
    assert_eq!(b.receive(None).unwrap(), 1);
    assert_eq!(b.receive(None).unwrap(), 2);
    assert_eq!(b.receive(None).unwrap(), 3);
    assert_eq!(a.receive(None).unwrap(), 0xF0);
}

#[test]
fn channel_receive_times_out() {
    let (mut a, _b) = ChannelLink::pair();
    match a.receive(Some(Duration::from_millis(10))) {
        Err(LinkError::Timeout(limit)) => assert_eq!(limit, Duration::from_millis(10)),
        other => panic!("expected a timeout, got {:?}", other),
    }
}

#[test]
fn channel_reports_closed_peer() {
    let (mut a, b) = ChannelLink::pair();
    drop(b);
    assert!(matches!(a.receive(None), Err(LinkError::Closed)));
    assert!(matches!(a.send(1), Err(LinkError::Closed)));
}

#[test]
fn channel_discard_drops_queued_bytes() {
    let (mut a, mut b) = ChannelLink::pair();
    a.send_all(&[7, 7, 7]).unwrap();
    b.discard_pending().unwrap();
    a.send(9).unwrap();
    assert_eq!(b.receive(Some(Duration::from_millis(100))).unwrap(), 9);
}
