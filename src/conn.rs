//! Per-connection buffering and request/response framing state machine.
//!
//! Ground truth: `common/conn.cxx`'s `Connection` (`tryOneRequest`,
//! `tryFillBuffer`, `tryFlushBuffer`, `stateRequest`/`stateResponse`). The
//! buffer sizing (`4 + MAX_MESSAGE_SIZE`), the drain-every-complete-frame
//! loop, and the `copy_within`-based compaction of the read buffer all
//! follow that file; only the raw I/O calls move from `read(2)`/`write(2)`
//! to `libc` bindings of the same syscalls.
//!
//! Unlike the original, a reply flush that blocks partway through a
//! pipelined batch does not strand the remaining buffered frames: once the
//! pending write later drains, processing resumes from where it left off
//! instead of waiting for the fd to become readable again.

use std::io;

use log::{debug, trace, warn};

use crate::dispatcher::dispatch;
use crate::entry::Namespace;
use crate::errors::FramingError;
use crate::protocol::frame::parse_request;
use crate::protocol::MAX_MESSAGE_SIZE;

/// What a connection is waiting to do next (spec.md §4.3's `RECEIVING` /
/// `SENDING` / `CLOSED`, named after the original's `REQ`/`RES`/`END`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Receiving,
    Sending,
    Closed,
}

/// Which direction of a raw fd's readiness the reactor should poll for
/// next, returned by [`Connection::io`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WantEvents {
    Readable,
    Writable,
    None,
}

pub struct Connection {
    fd: i32,
    state: ConnState,
    read_buf: Vec<u8>,
    read_len: usize,
    write_buf: Vec<u8>,
    write_len: usize,
    write_sent: usize,
}

impl Connection {
    pub fn new(fd: i32) -> Self {
        Connection {
            fd,
            state: ConnState::Receiving,
            read_buf: vec![0u8; 4 + MAX_MESSAGE_SIZE],
            read_len: 0,
            write_buf: vec![0u8; 4 + MAX_MESSAGE_SIZE],
            write_len: 0,
            write_sent: 0,
        }
    }

    pub fn fd(&self) -> i32 {
        self.fd
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn want_events(&self) -> WantEvents {
        match self.state {
            ConnState::Receiving => WantEvents::Readable,
            ConnState::Sending => WantEvents::Writable,
            ConnState::Closed => WantEvents::None,
        }
    }

    /// Drive this connection in response to a poll readiness event.
    pub fn io(&mut self, ns: &mut Namespace) {
        match self.state {
            ConnState::Receiving => self.state_receiving(ns),
            ConnState::Sending => self.state_sending(ns),
            ConnState::Closed => {}
        }
    }

    fn state_receiving(&mut self, ns: &mut Namespace) {
        while self.try_fill_buffer(ns) {}
    }

    /// Resume flushing a reply that previously blocked. If the flush
    /// completes, the read buffer may still hold further pipelined frames
    /// that `try_one_request` never got to (spec.md §4.8's "drain as many
    /// full frames as are available ... before yielding back to the
    /// reactor") — keep draining them in the same wake-up rather than
    /// waiting for the fd to become readable again.
    fn state_sending(&mut self, ns: &mut Namespace) {
        self.flush_until_blocked_or_done();
        if self.state == ConnState::Receiving {
            self.drain_buffered_requests(ns);
        }
    }

    /// Attempt one non-blocking read into `read_buf`, then drain every
    /// complete frame it yields. Returns `true` if the caller should try
    /// reading again immediately (more data may already be pending).
    fn try_fill_buffer(&mut self, ns: &mut Namespace) -> bool {
        debug_assert!(self.read_len < self.read_buf.len());
        let available = self.read_buf.len() - self.read_len;

        let read_bytes = loop {
            match raw_read(self.fd, &mut self.read_buf[self.read_len..self.read_len + available]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return false,
                Err(e) => {
                    warn!("read() error on fd {}: {}", self.fd, e);
                    self.state = ConnState::Closed;
                    return false;
                }
            }
        };

        if read_bytes == 0 {
            if self.read_len > 0 {
                debug!("unexpected EOF on fd {}", self.fd);
            } else {
                debug!("EOF on fd {}", self.fd);
            }
            self.state = ConnState::Closed;
            return false;
        }

        self.read_len += read_bytes;
        debug_assert!(self.read_len <= self.read_buf.len());

        self.drain_buffered_requests(ns);
        self.state == ConnState::Receiving
    }

    /// Process every complete frame currently sitting at the front of
    /// `read_buf`, flushing each one's reply before moving to the next
    /// (`write_buf` holds only one reply at a time). Stops early, leaving
    /// any remaining frames buffered, if a flush blocks — `state_sending`
    /// resumes this same loop once that flush completes.
    fn drain_buffered_requests(&mut self, ns: &mut Namespace) {
        while self.state == ConnState::Receiving && self.try_one_request(ns) {}
    }

    /// Parse and dispatch one complete request out of the front of the
    /// read buffer, if one is fully present. Returns `true` if the caller
    /// should attempt another request immediately (the read buffer may
    /// hold more than one pipelined request).
    fn try_one_request(&mut self, ns: &mut Namespace) -> bool {
        if self.read_len < 4 {
            return false;
        }
        let message_len =
            u32::from_le_bytes(self.read_buf[0..4].try_into().unwrap()) as usize;
        if message_len > MAX_MESSAGE_SIZE {
            debug!("fd {}: {}", self.fd, FramingError::MessageTooLong);
            self.state = ConnState::Closed;
            return false;
        }
        if 4 + message_len > self.read_len {
            return false; // not enough data buffered yet
        }

        let body = &self.read_buf[4..4 + message_len];
        let reply = match parse_request(body) {
            Ok(args) => {
                trace!("fd {}: parsed {} args", self.fd, args.len());
                dispatch(ns, &args)
            }
            Err(e) => {
                debug!("fd {}: bad request: {}", self.fd, e);
                self.state = ConnState::Closed;
                return false;
            }
        };

        let encoded = reply.encode();
        self.write_buf[0..4].copy_from_slice(&(encoded.len() as u32).to_le_bytes());
        self.write_buf[4..4 + encoded.len()].copy_from_slice(&encoded);
        self.write_len = 4 + encoded.len();

        let remaining = self.read_len - 4 - message_len;
        if remaining > 0 {
            self.read_buf.copy_within(4 + message_len..self.read_len, 0);
        }
        self.read_len = remaining;

        self.state = ConnState::Sending;
        self.flush_until_blocked_or_done();
        self.state == ConnState::Receiving
    }

    /// Attempt non-blocking writes of whatever remains in `write_buf`
    /// until it's fully sent, the connection blocks on `WouldBlock`, or an
    /// error closes it.
    fn flush_until_blocked_or_done(&mut self) {
        while self.try_flush_buffer() {}
    }

    /// Attempt one non-blocking write of whatever remains in `write_buf`.
    /// Returns `true` if the caller should try writing again immediately.
    fn try_flush_buffer(&mut self) -> bool {
        let remaining = self.write_len - self.write_sent;
        let written = loop {
            match raw_write(self.fd, &self.write_buf[self.write_sent..self.write_sent + remaining]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return false,
                Err(e) => {
                    warn!("write() error on fd {}: {}", self.fd, e);
                    self.state = ConnState::Closed;
                    return false;
                }
            }
        };

        self.write_sent += written;
        debug_assert!(self.write_sent <= self.write_len);

        if self.write_sent == self.write_len {
            self.state = ConnState::Receiving;
            self.write_sent = 0;
            self.write_len = 0;
            return false;
        }
        true
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

fn raw_read(fd: i32, buf: &mut [u8]) -> io::Result<usize> {
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

fn raw_write(fd: i32, buf: &[u8]) -> io::Result<usize> {
    let n = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}
