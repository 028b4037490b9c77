//! The byte channel produced by a transport and handed to the caller after
//! authentication.
//!
//! A channel starts in [`ChannelMode::Handshake`], where only the SASL driver
//! may talk over it. Sending `BEGIN` flips it to [`ChannelMode::Binary`]
//! exactly once; only then do [`Channel::read`] and [`Channel::write_all`]
//! become legal.

use crate::error::channel::ChannelError;

use common::ErrorLocation;

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::panic::Location;

use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Line-oriented SASL exchange in progress.
    Handshake,
    /// Handshake finished; binary message traffic only.
    Binary,
}

/// An open, non-blocking local-domain byte stream.
#[derive(Debug)]
pub struct Channel {
    stream: UnixStream,
    mode: ChannelMode,
    fd_passing_capable: bool,
    fd_passing_agreed: bool,
    server_id: Vec<u8>,
}

impl Channel {
    /// Wrap a freshly connected stream. The channel starts in handshake mode.
    pub fn new(stream: UnixStream, fd_passing_capable: bool) -> Self {
        Self {
            stream,
            mode: ChannelMode::Handshake,
            fd_passing_capable,
            fd_passing_agreed: false,
            server_id: Vec::new(),
        }
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// True if the underlying socket can carry auxiliary descriptors.
    pub fn is_fd_passing_capable(&self) -> bool {
        self.fd_passing_capable
    }

    /// True if the peer agreed to descriptor passing during the handshake.
    pub fn is_fd_passing_agreed(&self) -> bool {
        self.fd_passing_agreed
    }

    /// The server's opaque identifier (the GUID sent with `OK`).
    pub fn server_id(&self) -> &[u8] {
        &self.server_id
    }

    /// Check that the socket is still connected and has no pending error.
    pub fn is_valid(&self) -> bool {
        matches!(self.stream.take_error(), Ok(None)) && self.stream.peer_addr().is_ok()
    }

    /// Borrow the stream for the SASL exchange.
    pub(crate) fn handshake_stream(&mut self) -> &mut UnixStream {
        &mut self.stream
    }

    /// Record the handshake outcome and switch to binary mode.
    ///
    /// Called once, right after `BEGIN` has been written.
    pub(crate) fn enter_binary_mode(&mut self, server_id: Vec<u8>, fd_passing_agreed: bool) {
        debug_assert_eq!(self.mode, ChannelMode::Handshake);
        self.server_id = server_id;
        self.fd_passing_agreed = fd_passing_agreed && self.fd_passing_capable;
        self.mode = ChannelMode::Binary;
    }

    #[track_caller]
    fn ensure_binary(&self) -> Result<(), ChannelError> {
        match self.mode {
            ChannelMode::Binary => Ok(()),
            ChannelMode::Handshake => Err(ChannelError::NotBinary {
                message: "Binary I/O attempted before the handshake completed".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Read available bytes. Returns 0 when the peer closed the connection.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        self.ensure_binary()?;
        Ok(self.stream.read(buf).await?)
    }

    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        self.ensure_binary()?;
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Shut the socket down and release it.
    pub async fn close(mut self) -> Result<(), ChannelError> {
        debug!("Closing channel (fd {})", self.stream.as_raw_fd());
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Hand the raw stream to the caller, consuming the channel.
    pub fn into_stream(self) -> UnixStream {
        self.stream
    }
}

impl AsRawFd for Channel {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl AsFd for Channel {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}
