//! Requests from inside a sandbox.
//!
//! The sandbox can't reach `com.feralinteractive.GameMode`, so requests go to
//! `org.freedesktop.portal.GameMode` instead. The portal exposes a single
//! generic `Action` method taking a socket; the concrete GameMode method is
//! written to that socket as plain bytes, together with a second socket the
//! portal can use for any follow-up data.
//!
//! ```text
//!            Action(h wire_remote [, i target])
//!  client ──────────────────────────────────────▶ portal
//!  wire_local ── "RegisterGame" + SCM_RIGHTS(data_remote) ──▶ wire_remote
//! ```

use std::{
    io::{self, IoSlice},
    os::{
        fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd},
        unix::net::UnixStream,
    },
};

use nix::{
    errno::Errno,
    sys::socket::{sendmsg, ControlMessage, MsgFlags},
};

use crate::{
    backend::Backend,
    body::ActionArguments,
    proxy::{Proxy, PORTAL_ACTION},
    Error, Method, Request,
};

/// Creates a connected pair of sockets.
pub type SocketPairFn = fn() -> io::Result<(UnixStream, UnixStream)>;

/// The two socket pairs of a single portal call.
///
/// Owned by the call that opened it and closed by it with
/// [`PortalExchange::close`] on every path.
#[derive(Debug)]
pub struct PortalExchange {
    wire_local: UnixStream,
    wire_remote: UnixStream,
    data_local: UnixStream,
    data_remote: UnixStream,
}

impl PortalExchange {
    /// Open both socket pairs.
    pub fn open() -> Result<Self, Error> {
        Self::open_with(UnixStream::pair)
    }

    /// Open both socket pairs using `socket_pair`.
    ///
    /// If the second pair can't be created the first one is closed before
    /// returning.
    pub fn open_with(socket_pair: SocketPairFn) -> Result<Self, Error> {
        let (wire_local, wire_remote) = socket_pair()?;
        let (data_local, data_remote) = match socket_pair() {
            Ok(pair) => pair,
            Err(e) => {
                // Report the socket pair failure, not a close failure.
                let _ = close_all([wire_local, wire_remote]);
                return Err(e.into());
            }
        };
        Ok(Self {
            wire_local,
            wire_remote,
            data_local,
            data_remote,
        })
    }

    /// The end of the wire handed to the portal in the method call.
    pub fn wire_remote(&self) -> BorrowedFd<'_> {
        self.wire_remote.as_fd()
    }

    /// The end of the data pair kept by the caller.
    pub fn data_local(&self) -> BorrowedFd<'_> {
        self.data_local.as_fd()
    }

    /// Write the method name into the wire, with the remote end of the data
    /// pair attached to the first chunk.
    ///
    /// Every chunk is sent with `MSG_NOSIGNAL`: a portal that went away
    /// results in `EPIPE`, not in `SIGPIPE`.
    pub fn send_method(&self, method: Method) -> Result<(), Error> {
        let name = method.as_str().as_bytes();
        let fds = [self.data_remote.as_raw_fd()];
        let rights = [ControlMessage::ScmRights(&fds)];
        let mut sent = 0;
        while sent < name.len() {
            let iov = [IoSlice::new(&name[sent..])];
            let cmsgs: &[ControlMessage<'_>] = if sent == 0 { &rights } else { &[] };
            match sendmsg::<()>(
                self.wire_local.as_raw_fd(),
                &iov,
                cmsgs,
                MsgFlags::MSG_NOSIGNAL,
                None,
            ) {
                Ok(n) => sent += n,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("Sent '{}' over the portal side channel", method);
        Ok(())
    }

    /// Close all four descriptors, reporting the first failure.
    pub fn close(self) -> Result<(), Error> {
        let Self {
            wire_local,
            wire_remote,
            data_local,
            data_remote,
        } = self;
        close_all([wire_local, wire_remote, data_local, data_remote])
    }
}

fn close_all<const N: usize>(streams: [UnixStream; N]) -> Result<(), Error> {
    let mut result = Ok(());
    for stream in streams {
        if let Err(e) = nix::unistd::close(stream.into_raw_fd()) {
            if result.is_ok() {
                result = Err(e.into());
            }
        }
    }
    result
}

/// Talks to GameMode through `org.freedesktop.portal.GameMode`.
#[derive(Debug, Clone)]
pub struct PortalClient {
    connection: Option<zbus::Connection>,
    socket_pair: SocketPairFn,
}

impl Default for PortalClient {
    fn default() -> Self {
        Self {
            connection: None,
            socket_pair: UnixStream::pair,
        }
    }
}

impl PortalClient {
    /// Create a new instance of [`PortalClient`] using the shared session
    /// connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `connection` instead of the shared session connection.
    pub fn with_connection(mut self, connection: zbus::Connection) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Create the side channel sockets with `socket_pair`.
    pub fn with_socket_pair(mut self, socket_pair: SocketPairFn) -> Self {
        self.socket_pair = socket_pair;
        self
    }

    /// Send `request` through the portal and wait for its result code.
    ///
    /// The socket pairs are created before the bus is touched, so running
    /// out of descriptors never results in a method call.
    pub async fn request(&self, request: &Request) -> Result<i32, Error> {
        let exchange = PortalExchange::open_with(self.socket_pair)?;
        let result = self.handshake(&exchange, request).await;
        if let Err(_e) = exchange.close() {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to close the portal side channel: {}", _e);
        }
        result
    }

    async fn handshake(&self, exchange: &PortalExchange, request: &Request) -> Result<i32, Error> {
        let connection = match &self.connection {
            Some(cnx) => cnx.clone(),
            None => Proxy::connection().await?,
        };
        let method = request.method();
        let body = ActionArguments::new(exchange.wire_remote(), request.target_pid());
        // If the side channel fails the pending call is dropped: the portal
        // would otherwise wait for a method name that never comes.
        let proxy = Proxy::portal();
        let (code, ()) = futures_util::try_join!(
            proxy.call(&connection, method, PORTAL_ACTION, &body),
            async { exchange.send_method(method) },
        )?;
        Ok(code)
    }
}

impl Backend for PortalClient {
    fn name(&self) -> &'static str {
        "portal"
    }

    fn call(&self, request: &Request) -> Result<i32, Error> {
        futures::executor::block_on(self.request(request))
    }
}

/// Send `method` through the portal on behalf of the current process.
pub async fn request_portal(method: Method, target_pid: i32) -> Result<i32, Error> {
    PortalClient::new()
        .request(&Request::new(method, target_pid))
        .await
}
