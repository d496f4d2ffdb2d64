use crate::{
    common::{error::LurkError, logging},
    io::{stream::LurkBoxedStream, stream::LurkStream, tunnel::LurkTunnel, LurkIo, LurkRequestRead, LurkResponseWrite},
    proto::socks5::{
        address::Address,
        request::{CommandRequest, HandshakeRequest},
        response::{CommandResponse, HandshakeResponse},
        AuthMethod, ReplyStatus,
    },
    server::auth::LurkAuthenticator,
};
use anyhow::{bail, Result};
use log::debug;
use std::{
    fmt::{Debug, Display},
    net::SocketAddr,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

/// Stage of SOCKS5 protocol that connection has reached.
///
/// Idle -> Negotiated -> Authenticated -> CommandParsed -> {Active | Rejected} -> Closed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LurkConnectionState {
    Idle,
    Negotiated,
    Authenticated,
    CommandParsed,
    Active,
    Rejected,
    Closed,
}

/// Single client connection driven through the SOCKS5 protocol sequence.
///
/// Owns the stream along with the scratch buffer, which is used for
/// all protocol reads and writes. The stream is closed on drop.
pub struct LurkConnection {
    stream: LurkBoxedStream,
    state: LurkConnectionState,
    /// Remote address that this connection is connected to
    peer_addr: SocketAddr,
    /// Local address that this connection is bound to
    local_addr: SocketAddr,
}

impl LurkConnection {
    pub fn new<S>(stream: S, peer_addr: SocketAddr, local_addr: SocketAddr) -> LurkConnection
    where
        S: LurkIo + 'static,
    {
        LurkConnection {
            stream: LurkStream::new(Box::new(stream) as Box<dyn LurkIo>),
            state: LurkConnectionState::Idle,
            peer_addr,
            local_addr,
        }
    }

    pub fn from_tcp_stream(tcp_stream: TcpStream) -> Result<LurkConnection> {
        let (peer_addr, local_addr) = (tcp_stream.peer_addr()?, tcp_stream.local_addr()?);
        Ok(LurkConnection::new(tcp_stream, peer_addr, local_addr))
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> LurkConnectionState {
        self.state
    }

    pub fn stream_mut(&mut self) -> &mut LurkBoxedStream {
        &mut self.stream
    }

    /// Read client's method selection message and agree on `method`.
    ///
    /// Nothing is written back if client speaks other protocol version.
    /// Client that doesn't offer `method` receives "no acceptable methods" reply.
    pub async fn negotiate(&mut self, method: AuthMethod) -> Result<()> {
        debug_assert_eq!(LurkConnectionState::Idle, self.state, "negotiation happens first");

        let request = self.read_or_close::<HandshakeRequest>().await?;

        if request.offers(method) {
            debug!("Selected authentication method {:?} for {}", method, self);
            self.stream.write_response(HandshakeResponse::with_auth_method(method)).await?;
            self.state = LurkConnectionState::Negotiated;
            Ok(())
        } else {
            debug!("No acceptable methods identified for {}", self);
            self.stream.write_response(HandshakeResponse::with_no_acceptable_method()).await?;
            self.state = LurkConnectionState::Closed;
            bail!(LurkError::NoAcceptableMethod)
        }
    }

    /// Authenticate client by means of negotiated authentication method.
    pub async fn authenticate(&mut self, authenticator: &dyn LurkAuthenticator) -> Result<()> {
        debug_assert_eq!(LurkConnectionState::Negotiated, self.state, "authentication follows negotiation");

        match authenticator.authenticate(self).await {
            Ok(()) => {
                debug!("Client {} has been authenticated with {:?}", self, authenticator.method());
                self.state = LurkConnectionState::Authenticated;
                Ok(())
            }
            Err(err) => {
                self.state = LurkConnectionState::Closed;
                Err(err)
            }
        }
    }

    /// Read command request with target address. Domain names are not resolved.
    pub async fn read_command_request(&mut self) -> Result<CommandRequest> {
        debug_assert_eq!(LurkConnectionState::Authenticated, self.state, "command follows authentication");

        let request = self.read_or_close::<CommandRequest>().await?;
        self.state = LurkConnectionState::CommandParsed;

        Ok(request)
    }

    /// Reply on command request with the address bound by the executed operation.
    pub async fn write_command_response(&mut self, status: ReplyStatus, bound_addr: Address) -> Result<()> {
        debug_assert!(
            matches!(self.state, LurkConnectionState::CommandParsed | LurkConnectionState::Active),
            "response follows command request"
        );

        let response = CommandResponse::builder()
            .with_status(status)
            .with_bound_address(bound_addr)
            .build();
        self.stream.write_response(response).await?;

        self.state = match status {
            ReplyStatus::Succeeded => LurkConnectionState::Active,
            _ => LurkConnectionState::Rejected,
        };

        Ok(())
    }

    /// Reply with error status and null IPv4 bound address.
    pub async fn write_error(&mut self, status: ReplyStatus) -> Result<()> {
        let response = CommandResponse::builder().with_status(status).build();
        self.stream.write_response(response).await?;
        self.state = LurkConnectionState::Rejected;

        Ok(())
    }

    /// Relay data between client and `target` until either direction is done.
    ///
    /// Relaying errors are ordinary peer disconnects, so they are only logged.
    /// Target stream is closed once relaying is finished, client stream is
    /// closed along with the connection.
    pub async fn relay<T>(&mut self, mut target: T, endpoint: impl Display)
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        debug_assert_eq!(LurkConnectionState::Active, self.state, "relay follows successful response");

        let (peer_addr, local_addr) = (self.peer_addr, self.local_addr);
        let mut tunnel = LurkTunnel::new(&mut *self.stream, &mut target);

        logging::log_tunnel_created!(peer_addr, local_addr, endpoint);

        match tunnel.run().await {
            Ok((l2r, r2l)) => {
                logging::log_tunnel_closed!(peer_addr, local_addr, endpoint, l2r, r2l);
            }
            Err(err) => {
                logging::log_tunnel_closed_with_error!(peer_addr, local_addr, endpoint, err);
            }
        }

        self.state = LurkConnectionState::Closed;
    }

    async fn read_or_close<Request>(&mut self) -> Result<Request>
    where
        Request: crate::io::LurkRequest + Debug,
    {
        match self.stream.read_request::<Request>().await {
            Ok(request) => Ok(request),
            Err(err) => {
                self.state = LurkConnectionState::Closed;
                Err(err)
            }
        }
    }
}

impl Display for LurkConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.peer_addr)
    }
}
