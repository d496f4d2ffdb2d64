use crate::proto::socks5::address::Address;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, trace};
use socket2::{SockRef, TcpKeepalive};
use std::{net::SocketAddr, time::Duration};
use tokio::net::{TcpListener, TcpStream};

/// Different TCP connection options.
///
/// **Fields**:
/// * ```keep_alive``` - setting for TCP keepalive procedure
///
#[derive(Debug, Clone, Default)]
pub struct TcpConnectionOptions {
    keep_alive: Option<TcpKeepalive>,
}

impl TcpConnectionOptions {
    pub fn new() -> TcpConnectionOptions {
        TcpConnectionOptions { keep_alive: None }
    }

    /// Options with keepalive probes sent every `interval`.
    /// Zero interval disables keepalive.
    pub fn with_keepalive_interval(interval: Duration) -> TcpConnectionOptions {
        let mut opts = TcpConnectionOptions::new();
        if !interval.is_zero() {
            opts.set_keepalive(TcpKeepalive::new().with_time(interval).with_interval(interval));
        }
        opts
    }

    pub fn set_keepalive(&mut self, keep_alive: TcpKeepalive) -> &mut TcpConnectionOptions {
        debug_assert!(self.keep_alive.is_none(), "should be unset");
        self.keep_alive = Some(keep_alive);
        self
    }

    pub fn apply_to(&self, tcp_stream: &TcpStream) -> Result<()> {
        let tcp_sock_ref = SockRef::from(tcp_stream);

        if let Some(keep_alive) = &self.keep_alive {
            tcp_sock_ref.set_tcp_keepalive(keep_alive)?;
        }

        Ok(())
    }
}

/// Establish TCP connection with passed ```endpoint```.
///
/// Input ```tcp_opts``` are applied to created TCP socket right after stream creation.
pub async fn establish_tcp_connection_with_opts(endpoint: &Address, tcp_opts: &TcpConnectionOptions) -> Result<TcpStream> {
    // Resolve endpoint address.
    trace!("Endpoint address {} resolution: ... ", endpoint);
    let resolved = endpoint.to_socket_addr().await?;
    trace!("Endpoint address {} resolution: SUCCESS with {}", endpoint, resolved);

    // Establish TCP connection with the endpoint.
    debug!("TCP connection establishment with the endpoint {}: ... ", endpoint);
    let tcp_stream = TcpStream::connect(resolved).await?;
    debug!("TCP connection establishment with the endpoint {}: SUCCESS", endpoint);

    // Apply passed options to created TCP stream.
    tcp_opts.apply_to(&tcp_stream)?;

    Ok(tcp_stream)
}

/// Creates outbound connections for CONNECT command.
#[async_trait]
pub trait LurkDialer: Send + Sync {
    async fn dial(&self, endpoint: &Address) -> Result<TcpStream>;
}

/// Default dialer: plain TCP connection with options applied.
#[derive(Debug, Default)]
pub struct LurkTcpDialer {
    tcp_opts: TcpConnectionOptions,
}

impl LurkTcpDialer {
    pub fn new(tcp_opts: TcpConnectionOptions) -> LurkTcpDialer {
        LurkTcpDialer { tcp_opts }
    }
}

#[async_trait]
impl LurkDialer for LurkTcpDialer {
    async fn dial(&self, endpoint: &Address) -> Result<TcpStream> {
        establish_tcp_connection_with_opts(endpoint, &self.tcp_opts).await
    }
}

/// Listener accepting inbound connections for BIND command.
#[async_trait]
pub trait LurkListener: Send + Sync {
    fn local_addr(&self) -> Result<SocketAddr>;

    async fn accept(&self) -> Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl LurkListener for TcpListener {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(TcpListener::local_addr(self)?)
    }

    async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        Ok(TcpListener::accept(self).await?)
    }
}

/// Creates listeners for BIND command.
#[async_trait]
pub trait LurkListenerFactory: Send + Sync {
    async fn listen(&self, addr: &Address) -> Result<Box<dyn LurkListener>>;
}

/// Default listener factory: binds TCP listener to the resolved address.
#[derive(Debug, Default)]
pub struct LurkTcpListenerFactory;

#[async_trait]
impl LurkListenerFactory for LurkTcpListenerFactory {
    async fn listen(&self, addr: &Address) -> Result<Box<dyn LurkListener>> {
        let resolved = addr.to_socket_addr().await?;
        let listener = TcpListener::bind(resolved).await?;
        debug!("TCP listener has been bound to {} (requested {})", listener.local_addr()?, addr);

        Ok(Box::new(listener))
    }
}
