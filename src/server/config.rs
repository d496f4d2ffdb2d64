use super::auth::{LurkAuthenticator, NoAuthenticator, PasswordAuthenticator};
use crate::{
    net::tcp::{LurkDialer, LurkListenerFactory, LurkTcpDialer, LurkTcpListenerFactory, TcpConnectionOptions},
    proto::socks5::{
        address::{join_host_port, Address},
        Command,
    },
};
use log::warn;
use std::{
    collections::HashSet,
    fmt::Debug,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

pub const DEFAULT_LISTEN_PORT: u16 = 1080;

/// Rewrites bound addresses reported to clients in command responses,
/// e.g. when the proxy runs behind NAT or port forwarding.
pub trait LurkAddressRewriter: Send + Sync {
    fn rewrite(&self, addr: SocketAddr) -> String;
}

/// Replaces host part of the address and keeps the port.
#[derive(Debug, Clone)]
pub struct HostAddressRewriter {
    host: String,
}

impl HostAddressRewriter {
    pub fn new(host: impl Into<String>) -> HostAddressRewriter {
        HostAddressRewriter { host: host.into() }
    }
}

impl LurkAddressRewriter for HostAddressRewriter {
    fn rewrite(&self, addr: SocketAddr) -> String {
        join_host_port(&self.host, addr.port())
    }
}

/// Server configuration. Immutable once passed to the server.
pub struct LurkServerConfig {
    listen_addr: String,
    authenticator: Arc<dyn LurkAuthenticator>,
    tcp_opts: TcpConnectionOptions,
    allowed_commands: HashSet<Command>,
    dialer: Arc<dyn LurkDialer>,
    listener_factory: Arc<dyn LurkListenerFactory>,
    address_rewriter: Option<Arc<dyn LurkAddressRewriter>>,
}

impl LurkServerConfig {
    pub fn builder() -> LurkServerConfigBuilder {
        LurkServerConfigBuilder::default()
    }

    /// `host:port` to listen on, host could be a name to resolve.
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    pub fn authenticator(&self) -> &dyn LurkAuthenticator {
        self.authenticator.as_ref()
    }

    pub fn tcp_opts(&self) -> &TcpConnectionOptions {
        &self.tcp_opts
    }

    pub fn is_allowed(&self, command: Command) -> bool {
        self.allowed_commands.contains(&command)
    }

    pub fn dialer(&self) -> &dyn LurkDialer {
        self.dialer.as_ref()
    }

    pub fn listener_factory(&self) -> &dyn LurkListenerFactory {
        self.listener_factory.as_ref()
    }

    /// Address reported to the client as bound by the executed command.
    /// Rewritten address that can't be encoded falls back to `addr`.
    pub fn bound_address(&self, addr: SocketAddr) -> Address {
        let Some(rewriter) = &self.address_rewriter else {
            return Address::from(addr);
        };

        let rewritten = rewriter.rewrite(addr);
        match Address::parse(&rewritten).and_then(|bound| bound.port().map(|_| bound)) {
            Ok(bound) => bound,
            Err(err) => {
                warn!("Rewritten bound address {} is discarded: {}", rewritten, err);
                Address::from(addr)
            }
        }
    }
}

impl Default for LurkServerConfig {
    fn default() -> LurkServerConfig {
        LurkServerConfig::builder().build()
    }
}

impl Debug for LurkServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LurkServerConfig")
            .field("listen_addr", &self.listen_addr)
            .field("auth_method", &self.authenticator.method())
            .field("tcp_opts", &self.tcp_opts)
            .field("allowed_commands", &self.allowed_commands)
            .field("address_rewriter", &self.address_rewriter.is_some())
            .finish_non_exhaustive()
    }
}

pub struct LurkServerConfigBuilder {
    listen_addr: Option<String>,
    authenticator: Option<Arc<dyn LurkAuthenticator>>,
    keepalive_interval: Duration,
    allowed_commands: HashSet<Command>,
    dialer: Option<Arc<dyn LurkDialer>>,
    listener_factory: Option<Arc<dyn LurkListenerFactory>>,
    address_rewriter: Option<Arc<dyn LurkAddressRewriter>>,
}

impl Default for LurkServerConfigBuilder {
    fn default() -> LurkServerConfigBuilder {
        LurkServerConfigBuilder {
            listen_addr: None,
            authenticator: None,
            keepalive_interval: Duration::ZERO,
            allowed_commands: HashSet::from([Command::Connect]),
            dialer: None,
            listener_factory: None,
            address_rewriter: None,
        }
    }
}

impl LurkServerConfigBuilder {
    /// Listen on `host:port`. Empty host, as in `:1080`, means all interfaces.
    pub fn with_listen_addr(&mut self, addr: impl Into<String>) -> &mut LurkServerConfigBuilder {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Require username/password authentication with passed credentials.
    pub fn with_credentials(&mut self, username: &str, password: &str) -> &mut LurkServerConfigBuilder {
        self.with_authenticator(Arc::new(PasswordAuthenticator::new(username, password)))
    }

    pub fn with_authenticator(&mut self, authenticator: Arc<dyn LurkAuthenticator>) -> &mut LurkServerConfigBuilder {
        self.authenticator = Some(authenticator);
        self
    }

    /// Interval of TCP keepalive probes. Zero disables keepalive.
    pub fn with_keepalive_interval(&mut self, interval: Duration) -> &mut LurkServerConfigBuilder {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_allowed_commands(&mut self, commands: impl IntoIterator<Item = Command>) -> &mut LurkServerConfigBuilder {
        self.allowed_commands = commands.into_iter().collect();
        self
    }

    pub fn with_dialer(&mut self, dialer: Arc<dyn LurkDialer>) -> &mut LurkServerConfigBuilder {
        self.dialer = Some(dialer);
        self
    }

    pub fn with_listener_factory(&mut self, factory: Arc<dyn LurkListenerFactory>) -> &mut LurkServerConfigBuilder {
        self.listener_factory = Some(factory);
        self
    }

    pub fn with_address_rewriter(&mut self, rewriter: Arc<dyn LurkAddressRewriter>) -> &mut LurkServerConfigBuilder {
        self.address_rewriter = Some(rewriter);
        self
    }

    pub fn build(&self) -> LurkServerConfig {
        let tcp_opts = TcpConnectionOptions::with_keepalive_interval(self.keepalive_interval);

        LurkServerConfig {
            listen_addr: normalize_listen_addr(self.listen_addr.as_deref().unwrap_or_default()),
            authenticator: self.authenticator.clone().unwrap_or_else(|| Arc::new(NoAuthenticator)),
            allowed_commands: self.allowed_commands.clone(),
            dialer: self
                .dialer
                .clone()
                .unwrap_or_else(|| Arc::new(LurkTcpDialer::new(tcp_opts.clone()))),
            listener_factory: self
                .listener_factory
                .clone()
                .unwrap_or_else(|| Arc::new(LurkTcpListenerFactory)),
            address_rewriter: self.address_rewriter.clone(),
            tcp_opts,
        }
    }
}

fn normalize_listen_addr(addr: &str) -> String {
    match addr {
        "" => format!("0.0.0.0:{DEFAULT_LISTEN_PORT}"),
        _ if addr.starts_with(':') => format!("0.0.0.0{addr}"),
        _ => addr.to_string(),
    }
}
