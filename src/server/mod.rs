use self::{config::LurkServerConfig, handlers::LurkSocks5Handler};
use crate::{
    common::{error::LurkError, logging},
    net::connection::LurkConnection,
};
use anyhow::{bail, Result};
use cfg_if::cfg_if;
use log::{error, info, warn};
use std::{
    io,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

pub mod auth;
pub mod config;
pub mod handlers;

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// SOCKS5 proxy server.
///
/// Every accepted connection is handled in a separate task. The server
/// could be closed and served again, each serve cycle gets its own
/// shutdown signal.
pub struct LurkServer {
    config: Arc<LurkServerConfig>,
    state: Mutex<LurkServerState>,
}

#[derive(Default)]
struct LurkServerState {
    serve_cycle: u64,
    shutdown: Option<CancellationToken>,
    local_addr: Option<SocketAddr>,
}

impl LurkServer {
    pub fn new(config: LurkServerConfig) -> LurkServer {
        LurkServer {
            config: Arc::new(config),
            state: Mutex::new(LurkServerState::default()),
        }
    }

    pub fn config(&self) -> &LurkServerConfig {
        &self.config
    }

    /// Address of the listener being served at the moment.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_state().local_addr
    }

    /// Bind to the configured listen address and serve clients until closed.
    pub async fn listen_and_serve(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr()).await?;
        self.serve(listener).await
    }

    /// Accept and handle clients on passed listener.
    ///
    /// Returns [`LurkError::ServerClosed`] once the server is closed, or
    /// the first non-transient accept error. Previous serve cycle, if any,
    /// is closed first.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        let (serve_cycle, shutdown) = self.start_serve_cycle(local_addr);

        info!("Listening on {}", local_addr);

        let result = self.accept_loop(&listener, &shutdown).await;

        self.finish_serve_cycle(serve_cycle);
        info!("Stopped listening on {}", local_addr);

        result
    }

    /// Signal the active serve cycle to stop accepting clients.
    /// Already established connections are not interrupted.
    pub fn close(&self) {
        if let Some(shutdown) = self.lock_state().shutdown.take() {
            info!("Closing the server ...");
            shutdown.cancel();
        }
    }

    async fn accept_loop(&self, listener: &TcpListener, shutdown: &CancellationToken) -> Result<()> {
        let mut backoff = Duration::ZERO;

        loop {
            let accepted = tokio::select! {
                biased;
                _ = shutdown.cancelled() => bail!(LurkError::ServerClosed),
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    backoff = Duration::ZERO;
                    self.on_client_connected(stream, addr);
                }
                Err(err) if is_transient_accept_error(&err) => {
                    backoff = (backoff * 2).clamp(ACCEPT_BACKOFF_MIN, ACCEPT_BACKOFF_MAX);
                    warn!("Error while accepting the TCP connection: {}, retrying in {:?}", err, backoff);

                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => bail!(LurkError::ServerClosed),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                Err(err) => {
                    error!("Unable to accept TCP connection: {}", err);
                    bail!(err)
                }
            }
        }
    }

    fn on_client_connected(&self, stream: TcpStream, addr: SocketAddr) {
        logging::log_opened_tcp_conn!(addr);

        if let Err(err) = self.config.tcp_opts().apply_to(&stream) {
            warn!("Unable to apply TCP options to connection with {}: {}", addr, err);
        }

        let handler = LurkSocks5Handler::new(Arc::clone(&self.config));

        tokio::spawn(async move {
            let result = match LurkConnection::from_tcp_stream(stream) {
                Ok(conn) => handler.handle(conn).await,
                Err(err) => Err(err),
            };

            match result {
                Ok(()) => logging::log_closed_tcp_conn!(addr),
                Err(err) => logging::log_closed_tcp_conn_with_error!(addr, err),
            }
        });
    }

    fn start_serve_cycle(&self, local_addr: SocketAddr) -> (u64, CancellationToken) {
        let mut state = self.lock_state();

        if let Some(previous) = state.shutdown.take() {
            previous.cancel();
        }

        let shutdown = CancellationToken::new();
        state.serve_cycle += 1;
        state.shutdown = Some(shutdown.clone());
        state.local_addr = Some(local_addr);

        (state.serve_cycle, shutdown)
    }

    fn finish_serve_cycle(&self, serve_cycle: u64) {
        let mut state = self.lock_state();

        // Newer serve cycle may have already taken over.
        if state.serve_cycle == serve_cycle {
            state.shutdown = None;
            state.local_addr = None;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LurkServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Accept errors that don't break the listener: per-connection failures and
/// temporary resource exhaustion, e.g. running out of file descriptors.
fn is_transient_accept_error(err: &io::Error) -> bool {
    async_listen::is_transient_error(err)
        || matches!(
            err.kind(),
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::OutOfMemory
        )
        || is_resource_exhausted(err)
}

cfg_if! {
    if #[cfg(unix)] {
        fn is_resource_exhausted(err: &io::Error) -> bool {
            matches!(
                err.raw_os_error(),
                Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
            )
        }
    } else {
        fn is_resource_exhausted(_err: &io::Error) -> bool {
            false
        }
    }
}
