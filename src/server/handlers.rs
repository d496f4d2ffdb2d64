use super::config::LurkServerConfig;
use crate::{
    common::{error::LurkError, logging},
    net::connection::LurkConnection,
    proto::socks5::{request::CommandRequest, Command, ReplyStatus},
};
use anyhow::{anyhow, Result};
use log::{debug, info};
use std::sync::Arc;

/// Drives accepted connection through the whole SOCKS5 sequence and
/// dispatches parsed command to its handler.
pub struct LurkSocks5Handler {
    config: Arc<LurkServerConfig>,
}

impl LurkSocks5Handler {
    pub fn new(config: Arc<LurkServerConfig>) -> LurkSocks5Handler {
        LurkSocks5Handler { config }
    }

    pub async fn handle(&self, mut conn: LurkConnection) -> Result<()> {
        let authenticator = self.config.authenticator();

        // Agree on the configured method and run its subnegotiation.
        // Both fail hard: the client is never let through unauthenticated.
        conn.negotiate(authenticator.method()).await?;
        conn.authenticate(authenticator).await?;

        let request = match conn.read_command_request().await {
            Ok(request) => request,
            Err(err) => return LurkSocks5Handler::on_malformed_request(&mut conn, err).await,
        };

        let command = request.command();
        debug!("Received {} command from {} to {}", command, conn, request.target_addr());

        match command {
            Command::Connect if self.config.is_allowed(command) => self.handle_connect(&mut conn, &request).await,
            Command::Bind if self.config.is_allowed(command) => self.handle_bind(&mut conn, &request).await,
            _ => {
                let err = anyhow!(LurkError::CommandNotSupported(command));
                LurkSocks5Handler::on_request_handling_error(&mut conn, &request, err, ReplyStatus::CommandNotSupported).await
            }
        }
    }

    async fn handle_connect(&self, conn: &mut LurkConnection, request: &CommandRequest) -> Result<()> {
        let target_addr = request.target_addr();
        info!("SOCKS5 CONNECT from peer {} to {}", conn, target_addr);

        let target = match self.config.dialer().dial(target_addr).await {
            Ok(target) => target,
            Err(err) => {
                return LurkSocks5Handler::on_request_handling_error(conn, request, err, ReplyStatus::HostUnreachable).await
            }
        };

        // Client is told the local address of the outbound connection.
        let local_addr = match target.local_addr() {
            Ok(addr) => addr,
            Err(err) => {
                return LurkSocks5Handler::on_request_handling_error(conn, request, err.into(), ReplyStatus::GeneralFailure)
                    .await
            }
        };
        conn.write_command_response(ReplyStatus::Succeeded, self.config.bound_address(local_addr))
            .await?;

        conn.relay(target, target_addr).await;

        Ok(())
    }

    async fn handle_bind(&self, conn: &mut LurkConnection, request: &CommandRequest) -> Result<()> {
        let requested_addr = request.target_addr();
        info!("SOCKS5 BIND from peer {} on {}", conn, requested_addr);

        let listener = match self.config.listener_factory().listen(requested_addr).await {
            Ok(listener) => listener,
            Err(err) => {
                return LurkSocks5Handler::on_request_handling_error(conn, request, err, ReplyStatus::GeneralFailure).await
            }
        };

        // First reply announces the address the server listens on.
        let listen_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(err) => {
                return LurkSocks5Handler::on_request_handling_error(conn, request, err, ReplyStatus::GeneralFailure).await
            }
        };
        conn.write_command_response(ReplyStatus::Succeeded, self.config.bound_address(listen_addr))
            .await?;

        // Exactly one inbound connection is accepted.
        let (inbound, inbound_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                return LurkSocks5Handler::on_request_handling_error(conn, request, err, ReplyStatus::GeneralFailure).await
            }
        };
        drop(listener);

        debug!("BIND listener {} accepted connection from {}", listen_addr, inbound_addr);
        self.config.tcp_opts().apply_to(&inbound)?;

        // Second reply announces the connected peer.
        conn.write_command_response(ReplyStatus::Succeeded, inbound_addr.into()).await?;

        conn.relay(inbound, inbound_addr).await;

        Ok(())
    }

    /// Command request could not be parsed. Unsupported address type and
    /// unusable target address are reported to the client, anything else
    /// closes the connection silently.
    async fn on_malformed_request(conn: &mut LurkConnection, err: anyhow::Error) -> Result<()> {
        match err.downcast_ref::<LurkError>() {
            Some(LurkError::AddressTypeNotSupported(_)) => conn.write_error(ReplyStatus::AddressTypeNotSupported).await?,
            // Target can't be reached by a name that isn't valid UTF-8.
            Some(LurkError::InvalidAddress(_)) => conn.write_error(ReplyStatus::HostUnreachable).await?,
            _ => {}
        }
        Err(err)
    }

    async fn on_request_handling_error(
        conn: &mut LurkConnection,
        request: &CommandRequest,
        err: anyhow::Error,
        status: ReplyStatus,
    ) -> Result<()> {
        logging::log_request_handling_error!(conn, err, request, status);
        conn.write_error(status).await
    }
}
