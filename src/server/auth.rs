use crate::{
    common::error::LurkError,
    io::{LurkRequestRead, LurkResponseWrite},
    net::connection::LurkConnection,
    proto::socks5::{
        request::PasswordAuthRequest,
        response::PasswordAuthResponse,
        AuthMethod,
    },
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use log::{debug, warn};

/// Authentication method the server is able to perform over established connection.
#[async_trait]
pub trait LurkAuthenticator: Send + Sync {
    /// Method identifier that is negotiated with the client.
    fn method(&self) -> AuthMethod;

    /// Run method-specific subnegotiation over the connection.
    async fn authenticate(&self, conn: &mut LurkConnection) -> Result<()>;
}

/// "No authentication required" method.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuthenticator;

#[async_trait]
impl LurkAuthenticator for NoAuthenticator {
    fn method(&self) -> AuthMethod {
        AuthMethod::None
    }

    async fn authenticate(&self, _conn: &mut LurkConnection) -> Result<()> {
        Ok(())
    }
}

/// Username/Password authentication as per RFC 1929.
#[derive(Clone)]
pub struct PasswordAuthenticator {
    username: String,
    password: String,
}

impl PasswordAuthenticator {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> PasswordAuthenticator {
        PasswordAuthenticator {
            username: username.into(),
            password: password.into(),
        }
    }

    fn verify(&self, request: &PasswordAuthRequest) -> bool {
        request.username() == self.username.as_bytes() && request.password() == self.password.as_bytes()
    }
}

#[async_trait]
impl LurkAuthenticator for PasswordAuthenticator {
    fn method(&self) -> AuthMethod {
        AuthMethod::Password
    }

    async fn authenticate(&self, conn: &mut LurkConnection) -> Result<()> {
        let request = conn.stream_mut().read_request::<PasswordAuthRequest>().await?;

        // Client observes the status before the connection is closed.
        if self.verify(&request) {
            conn.stream_mut().write_response(PasswordAuthResponse::success()).await?;
            debug!("Credentials of {} have been verified", conn);
            Ok(())
        } else {
            conn.stream_mut().write_response(PasswordAuthResponse::failure()).await?;
            warn!("Invalid credentials received from {}", conn);
            bail!(LurkError::AuthenticationFailed)
        }
    }
}

impl std::fmt::Debug for PasswordAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordAuthenticator")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
