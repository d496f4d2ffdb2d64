use super::{address::Address, consts, AuthMethod, Command};
use crate::{common::error::LurkError, io::LurkRequest};
use anyhow::{ensure, Result};
use cfg_if::cfg_if;
use std::fmt::Debug;
use tokio::io::AsyncReadExt;

// The client connects to the server, and sends a
// version identifier/method selection message:
// +----+----------+----------+
// |VER | NMETHODS | METHODS  |
// +----+----------+----------+
// | 1  |    1     | 1 to 255 |
// +----+----------+----------+

#[derive(Debug)]
pub struct HandshakeRequest {
    auth_methods: Vec<u8>,
}

impl HandshakeRequest {
    cfg_if! {
        if #[cfg(test)] {
            pub fn new(auth_methods: Vec<u8>) -> HandshakeRequest {
                HandshakeRequest { auth_methods }
            }
        }
    }

    /// Whether client offered passed authentication method.
    pub fn offers(&self, method: AuthMethod) -> bool {
        self.auth_methods.contains(&method.as_u8())
    }

    pub fn auth_methods(&self) -> &[u8] {
        &self.auth_methods
    }
}

impl LurkRequest for HandshakeRequest {
    async fn read_from<T: AsyncReadExt + Unpin + Send>(stream: &mut T, buf: &mut [u8]) -> Result<Self> {
        stream.read_exact(&mut buf[..2]).await?;

        let (version, nmethods) = (buf[0], buf[1] as usize);

        // Bail out if version is not supported.
        ensure!(version == consts::SOCKS5_VERSION, LurkError::InvalidSocksVersion(version));

        stream.read_exact(&mut buf[..nmethods]).await?;

        Ok(HandshakeRequest {
            auth_methods: buf[..nmethods].to_vec(),
        })
    }
}

// Once the SOCKS V5 server has started, and the client has selected the
// Username/Password Authentication protocol, the Username/Password
// subnegotiation begins:
// +----+------+----------+------+----------+
// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
// +----+------+----------+------+----------+
// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
// +----+------+----------+------+----------+

pub struct PasswordAuthRequest {
    username: Vec<u8>,
    password: Vec<u8>,
}

impl PasswordAuthRequest {
    pub fn username(&self) -> &[u8] {
        &self.username
    }

    pub fn password(&self) -> &[u8] {
        &self.password
    }
}

impl Debug for PasswordAuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordAuthRequest")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("password", &"<hidden>")
            .finish()
    }
}

impl LurkRequest for PasswordAuthRequest {
    async fn read_from<T: AsyncReadExt + Unpin + Send>(stream: &mut T, buf: &mut [u8]) -> Result<Self> {
        stream.read_exact(&mut buf[..2]).await?;

        let (version, ulen) = (buf[0], buf[1] as usize);

        ensure!(
            version == consts::auth::SOCKS5_SUBNEGOTIATION_VERSION,
            LurkError::InvalidSubnegotiationVersion(version)
        );

        stream.read_exact(&mut buf[..ulen]).await?;
        let username = buf[..ulen].to_vec();

        let plen = stream.read_u8().await? as usize;
        stream.read_exact(&mut buf[..plen]).await?;
        let password = buf[..plen].to_vec();

        Ok(PasswordAuthRequest { username, password })
    }
}

// The SOCKS request information is sent by the client as
// soon as it has established a connection to the SOCKS
// server, and completed the authentication negotiations.
// +----+-----+-------+------+----------+----------+
// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
// +----+-----+-------+------+----------+----------+
// | 1  |  1  | X'00' |  1   | Variable |    2     |
// +----+-----+-------+------+----------+----------+

#[derive(Debug)]
pub struct CommandRequest {
    command: Command,
    target_addr: Address,
}

impl CommandRequest {
    cfg_if! {
        if #[cfg(test)] {
            pub fn new(command: Command, target_addr: Address) -> CommandRequest {
                CommandRequest { command, target_addr }
            }
        }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn target_addr(&self) -> &Address {
        &self.target_addr
    }
}

impl LurkRequest for CommandRequest {
    async fn read_from<T: AsyncReadExt + Unpin + Send>(stream: &mut T, buf: &mut [u8]) -> Result<CommandRequest> {
        stream.read_exact(&mut buf[..4]).await?;

        // Reserved field is ignored.
        let (version, cmd, addr_type) = (buf[0], buf[1], buf[3]);

        ensure!(version == consts::SOCKS5_VERSION, LurkError::InvalidSocksVersion(version));

        let command = Command::from(cmd);
        let target_addr = Address::read_from(stream, addr_type, buf).await?;

        Ok(CommandRequest { command, target_addr })
    }
}
