use super::{address::Address, consts, AuthMethod, ReplyStatus};
use crate::{common::error::LurkError, io::LurkResponse};
use anyhow::{ensure, Result};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

// The server selects from one of the methods given in METHODS, and
// sends a METHOD selection message:
// +----+--------+
// |VER | METHOD |
// +----+--------+
// | 1  |   1    |
// +----+--------+

#[derive(Debug, PartialEq)]
pub struct HandshakeResponse {
    method: AuthMethod,
}

impl HandshakeResponse {
    pub fn with_auth_method(method: AuthMethod) -> HandshakeResponse {
        HandshakeResponse { method }
    }

    pub fn with_no_acceptable_method() -> HandshakeResponse {
        HandshakeResponse {
            method: AuthMethod::NoAcceptableMethod,
        }
    }
}

impl LurkResponse for HandshakeResponse {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        encode_fixed(buf, &[consts::SOCKS5_VERSION, self.method.as_u8()])
    }
}

// The server verifies the supplied UNAME and PASSWD, and sends the
// following response:
// +----+--------+
// |VER | STATUS |
// +----+--------+
// | 1  |   1    |
// +----+--------+

#[derive(Debug, PartialEq)]
pub struct PasswordAuthResponse {
    status: u8,
}

impl PasswordAuthResponse {
    pub fn success() -> PasswordAuthResponse {
        PasswordAuthResponse {
            status: consts::auth::SOCKS5_AUTH_STATUS_SUCCESS,
        }
    }

    pub fn failure() -> PasswordAuthResponse {
        PasswordAuthResponse {
            status: consts::auth::SOCKS5_AUTH_STATUS_FAILURE,
        }
    }
}

impl LurkResponse for PasswordAuthResponse {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        encode_fixed(buf, &[consts::auth::SOCKS5_SUBNEGOTIATION_VERSION, self.status])
    }
}

// The server evaluates the request, and returns a reply formed as follows:
// +----+-----+-------+------+----------+----------+
// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
// +----+-----+-------+------+----------+----------+
// | 1  |  1  | X'00' |  1   | Variable |    2     |
// +----+-----+-------+------+----------+----------+

#[derive(Debug)]
pub struct CommandResponse {
    bound_addr: Address,
    status: ReplyStatus,
}

impl CommandResponse {
    pub fn builder() -> CommandResponseBuilder {
        CommandResponseBuilder {
            bound_addr: None,
            status: None,
        }
    }
}

impl LurkResponse for CommandResponse {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let header = encode_fixed(buf, &[consts::SOCKS5_VERSION, self.status.as_u8(), consts::SOCKS5_RESERVED])?;
        let addr_len = self.bound_addr.encode(&mut buf[header..])?;
        Ok(header + addr_len)
    }
}

pub struct CommandResponseBuilder {
    bound_addr: Option<Address>,
    status: Option<ReplyStatus>,
}

impl CommandResponseBuilder {
    pub fn with_success(&mut self) -> &mut CommandResponseBuilder {
        self.with_status(ReplyStatus::Succeeded)
    }

    pub fn with_status(&mut self, status: ReplyStatus) -> &mut CommandResponseBuilder {
        debug_assert!(self.status.is_none(), "should be unset");
        self.status = Some(status);
        self
    }

    pub fn with_bound_address(&mut self, bound_addr: Address) -> &mut CommandResponseBuilder {
        debug_assert!(self.bound_addr.is_none(), "should be unset");
        self.bound_addr = Some(bound_addr);
        self
    }

    /// Build the response. Unset bound address is replaced with `0.0.0.0:0`,
    /// which makes fixed-shape 10 bytes reply used to report errors.
    pub fn build(&self) -> CommandResponse {
        CommandResponse {
            bound_addr: self.bound_addr.clone().unwrap_or_else(null_ipv4_address),
            status: self.status.unwrap_or(ReplyStatus::GeneralFailure),
        }
    }
}

fn null_ipv4_address() -> Address {
    Address::from(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)))
}

fn encode_fixed(buf: &mut [u8], bytes: &[u8]) -> Result<usize> {
    ensure!(
        buf.len() >= bytes.len(),
        LurkError::ShortBuffer {
            required: bytes.len(),
            available: buf.len()
        }
    );
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}
