//!
//! Socks5 protocol implementation details
//!
//! RFC 1928
//! https://datatracker.ietf.org/doc/html/rfc1928#ref-1
//!
//! RFC 1929
//! https://datatracker.ietf.org/doc/html/rfc1929
//!
use std::fmt::Display;

pub mod address;
pub mod request;
pub mod response;

#[cfg(test)]
mod test;

#[rustfmt::skip]
pub mod consts {
    pub const SOCKS5_VERSION: u8 = 0x05;
    pub const SOCKS5_RESERVED: u8 = 0x00;

    pub mod auth {
        pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
        pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;
        pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xff;

        pub const SOCKS5_SUBNEGOTIATION_VERSION: u8 = 0x01;
        pub const SOCKS5_AUTH_STATUS_SUCCESS: u8 = 0x00;
        pub const SOCKS5_AUTH_STATUS_FAILURE: u8 = 0x01;
    }

    pub mod command {
        pub const SOCKS5_CMD_CONNECT: u8 = 0x01;
        pub const SOCKS5_CMD_BIND: u8 = 0x02;
        pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;
    }

    pub mod address {
        pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
        pub const SOCKS5_ADDR_TYPE_DOMAIN_NAME: u8 = 0x03;
        pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;
    }

    pub mod reply {
        pub const SOCKS5_REPLY_SUCCEEDED: u8 = 0x00;
        pub const SOCKS5_REPLY_GENERAL_FAILURE: u8 = 0x01;
        pub const SOCKS5_REPLY_CONNECTION_NOT_ALLOWED: u8 = 0x02;
        pub const SOCKS5_REPLY_NETWORK_UNREACHABLE: u8 = 0x03;
        pub const SOCKS5_REPLY_HOST_UNREACHABLE: u8 = 0x04;
        pub const SOCKS5_REPLY_CONNECTION_REFUSED: u8 = 0x05;
        pub const SOCKS5_REPLY_TTL_EXPIRED: u8 = 0x06;
        pub const SOCKS5_REPLY_COMMAND_NOT_SUPPORTED: u8 = 0x07;
        pub const SOCKS5_REPLY_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;
    }
}

#[repr(u8)]
#[rustfmt::skip]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AuthMethod {
    None               = consts::auth::SOCKS5_AUTH_METHOD_NONE,
    Password           = consts::auth::SOCKS5_AUTH_METHOD_PASSWORD,
    NoAcceptableMethod = consts::auth::SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE,
}

impl AuthMethod {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[rustfmt::skip]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Command {
    Connect,
    Bind,
    UdpAssociate,
    /// Command value outside of RFC 1928 set, kept to be rejected with a proper reply.
    Other(u8),
}

impl From<u8> for Command {
    fn from(value: u8) -> Self {
        use consts::command::*;
        match value {
            SOCKS5_CMD_CONNECT => Command::Connect,
            SOCKS5_CMD_BIND => Command::Bind,
            SOCKS5_CMD_UDP_ASSOCIATE => Command::UdpAssociate,
            other => Command::Other(other),
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Connect => write!(f, "CONNECT"),
            Command::Bind => write!(f, "BIND"),
            Command::UdpAssociate => write!(f, "UDP ASSOCIATE"),
            Command::Other(value) => write!(f, "UNKNOWN({value:#04x})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplyStatus {
    Succeeded,
    GeneralFailure,
    ConnectionNotAllowed,
    NetworkUnreachable,
    HostUnreachable,
    ConnectionRefused,
    TtlExpired,
    CommandNotSupported,
    AddressTypeNotSupported,
}

impl ReplyStatus {
    #[rustfmt::skip]
    pub fn as_u8(self) -> u8 {
        use consts::reply::*;
        match self {
            ReplyStatus::Succeeded               => SOCKS5_REPLY_SUCCEEDED,
            ReplyStatus::GeneralFailure          => SOCKS5_REPLY_GENERAL_FAILURE,
            ReplyStatus::ConnectionNotAllowed    => SOCKS5_REPLY_CONNECTION_NOT_ALLOWED,
            ReplyStatus::NetworkUnreachable      => SOCKS5_REPLY_NETWORK_UNREACHABLE,
            ReplyStatus::HostUnreachable         => SOCKS5_REPLY_HOST_UNREACHABLE,
            ReplyStatus::ConnectionRefused       => SOCKS5_REPLY_CONNECTION_REFUSED,
            ReplyStatus::TtlExpired              => SOCKS5_REPLY_TTL_EXPIRED,
            ReplyStatus::CommandNotSupported     => SOCKS5_REPLY_COMMAND_NOT_SUPPORTED,
            ReplyStatus::AddressTypeNotSupported => SOCKS5_REPLY_ADDRESS_TYPE_NOT_SUPPORTED,
        }
    }
}
