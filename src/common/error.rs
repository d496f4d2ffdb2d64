use crate::proto::socks5::Command;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum LurkError {
    #[error("invalid SOCKS version {0:#04x}")]
    InvalidSocksVersion(u8),
    #[error("unable to agree on authentication method")]
    NoAcceptableMethod,
    #[error("address type {0:#04x} is not supported")]
    AddressTypeNotSupported(u8),
    #[error("invalid address '{0}'")]
    InvalidAddress(String),
    #[error("invalid port number '{0}'")]
    InvalidPort(String),
    #[error("short buffer: {required} bytes required, {available} available")]
    ShortBuffer { required: usize, available: usize },
    #[error("invalid subnegotiation version {0:#04x}")]
    InvalidSubnegotiationVersion(u8),
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("server closed")]
    ServerClosed,
    #[error("unable to resolve domain name {0}")]
    UnresolvedDomainName(String),
    #[error("command {0} is not supported")]
    CommandNotSupported(Command),
}
