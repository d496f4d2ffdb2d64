use super::consts;
use crate::common::error::LurkError;
use anyhow::{bail, ensure, Result};
use bytes::BufMut;
use std::{
    fmt::Display,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};
use tokio::{io::AsyncReadExt, net::lookup_host};

/// Longest domain name that fits into single length byte.
pub const MAX_DOMAIN_NAME_LEN: usize = u8::MAX as usize;

#[rustfmt::skip]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AddressType {
    IPv4,
    DomainName,
    IPv6,
}

impl AddressType {
    #[rustfmt::skip]
    pub fn as_u8(self) -> u8 {
        use consts::address::*;
        match self {
            AddressType::IPv4       => SOCKS5_ADDR_TYPE_IPV4,
            AddressType::DomainName => SOCKS5_ADDR_TYPE_DOMAIN_NAME,
            AddressType::IPv6       => SOCKS5_ADDR_TYPE_IPV6,
        }
    }
}

impl TryFrom<u8> for AddressType {
    type Error = LurkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use consts::address::*;
        match value {
            SOCKS5_ADDR_TYPE_IPV4 => Ok(AddressType::IPv4),
            SOCKS5_ADDR_TYPE_DOMAIN_NAME => Ok(AddressType::DomainName),
            SOCKS5_ADDR_TYPE_IPV6 => Ok(AddressType::IPv6),
            _ => Err(LurkError::AddressTypeNotSupported(value)),
        }
    }
}

impl Display for AddressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressType::IPv4 => write!(f, "ipv4"),
            AddressType::DomainName => write!(f, "domain"),
            AddressType::IPv6 => write!(f, "ipv6"),
        }
    }
}

/// SOCKS5 network address record.
///
/// Keeps textual `host:port` representation along with declared address type.
/// Wire layout:
///
/// +------+----------+------+
/// | ATYP |   ADDR   | PORT |
/// +------+----------+------+
/// |  1   | Variable |  2   |
/// +------+----------+------+
///
/// Domain names are never resolved here, it happens at connect time.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Address {
    addr_type: AddressType,
    addr: String,
}

impl Address {
    /// Create address with explicitly declared type. Consistency between
    /// the type and `addr` is verified on encoding.
    pub fn new(addr_type: AddressType, addr: impl Into<String>) -> Address {
        Address {
            addr_type,
            addr: addr.into(),
        }
    }

    /// Parse textual `host:port` address. Type is derived from the host:
    /// IPv4 / IPv6 literals map to IP types, everything else is a domain name.
    pub fn parse(addr: &str) -> Result<Address> {
        let (host, _) = split_host_port(addr)?;

        let addr_type = match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(_)) => AddressType::IPv4,
            Ok(IpAddr::V6(_)) => AddressType::IPv6,
            Err(_) => {
                ensure!(host.len() <= MAX_DOMAIN_NAME_LEN, LurkError::InvalidAddress(addr.to_string()));
                AddressType::DomainName
            }
        };

        Ok(Address::new(addr_type, addr))
    }

    pub fn addr_type(&self) -> AddressType {
        self.addr_type
    }

    pub fn as_str(&self) -> &str {
        &self.addr
    }

    pub fn port(&self) -> Result<u16> {
        let (_, port) = split_host_port(&self.addr)?;
        parse_port(port)
    }

    /// Encode address into `buf`. Returns number of written bytes.
    ///
    /// Nothing is written unless the whole record is valid and fits into `buf`.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let (host, port) = split_host_port(&self.addr)?;
        let invalid_address = || LurkError::InvalidAddress(self.addr.clone());

        let host = match self.addr_type {
            AddressType::IPv4 => EncodedHost::IPv4(host.parse::<Ipv4Addr>().map_err(|_| invalid_address())?),
            AddressType::IPv6 => EncodedHost::IPv6(host.parse::<Ipv6Addr>().map_err(|_| invalid_address())?),
            AddressType::DomainName => {
                ensure!(host.len() <= MAX_DOMAIN_NAME_LEN, invalid_address());
                EncodedHost::DomainName(host)
            }
        };

        let port = parse_port(port)?;

        let required = 3 + host.len();
        ensure!(
            buf.len() >= required,
            LurkError::ShortBuffer {
                required,
                available: buf.len()
            }
        );

        let mut bytes = &mut buf[..required];
        bytes.put_u8(self.addr_type.as_u8());
        match host {
            EncodedHost::IPv4(ipv4) => bytes.put_slice(&ipv4.octets()),
            EncodedHost::IPv6(ipv6) => bytes.put_slice(&ipv6.octets()),
            EncodedHost::DomainName(name) => {
                bytes.put_u8(name.len() as u8);
                bytes.put_slice(name.as_bytes());
            }
        }
        bytes.put_u16(port);

        Ok(required)
    }

    /// Decode address record from the beginning of `buf`.
    /// Returns decoded address and number of consumed bytes.
    pub fn decode(buf: &[u8]) -> Result<(Address, usize)> {
        let short_buffer = |required: usize| LurkError::ShortBuffer {
            required,
            available: buf.len(),
        };

        ensure!(!buf.is_empty(), short_buffer(1));
        let addr_type = AddressType::try_from(buf[0])?;

        let (offset, addr_len) = match addr_type {
            AddressType::IPv4 => (1, 4),
            AddressType::IPv6 => (1, 16),
            AddressType::DomainName => {
                ensure!(buf.len() >= 2, short_buffer(2));
                (2, buf[1] as usize)
            }
        };

        let required = offset + addr_len + 2;
        ensure!(buf.len() >= required, short_buffer(required));

        let host = host_from_bytes(addr_type, &buf[offset..offset + addr_len])?;
        let port = u16::from_be_bytes([buf[offset + addr_len], buf[offset + addr_len + 1]]);

        Ok((Address::new(addr_type, join_host_port(&host, port)), required))
    }

    /// Read address body from the stream, once address type byte has been
    /// already consumed. The `buf` is used as scratch space.
    pub async fn read_from<T: AsyncReadExt + Unpin>(stream: &mut T, addr_type: u8, buf: &mut [u8]) -> Result<Address> {
        let addr_type = AddressType::try_from(addr_type)?;

        let addr_len = match addr_type {
            AddressType::IPv4 => 4,
            AddressType::IPv6 => 16,
            AddressType::DomainName => stream.read_u8().await? as usize,
        };

        let required = addr_len + 2;
        ensure!(
            buf.len() >= required,
            LurkError::ShortBuffer {
                required,
                available: buf.len()
            }
        );

        stream.read_exact(&mut buf[..required]).await?;

        let host = host_from_bytes(addr_type, &buf[..addr_len])?;
        let port = u16::from_be_bytes([buf[addr_len], buf[addr_len + 1]]);

        Ok(Address::new(addr_type, join_host_port(&host, port)))
    }

    /// Resolve address into socket address. Domain names are resolved
    /// by means of builtin tokio DNS resolver, the first found is taken.
    pub async fn to_socket_addr(&self) -> Result<SocketAddr> {
        let (host, port) = split_host_port(&self.addr)?;
        let port = parse_port(port)?;

        match self.addr_type {
            AddressType::IPv4 | AddressType::IPv6 => match host.parse::<IpAddr>() {
                Ok(ip) => Ok(SocketAddr::new(ip, port)),
                Err(_) => bail!(LurkError::InvalidAddress(self.addr.clone())),
            },
            // Empty host stands for all interfaces, e.g. ":1080".
            AddressType::DomainName if host.is_empty() => Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)),
            AddressType::DomainName => lookup_host((host, port))
                .await?
                .next()
                .ok_or_else(|| LurkError::UnresolvedDomainName(host.to_string()).into()),
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        let addr_type = match addr {
            SocketAddr::V4(_) => AddressType::IPv4,
            SocketAddr::V6(_) => AddressType::IPv6,
        };
        Address::new(addr_type, addr.to_string())
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.addr)
    }
}

enum EncodedHost<'a> {
    IPv4(Ipv4Addr),
    IPv6(Ipv6Addr),
    DomainName(&'a str),
}

impl EncodedHost<'_> {
    fn len(&self) -> usize {
        match self {
            EncodedHost::IPv4(_) => 4,
            EncodedHost::IPv6(_) => 16,
            EncodedHost::DomainName(name) => 1 + name.len(),
        }
    }
}

fn host_from_bytes(addr_type: AddressType, bytes: &[u8]) -> Result<String> {
    let host = match addr_type {
        AddressType::IPv4 => Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]).to_string(),
        AddressType::IPv6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            Ipv6Addr::from(octets).to_string()
        }
        AddressType::DomainName => String::from_utf8(bytes.to_vec())
            .map_err(|err| LurkError::InvalidAddress(String::from_utf8_lossy(err.as_bytes()).into_owned()))?,
    };

    Ok(host)
}

/// Split `host:port` into its parts. IPv6 literal hosts must be enclosed
/// into square brackets, e.g. `[::1]:80`.
pub fn split_host_port(addr: &str) -> Result<(&str, &str)> {
    let invalid_address = || LurkError::InvalidAddress(addr.to_string());

    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest.split_once(']').ok_or_else(invalid_address)?;
        let port = rest.strip_prefix(':').ok_or_else(invalid_address)?;
        (host, port)
    } else {
        let (host, port) = addr.rsplit_once(':').ok_or_else(invalid_address)?;
        ensure!(!host.contains(':'), invalid_address());
        (host, port)
    };

    ensure!(!host.contains(['[', ']']) && !port.contains(['[', ']', ':']), invalid_address());

    Ok((host, port))
}

/// Join host and port, enclosing hosts that contain colons into square brackets.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn parse_port(port: &str) -> Result<u16> {
    let invalid_port = || LurkError::InvalidPort(port.to_string());

    ensure!(!port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()), invalid_port());
    port.parse::<u16>().map_err(|_| invalid_port().into())
}
