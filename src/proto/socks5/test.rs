use crate::{
    common::{
        assertions::{assert_lurk_err, bail_unless_lurk_err},
        error::LurkError,
    },
    io::{LurkRequest, LurkResponse},
    proto::socks5::{
        address::{split_host_port, Address, AddressType},
        consts::*,
        request::{CommandRequest, HandshakeRequest, PasswordAuthRequest},
        response::{CommandResponse, HandshakeResponse, PasswordAuthResponse},
        AuthMethod, Command, ReplyStatus,
    },
};
use pretty_assertions::assert_eq;

const TEST_ADDRESSES: [(&str, AddressType); 5] = [
    ("0.0.0.0:0", AddressType::IPv4),
    ("1.2.3.4:5", AddressType::IPv4),
    ("google.com:80", AddressType::DomainName),
    ("[::]:80", AddressType::IPv6),
    ("[2001:db8::a:b:c:d]:80", AddressType::IPv6),
];

#[test]
fn parse_textual_address() {
    for (addr, addr_type) in TEST_ADDRESSES {
        let parsed = Address::parse(addr).expect("Expect parsed address");
        assert_eq!(Address::new(addr_type, addr), parsed, "address '{addr}'");
    }
}

#[test]
fn parse_invalid_textual_address() {
    for addr in ["google.com", "[::1]", "::1:80", "[::1:80", "1.2.3.4"] {
        bail_unless_lurk_err!(LurkError::InvalidAddress(addr.to_string()), Address::parse(addr));
    }

    let too_long = format!("{}:80", "a".repeat(256));
    bail_unless_lurk_err!(LurkError::InvalidAddress(too_long.clone()), Address::parse(&too_long));
}

#[test]
#[rustfmt::skip]
fn encode_address() {
    let expected: [&[u8]; 5] = [
        &[1, 0, 0, 0, 0, 0, 0],
        &[1, 1, 2, 3, 4, 0, 5],
        &[3, 10, 103, 111, 111, 103, 108, 101, 46, 99, 111, 109, 0, 80],
        &[4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 80],
        &[4, 32, 1, 13, 184, 0, 0, 0, 0, 0, 10, 0, 11, 0, 12, 0, 13, 0, 80],
    ];

    for ((addr, addr_type), bytes) in TEST_ADDRESSES.into_iter().zip(expected) {
        let mut buf = [0u8; 256];
        let len = Address::new(addr_type, addr).encode(&mut buf).expect("Expect encoded address");
        assert_eq!(bytes, &buf[..len], "address '{addr}'");
    }
}

#[test]
fn address_survives_wire_round_trip() {
    for (addr, _) in TEST_ADDRESSES {
        let parsed = Address::parse(addr).unwrap();

        let mut buf = [0u8; 256];
        let len = parsed.encode(&mut buf).unwrap();
        let (decoded, consumed) = Address::decode(&buf[..len]).expect("Expect decoded address");

        assert_eq!(len, consumed);
        assert_eq!(parsed, decoded);
    }
}

#[test]
fn encode_address_errors() {
    let mut buf = [0xaau8; 5];
    bail_unless_lurk_err!(
        LurkError::ShortBuffer {
            required: 7,
            available: 5
        },
        Address::new(AddressType::IPv4, "0.0.0.0:0").encode(&mut buf)
    );
    // Undersized buffer stays untouched.
    assert_eq!([0xaau8; 5], buf);

    let mut buf = [0u8; 256];
    bail_unless_lurk_err!(
        LurkError::InvalidPort("a".to_string()),
        Address::new(AddressType::DomainName, "1.2.3.4:a").encode(&mut buf)
    );
    bail_unless_lurk_err!(
        LurkError::InvalidAddress("google.com:80".to_string()),
        Address::new(AddressType::IPv4, "google.com:80").encode(&mut buf)
    );
    bail_unless_lurk_err!(
        LurkError::InvalidAddress("google.com".to_string()),
        Address::new(AddressType::IPv4, "google.com").encode(&mut buf)
    );
    bail_unless_lurk_err!(
        LurkError::InvalidPort("65536".to_string()),
        Address::new(AddressType::IPv4, "1.2.3.4:65536").encode(&mut buf)
    );
}

#[test]
fn decode_address_errors() {
    bail_unless_lurk_err!(LurkError::AddressTypeNotSupported(0x02), Address::decode(&[0x02, 0, 0]));
    bail_unless_lurk_err!(
        LurkError::ShortBuffer {
            required: 7,
            available: 4
        },
        Address::decode(&[address::SOCKS5_ADDR_TYPE_IPV4, 1, 2, 3])
    );
    bail_unless_lurk_err!(
        LurkError::ShortBuffer {
            required: 1,
            available: 0
        },
        Address::decode(&[])
    );
}

#[test]
fn split_bracketed_ipv6() {
    assert_eq!(("::1", "80"), split_host_port("[::1]:80").unwrap());
    assert_eq!(("", "1080"), split_host_port(":1080").unwrap());
    assert_eq!(("google.com", "443"), split_host_port("google.com:443").unwrap());
}

#[tokio::test]
async fn resolve_address() {
    let resolved = Address::parse("127.0.0.1:8080").unwrap().to_socket_addr().await.unwrap();
    assert_eq!("127.0.0.1:8080".parse::<std::net::SocketAddr>().unwrap(), resolved);

    let resolved = Address::new(AddressType::DomainName, ":1080").to_socket_addr().await.unwrap();
    assert_eq!("0.0.0.0:1080".parse::<std::net::SocketAddr>().unwrap(), resolved);

    let resolved = Address::parse("localhost:80").unwrap().to_socket_addr().await.unwrap();
    assert!(resolved.ip().is_loopback());
}

#[tokio::test]
async fn read_handshake_request() {
    let mut buf = [0u8; 520];
    let mut stream = tokio_test::io::Builder::new()
        .read(&[
            SOCKS5_VERSION,
            3,
            auth::SOCKS5_AUTH_METHOD_PASSWORD,
            0x01,
            auth::SOCKS5_AUTH_METHOD_NONE,
        ])
        .read(&[SOCKS5_VERSION, 0])
        .read(&[0x04, 1])
        .build();

    let request = HandshakeRequest::read_from(&mut stream, &mut buf)
        .await
        .expect("Handshake request should be parsed");
    assert_eq!(&[0x02u8, 0x01, 0x00][..], request.auth_methods());
    assert!(request.offers(AuthMethod::Password));
    assert!(request.offers(AuthMethod::None));

    let request = HandshakeRequest::read_from(&mut stream, &mut buf)
        .await
        .expect("Handshake request without methods should be parsed");
    assert!(!request.offers(AuthMethod::None));

    bail_unless_lurk_err!(
        LurkError::InvalidSocksVersion(0x04),
        HandshakeRequest::read_from(&mut stream, &mut buf).await
    );
}

#[test]
fn handshake_request_offers_only_listed_methods() {
    let request = HandshakeRequest::new(vec![auth::SOCKS5_AUTH_METHOD_PASSWORD]);
    assert!(request.offers(AuthMethod::Password));
    assert!(!request.offers(AuthMethod::None));
}

#[tokio::test]
async fn read_password_auth_request() {
    let mut buf = [0u8; 520];
    let username = [b'u'; 255];
    let password = [b'p'; 255];

    let mut stream = tokio_test::io::Builder::new()
        .read(&[auth::SOCKS5_SUBNEGOTIATION_VERSION, 255])
        .read(&username)
        .read(&[255])
        .read(&password)
        .build();

    let request = PasswordAuthRequest::read_from(&mut stream, &mut buf)
        .await
        .expect("Password auth request should be parsed");
    assert_eq!(&username[..], request.username());
    assert_eq!(&password[..], request.password());

    // Password never shows up in logs.
    assert!(!format!("{request:?}").contains("ppp"));
}

#[tokio::test]
#[rustfmt::skip]
async fn read_command_requests() {
    let mut buf = [0u8; 520];
    let mut stream = tokio_test::io::Builder::new()
        .read(&[SOCKS5_VERSION, command::SOCKS5_CMD_CONNECT, 0x00, address::SOCKS5_ADDR_TYPE_IPV4, 192, 168, 0, 1, 0x1f, 0x90])
        .read(&[SOCKS5_VERSION, command::SOCKS5_CMD_BIND, 0xff, address::SOCKS5_ADDR_TYPE_IPV6, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 80])
        .read(&[SOCKS5_VERSION, 0x09, 0x00, address::SOCKS5_ADDR_TYPE_DOMAIN_NAME, 1, b'a', 0, 1])
        .read(&[0x06, command::SOCKS5_CMD_CONNECT, 0x00, address::SOCKS5_ADDR_TYPE_IPV4])
        .build();

    let request = CommandRequest::read_from(&mut stream, &mut buf).await.unwrap();
    assert_eq!(Command::Connect, request.command());
    assert_eq!(&Address::new(AddressType::IPv4, "192.168.0.1:8080"), request.target_addr());

    // Reserved byte is ignored.
    let request = CommandRequest::read_from(&mut stream, &mut buf).await.unwrap();
    assert_eq!(Command::Bind, request.command());
    assert_eq!(&Address::new(AddressType::IPv6, "[::1]:80"), request.target_addr());

    let request = CommandRequest::read_from(&mut stream, &mut buf).await.unwrap();
    assert_eq!(Command::Other(0x09), request.command());
    assert_eq!(&Address::new(AddressType::DomainName, "a:1"), request.target_addr());

    bail_unless_lurk_err!(
        LurkError::InvalidSocksVersion(0x06),
        CommandRequest::read_from(&mut stream, &mut buf).await
    );
}

#[test]
fn command_request_display() {
    let request = CommandRequest::new(Command::UdpAssociate, Address::parse("1.2.3.4:5").unwrap());
    assert_eq!("UDP ASSOCIATE", request.command().to_string());
    assert_eq!("1.2.3.4:5", request.target_addr().to_string());
}

#[test]
fn encode_handshake_responses() {
    let mut buf = [0u8; 520];

    let len = HandshakeResponse::with_auth_method(AuthMethod::Password).encode(&mut buf).unwrap();
    assert_eq!(&[SOCKS5_VERSION, auth::SOCKS5_AUTH_METHOD_PASSWORD], &buf[..len]);

    let len = HandshakeResponse::with_no_acceptable_method().encode(&mut buf).unwrap();
    assert_eq!(&[SOCKS5_VERSION, auth::SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE], &buf[..len]);
}

#[test]
fn encode_password_auth_responses() {
    let mut buf = [0u8; 520];

    let len = PasswordAuthResponse::success().encode(&mut buf).unwrap();
    assert_eq!(&[auth::SOCKS5_SUBNEGOTIATION_VERSION, auth::SOCKS5_AUTH_STATUS_SUCCESS], &buf[..len]);

    let len = PasswordAuthResponse::failure().encode(&mut buf).unwrap();
    assert_eq!(&[auth::SOCKS5_SUBNEGOTIATION_VERSION, auth::SOCKS5_AUTH_STATUS_FAILURE], &buf[..len]);
}

#[test]
#[rustfmt::skip]
fn encode_command_responses() {
    let mut buf = [0u8; 520];

    let len = CommandResponse::builder()
        .with_success()
        .with_bound_address(Address::parse("google.com:80").unwrap())
        .build()
        .encode(&mut buf)
        .unwrap();
    assert_eq!(
        &[SOCKS5_VERSION, reply::SOCKS5_REPLY_SUCCEEDED, 0x00, address::SOCKS5_ADDR_TYPE_DOMAIN_NAME, 10,
          b'g', b'o', b'o', b'g', b'l', b'e', b'.', b'c', b'o', b'm', 0, 80],
        &buf[..len]
    );

    let len = CommandResponse::builder()
        .with_status(ReplyStatus::ConnectionRefused)
        .build()
        .encode(&mut buf)
        .unwrap();
    assert_eq!(
        &[SOCKS5_VERSION, reply::SOCKS5_REPLY_CONNECTION_REFUSED, 0x00, address::SOCKS5_ADDR_TYPE_IPV4, 0, 0, 0, 0, 0, 0],
        &buf[..len]
    );
}

#[test]
fn encode_command_response_into_short_buffer() {
    let mut buf = [0u8; 8];

    assert_lurk_err!(
        LurkError::ShortBuffer {
            required: 7,
            available: 5
        },
        CommandResponse::builder()
            .with_success()
            .build()
            .encode(&mut buf)
            .expect_err("Expect error")
    );

    let mut buf = [0u8; 2];
    assert_lurk_err!(
        LurkError::ShortBuffer {
            required: 3,
            available: 2
        },
        CommandResponse::builder()
            .with_success()
            .build()
            .encode(&mut buf)
            .expect_err("Expect error")
    );
}

#[test]
fn reply_status_codes() {
    assert_eq!(reply::SOCKS5_REPLY_SUCCEEDED, ReplyStatus::Succeeded.as_u8());
    assert_eq!(reply::SOCKS5_REPLY_GENERAL_FAILURE, ReplyStatus::GeneralFailure.as_u8());
    assert_eq!(reply::SOCKS5_REPLY_HOST_UNREACHABLE, ReplyStatus::HostUnreachable.as_u8());
    assert_eq!(reply::SOCKS5_REPLY_COMMAND_NOT_SUPPORTED, ReplyStatus::CommandNotSupported.as_u8());
    assert_eq!(
        reply::SOCKS5_REPLY_ADDRESS_TYPE_NOT_SUPPORTED,
        ReplyStatus::AddressTypeNotSupported.as_u8()
    );
}
