use anyhow::Result;
use std::fmt::Debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

pub mod stream;
pub mod tunnel;

/// Any byte stream that could be handled by the proxy.
pub trait LurkIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> LurkIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Message that is read from the stream. Implementations use `buf`
/// as scratch space instead of allocating on every read.
pub trait LurkRequest {
    async fn read_from<T: AsyncReadExt + Unpin + Send>(stream: &mut T, buf: &mut [u8]) -> Result<Self>
    where
        Self: std::marker::Sized;
}

/// Message that is written to the stream. Implementations encode
/// themselves into `buf` and return the number of encoded bytes.
pub trait LurkResponse {
    fn encode(&self, buf: &mut [u8]) -> Result<usize>;
}

pub trait LurkResponseWrite {
    async fn write_response<Response>(&mut self, response: Response) -> Result<()>
    where
        Response: LurkResponse + Debug;
}

pub trait LurkRequestRead {
    async fn read_request<Request>(&mut self) -> Result<Request>
    where
        Request: LurkRequest + Debug;
}
