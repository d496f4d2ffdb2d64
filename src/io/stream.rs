use super::{LurkIo, LurkRequest, LurkRequestRead, LurkResponse, LurkResponseWrite};
use anyhow::Result;
use log::trace;
use std::{
    fmt::Debug,
    ops::{Deref, DerefMut},
};
use tokio::io::AsyncWriteExt;

/// Size of per-stream scratch buffer.
///
/// Fits the largest SOCKS5 frame handled by the server, which is
/// username/password subnegotiation request: 1 + 1 + 255 + 1 + 255 bytes.
pub const SCRATCH_BUFFER_SIZE: usize = 520;

/// Alias for stream wrapper over boxed byte stream.
pub type LurkBoxedStream = LurkStream<Box<dyn LurkIo>>;

/// Stream wrapper that owns the scratch buffer used for all
/// reads and writes of protocol messages.
pub struct LurkStream<T> {
    stream: T,
    buf: Box<[u8; SCRATCH_BUFFER_SIZE]>,
}

impl<T> LurkStream<T>
where
    T: LurkIo,
{
    pub fn new(stream: T) -> LurkStream<T> {
        LurkStream {
            stream,
            buf: Box::new([0u8; SCRATCH_BUFFER_SIZE]),
        }
    }
}

impl<T> LurkRequestRead for LurkStream<T>
where
    T: LurkIo,
{
    async fn read_request<Request>(&mut self) -> Result<Request>
    where
        Request: LurkRequest + Debug,
    {
        let request = Request::read_from(&mut self.stream, &mut self.buf[..]).await?;
        trace!("Read {:?}", request);

        Ok(request)
    }
}

impl<T> LurkResponseWrite for LurkStream<T>
where
    T: LurkIo,
{
    async fn write_response<Response>(&mut self, response: Response) -> Result<()>
    where
        Response: LurkResponse + Debug,
    {
        let len = response.encode(&mut self.buf[..])?;
        self.stream.write_all(&self.buf[..len]).await?;
        self.stream.flush().await?;
        trace!("Write {:?}", response);

        Ok(())
    }
}

impl<T> Deref for LurkStream<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.stream
    }
}

impl<T> DerefMut for LurkStream<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.stream
    }
}
