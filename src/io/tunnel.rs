use anyhow::{bail, Result};
use log::debug;
use std::io;
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const TUNNEL_BUFFER_SIZE: usize = 8 * 1024;

/// Bidirectional data relay between two streams.
///
/// Both directions are driven concurrently. The tunnel finishes as soon as
/// either direction reaches end of input or fails: write side of the
/// opposite stream is shut down and the other direction is abandoned, so an
/// idle peer can't hold the tunnel open.
pub struct LurkTunnel<'a, X, Y>
where
    X: AsyncRead + AsyncWrite + Unpin + ?Sized,
    Y: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    l2r: &'a mut X,
    r2l: &'a mut Y,
}

impl<'a, X, Y> LurkTunnel<'a, X, Y>
where
    X: AsyncRead + AsyncWrite + Unpin + ?Sized,
    Y: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    pub fn new(l2r: &'a mut X, r2l: &'a mut Y) -> LurkTunnel<'a, X, Y> {
        LurkTunnel { l2r, r2l }
    }

    /// Run the relay. Returns number of bytes transmitted L->R and R->L.
    pub async fn run(&mut self) -> Result<(u64, u64)> {
        let (mut l2r, mut r2l) = (0u64, 0u64);

        let result = {
            let (mut l_reader, mut l_writer) = split(&mut *self.l2r);
            let (mut r_reader, mut r_writer) = split(&mut *self.r2l);

            tokio::select! {
                result = pipe(&mut l_reader, &mut r_writer, &mut l2r) => result,
                result = pipe(&mut r_reader, &mut l_writer, &mut r2l) => result,
            }
        };

        match result {
            Ok(()) => {
                debug!("Tunnel closed, L2R {} bytes, R2L {} bytes transmitted", l2r, r2l);
                Ok((l2r, r2l))
            }
            Err(err) => bail!(err),
        }
    }
}

/// Copy `reader` into `writer` until EOF, then shut `writer` down.
/// `transmitted` is kept up to date, so it is valid even if the copy is abandoned.
async fn pipe<R, W>(reader: &mut R, writer: &mut W, transmitted: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; TUNNEL_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        *transmitted += n as u64;
    }

    writer.shutdown().await
}
