//! Digest engine: streams a file through BLAKE3.
//!
//! Memory use is one fixed chunk regardless of file size.

use std::io;
use std::path::Path;

use coldsync_core::Digest;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes read per step.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Digest everything `reader` yields. Returns the digest and byte count.
pub async fn digest_reader<R>(reader: &mut R) -> io::Result<(Digest, u64)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    Ok((Digest::from(hasher.finalize()), total))
}

/// Digest the full current content of the file at `path`.
///
/// Fails with the underlying I/O error if the file cannot be opened or
/// becomes unreadable while streaming.
pub async fn digest_file(path: &Path) -> io::Result<Digest> {
    let mut file = tokio::fs::File::open(path).await?;
    let (digest, _) = digest_reader(&mut file).await?;
    Ok(digest)
}
