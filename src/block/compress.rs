//! zlib compression of log block payloads.

use crate::error::{Error, Result};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;

/// Deflates `data` at the best compression level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len()), Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| Error::compression(format!("deflate failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::compression(format!("deflate failed: {}", e)))
}

/// Inflates one zlib stream from the front of `src` into `dst`, which must
/// be exactly the uncompressed size.
///
/// `src` may extend past the end of the stream; the return value is the
/// number of compressed bytes the stream occupied.
pub fn decompress_into(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    let mut inflater = Decompress::new(true);
    let status = inflater
        .decompress(src, dst, FlushDecompress::Finish)
        .map_err(|e| Error::compression(format!("inflate failed: {}", e)))?;

    if status != Status::StreamEnd {
        return Err(Error::compression(format!(
            "inflate stopped early: produced {} of {} bytes",
            inflater.total_out(),
            dst.len()
        )));
    }
    if inflater.total_out() as usize != dst.len() {
        return Err(Error::compression(format!(
            "inflated {} bytes, block header declares {}",
            inflater.total_out(),
            dst.len()
        )));
    }
    Ok(inflater.total_in() as usize)
}
