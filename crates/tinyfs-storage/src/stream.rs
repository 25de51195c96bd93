//! Stream helpers shared by the backends.

use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt, TryStreamExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::traits::{ByteStream, LineStream, StorageError, StorageResult};

/// Consume a byte stream into a single buffer.
pub async fn read_stream_to_bytes(mut stream: ByteStream) -> StorageResult<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}

/// Byte stream yielding a single in-memory chunk.
pub fn once(data: Bytes) -> ByteStream {
    Box::pin(stream::once(async move { Ok(data) }))
}

/// Split a byte stream into lines.
///
/// Lines end at `\n`; a trailing `\r` is dropped. A final line without a
/// terminator is still yielded.
pub fn lines(bytes: ByteStream) -> LineStream {
    let reader = StreamReader::new(bytes.map_err(std::io::Error::other));
    let framed = FramedRead::new(reader, LinesCodec::new());
    Box::pin(framed.map_err(|e| match e {
        LinesCodecError::Io(io) => StorageError::from(io),
        other => StorageError::wrap("Failed to split stream into lines", other),
    }))
}
