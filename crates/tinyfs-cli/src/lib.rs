use anyhow::Context;
use futures::StreamExt;
use serde::Serialize;
use tinyfs_core::{FileType, Reference};
use tinyfs_storage::FileWriter;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Summary printed by `tinyfs stat`
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatOutput {
    pub reference: Reference,
    pub backend: &'static str,
    pub exists: bool,
    pub file_type: Option<FileType>,
}

/// Render listed references one per line.
pub fn listing_lines(refs: &[Reference]) -> Vec<String> {
    refs.iter().map(|r| r.as_str().to_string()).collect()
}

/// Copy everything from `reader` into a storage writer and close it.
///
/// Returns the number of bytes written.
pub async fn copy_into_writer<R>(reader: R, writer: &mut dyn FileWriter) -> anyhow::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut chunks = ReaderStream::new(reader);
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.context("Read input")?;
        writer.write(&chunk).await?;
    }
    writer.close().await?;
    Ok(writer.bytes_written())
}

/// Initialize tracing for the CLI.
///
/// Logs go to stderr so file contents written to stdout stay clean.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
