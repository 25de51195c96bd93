//! Tinyfs CLI: run file-system operations against local paths, the in-memory
//! backend, or `s3://` URIs.
//!
//! Configuration comes from the environment (see `TINYFS_*` variables).

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tinyfs_cli::{copy_into_writer, init_tracing, listing_lines, StatOutput};
use tinyfs_core::{Config, Reference, StorageBackend};
use tinyfs_storage::{s3, storage_for_reference, TinyFileSystem};
use tokio::io::AsyncWriteExt;

#[derive(Parser)]
#[command(name = "tinyfs", about = "Uniform file operations over local, memory and S3 storage")]
struct Cli {
    /// Backend for plain paths: local or memory (overrides TINYFS_BACKEND)
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the immediate children of a directory
    Ls {
        dir: String,
        /// Print a JSON array instead of one entry per line
        #[arg(long)]
        json: bool,
    },
    /// Show type and existence of a reference
    Stat { reference: String },
    /// Print whether a reference exists
    Exists { reference: String },
    /// Stream a file to stdout
    Cat { file: String },
    /// Print the first lines of a file
    Head {
        file: String,
        /// Number of lines
        #[arg(short = 'n', long, default_value = "10")]
        lines: usize,
    },
    /// Write stdin (or a local file) to a file
    Put {
        file: String,
        /// Read content from this local path instead of stdin
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Delete a file
    Rm { file: String },
    /// Create a directory
    Mkdir { dir: String },
    /// Remove a directory and everything below it
    Rmdir { dir: String },
    /// Parse an s3:// URI and print its components
    Parse { uri: String },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn open(config: &Config, reference: &str) -> anyhow::Result<Arc<dyn TinyFileSystem>> {
    storage_for_reference(config, reference)
        .await
        .with_context(|| format!("Failed to open storage for {}", reference))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(ref backend) = cli.backend {
        config.path_backend = backend.parse::<StorageBackend>()?;
    }

    match cli.command {
        Commands::Ls { dir, json } => {
            let fs = open(&config, &dir).await?;
            let refs = fs.list_files(&dir).await?;
            if json {
                print_json(&refs)?;
            } else {
                for line in listing_lines(&refs) {
                    println!("{}", line);
                }
            }
        }
        Commands::Stat { reference } => {
            let fs = open(&config, &reference).await?;
            let exists = fs.exists(&reference).await?;
            let file_type = if exists {
                Some(fs.get_file_type(&reference).await?)
            } else {
                None
            };
            print_json(&StatOutput {
                reference: Reference::classify(&reference),
                backend: fs.id(),
                exists,
                file_type,
            })?;
        }
        Commands::Exists { reference } => {
            let fs = open(&config, &reference).await?;
            println!("{}", fs.exists(&reference).await?);
        }
        Commands::Cat { file } => {
            let fs = open(&config, &file).await?;
            let mut chunks = fs.file_read_stream(&file).await?;
            let mut stdout = tokio::io::stdout();
            while let Some(chunk) = chunks.next().await {
                stdout.write_all(&chunk?).await?;
            }
            stdout.flush().await?;
        }
        Commands::Head { file, lines } => {
            let fs = open(&config, &file).await?;
            let mut stream = fs.file_line_stream(&file).await?.take(lines);
            while let Some(line) = stream.next().await {
                println!("{}", line?);
            }
        }
        Commands::Put { file, from } => {
            let fs = open(&config, &file).await?;
            let mut writer = fs.file_write_stream(&file).await?;
            let written = match from {
                Some(path) => {
                    let input = tokio::fs::File::open(&path)
                        .await
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    copy_into_writer(input, writer.as_mut()).await?
                }
                None => copy_into_writer(tokio::io::stdin(), writer.as_mut()).await?,
            };
            print_json(&serde_json::json!({ "file": file, "bytes_written": written }))?;
        }
        Commands::Rm { file } => {
            let fs = open(&config, &file).await?;
            fs.delete_file(&file).await?;
            print_json(&serde_json::json!({ "success": true, "message": format!("{} deleted", file) }))?;
        }
        Commands::Mkdir { dir } => {
            let fs = open(&config, &dir).await?;
            fs.create_directory(&dir).await?;
            print_json(&serde_json::json!({ "success": true, "message": format!("{} created", dir) }))?;
        }
        Commands::Rmdir { dir } => {
            let fs = open(&config, &dir).await?;
            fs.remove_directory(&dir).await?;
            print_json(&serde_json::json!({ "success": true, "message": format!("{} removed", dir) }))?;
        }
        Commands::Parse { uri } => {
            let parsed = s3::parse(&uri)?;
            print_json(&parsed)?;
        }
    }

    Ok(())
}
