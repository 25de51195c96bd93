//! Tinyfs Core Library
//!
//! This crate provides the domain types, constants, and configuration shared by
//! every tinyfs component: the storage backends and the command-line client.

pub mod config;
pub mod constants;
pub mod file_type;
pub mod reference;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use file_type::FileType;
pub use reference::Reference;
pub use storage_types::StorageBackend;
// Note: TinyFileSystem, StorageError, StorageResult live in tinyfs-storage
