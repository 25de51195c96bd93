use std::fmt::{Display, Formatter, Result as FmtResult};

/// Kind of entry a reference resolves to.
///
/// `Other` covers entries that are neither regular files nor directories
/// (symlinks, sockets, ...). The object-storage backend never produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FileType {
    Directory,
    File,
    Other,
}

impl FileType {
    pub fn is_directory(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    pub fn is_other(&self) -> bool {
        matches!(self, FileType::Other)
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileType::Directory => write!(f, "Directory"),
            FileType::File => write!(f, "File"),
            FileType::Other => write!(f, "Other"),
        }
    }
}
