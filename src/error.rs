//! Error type shared by every layer of the filesystem core.

use std::io;

use thiserror::Error;

/// Everything that can go wrong below the binding layer.
///
/// Errors propagate to the top-level handler untouched; the handler turns
/// them into a negative errno with [`FsError::errno`].
#[derive(Debug, Error)]
pub enum FsError {
    /// A block transfer failed. Surfaced unchanged, never retried here.
    #[error("block I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A path component does not exist.
    #[error("no such file or directory")]
    NotFound,

    /// A directory entry with the same name already exists.
    #[error("entry already exists")]
    Exists,

    /// Inode bitmap, data bitmap, or directory capacity is exhausted.
    #[error("out of inodes, data blocks, or directory slots")]
    NoSpace,

    /// Malformed path, oversized name, or unsupported size argument.
    #[error("invalid argument")]
    Invalid,

    /// A directory operation hit a non-directory inode.
    #[error("not a directory")]
    NotDirectory,

    /// A file operation hit a directory inode.
    #[error("is a directory")]
    IsDirectory,

    /// rmdir on a directory that still has entries.
    #[error("directory not empty")]
    NotEmpty,

    /// The on-disk state contradicts itself (bad magic, region order,
    /// double free).
    #[error("filesystem corrupted: {0}")]
    Corrupted(&'static str),
}

impl FsError {
    /// Projection for the user-level filesystem binding: negative errno on
    /// failure, per its return convention.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::Io(_) => -libc::EIO,
            FsError::NotFound => -libc::ENOENT,
            FsError::Exists => -libc::EEXIST,
            FsError::NoSpace => -libc::ENOSPC,
            FsError::Invalid => -libc::EINVAL,
            FsError::NotDirectory => -libc::ENOTDIR,
            FsError::IsDirectory => -libc::EISDIR,
            FsError::NotEmpty => -libc::ENOTEMPTY,
            FsError::Corrupted(_) => -libc::EIO,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
