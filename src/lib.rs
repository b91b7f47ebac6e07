//! RUFS: a user-space, block-based hierarchical filesystem stored in a
//! single flat diskfile.
//!
//! The core is layered bottom-up and each layer only calls downward:
//! block device ([`disk`]), superblock and layout ([`superblock`]),
//! bitmap allocation ([`bitmap`]), inode table I/O ([`inode`]), the
//! directory service ([`dir`]), the path resolver ([`path`]), and the
//! operation surface ([`fs`]) a user-level filesystem binding dispatches
//! into.

pub mod bitmap;
pub mod dir;
pub mod disk;
pub mod error;
pub mod fs;
pub mod inode;
pub mod param;
pub mod path;
pub mod superblock;

pub use error::{FsError, Result};
pub use fs::{FileAttr, Rufs};
pub use superblock::{FsGeometry, SuperBlock};
