//! Path resolution: walk slash-separated components down the directory
//! tree with successive `dir_find` lookups.

use crate::dir::dir_find;
use crate::disk::Disk;
use crate::error::{FsError, Result};
use crate::inode::{read_inode, Inode};
use crate::superblock::SuperBlock;

/// Resolve `path` starting from `start_ino` and load the target inode.
///
/// Empty components are discarded, so "//a///b" walks like "/a/b" and "/"
/// itself is just `start_ino`. `.` and `..` get no special handling; they
/// resolve through literal directory entries where those exist.
pub fn resolve(disk: &mut Disk, sb: &SuperBlock, path: &str, start_ino: u32) -> Result<Inode> {
    let mut ino = start_ino;
    for comp in path.split('/').filter(|c| !c.is_empty()) {
        ino = dir_find(disk, sb, ino, comp)?.ino;
    }
    read_inode(disk, sb, ino)
}

/// Split a path into (parent, leaf), the way dirname/basename would.
/// The root itself has no leaf and is rejected.
pub fn split_path(path: &str) -> Result<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(FsError::Invalid);
    }
    match trimmed.rfind('/') {
        Some(i) if i == 0 => Ok(("/", &trimmed[1..])),
        Some(i) => Ok((&trimmed[..i], &trimmed[i + 1..])),
        None => Ok(("/", trimmed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_basic() {
        assert_eq!(split_path("/a").unwrap(), ("/", "a"));
        assert_eq!(split_path("/a/b").unwrap(), ("/a", "b"));
        assert_eq!(split_path("/a/b/c").unwrap(), ("/a/b", "c"));
    }

    #[test]
    fn split_tolerates_trailing_slashes() {
        assert_eq!(split_path("/a/b/").unwrap(), ("/a", "b"));
        assert_eq!(split_path("/a///").unwrap(), ("/", "a"));
    }

    #[test]
    fn split_rejects_root() {
        assert!(matches!(split_path("/"), Err(FsError::Invalid)));
        assert!(matches!(split_path("///"), Err(FsError::Invalid)));
        assert!(matches!(split_path(""), Err(FsError::Invalid)));
    }
}
