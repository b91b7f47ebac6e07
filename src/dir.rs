// Directory service.
//
// A directory is a file whose data blocks hold a packed array of fixed
// size dirents, DPB per block. A slot is free iff its ino is 0; the valid
// flag is advisory and name matching trusts len plus the bytes themselves.
// Iteration order everywhere is direct-pointer index ascending, then slot
// index ascending.

use log::trace;

use crate::bitmap::{alloc_block, free_block};
use crate::disk::Disk;
use crate::error::{FsError, Result};
use crate::inode::{read_inode, unix_now, write_inode, Inode};
use crate::param::{BSIZE, DIRENT_SIZE, DPB, MAX_DIRENTS, NAME_MAX};
use crate::superblock::SuperBlock;

/// One on-disk directory entry. `name` is zero-padded; `len` excludes the
/// padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dirent {
    pub ino: u32,
    pub valid: u32,
    pub len: u32,
    pub name: [u8; NAME_MAX],
}

impl Dirent {
    /// Build an entry for `name`. Names must be 1..=NAME_MAX-1 bytes so a
    /// padding NUL always remains.
    pub fn new(ino: u32, name: &str) -> Result<Dirent> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() >= NAME_MAX {
            return Err(FsError::Invalid);
        }
        let mut buf = [0u8; NAME_MAX];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Dirent {
            ino,
            valid: 1,
            len: bytes.len() as u32,
            name: buf,
        })
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.name[..(self.len as usize).min(NAME_MAX)]
    }

    fn matches(&self, name: &[u8]) -> bool {
        self.len as usize == name.len() && &self.name[..name.len()] == name
    }

    pub fn encode(&self, rec: &mut [u8]) {
        rec.fill(0);
        rec[0..4].copy_from_slice(&self.ino.to_le_bytes());
        rec[4..8].copy_from_slice(&self.valid.to_le_bytes());
        rec[8..12].copy_from_slice(&self.len.to_le_bytes());
        rec[12..12 + NAME_MAX].copy_from_slice(&self.name);
    }

    pub fn decode(rec: &[u8]) -> Dirent {
        let word = |i: usize| u32::from_le_bytes(rec[i..i + 4].try_into().unwrap());
        let mut name = [0u8; NAME_MAX];
        name.copy_from_slice(&rec[12..12 + NAME_MAX]);
        Dirent {
            ino: word(0),
            valid: word(4),
            len: word(8),
            name,
        }
    }
}

fn slot(buf: &[u8; BSIZE], j: usize) -> Dirent {
    Dirent::decode(&buf[j * DIRENT_SIZE..(j + 1) * DIRENT_SIZE])
}

/// Look `name` up in directory `dir_ino`. First match wins; duplicates
/// cannot occur because dir_add refuses them.
pub fn dir_find(disk: &mut Disk, sb: &SuperBlock, dir_ino: u32, name: &str) -> Result<Dirent> {
    let dp = read_inode(disk, sb, dir_ino)?;
    if !dp.is_dir() {
        return Err(FsError::NotDirectory);
    }
    let target = name.as_bytes();
    let mut buf = [0u8; BSIZE];
    for &ptr in dp.direct.iter() {
        if ptr < sb.d_start_blk {
            continue;
        }
        disk.read_block(ptr, &mut buf)?;
        for j in 0..DPB {
            let de = slot(&buf, j);
            if de.matches(target) {
                return Ok(de);
            }
        }
    }
    Err(FsError::NotFound)
}

/// Insert `name -> child_ino` into directory `dir_ino`.
///
/// Any existing entry with the same name is a duplicate, regardless of its
/// ino. When no allocated block has a free slot, a fresh block is written
/// with the entry before the direct pointer is published, so a failure in
/// between leaks a block but never dangles a pointer. `child_is_dir` is
/// passed by the caller because the child inode may not be persisted yet.
pub fn dir_add(
    disk: &mut Disk,
    sb: &SuperBlock,
    dir_ino: u32,
    child_ino: u32,
    name: &str,
    child_is_dir: bool,
) -> Result<()> {
    let de = Dirent::new(child_ino, name)?;
    let mut dp = read_inode(disk, sb, dir_ino)?;
    if !dp.is_dir() {
        return Err(FsError::NotDirectory);
    }
    let target = name.as_bytes();
    let mut buf = [0u8; BSIZE];

    // duplicate check across every allocated block
    for &ptr in dp.direct.iter() {
        if ptr < sb.d_start_blk {
            continue;
        }
        disk.read_block(ptr, &mut buf)?;
        for j in 0..DPB {
            if slot(&buf, j).matches(target) {
                return Err(FsError::Exists);
            }
        }
    }

    if dp.size as usize == MAX_DIRENTS * DIRENT_SIZE {
        return Err(FsError::NoSpace);
    }

    // first free slot in an already-allocated block
    let direct = dp.direct;
    for &ptr in direct.iter() {
        if ptr < sb.d_start_blk {
            continue;
        }
        disk.read_block(ptr, &mut buf)?;
        for j in 0..DPB {
            if slot(&buf, j).ino == 0 {
                de.encode(&mut buf[j * DIRENT_SIZE..(j + 1) * DIRENT_SIZE]);
                disk.write_block(ptr, &buf)?;
                trace!("dir_add: {} -> ino {} (dir {})", name, child_ino, dir_ino);
                return commit_add(disk, sb, dir_ino, &mut dp, child_is_dir);
            }
        }
    }

    // no free slot anywhere: put the entry in a fresh block
    let Some(idx) = dp.direct.iter().position(|&p| p == 0) else {
        return Err(FsError::NoSpace);
    };
    let abs = alloc_block(disk, sb)?;
    buf.fill(0);
    de.encode(&mut buf[0..DIRENT_SIZE]);
    disk.write_block(abs, &buf)?;
    dp.direct[idx] = abs;
    trace!(
        "dir_add: {} -> ino {} (dir {}, new block {})",
        name,
        child_ino,
        dir_ino,
        abs
    );
    commit_add(disk, sb, dir_ino, &mut dp, child_is_dir)
}

fn commit_add(
    disk: &mut Disk,
    sb: &SuperBlock,
    dir_ino: u32,
    dp: &mut Inode,
    child_is_dir: bool,
) -> Result<()> {
    dp.size += DIRENT_SIZE as u32;
    if child_is_dir {
        dp.link += 1;
    }
    dp.atime = unix_now();
    write_inode(disk, sb, dir_ino, dp)
}

/// Remove the entry named `name` from directory `dir_ino`. A data block
/// left with no entries at all is released back to the bitmap.
pub fn dir_remove(
    disk: &mut Disk,
    sb: &SuperBlock,
    dir_ino: u32,
    name: &str,
    child_is_dir: bool,
) -> Result<()> {
    let mut dp = read_inode(disk, sb, dir_ino)?;
    if !dp.is_dir() {
        return Err(FsError::NotDirectory);
    }
    let target = name.as_bytes();
    let mut buf = [0u8; BSIZE];
    let direct = dp.direct;
    for (i, &ptr) in direct.iter().enumerate() {
        if ptr < sb.d_start_blk {
            continue;
        }
        disk.read_block(ptr, &mut buf)?;
        for j in 0..DPB {
            if !slot(&buf, j).matches(target) {
                continue;
            }
            buf[j * DIRENT_SIZE..(j + 1) * DIRENT_SIZE].fill(0);
            disk.write_block(ptr, &buf)?;
            dp.size = dp.size.saturating_sub(DIRENT_SIZE as u32);
            if child_is_dir {
                dp.link = dp.link.saturating_sub(1);
            }
            if buf.iter().all(|&b| b == 0) {
                free_block(disk, sb, ptr)?;
                dp.direct[i] = 0;
            }
            trace!("dir_remove: {} (dir {})", name, dir_ino);
            return write_inode(disk, sb, dir_ino, &dp);
        }
    }
    Err(FsError::NotFound)
}
