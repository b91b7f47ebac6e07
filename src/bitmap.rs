// Bit-level free-space management.
//
// Two independent bitmaps, one block each: bit i of the inode bitmap
// covers inode i, bit i of the data bitmap covers block i + d_start_blk.
// Bit k of byte j represents object 8*j + k, LSB first. The authoritative
// copy lives on disk; every allocation is a read-scan-set-write on the
// bitmap block.

use log::{debug, warn};

use crate::disk::Disk;
use crate::error::{FsError, Result};
use crate::param::BSIZE;
use crate::superblock::SuperBlock;

fn get_bit(map: &[u8], i: usize) -> bool {
    map[i / 8] & (1 << (i % 8)) != 0
}

fn set_bit(map: &mut [u8], i: usize) {
    map[i / 8] |= 1 << (i % 8);
}

fn clear_bit(map: &mut [u8], i: usize) {
    map[i / 8] &= !(1 << (i % 8));
}

/// Claim the first free inode number. The inode record itself is left
/// untouched; the caller must write it before anyone reads it.
pub fn alloc_inode(disk: &mut Disk, sb: &SuperBlock) -> Result<u32> {
    let mut buf = [0u8; BSIZE];
    disk.read_block(sb.i_bitmap_blk, &mut buf)?;
    for i in 0..sb.max_inum as usize {
        if !get_bit(&buf, i) {
            set_bit(&mut buf, i);
            disk.write_block(sb.i_bitmap_blk, &buf)?;
            debug!("alloc_inode: {}", i);
            return Ok(i as u32);
        }
    }
    warn!("alloc_inode: inode bitmap exhausted");
    Err(FsError::NoSpace)
}

/// Claim the first free data block and zero it. Returns the absolute block
/// index (bit i maps to block i + d_start_blk); inode direct pointers store
/// this absolute form.
pub fn alloc_block(disk: &mut Disk, sb: &SuperBlock) -> Result<u32> {
    let mut buf = [0u8; BSIZE];
    disk.read_block(sb.d_bitmap_blk, &mut buf)?;
    for i in 0..sb.max_dnum as usize {
        if !get_bit(&buf, i) {
            let abs = i as u32 + sb.d_start_blk;
            // Zero the block before the bitmap commit makes it reachable,
            // so gaps in sparse files read back as zeros.
            disk.write_block(abs, &[0u8; BSIZE])?;
            set_bit(&mut buf, i);
            disk.write_block(sb.d_bitmap_blk, &buf)?;
            debug!("alloc_block: {}", abs);
            return Ok(abs);
        }
    }
    warn!("alloc_block: data bitmap exhausted");
    Err(FsError::NoSpace)
}

/// Release an inode number back to the bitmap.
pub fn free_inode(disk: &mut Disk, sb: &SuperBlock, ino: u32) -> Result<()> {
    if ino >= sb.max_inum {
        return Err(FsError::Invalid);
    }
    let mut buf = [0u8; BSIZE];
    disk.read_block(sb.i_bitmap_blk, &mut buf)?;
    if !get_bit(&buf, ino as usize) {
        return Err(FsError::Corrupted("freeing a free inode"));
    }
    clear_bit(&mut buf, ino as usize);
    disk.write_block(sb.i_bitmap_blk, &buf)?;
    debug!("free_inode: {}", ino);
    Ok(())
}

/// Release a data block given its absolute index.
pub fn free_block(disk: &mut Disk, sb: &SuperBlock, abs: u32) -> Result<()> {
    if abs < sb.d_start_blk || abs - sb.d_start_blk >= sb.max_dnum {
        return Err(FsError::Invalid);
    }
    let i = (abs - sb.d_start_blk) as usize;
    let mut buf = [0u8; BSIZE];
    disk.read_block(sb.d_bitmap_blk, &mut buf)?;
    if !get_bit(&buf, i) {
        return Err(FsError::Corrupted("freeing a free block"));
    }
    clear_bit(&mut buf, i);
    disk.write_block(sb.d_bitmap_blk, &buf)?;
    debug!("free_block: {}", abs);
    Ok(())
}
