// Inode table I/O.
//
// Inodes are laid out sequentially starting at sb.i_start_blk, IPB records
// per block. Reading or writing one inode always goes through its whole
// table block: load the block, splice one record, store the block. Writers
// must never skip the load step or they clobber the sibling records.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::disk::Disk;
use crate::error::{FsError, Result};
use crate::param::{BSIZE, INODE_SIZE, IPB, NDIRECT, NINDIRECT};
use crate::superblock::SuperBlock;

/// Seconds since the epoch, for inode timestamps.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// One on-disk inode record.
///
/// `direct` slots hold absolute block indices (0 means unallocated, any
/// other value is >= sb.d_start_blk). `indirect` is reserved space: it is
/// zeroed at creation and carried through every read-modify-write, but
/// nothing interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub ino: u32,
    pub valid: u32,
    pub size: u32,
    pub mode: u32,
    pub link: u32,
    pub direct: [u32; NDIRECT],
    pub indirect: [u32; NINDIRECT],
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub uid: u32,
    pub gid: u32,
}

impl Inode {
    /// Fresh inode owned by the calling process, timestamps set to now.
    pub fn new(ino: u32, mode: u32, link: u32) -> Inode {
        let now = unix_now();
        Inode {
            ino,
            valid: 1,
            size: 0,
            mode,
            link,
            direct: [0; NDIRECT],
            indirect: [0; NINDIRECT],
            atime: now,
            mtime: now,
            ctime: now,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getegid() },
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT as u32 == libc::S_IFDIR as u32
    }

    pub fn encode(&self, rec: &mut [u8]) {
        rec.fill(0);
        rec[0..4].copy_from_slice(&self.ino.to_le_bytes());
        rec[4..8].copy_from_slice(&self.valid.to_le_bytes());
        rec[8..12].copy_from_slice(&self.size.to_le_bytes());
        rec[12..16].copy_from_slice(&self.mode.to_le_bytes());
        rec[16..20].copy_from_slice(&self.link.to_le_bytes());
        for (i, p) in self.direct.iter().enumerate() {
            rec[20 + i * 4..24 + i * 4].copy_from_slice(&p.to_le_bytes());
        }
        for (i, p) in self.indirect.iter().enumerate() {
            rec[84 + i * 4..88 + i * 4].copy_from_slice(&p.to_le_bytes());
        }
        rec[116..124].copy_from_slice(&self.atime.to_le_bytes());
        rec[124..132].copy_from_slice(&self.mtime.to_le_bytes());
        rec[132..140].copy_from_slice(&self.ctime.to_le_bytes());
        rec[140..144].copy_from_slice(&self.uid.to_le_bytes());
        rec[144..148].copy_from_slice(&self.gid.to_le_bytes());
    }

    pub fn decode(rec: &[u8]) -> Inode {
        let word = |i: usize| u32::from_le_bytes(rec[i..i + 4].try_into().unwrap());
        let long = |i: usize| i64::from_le_bytes(rec[i..i + 8].try_into().unwrap());
        let mut direct = [0u32; NDIRECT];
        for (i, p) in direct.iter_mut().enumerate() {
            *p = word(20 + i * 4);
        }
        let mut indirect = [0u32; NINDIRECT];
        for (i, p) in indirect.iter_mut().enumerate() {
            *p = word(84 + i * 4);
        }
        Inode {
            ino: word(0),
            valid: word(4),
            size: word(8),
            mode: word(12),
            link: word(16),
            direct,
            indirect,
            atime: long(116),
            mtime: long(124),
            ctime: long(132),
            uid: word(140),
            gid: word(144),
        }
    }
}

fn table_pos(sb: &SuperBlock, ino: u32) -> (u32, usize) {
    let blk = sb.i_start_blk + ino / IPB as u32;
    let off = (ino as usize % IPB) * INODE_SIZE;
    (blk, off)
}

/// Load inode `ino` from the table.
pub fn read_inode(disk: &mut Disk, sb: &SuperBlock, ino: u32) -> Result<Inode> {
    if ino >= sb.max_inum {
        return Err(FsError::Invalid);
    }
    let (blk, off) = table_pos(sb, ino);
    let mut buf = [0u8; BSIZE];
    disk.read_block(blk, &mut buf)?;
    Ok(Inode::decode(&buf[off..off + INODE_SIZE]))
}

/// Store `inode` as record `ino`, leaving the block's other records intact.
pub fn write_inode(disk: &mut Disk, sb: &SuperBlock, ino: u32, inode: &Inode) -> Result<()> {
    if ino >= sb.max_inum {
        return Err(FsError::Invalid);
    }
    let (blk, off) = table_pos(sb, ino);
    let mut buf = [0u8; BSIZE];
    disk.read_block(blk, &mut buf)?;
    inode.encode(&mut buf[off..off + INODE_SIZE]);
    disk.write_block(blk, &buf)
}
