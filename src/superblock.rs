// Superblock and diskfile layout.
//
// The superblock lives in block 0 and records where every other region
// starts. mkfs computes the layout once from the geometry; mount reads it
// back and trusts it for the lifetime of the disk:
//
//   block 0                superblock
//   block 1                inode bitmap
//   block 2                data bitmap
//   block 3 ..             inode table (max_inum / IPB blocks, rounded up)
//   block d_start_blk ..   data region (max_dnum blocks)

use crate::disk::Disk;
use crate::error::{FsError, Result};
use crate::param::{
    BSIZE, D_BITMAP_BLK, FSMAGIC, IPB, I_BITMAP_BLK, I_START_BLK, MAX_DNUM, MAX_INUM,
    SUPERBLOCK_BLK,
};

/// Format-time capacity caps. Both bitmaps must fit in a single block.
#[derive(Debug, Clone, Copy)]
pub struct FsGeometry {
    pub max_inum: u32,
    pub max_dnum: u32,
}

impl Default for FsGeometry {
    fn default() -> Self {
        FsGeometry {
            max_inum: MAX_INUM,
            max_dnum: MAX_DNUM,
        }
    }
}

impl FsGeometry {
    fn validate(&self) -> Result<()> {
        let bits = (BSIZE * 8) as u32;
        if self.max_inum == 0 || self.max_dnum == 0 || self.max_inum > bits || self.max_dnum > bits
        {
            return Err(FsError::Invalid);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,
    pub max_inum: u32,
    pub max_dnum: u32,
    pub i_bitmap_blk: u32,
    pub d_bitmap_blk: u32,
    pub i_start_blk: u32,
    pub d_start_blk: u32,
}

impl SuperBlock {
    /// Compute the layout for a fresh disk.
    pub fn new(geometry: FsGeometry) -> Result<SuperBlock> {
        geometry.validate()?;
        let itable_blks = geometry.max_inum.div_ceil(IPB as u32);
        Ok(SuperBlock {
            magic: FSMAGIC,
            max_inum: geometry.max_inum,
            max_dnum: geometry.max_dnum,
            i_bitmap_blk: I_BITMAP_BLK,
            d_bitmap_blk: D_BITMAP_BLK,
            i_start_blk: I_START_BLK,
            d_start_blk: I_START_BLK + itable_blks,
        })
    }

    /// Total diskfile size in blocks: metadata regions plus the data region.
    pub fn nblocks(&self) -> u32 {
        self.d_start_blk + self.max_dnum
    }

    pub fn encode(&self, buf: &mut [u8; BSIZE]) {
        buf.fill(0);
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.max_inum.to_le_bytes());
        buf[8..12].copy_from_slice(&self.max_dnum.to_le_bytes());
        buf[12..16].copy_from_slice(&self.i_bitmap_blk.to_le_bytes());
        buf[16..20].copy_from_slice(&self.d_bitmap_blk.to_le_bytes());
        buf[20..24].copy_from_slice(&self.i_start_blk.to_le_bytes());
        buf[24..28].copy_from_slice(&self.d_start_blk.to_le_bytes());
    }

    /// Decode and sanity-check block 0 of a disk that claims to be formatted.
    pub fn decode(buf: &[u8; BSIZE]) -> Result<SuperBlock> {
        let word = |i: usize| u32::from_le_bytes(buf[i * 4..i * 4 + 4].try_into().unwrap());
        let sb = SuperBlock {
            magic: word(0),
            max_inum: word(1),
            max_dnum: word(2),
            i_bitmap_blk: word(3),
            d_bitmap_blk: word(4),
            i_start_blk: word(5),
            d_start_blk: word(6),
        };
        if sb.magic != FSMAGIC {
            return Err(FsError::Corrupted("bad magic"));
        }
        if !(0 < sb.i_bitmap_blk
            && sb.i_bitmap_blk < sb.d_bitmap_blk
            && sb.d_bitmap_blk < sb.i_start_blk
            && sb.i_start_blk < sb.d_start_blk)
        {
            return Err(FsError::Corrupted("region order"));
        }
        if sb.max_inum == 0 || sb.max_dnum == 0 {
            return Err(FsError::Corrupted("zero capacity"));
        }
        Ok(sb)
    }

    /// Persist into block 0.
    pub fn write(&self, disk: &mut Disk) -> Result<()> {
        let mut buf = [0u8; BSIZE];
        self.encode(&mut buf);
        disk.write_block(SUPERBLOCK_BLK, &buf)
    }

    /// Load from block 0 of an existing disk.
    pub fn read(disk: &mut Disk) -> Result<SuperBlock> {
        let mut buf = [0u8; BSIZE];
        disk.read_block(SUPERBLOCK_BLK, &mut buf)?;
        SuperBlock::decode(&buf)
    }
}
