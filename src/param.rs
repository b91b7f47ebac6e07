// On-disk format constants.
//
// Diskfile layout:
// [ superblock | inode bitmap | data bitmap | inode table | data blocks ]
//
// Block 0 holds the superblock, blocks 1 and 2 the two bitmaps, the inode
// table starts at block 3, and the data region follows the table. All
// multi-byte fields on disk are little-endian and all records are fixed
// size, so every offset below is constant for the lifetime of a disk.

/// Block size in bytes.
pub const BSIZE: usize = 4096;

/// Default number of inodes a disk can hold.
pub const MAX_INUM: u32 = 1024;

/// Default number of data blocks a disk can hold.
pub const MAX_DNUM: u32 = 16384;

/// Direct block pointers per inode.
pub const NDIRECT: usize = 16;

/// Reserved indirect pointer slots per inode. Zeroed, preserved, never
/// interpreted.
pub const NINDIRECT: usize = 8;

/// Filename capacity of a dirent, including the padding NUL. Names may be
/// at most `NAME_MAX - 1` bytes.
pub const NAME_MAX: usize = 208;

/// Bytes one inode record occupies on disk.
pub const INODE_SIZE: usize = 256;

/// Bytes one directory entry occupies on disk.
pub const DIRENT_SIZE: usize = 256;

/// Inodes per block.
pub const IPB: usize = BSIZE / INODE_SIZE;

/// Dirents per block.
pub const DPB: usize = BSIZE / DIRENT_SIZE;

/// Entries a single directory can hold across all of its direct blocks.
pub const MAX_DIRENTS: usize = DPB * NDIRECT;

/// Root directory inode number.
pub const ROOTINO: u32 = 0;

/// Must be the first field of block 0 on a formatted disk ("RUFS").
pub const FSMAGIC: u32 = 0x5255_4653;

/// Block index of the superblock.
pub const SUPERBLOCK_BLK: u32 = 0;
/// Block index of the inode bitmap.
pub const I_BITMAP_BLK: u32 = 1;
/// Block index of the data-block bitmap.
pub const D_BITMAP_BLK: u32 = 2;
/// First block of the inode table.
pub const I_START_BLK: u32 = 3;
