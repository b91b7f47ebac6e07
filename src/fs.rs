// Filesystem surface.
//
// Rufs owns the open diskfile and the layout constants cached from the
// superblock; every handler resolves a path, acts through the lower
// layers, and returns a Result the binding maps to an errno.
//
// Concurrency model: every handler takes &mut self, so one Rufs value
// serializes all operations by ownership. A binding that dispatches from
// multiple threads wraps the value in a single Mutex, which is the coarse
// global lock; there is no hidden shared buffer anywhere below, each
// read-modify-write declares its own block-sized buffer on the stack.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::bitmap::{alloc_block, alloc_inode, free_block, free_inode};
use crate::dir::{dir_add, dir_find, dir_remove, Dirent};
use crate::disk::Disk;
use crate::error::{FsError, Result};
use crate::inode::{read_inode, unix_now, write_inode, Inode};
use crate::param::{BSIZE, DIRENT_SIZE, DPB, NDIRECT, ROOTINO};
use crate::path::{resolve, split_path};
use crate::superblock::{FsGeometry, SuperBlock};

// Formatting through init happens at most once per process lifetime.
static MKFS_DONE: AtomicBool = AtomicBool::new(false);

/// stat-shaped projection of an inode for the binding layer.
#[derive(Debug, Clone, Copy)]
pub struct FileAttr {
    pub ino: u32,
    pub mode: u32,
    pub nlink: u32,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

pub struct Rufs {
    disk: Disk,
    sb: SuperBlock,
}

impl Rufs {
    /// Create and format a diskfile, then mount it.
    ///
    /// Layout work in order: zero-filled device, superblock, empty
    /// bitmaps, root inode (which must come out as ino 0) with one data
    /// block holding the "/", "." and ".." self entries.
    pub fn format(path: &Path, geometry: FsGeometry) -> Result<Rufs> {
        let sb = SuperBlock::new(geometry)?;
        let mut disk = Disk::init(path, sb.nblocks())?;
        sb.write(&mut disk)?;

        let zero = [0u8; BSIZE];
        disk.write_block(sb.i_bitmap_blk, &zero)?;
        disk.write_block(sb.d_bitmap_blk, &zero)?;

        let ino = alloc_inode(&mut disk, &sb)?;
        if ino != ROOTINO {
            return Err(FsError::Corrupted("root inode is not 0"));
        }
        let mut root = Inode::new(ROOTINO, libc::S_IFDIR as u32 | 0o755, 2);
        root.direct[0] = alloc_block(&mut disk, &sb)?;
        write_inode(&mut disk, &sb, ROOTINO, &root)?;

        // Root self entries, in this order. They name ino 0, so the free
        // slot scan treats them as reusable and the directory size stays 0.
        let mut buf = [0u8; BSIZE];
        for (j, name) in ["/", ".", ".."].into_iter().enumerate() {
            let de = Dirent::new(ROOTINO, name)?;
            de.encode(&mut buf[j * DIRENT_SIZE..(j + 1) * DIRENT_SIZE]);
        }
        disk.write_block(root.direct[0], &buf)?;

        info!(
            "format: {} blocks ({} inodes over {} table blocks, data at {})",
            sb.nblocks(),
            sb.max_inum,
            sb.d_start_blk - sb.i_start_blk,
            sb.d_start_blk
        );
        Ok(Rufs { disk, sb })
    }

    /// Mount an existing diskfile: reopen it, read block 0, repopulate the
    /// layout constants. No bitmap is cached; the disk copy stays
    /// authoritative.
    pub fn mount(path: &Path) -> Result<Rufs> {
        let mut disk = Disk::open(path)?;
        let sb = SuperBlock::read(&mut disk)?;
        debug!(
            "mount: {} inodes, {} data blocks, data region at {}",
            sb.max_inum, sb.max_dnum, sb.d_start_blk
        );
        Ok(Rufs { disk, sb })
    }

    /// Binding entry point: mount the diskfile if it exists, otherwise
    /// fall back to formatting it. The fallback is guarded by a
    /// process-wide test-and-set so mkfs runs at most once per process.
    pub fn init(path: &Path) -> Result<Rufs> {
        if path.exists() {
            Rufs::mount(path)
        } else if !MKFS_DONE.swap(true, Ordering::SeqCst) {
            Rufs::format(path, FsGeometry::default())
        } else {
            Err(FsError::Invalid)
        }
    }

    /// Diskfile location per the mount contract: current working
    /// directory joined with "/DISKFILE".
    pub fn default_diskfile() -> PathBuf {
        env::current_dir()
            .map(|d| d.join("DISKFILE"))
            .unwrap_or_else(|_| PathBuf::from("DISKFILE"))
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.sb
    }

    fn lookup(&mut self, path: &str) -> Result<Inode> {
        resolve(&mut self.disk, &self.sb, path, ROOTINO)
    }

    pub fn getattr(&mut self, path: &str) -> Result<FileAttr> {
        let ip = self.lookup(path)?;
        Ok(FileAttr {
            ino: ip.ino,
            mode: ip.mode,
            nlink: ip.link,
            size: ip.size as u64,
            uid: ip.uid,
            gid: ip.gid,
            atime: ip.atime,
            mtime: ip.mtime,
            ctime: ip.ctime,
        })
    }

    pub fn opendir(&mut self, path: &str) -> Result<()> {
        let ip = self.lookup(path)?;
        if !ip.is_dir() {
            return Err(FsError::NotDirectory);
        }
        Ok(())
    }

    /// Feed every live entry name to the filler. Slots whose ino is 0 or
    /// whose name is empty are skipped, which hides the root self entries.
    pub fn readdir(&mut self, path: &str, mut fill: impl FnMut(&str)) -> Result<()> {
        let dp = self.lookup(path)?;
        if !dp.is_dir() {
            return Err(FsError::NotDirectory);
        }
        let mut buf = [0u8; BSIZE];
        for &ptr in dp.direct.iter() {
            if ptr < self.sb.d_start_blk {
                continue;
            }
            self.disk.read_block(ptr, &mut buf)?;
            for j in 0..DPB {
                let de = Dirent::decode(&buf[j * DIRENT_SIZE..(j + 1) * DIRENT_SIZE]);
                if de.ino == 0 || de.len == 0 {
                    continue;
                }
                if let Ok(name) = std::str::from_utf8(de.name_bytes()) {
                    fill(name);
                }
            }
        }
        Ok(())
    }

    pub fn mkdir(&mut self, path: &str, mode: u32) -> Result<()> {
        self.make_node(path, libc::S_IFDIR as u32 | (mode & 0o7777), 2)
    }

    pub fn create(&mut self, path: &str, mode: u32) -> Result<()> {
        self.make_node(path, libc::S_IFREG as u32 | (mode & 0o7777), 1)
    }

    fn make_node(&mut self, path: &str, mode: u32, link: u32) -> Result<()> {
        let (parent, leaf) = split_path(path)?;
        let dp = self.lookup(parent)?;
        if !dp.is_dir() {
            return Err(FsError::NotDirectory);
        }
        let ino = alloc_inode(&mut self.disk, &self.sb)?;
        let child = Inode::new(ino, mode, link);
        // The entry goes in before the child inode is persisted; on any
        // dir_add failure the freshly claimed ino goes straight back.
        if let Err(e) = dir_add(
            &mut self.disk,
            &self.sb,
            dp.ino,
            ino,
            leaf,
            child.is_dir(),
        ) {
            let _ = free_inode(&mut self.disk, &self.sb, ino);
            return Err(e);
        }
        write_inode(&mut self.disk, &self.sb, ino, &child)
    }

    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        self.remove_node(path, true)
    }

    pub fn unlink(&mut self, path: &str) -> Result<()> {
        self.remove_node(path, false)
    }

    fn remove_node(&mut self, path: &str, want_dir: bool) -> Result<()> {
        let (parent, leaf) = split_path(path)?;
        let dp = self.lookup(parent)?;
        let de = dir_find(&mut self.disk, &self.sb, dp.ino, leaf)?;
        if de.ino == ROOTINO {
            // only the root's own "." / ".." entries carry ino 0
            return Err(FsError::Invalid);
        }
        let mut target = read_inode(&mut self.disk, &self.sb, de.ino)?;
        if want_dir {
            if !target.is_dir() {
                return Err(FsError::NotDirectory);
            }
            if target.size != 0 {
                return Err(FsError::NotEmpty);
            }
        } else if target.is_dir() {
            return Err(FsError::IsDirectory);
        }

        for i in 0..NDIRECT {
            if target.direct[i] != 0 {
                free_block(&mut self.disk, &self.sb, target.direct[i])?;
                target.direct[i] = 0;
            }
        }
        // invalidate the record before releasing the number, so a set
        // bitmap bit always points at a valid inode
        target.valid = 0;
        target.size = 0;
        write_inode(&mut self.disk, &self.sb, de.ino, &target)?;
        free_inode(&mut self.disk, &self.sb, de.ino)?;
        dir_remove(&mut self.disk, &self.sb, dp.ino, leaf, want_dir)
    }

    pub fn open(&mut self, path: &str) -> Result<()> {
        let ip = self.lookup(path)?;
        if ip.is_dir() {
            return Err(FsError::IsDirectory);
        }
        Ok(())
    }

    /// Read at most one data block's worth starting at `offset`. The
    /// binding loops for longer transfers. Reads past end of file return
    /// 0 bytes, as does a hole where no block was ever written.
    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        let ip = self.lookup(path)?;
        if ip.is_dir() {
            return Err(FsError::IsDirectory);
        }
        let size = ip.size as u64;
        if buf.is_empty() || offset >= size {
            return Ok(0);
        }
        let bi = (offset / BSIZE as u64) as usize;
        if bi >= NDIRECT {
            return Ok(0);
        }
        let in_blk = (offset % BSIZE as u64) as usize;
        let n = buf
            .len()
            .min((size - offset) as usize)
            .min(BSIZE - in_blk);
        if ip.direct[bi] < self.sb.d_start_blk {
            return Ok(0);
        }
        let mut blk = [0u8; BSIZE];
        self.disk.read_block(ip.direct[bi], &mut blk)?;
        buf[..n].copy_from_slice(&blk[in_blk..in_blk + n]);
        Ok(n)
    }

    /// Write at most one data block's worth starting at `offset`,
    /// allocating the block on demand. Freshly allocated blocks arrive
    /// zeroed, so a gap left by a far offset reads back as zeros. Size
    /// grows monotonically to cover the write, never by blind addition.
    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize> {
        let mut ip = self.lookup(path)?;
        if ip.is_dir() {
            return Err(FsError::IsDirectory);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let bi = (offset / BSIZE as u64) as usize;
        if bi >= NDIRECT {
            return Err(FsError::NoSpace);
        }
        let in_blk = (offset % BSIZE as u64) as usize;
        let n = buf.len().min(BSIZE - in_blk);
        if ip.direct[bi] == 0 {
            ip.direct[bi] = alloc_block(&mut self.disk, &self.sb)?;
        }
        let mut blk = [0u8; BSIZE];
        self.disk.read_block(ip.direct[bi], &mut blk)?;
        blk[in_blk..in_blk + n].copy_from_slice(&buf[..n]);
        // data block first, inode pointer after
        self.disk.write_block(ip.direct[bi], &blk)?;

        let end = (offset + n as u64) as u32;
        ip.size = ip.size.max(end);
        let now = unix_now();
        ip.atime = now;
        ip.mtime = now;
        write_inode(&mut self.disk, &self.sb, ip.ino, &ip)?;
        Ok(n)
    }

    /// Only truncation to zero is supported: release every data block and
    /// reset the size.
    pub fn truncate(&mut self, path: &str, size: u64) -> Result<()> {
        if size != 0 {
            return Err(FsError::Invalid);
        }
        let mut ip = self.lookup(path)?;
        if ip.is_dir() {
            return Err(FsError::IsDirectory);
        }
        for i in 0..NDIRECT {
            if ip.direct[i] != 0 {
                free_block(&mut self.disk, &self.sb, ip.direct[i])?;
                ip.direct[i] = 0;
            }
        }
        ip.size = 0;
        ip.mtime = unix_now();
        write_inode(&mut self.disk, &self.sb, ip.ino, &ip)
    }

    pub fn utimens(&mut self, path: &str, atime: i64, mtime: i64) -> Result<()> {
        let mut ip = self.lookup(path)?;
        ip.atime = atime;
        ip.mtime = mtime;
        write_inode(&mut self.disk, &self.sb, ip.ino, &ip)
    }

    pub fn flush(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    pub fn release(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    pub fn releasedir(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    /// Tear down the mount. Consuming self closes the diskfile descriptor.
    pub fn destroy(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (tempfile::TempDir, Rufs) {
        let dir = tempfile::tempdir().unwrap();
        let fs = Rufs::format(&dir.path().join("DISKFILE"), FsGeometry::default()).unwrap();
        (dir, fs)
    }

    #[test]
    fn format_seeds_root_self_entries() {
        let (_t, mut fs) = fresh();
        let sb = *fs.superblock();
        for name in ["/", ".", ".."] {
            let de = dir_find(&mut fs.disk, &sb, ROOTINO, name).unwrap();
            assert_eq!(de.ino, ROOTINO);
        }
    }

    #[test]
    fn format_then_mount_round_trips_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DISKFILE");
        let sb = {
            let fs = Rufs::format(&path, FsGeometry::default()).unwrap();
            *fs.superblock()
        };
        let fs = Rufs::mount(&path).unwrap();
        assert_eq!(*fs.superblock(), sb);
    }

    #[test]
    fn mount_rejects_unformatted_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DISKFILE");
        std::fs::write(&path, vec![0u8; BSIZE * 4]).unwrap();
        assert!(matches!(
            Rufs::mount(&path),
            Err(FsError::Corrupted(_))
        ));
    }

    #[test]
    fn getattr_root_is_a_directory() {
        let (_t, mut fs) = fresh();
        let attr = fs.getattr("/").unwrap();
        assert_eq!(attr.mode & libc::S_IFMT as u32, libc::S_IFDIR as u32);
        assert!(attr.nlink >= 2);
        assert_eq!(attr.ino, ROOTINO);
    }

    #[test]
    fn open_rejects_directories_and_opendir_rejects_files() {
        let (_t, mut fs) = fresh();
        fs.create("/f", 0o644).unwrap();
        fs.mkdir("/d", 0o755).unwrap();
        assert!(matches!(fs.open("/d"), Err(FsError::IsDirectory)));
        assert!(matches!(fs.opendir("/f"), Err(FsError::NotDirectory)));
        fs.open("/f").unwrap();
        fs.opendir("/d").unwrap();
    }

    #[test]
    fn write_grows_size_monotonically() {
        let (_t, mut fs) = fresh();
        fs.create("/f", 0o644).unwrap();
        fs.write("/f", b"hello", 0).unwrap();
        assert_eq!(fs.getattr("/f").unwrap().size, 5);
        // overwrite in place must not inflate the size
        fs.write("/f", b"HELLO", 0).unwrap();
        assert_eq!(fs.getattr("/f").unwrap().size, 5);
        fs.write("/f", b"x", 9).unwrap();
        assert_eq!(fs.getattr("/f").unwrap().size, 10);
    }

    #[test]
    fn read_caps_at_one_block_and_eof() {
        let (_t, mut fs) = fresh();
        fs.create("/f", 0o644).unwrap();
        fs.write("/f", &[7u8; 100], 0).unwrap();

        let mut buf = [0u8; 200];
        assert_eq!(fs.read("/f", &mut buf, 0).unwrap(), 100);
        assert_eq!(fs.read("/f", &mut buf, 100).unwrap(), 0);
        assert_eq!(fs.read("/f", &mut buf, 40).unwrap(), 60);

        // a write into the second block leaves the transfer split at the
        // block boundary
        fs.write("/f", &[9u8; 8], BSIZE as u64).unwrap();
        let mut big = vec![0u8; 2 * BSIZE];
        assert_eq!(
            fs.read("/f", &mut big, (BSIZE - 16) as u64).unwrap(),
            16
        );
    }

    #[test]
    fn write_beyond_direct_range_is_no_space() {
        let (_t, mut fs) = fresh();
        fs.create("/f", 0o644).unwrap();
        let off = (NDIRECT * BSIZE) as u64;
        assert!(matches!(
            fs.write("/f", b"x", off),
            Err(FsError::NoSpace)
        ));
    }

    #[test]
    fn truncate_releases_blocks() {
        let (_t, mut fs) = fresh();
        fs.create("/f", 0o644).unwrap();
        fs.write("/f", &[1u8; 10], 0).unwrap();
        fs.write("/f", &[2u8; 10], BSIZE as u64).unwrap();
        fs.truncate("/f", 0).unwrap();
        assert_eq!(fs.getattr("/f").unwrap().size, 0);
        let mut buf = [0u8; 4];
        assert_eq!(fs.read("/f", &mut buf, 0).unwrap(), 0);
        assert!(matches!(
            fs.truncate("/f", 1),
            Err(FsError::Invalid)
        ));
    }

    #[test]
    fn utimens_persists() {
        let (_t, mut fs) = fresh();
        fs.create("/f", 0o644).unwrap();
        fs.utimens("/f", 111, 222).unwrap();
        let attr = fs.getattr("/f").unwrap();
        assert_eq!(attr.atime, 111);
        assert_eq!(attr.mtime, 222);
    }

    #[test]
    fn removing_root_aliases_is_rejected() {
        let (_t, mut fs) = fresh();
        assert!(matches!(fs.rmdir("/."), Err(FsError::Invalid)));
        assert!(matches!(fs.rmdir("/"), Err(FsError::Invalid)));
    }
}
