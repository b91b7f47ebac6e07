//! File-backed block device.
//!
//! The diskfile is a flat array of `BSIZE`-byte blocks. Every transfer
//! moves exactly one block; callers hand in their own block-sized buffer,
//! so the device keeps no state beyond the open file. The file descriptor
//! is scoped to the [`Disk`] value and closes on drop.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::error::Result;
use crate::param::BSIZE;

pub struct Disk {
    file: File,
}

impl Disk {
    /// Create the diskfile and size it to `nblocks` zero-filled blocks.
    /// Truncates any previous content.
    pub fn init(path: &Path, nblocks: u32) -> Result<Disk> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(nblocks as u64 * BSIZE as u64)?;
        debug!("disk: created {} ({} blocks)", path.display(), nblocks);
        Ok(Disk { file })
    }

    /// Open an existing diskfile. Fails if it is absent.
    pub fn open(path: &Path) -> Result<Disk> {
        let file = File::options().read(true).write(true).open(path)?;
        debug!("disk: opened {}", path.display());
        Ok(Disk { file })
    }

    /// Read block `idx` into `buf`.
    pub fn read_block(&mut self, idx: u32, buf: &mut [u8; BSIZE]) -> Result<()> {
        self.file.seek(SeekFrom::Start(idx as u64 * BSIZE as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Write `buf` to block `idx`.
    pub fn write_block(&mut self, idx: u32, buf: &[u8; BSIZE]) -> Result<()> {
        self.file.seek(SeekFrom::Start(idx as u64 * BSIZE as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DISKFILE");
        (dir, path)
    }

    #[test]
    fn init_zero_fills() {
        let (_dir, path) = scratch();
        let mut disk = Disk::init(&path, 8).unwrap();
        let mut buf = [0xffu8; BSIZE];
        disk.read_block(7, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn block_round_trip() {
        let (_dir, path) = scratch();
        let mut disk = Disk::init(&path, 4).unwrap();

        let mut out = [0u8; BSIZE];
        out[0] = 0xaa;
        out[BSIZE - 1] = 0x55;
        disk.write_block(2, &out).unwrap();

        let mut back = [0u8; BSIZE];
        disk.read_block(2, &mut back).unwrap();
        assert_eq!(out[..], back[..]);

        // neighbors untouched
        disk.read_block(1, &mut back).unwrap();
        assert!(back.iter().all(|&b| b == 0));
        disk.read_block(3, &mut back).unwrap();
        assert!(back.iter().all(|&b| b == 0));
    }

    #[test]
    fn open_missing_fails() {
        let (_dir, path) = scratch();
        assert!(Disk::open(&path).is_err());
    }

    #[test]
    fn open_sees_previous_writes() {
        let (_dir, path) = scratch();
        let mut out = [0u8; BSIZE];
        out[17] = 0x42;
        {
            let mut disk = Disk::init(&path, 4).unwrap();
            disk.write_block(1, &out).unwrap();
        }
        let mut disk = Disk::open(&path).unwrap();
        let mut back = [0u8; BSIZE];
        disk.read_block(1, &mut back).unwrap();
        assert_eq!(back[17], 0x42);
    }
}
