//! Create and format a RUFS diskfile.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use rufs::param::FSMAGIC;
use rufs::{FsGeometry, Rufs};

#[derive(Parser, Debug)]
struct Args {
    /// Path of the diskfile to create (defaults to ./DISKFILE)
    #[arg(short, long)]
    output_name: Option<PathBuf>,

    /// Number of inodes the disk can hold
    #[arg(long, default_value_t = rufs::param::MAX_INUM)]
    inodes: u32,

    /// Number of data blocks the disk can hold
    #[arg(long, default_value_t = rufs::param::MAX_DNUM)]
    blocks: u32,

    /// Overwrite an already-formatted diskfile
    #[arg(short, long)]
    force: bool,
}

/// An existing file that starts with the magic already carries a
/// filesystem.
fn is_formatted(path: &PathBuf) -> bool {
    let mut word = [0u8; 4];
    match File::open(path) {
        Ok(mut f) => f.read_exact(&mut word).is_ok() && u32::from_le_bytes(word) == FSMAGIC,
        Err(_) => false,
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let path = args.output_name.unwrap_or_else(Rufs::default_diskfile);
    if !args.force && is_formatted(&path) {
        eprintln!(
            "mkfs: {} already contains a filesystem (use --force to overwrite)",
            path.display()
        );
        exit(1);
    }

    let geometry = FsGeometry {
        max_inum: args.inodes,
        max_dnum: args.blocks,
    };
    let fs = match Rufs::format(&path, geometry) {
        Ok(fs) => fs,
        Err(e) => {
            eprintln!("mkfs: failed to format {}: {}", path.display(), e);
            exit(1);
        }
    };

    let sb = fs.superblock();
    println!(
        "nmeta {} (super 1, bitmaps 2, inode table {}) data blocks {} total {}",
        sb.d_start_blk,
        sb.d_start_blk - sb.i_start_blk,
        sb.max_dnum,
        sb.nblocks()
    );
}
