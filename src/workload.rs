//! Benchmark fixtures.
//!
//! Generates the fixed-size files the stress harness uploads and downloads.
//! Contents are pseudo-random but seeded from the file size, so regenerated
//! fixtures are byte-identical across machines and runs.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info};

/// Fixture sizes exercised by the standard stress matrix, in MiB.
pub const STANDARD_SIZES_MIB: [u64; 4] = [1, 10, 50, 100];

const CHUNK: usize = 1024 * 1024;

/// Fixture file name for a size in MiB.
pub fn test_file_name(size_mib: u64) -> String {
    format!("test_{}mb.dat", size_mib)
}

/// Size in MiB encoded in a fixture name, if it is one.
pub fn fixture_size(name: &str) -> Option<u64> {
    name.strip_prefix("test_")?
        .strip_suffix("mb.dat")?
        .parse()
        .ok()
}

/// Ensure the fixtures for `sizes` exist under `dir`.
///
/// Files already present with the right length are left alone, so repeated
/// runs are cheap. Returns the paths of all fixtures, generated or kept.
pub fn generate(dir: &Path, sizes: &[u64]) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(sizes.len());
    for &size_mib in sizes {
        let path = dir.join(test_file_name(size_mib));
        let wanted = size_mib * 1024 * 1024;
        match fs::metadata(&path) {
            Ok(meta) if meta.len() == wanted => {
                debug!(path = %path.display(), "fixture already present");
            }
            _ => {
                info!(path = %path.display(), size_mib, "generating fixture");
                write_fixture(&path, size_mib)?;
            }
        }
        paths.push(path);
    }
    Ok(paths)
}

fn write_fixture(path: &Path, size_mib: u64) -> io::Result<()> {
    let mut rng = StdRng::seed_from_u64(size_mib);
    let mut out = BufWriter::new(File::create(path)?);
    let mut chunk = vec![0u8; CHUNK];
    for _ in 0..size_mib {
        rng.fill_bytes(&mut chunk);
        out.write_all(&chunk)?;
    }
    out.flush()
}
