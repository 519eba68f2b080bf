//! Archive extractor (extract stage)
//!
//! Unpacks every downloaded ZIP into an isolated per-archive directory and
//! records the SHA-256 of the original archive bytes as provenance. A
//! failure on any archive is fatal to the stage: the inventory is only
//! written once every archive extracted, so a retry starts clean.

use crate::types::{ArchiveInventory, InventoryEntry};
use njleg_common::{checksum, NjlegError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// File name of the per-year inventory under the extraction root.
pub const INVENTORY_FILE_NAME: &str = "inventory.json";

/// Extract every `.zip` under `downloads_dir` into `extract_root`
///
/// Each archive lands in a subdirectory named after the archive stem.
/// Re-extraction overwrites prior output deterministically; the content
/// hash is always recomputed from the source archive.
pub fn extract_year(year: i32, downloads_dir: &Path, extract_root: &Path) -> Result<ArchiveInventory> {
    std::fs::create_dir_all(extract_root)?;

    let mut archives = Vec::new();

    let mut names: Vec<String> = std::fs::read_dir(downloads_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.to_ascii_lowercase().ends_with(".zip"))
        .collect();
    names.sort();

    for name in names {
        let archive_path = downloads_dir.join(&name);
        let stem = name.trim_end_matches(".zip").trim_end_matches(".ZIP");
        let dest = extract_root.join(stem);

        let sha256 = checksum::sha256_file(&archive_path)?;
        extract_archive(&archive_path, &dest)?;

        debug!(year, file = %name, %sha256, "extracted archive");
        archives.push(InventoryEntry { file: name, sha256 });
    }

    let inventory = ArchiveInventory::new(year, archives);
    inventory.save(extract_root.join(INVENTORY_FILE_NAME))?;

    info!(year, archives = inventory.archives.len(), "extract stage complete");
    Ok(inventory)
}

/// Unpack one ZIP archive into `dest`, replacing any prior extraction
fn extract_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    std::fs::create_dir_all(dest)?;

    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| NjlegError::DataShape(format!("{}: {e}", archive_path.display())))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| NjlegError::DataShape(format!("{}: {e}", archive_path.display())))?;

        // Reject entries that would escape the destination directory.
        let relative = entry.enclosed_name().map(Path::to_path_buf).ok_or_else(|| {
            NjlegError::DataShape(format!(
                "{}: unsafe entry path {:?}",
                archive_path.display(),
                entry.name()
            ))
        })?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut contents = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut contents)?;
        std::fs::write(&out_path, contents)?;
    }

    Ok(())
}
