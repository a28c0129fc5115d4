//! Zip packing of job output trees for the remote round trip.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use pex_core::{ErrorInfo, PexError};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

fn zip_error(code: &str, path: &Path, err: impl ToString) -> PexError {
    PexError::Io(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Compresses every file under `root` into `archive`, storing paths relative
/// to `root`. Returns the number of files written.
pub fn pack_dir(root: &Path, archive: &Path) -> Result<usize, PexError> {
    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent).map_err(|err| PexError::io("archive_dir", parent, err))?;
    }
    let file = File::create(archive).map_err(|err| PexError::io("archive_create", archive, err))?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries: Vec<_> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .collect::<Result<_, _>>()
        .map_err(|err| zip_error("archive_walk", root, err))?;
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    let mut files = 0;
    for entry in entries {
        let path = entry.path();
        if path == archive {
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .map_err(|err| zip_error("archive_relative", path, err))?
            .to_string_lossy()
            .replace('\\', "/");
        if entry.file_type().is_dir() {
            writer
                .add_directory(relative, options)
                .map_err(|err| zip_error("archive_add_dir", path, err))?;
            continue;
        }
        writer
            .start_file(relative, options)
            .map_err(|err| zip_error("archive_start_file", path, err))?;
        let bytes = fs::read(path).map_err(|err| PexError::io("archive_read", path, err))?;
        writer
            .write_all(&bytes)
            .map_err(|err| zip_error("archive_write", path, err))?;
        files += 1;
    }
    writer
        .finish()
        .map_err(|err| zip_error("archive_finish", archive, err))?;
    Ok(files)
}

/// Extracts `archive` into `dest`, refusing entries that would escape it.
/// Returns the number of files extracted.
pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<usize, PexError> {
    let file = File::open(archive).map_err(|err| PexError::io("archive_open", archive, err))?;
    let mut zip = ZipArchive::new(file).map_err(|err| zip_error("archive_parse", archive, err))?;
    let mut files = 0;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|err| zip_error("archive_entry", archive, err))?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(zip_error(
                "archive_unsafe_path",
                archive,
                format!("entry `{}` escapes the destination", entry.name()),
            ));
        };
        let target = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|err| PexError::io("archive_mkdir", &target, err))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| PexError::io("archive_mkdir", parent, err))?;
        }
        let mut out = File::create(&target).map_err(|err| PexError::io("archive_extract", &target, err))?;
        io::copy(&mut entry, &mut out).map_err(|err| PexError::io("archive_extract", &target, err))?;
        files += 1;
    }
    Ok(files)
}
