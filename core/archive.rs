use crate::error::{AppError, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// `out.txt` becomes `out.zip`; a path already ending in `.zip` gains a
/// second suffix rather than overwriting itself.
pub fn archive_path(output: &Path) -> PathBuf {
    let zipped = output.with_extension("zip");
    if zipped == output {
        let mut name = output.as_os_str().to_owned();
        name.push(".zip");
        PathBuf::from(name)
    } else {
        zipped
    }
}

/// Packs the finished artifact into a deflate zip next to it. The single
/// entry is named after the artifact's file name.
pub fn create_archive(output: &Path) -> Result<PathBuf> {
    let target = archive_path(output);
    let entry_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::Internal(format!("Output has no file name: {}", output.display())))?;

    let mut source = File::open(output).map_err(|e| AppError::FileRead {
        path: output.to_path_buf(),
        source: e,
    })?;
    let file = File::create(&target).map_err(|e| archive_error(&target, ZipError::Io(e)))?;

    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry_name, options)
        .map_err(|e| archive_error(&target, e))?;
    io::copy(&mut source, &mut zip).map_err(|e| archive_error(&target, ZipError::Io(e)))?;
    zip.finish().map_err(|e| archive_error(&target, e))?;

    log::info!("Created zip archive: {}", target.display());
    Ok(target)
}

fn archive_error(path: &Path, source: ZipError) -> AppError {
    AppError::Archive {
        path: path.to_path_buf(),
        source,
    }
}
