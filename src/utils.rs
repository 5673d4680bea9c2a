use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use log::debug;
use opencv::core::CV_32F;
use opencv::imgcodecs;
use opencv::prelude::*;
use walkdir::WalkDir;

/// List regular files of a directory in file-name order.
///
/// Hidden files (name begins with '.') are skipped. Subdirectories are not
/// descended into. The sorted order makes repeated index generation over an
/// unchanged directory reproducible.
pub fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    ensure!(dir.is_dir(), "could not open image directory {}", dir.display());
    let mut files = vec![];
    for entry in WalkDir::new(dir).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

/// Read an image as grayscale. Files OpenCV cannot decode yield `None`.
pub fn imread(path: &Path) -> Result<Option<Mat>> {
    let filename = path.to_str().with_context(|| format!("non-utf8 path: {}", path.display()))?;
    let image = imgcodecs::imread(filename, imgcodecs::IMREAD_GRAYSCALE)?;
    if image.empty() {
        debug!("skip undecodable file: {}", path.display());
        return Ok(None);
    }
    Ok(Some(image))
}

/// Convert descriptors to CV_32F. Binary descriptors (ORB, BRISK, ...) come
/// out of the extractor as CV_8U, which neither the FLANN KD-tree nor k-means
/// accepts.
pub fn to_f32(des: &Mat) -> Result<Mat> {
    if des.empty() || des.typ() == CV_32F {
        return Ok(des.try_clone()?);
    }
    let mut out = Mat::default();
    des.convert_to_def(&mut out, CV_32F)?;
    Ok(out)
}
