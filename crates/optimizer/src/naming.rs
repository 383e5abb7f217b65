use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix inserted between the file stem and its extension
pub const OPTIMIZED_SUFFIX: &str = "-optimized";

/// Get the output path for an input file: `clip.mp4` -> `clip-optimized.mp4`
///
/// Pure path arithmetic, the filesystem is never touched. Files without an
/// extension get the bare suffix (`clip` -> `clip-optimized`).
pub fn optimized_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();

    let mut file_name = OsString::with_capacity(stem.len() + OPTIMIZED_SUFFIX.len() + 8);
    file_name.push(&stem);
    file_name.push(OPTIMIZED_SUFFIX);
    if let Some(ext) = input.extension() {
        file_name.push(".");
        file_name.push(ext);
    }

    input.with_file_name(file_name)
}
