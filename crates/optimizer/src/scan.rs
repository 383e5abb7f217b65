use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::naming::OPTIMIZED_SUFFIX;
use crate::queue::is_video_container;

/// Expand submitted paths into candidate video files
///
/// Files are passed through in the given order. Directories are replaced by
/// the video files they contain, sorted by name; subdirectories are only
/// entered when `recursive` is set. Outputs of an earlier run
/// (`*-optimized.*`) found inside directories are skipped.
pub fn expand_inputs(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        info!("Scanning directory: {}", path.display());
        let max_depth = if recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(path)
            .follow_links(false)
            .max_depth(max_depth)
            .sort_by_file_name();

        let mut found = 0;
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Error reading directory entry: {}", e);
                    continue;
                }
            };

            let candidate = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if !is_video_container(candidate) || is_previous_output(candidate) {
                debug!("Skipping {}", candidate.display());
                continue;
            }

            found += 1;
            files.push(candidate.to_path_buf());
        }

        info!("Finished scanning {}: {} video file(s) found", path.display(), found);
    }

    files
}

fn is_previous_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.ends_with(OPTIMIZED_SUFFIX))
        .unwrap_or(false)
}
