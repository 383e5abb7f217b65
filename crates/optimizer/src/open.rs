use std::path::Path;
use std::process::Stdio;
use log::{debug, info};
use tokio::process::Command;

/// Ask the desktop to open a finished file with its default application
///
/// Missing files and launcher failures are logged and otherwise ignored.
pub async fn open_path(path: &Path) {
    if !path.exists() {
        debug!("Not opening {}: file does not exist", path.display());
        return;
    }

    let mut command = launcher(path);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    match command.status().await {
        Ok(status) if status.success() => info!("📂 Opened {}", path.display()),
        Ok(status) => debug!("Opener exited with {} for {}", status, path.display()),
        Err(e) => debug!("Failed to launch opener for {}: {}", path.display(), e),
    }
}

#[cfg(target_os = "macos")]
fn launcher(path: &Path) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(path);
    cmd
}

#[cfg(target_os = "windows")]
fn launcher(path: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    // Empty title argument so paths with spaces are not taken as the title
    cmd.args(["/C", "start", ""]).arg(path);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn launcher(path: &Path) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(path);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_ignored() {
        // Returns without spawning anything
        open_path(Path::new("/definitely/not/here-optimized.mp4")).await;
    }

    #[test]
    fn test_launcher_targets_path() {
        let cmd = launcher(Path::new("/v/clip-optimized.mp4"));
        let args: Vec<_> = cmd.as_std().get_args().collect();
        assert_eq!(args.last().unwrap().to_str(), Some("/v/clip-optimized.mp4"));
    }
}
