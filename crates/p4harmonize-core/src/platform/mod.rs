use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(target_os = "windows")]
const GIT_DEPENDENCIES_PATH: &str =
    "Engine/Binaries/DotNET/GitDependencies/win-x64/GitDependencies.exe";
#[cfg(target_os = "macos")]
const GIT_DEPENDENCIES_PATH: &str = "Engine/Binaries/DotNET/GitDependencies/osx-x64/GitDependencies";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const GIT_DEPENDENCIES_PATH: &str =
    "Engine/Binaries/DotNET/GitDependencies/linux-x64/GitDependencies";

/// Location of the GitDependencies tool inside an Unreal Engine checkout.
pub fn git_dependencies_path(source_root: &Path) -> PathBuf {
    local_path(source_root, GIT_DEPENDENCIES_PATH)
}

/// Forward slashes, no leading `./` or `/`.
pub fn normalize_relative_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut trimmed = path.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.trim_start_matches('/').to_string()
}

/// Strip `root` from `full`, comparing the prefix without regard to case or
/// separator style. Returns `None` when `full` is not under `root`.
pub fn relative_to_root(full: &str, root: &str) -> Option<String> {
    let full = full.replace('\\', "/");
    let root = root.replace('\\', "/");
    let root = root.trim_end_matches('/');

    let prefix = full.get(..root.len())?;
    if !prefix.eq_ignore_ascii_case(root) {
        return None;
    }
    let rest = full.get(root.len()..)?.strip_prefix('/')?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_string())
}

/// Join a forward-slash relative path onto a local root.
pub fn local_path(root: &Path, relative: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in relative.split('/').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    path
}

/// Target of the symlink at `path` with forward slashes, or `None` when
/// `path` is not a symlink (including a link git checked out as a plain
/// file).
pub fn symlink_target(path: &Path) -> io::Result<Option<String>> {
    if !fs::symlink_metadata(path)?.file_type().is_symlink() {
        return Ok(None);
    }
    let target = fs::read_link(path)?;
    Ok(Some(target.to_string_lossy().replace('\\', "/")))
}

/// Point `link` at `target`, replacing a file or link already at `link`.
pub fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    match fs::symlink_metadata(link) {
        Ok(metadata) if !metadata.is_dir() => fs::remove_file(link)?,
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    make_symlink(target, link)
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let resolved = link.parent().map(|p| p.join(target));
    if resolved.map_or(false, |p| p.is_dir()) {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

#[cfg(not(any(unix, windows)))]
fn make_symlink(_target: &Path, link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("Cannot create symlink {}", link.display()),
    ))
}
