//! Filesystem mutations performed by live effects.

use std::fs::{self, File};
use std::io;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

#[cfg(unix)]
use nix::unistd::{Gid, Group, Uid, User, chown};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{EffectError, EffectResult};

pub(crate) fn extract_zip(archive_path: &Path, target: &Path) -> EffectResult<usize> {
    let file = File::open(archive_path)
        .map_err(|source| EffectError::io("extract_zip.open", archive_path, source))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|source| EffectError::zip("extract_zip.decode", archive_path, source))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|source| EffectError::zip("extract_zip.read_entry", archive_path, source))?;
        let destination = target.join(sanitize_archive_path(entry.name())?);

        if entry.is_dir() {
            fs::create_dir_all(&destination)
                .map_err(|source| EffectError::io("extract_zip.create_dir", &destination, source))?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| EffectError::io("extract_zip.create_parent", parent, source))?;
        }
        let mut output = File::create(&destination)
            .map_err(|source| EffectError::io("extract_zip.create_file", &destination, source))?;
        io::copy(&mut entry, &mut output)
            .map_err(|source| EffectError::io("extract_zip.copy", &destination, source))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            fs::set_permissions(&destination, fs::Permissions::from_mode(mode)).map_err(
                |source| EffectError::io("extract_zip.set_permissions", &destination, source),
            )?;
        }
        written += 1;
    }
    Ok(written)
}

pub(crate) fn sanitize_archive_path(entry: &str) -> EffectResult<PathBuf> {
    let path = Path::new(entry);
    if path.is_absolute() {
        return Err(EffectError::InvalidInput {
            field: "archive_entry",
            reason: "absolute_path",
            value: Some(entry.to_string()),
        });
    }

    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            _ => {
                return Err(EffectError::InvalidInput {
                    field: "archive_entry",
                    reason: "invalid_segment",
                    value: Some(entry.to_string()),
                });
            }
        }
    }
    Ok(sanitized)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Remove every non-hidden entry directly under `dir`.
pub(crate) fn purge_dir(dir: &Path) -> EffectResult<usize> {
    let mut removed = 0;
    for entry in read_dir(dir, "purge.read_dir")? {
        if is_hidden(&entry.file_name()) {
            continue;
        }
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|source| EffectError::io("purge.file_type", &path, source))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path)
                .map_err(|source| EffectError::io("purge.remove_dir", &path, source))?;
        } else {
            fs::remove_file(&path)
                .map_err(|source| EffectError::io("purge.remove_file", &path, source))?;
        }
        removed += 1;
    }
    Ok(removed)
}

/// Move every entry under `source`, dot-entries included, into `destination`.
pub(crate) fn move_contents(source: &Path, destination: &Path) -> EffectResult<usize> {
    fs::create_dir_all(destination)
        .map_err(|err| EffectError::io("move_contents.create_dir", destination, err))?;
    let mut moved = 0;
    for entry in read_dir(source, "move_contents.read_dir")? {
        let target = destination.join(entry.file_name());
        move_tree(&entry.path(), &target)?;
        moved += 1;
    }
    Ok(moved)
}

fn read_dir(dir: &Path, operation: &'static str) -> EffectResult<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)
        .map_err(|source| EffectError::io(operation, dir, source))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| EffectError::io(operation, dir, source))?;
    entries.sort_by_key(fs::DirEntry::file_name);
    Ok(entries)
}

fn move_tree(source: &Path, destination: &Path) -> EffectResult<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    copy_tree(source, destination)?;
    if source.is_dir() {
        fs::remove_dir_all(source)
            .map_err(|err| EffectError::io("move_tree.cleanup", source, err))?;
    } else {
        fs::remove_file(source).map_err(|err| EffectError::io("move_tree.cleanup", source, err))?;
    }
    Ok(())
}

fn copy_tree(source: &Path, destination: &Path) -> EffectResult<()> {
    if source.is_file() {
        fs::copy(source, destination)
            .map_err(|err| EffectError::io("copy_tree.copy_file", destination, err))?;
        return Ok(());
    }

    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|err| EffectError::walkdir("copy_tree.walk", source, err))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| EffectError::InvalidInput {
                field: "source_path",
                reason: "strip_prefix",
                value: Some(entry.path().to_string_lossy().into_owned()),
            })?;
        let target_path = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target_path)
                .map_err(|err| EffectError::io("copy_tree.create_dir", &target_path, err))?;
        } else {
            fs::copy(entry.path(), &target_path)
                .map_err(|err| EffectError::io("copy_tree.copy_entry", &target_path, err))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
/// Change ownership of everything below `root`; `root` itself is left alone.
pub(crate) fn chown_tree(root: &Path, owner: &str, group: &str) -> EffectResult<usize> {
    let uid = resolve_owner(owner)?;
    let gid = resolve_group(group)?;
    let mut changed = 0;
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|source| EffectError::walkdir("chown_tree.walk", root, source))?;
        chown(entry.path(), Some(uid), Some(gid))
            .map_err(|source| EffectError::nix("chown_tree.chown", entry.path(), source))?;
        changed += 1;
    }
    Ok(changed)
}

#[cfg(unix)]
pub(crate) fn chown_path(path: &Path, owner: &str, group: &str) -> EffectResult<()> {
    let uid = resolve_owner(owner)?;
    let gid = resolve_group(group)?;
    chown(path, Some(uid), Some(gid)).map_err(|source| EffectError::nix("chown", path, source))
}

#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> EffectResult<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|source| EffectError::io("chmod", path, source))
}

#[cfg(not(unix))]
pub(crate) fn chown_tree(_root: &Path, _owner: &str, _group: &str) -> EffectResult<usize> {
    Err(unix_only("chown_tree"))
}

#[cfg(not(unix))]
pub(crate) fn chown_path(_path: &Path, _owner: &str, _group: &str) -> EffectResult<()> {
    Err(unix_only("chown"))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> EffectResult<()> {
    Err(unix_only("chmod"))
}

#[cfg(not(unix))]
const fn unix_only(operation: &'static str) -> EffectError {
    EffectError::Unsupported {
        operation,
        value: None,
    }
}

pub(crate) fn remove_file(path: &Path) -> EffectResult<()> {
    fs::remove_file(path).map_err(|source| EffectError::io("remove_file", path, source))
}

/// Remove `leaf`, then each empty parent up to but excluding `stop_at`.
pub(crate) fn remove_empty_dir_chain(leaf: &Path, stop_at: &Path) -> EffectResult<usize> {
    fs::remove_dir(leaf).map_err(|source| EffectError::io("remove_dirs.leaf", leaf, source))?;
    let mut removed = 1;
    let mut current = leaf.parent();
    while let Some(dir) = current {
        if dir == stop_at || !dir.starts_with(stop_at) || fs::remove_dir(dir).is_err() {
            break;
        }
        removed += 1;
        current = dir.parent();
    }
    Ok(removed)
}

#[cfg(unix)]
pub(crate) fn resolve_owner(spec: &str) -> EffectResult<Uid> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(EffectError::InvalidInput {
            field: "owner",
            reason: "empty",
            value: Some(spec.to_string()),
        });
    }
    if let Ok(id) = trimmed.parse::<u32>() {
        return Ok(Uid::from_raw(id));
    }
    let user = User::from_name(trimmed)
        .map_err(|source| EffectError::UserLookup {
            user: trimmed.to_string(),
            source,
        })?
        .ok_or_else(|| EffectError::InvalidInput {
            field: "owner",
            reason: "not_found",
            value: Some(trimmed.to_string()),
        })?;
    Ok(user.uid)
}

#[cfg(unix)]
pub(crate) fn resolve_group(spec: &str) -> EffectResult<Gid> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(EffectError::InvalidInput {
            field: "group",
            reason: "empty",
            value: Some(spec.to_string()),
        });
    }
    if let Ok(id) = trimmed.parse::<u32>() {
        return Ok(Gid::from_raw(id));
    }
    let group = Group::from_name(trimmed)
        .map_err(|source| EffectError::GroupLookup {
            group: trimmed.to_string(),
            source,
        })?
        .ok_or_else(|| EffectError::InvalidInput {
            field: "group",
            reason: "not_found",
            value: Some(trimmed.to_string()),
        })?;
    Ok(group.gid)
}
