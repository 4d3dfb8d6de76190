//! File system tools: list, read, and write within the sandbox root.

use std::io;

use tokio::fs;
use tokio::io::AsyncReadExt;

use super::{Access, ToolError};
use crate::sandbox::{ResolveError, SandboxRoot};

/// Maximum characters returned by [`read_file`]. Longer files are cut silently.
pub const MAX_FILE_CHARS: usize = 10_000;

/// Bytes read from disk for [`read_file`]: enough for `MAX_FILE_CHARS`
/// characters of up to four UTF-8 bytes each, plus one partial character.
const MAX_READ_BYTES: u64 = (MAX_FILE_CHARS as u64) * 4 + 4;

/// List the immediate children of `directory` (default: the root).
///
/// One line per entry, sorted by name:
/// `- <name>: file_size=<bytes> bytes, is_dir=<bool>`.
/// Symlinks are described, not followed.
pub async fn list_directory(
    root: &SandboxRoot,
    directory: Option<&str>,
) -> Result<String, ToolError> {
    let directory = directory.unwrap_or(".");
    let path = root
        .resolve(directory)
        .map_err(|err| match err {
            ResolveError::Io { source, .. } if source.kind() == io::ErrorKind::NotADirectory => {
                ToolError::NotADirectory(directory.to_string())
            }
            err => ToolError::unresolved(Access::List, directory)(err),
        })?;

    match fs::metadata(&path).await {
        Ok(metadata) if metadata.is_dir() => {}
        _ => return Err(ToolError::NotADirectory(directory.to_string())),
    }

    let mut reader = fs::read_dir(&path)
        .await
        .map_err(ToolError::io(Access::List, directory))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(ToolError::io(Access::List, directory))?
    {
        let metadata = fs::symlink_metadata(entry.path())
            .await
            .map_err(ToolError::io(Access::List, directory))?;
        entries.push((
            entry.file_name().to_string_lossy().into_owned(),
            metadata.len(),
            metadata.is_dir(),
        ));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(entries
        .iter()
        .map(|(name, size, is_dir)| format!("- {}: file_size={} bytes, is_dir={}", name, size, is_dir))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Read a regular file, returning at most [`MAX_FILE_CHARS`] characters.
pub async fn read_file(root: &SandboxRoot, file_path: &str) -> Result<String, ToolError> {
    let path = root
        .resolve(file_path)
        .map_err(ToolError::unresolved_file(Access::Read, file_path))?;

    match fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => {}
        Ok(_) => return Err(ToolError::NotAFile(file_path.to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ToolError::NotFound(file_path.to_string()))
        }
        Err(e) => return Err(ToolError::io(Access::Read, file_path)(e)),
    }

    let file = fs::File::open(&path)
        .await
        .map_err(ToolError::io(Access::Read, file_path))?;
    let mut bytes = Vec::new();
    file.take(MAX_READ_BYTES)
        .read_to_end(&mut bytes)
        .await
        .map_err(ToolError::io(Access::Read, file_path))?;

    Ok(truncate_chars(&String::from_utf8_lossy(&bytes), MAX_FILE_CHARS))
}

/// Create or overwrite `file_path` with `content`, creating parent directories.
pub async fn write_file(
    root: &SandboxRoot,
    file_path: &str,
    content: &str,
) -> Result<String, ToolError> {
    let path = root
        .resolve(file_path)
        .map_err(ToolError::unresolved(Access::Write, file_path))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(ToolError::io(Access::Write, file_path))?;
    }
    fs::write(&path, content)
        .await
        .map_err(ToolError::io(Access::Write, file_path))?;

    Ok(format!(
        "Successfully wrote to \"{}\" ({} bytes written)",
        file_path,
        content.len()
    ))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
