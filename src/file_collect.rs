use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct CollectResult {
    pub files: Vec<PathBuf>,
    pub folders: u64,
}

/// Resolve the input paths and gather every file to examine. Files given
/// directly are always taken, hidden or not; entries found inside folders
/// obey the hidden policy. Folders are counted as they are searched, and
/// a cancellation request stops further descents.
pub fn collect_targets<FCancel>(
    input_paths: &[String],
    include_subfolders: bool,
    include_hidden: bool,
    is_cancelled: &FCancel,
) -> Result<CollectResult, String>
where
    FCancel: Fn() -> bool,
{
    if input_paths.is_empty() {
        return Err("入力パスが指定されていません".to_string());
    }

    let mut resolved_inputs: Vec<PathBuf> = Vec::new();
    for raw in input_paths {
        let path = PathBuf::from(raw);
        if !path.exists() {
            return Err(format!("入力パスが存在しません: {}", raw));
        }
        resolved_inputs.push(
            safe_canonicalize(&path)
                .map_err(|e| format!("パスの正規化に失敗しました `{}`: {}", raw, e))?,
        );
    }

    let mut files = BTreeSet::new();
    let mut folders = 0u64;
    for path in &resolved_inputs {
        if is_cancelled() {
            break;
        }
        if path.is_file() {
            files.insert(path.clone());
            continue;
        }
        if path.is_dir() {
            collect_from_dir(
                path,
                include_subfolders,
                include_hidden,
                is_cancelled,
                &mut files,
                &mut folders,
            )?;
        }
    }

    let mut file_list: Vec<PathBuf> = files.into_iter().collect();
    file_list.sort_by(|a, b| {
        a.to_string_lossy()
            .to_lowercase()
            .cmp(&b.to_string_lossy().to_lowercase())
    });

    Ok(CollectResult {
        files: file_list,
        folders,
    })
}

fn collect_from_dir<FCancel>(
    dir: &Path,
    include_subfolders: bool,
    include_hidden: bool,
    is_cancelled: &FCancel,
    files: &mut BTreeSet<PathBuf>,
    folders: &mut u64,
) -> Result<(), String>
where
    FCancel: Fn() -> bool,
{
    let max_depth = if include_subfolders { usize::MAX } else { 1 };
    let walker = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(move |entry| {
            entry.depth() == 0 || include_hidden || !is_hidden_name(entry.file_name())
        });

    for entry in walker {
        let entry = entry.map_err(|e| format!("フォルダの走査に失敗しました: {}", e))?;
        if entry.file_type().is_dir() {
            // polled once per folder descent, never mid-file
            if is_cancelled() {
                return Ok(());
            }
            if entry.depth() == 0 || include_subfolders {
                *folders += 1;
            }
        } else if entry.file_type().is_file() {
            files.insert(
                safe_canonicalize(entry.path())
                    .map_err(|e| format!("パスの正規化に失敗しました: {}", e))?,
            );
        }
    }
    Ok(())
}

fn is_hidden_name(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// `canonicalize()` wrapper that strips the Windows `\\?\` prefix.
fn safe_canonicalize(path: &Path) -> std::io::Result<PathBuf> {
    let canonical = path.canonicalize()?;
    Ok(strip_verbatim(canonical))
}

#[cfg(windows)]
fn strip_verbatim(path: PathBuf) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        path
    }
}

#[cfg(not(windows))]
fn strip_verbatim(path: PathBuf) -> PathBuf {
    path
}
