//! Filesystem staging: render a config sub-tree as concrete file
//! copies, symlinks, and directory creation.
//!
//! The tree shape is `destination -> source` for copies and links, with
//! nested mappings naming subdirectories, and `makedirs: [dir, ...]`
//! for directory creation. `!glob` tagged sources expand to every match
//! and land under the destination directory by file name.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use wxflow_tree::{Node, Tag};

use crate::error::ConfigResult;

/// Paths each staging operation handled or could not handle. Failures
/// are reported, not raised; the caller decides whether a partial stage
/// is fatal.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StageReport {
    pub ready: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl StageReport {
    /// True when every requested path was staged.
    pub fn ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Copy files per a `destination -> source` mapping.
pub fn copy(tree: &Node) -> ConfigResult<StageReport> {
    let mut report = StageReport::default();
    stage(tree, Path::new(""), &mut report, &copy_one)?;
    Ok(report)
}

/// Symlink files per a `destination -> source` mapping. An existing
/// symlink at the destination is replaced.
pub fn link(tree: &Node) -> ConfigResult<StageReport> {
    let mut report = StageReport::default();
    stage(tree, Path::new(""), &mut report, &link_one)?;
    Ok(report)
}

/// Create every directory named by the tree's `makedirs` list (or by a
/// bare sequence of paths).
pub fn makedirs(tree: &Node) -> ConfigResult<StageReport> {
    let mut report = StageReport::default();
    let dirs = match tree {
        Node::Map(map) => map.get("makedirs"),
        seq @ Node::Seq(_) => Some(seq),
        _ => None,
    };
    let Some(Node::Seq(dirs)) = dirs else {
        return Ok(report);
    };
    for dir in dirs {
        let Node::Str(dir) = dir else {
            continue;
        };
        let dir = PathBuf::from(dir);
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                info!("created directory {}", dir.display());
                report.ready.push(dir);
            }
            Err(e) => {
                error!("cannot create directory {}: {e}", dir.display());
                report.failed.push(dir);
            }
        }
    }
    Ok(report)
}

type StageFn = dyn Fn(&Path, &Path) -> std::io::Result<()>;

fn stage(
    tree: &Node,
    prefix: &Path,
    report: &mut StageReport,
    action: &StageFn,
) -> ConfigResult<()> {
    let Node::Map(map) = tree else {
        return Ok(());
    };
    for (dst, src) in map {
        let dst = prefix.join(dst);
        match src {
            Node::Map(_) => stage(src, &dst, report, action)?,
            Node::Str(src) => apply(action, &dst, Path::new(src), report),
            Node::Tagged(tagged) if tagged.tag == Tag::Glob => {
                expand_glob(&tagged.payload, &dst, report, action);
            }
            other => {
                error!("cannot stage {}: unexpected source {other}", dst.display());
                report.failed.push(dst);
            }
        }
    }
    Ok(())
}

fn apply(action: &StageFn, dst: &Path, src: &Path, report: &mut StageReport) {
    if !src.exists() {
        error!("source {} does not exist", src.display());
        report.failed.push(dst.to_path_buf());
        return;
    }
    match action(dst, src) {
        Ok(()) => {
            info!("staged {} -> {}", src.display(), dst.display());
            report.ready.push(dst.to_path_buf());
        }
        Err(e) => {
            error!("cannot stage {}: {e}", dst.display());
            report.failed.push(dst.to_path_buf());
        }
    }
}

/// Every glob match stages into `dst_dir` under its own file name.
fn expand_glob(pattern: &str, dst_dir: &Path, report: &mut StageReport, action: &StageFn) {
    let matches = match glob::glob(pattern) {
        Ok(matches) => matches,
        Err(e) => {
            error!("bad glob pattern '{pattern}': {e}");
            report.failed.push(dst_dir.to_path_buf());
            return;
        }
    };
    for entry in matches {
        match entry {
            Ok(src) => {
                let Some(name) = src.file_name() else {
                    continue;
                };
                apply(action, &dst_dir.join(name), &src, report);
            }
            Err(e) => {
                error!("glob '{pattern}': {e}");
                report.failed.push(dst_dir.to_path_buf());
            }
        }
    }
}

fn copy_one(dst: &Path, src: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, dst)?;
    Ok(())
}

#[cfg(unix)]
fn link_one(dst: &Path, src: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    if dst.symlink_metadata().is_ok() {
        std::fs::remove_file(dst)?;
    }
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(not(unix))]
fn link_one(_dst: &Path, _src: &Path) -> std::io::Result<()> {
    Err(std::io::Error::other("symlinks are only supported on unix"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wxflow_tree::Tagged;

    fn touch(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_copy_mapping() {
        let dir = TempDir::new().unwrap();
        let src = touch(&dir, "in.txt", "payload");
        let dst = dir.path().join("staged/out.txt");
        let tree = Node::from([(
            dst.to_str().unwrap(),
            Node::Str(src.to_str().unwrap().into()),
        )]);
        let report = copy(&tree).unwrap();
        assert!(report.ok());
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "payload");
    }

    #[test]
    fn test_copy_missing_source_reports_failure() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("out.txt");
        let tree = Node::from([(dst.to_str().unwrap(), Node::Str("/no/such/file".into()))]);
        let report = copy(&tree).unwrap();
        assert!(!report.ok());
        assert_eq!(report.failed, vec![dst]);
    }

    #[test]
    fn test_link_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let first = touch(&dir, "first.txt", "1");
        let second = touch(&dir, "second.txt", "2");
        let dst = dir.path().join("current");
        for src in [&first, &second] {
            let tree = Node::from([(
                dst.to_str().unwrap(),
                Node::Str(src.to_str().unwrap().into()),
            )]);
            assert!(link(&tree).unwrap().ok());
        }
        assert_eq!(std::fs::read_link(&dst).unwrap(), second);
    }

    #[test]
    fn test_glob_source_expands() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.nc", "");
        touch(&dir, "b.nc", "");
        touch(&dir, "c.txt", "");
        let dst = dir.path().join("staged");
        let pattern = format!("{}/*.nc", dir.path().display());
        let tree = Node::from([(
            dst.to_str().unwrap(),
            Node::Tagged(Tagged::new(Tag::Glob, pattern)),
        )]);
        let report = copy(&tree).unwrap();
        assert!(report.ok());
        assert_eq!(report.ready.len(), 2);
        assert!(dst.join("a.nc").exists());
        assert!(dst.join("b.nc").exists());
        assert!(!dst.join("c.txt").exists());
    }

    #[test]
    fn test_nested_mapping_names_subdirectories() {
        let dir = TempDir::new().unwrap();
        let src = touch(&dir, "in.txt", "x");
        let root = dir.path().join("run");
        let tree = Node::from([(
            root.to_str().unwrap(),
            Node::from([("inner", Node::from([(
                "out.txt",
                Node::Str(src.to_str().unwrap().into()),
            )]))]),
        )]);
        let report = copy(&tree).unwrap();
        assert!(report.ok());
        assert!(root.join("inner/out.txt").exists());
    }

    #[test]
    fn test_makedirs() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("x/y");
        let b = dir.path().join("z");
        let tree = Node::from([(
            "makedirs",
            Node::Seq(vec![
                Node::Str(a.to_str().unwrap().into()),
                Node::Str(b.to_str().unwrap().into()),
            ]),
        )]);
        let report = makedirs(&tree).unwrap();
        assert!(report.ok());
        assert!(a.is_dir());
        assert!(b.is_dir());
    }
}
