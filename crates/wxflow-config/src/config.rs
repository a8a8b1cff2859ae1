//! The Config model: a tree bundled with its format and provenance.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use wxflow_codec::{Format, codec_for};
use wxflow_template::dereference;
use wxflow_tree::{Characterization, Mapping, Node, characterize, deep_update, diff};

use crate::error::{ConfigError, ConfigResult};
use crate::stdin::read_stdin;

static INCLUDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*!INCLUDE\s*\[(.*)\]\s*$").expect("static pattern"));

/// A parsed configuration: normalized tree, format, and the source path
/// used for relative include resolution and error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    tree: Node,
    format: Format,
    path: Option<PathBuf>,
}

impl Config {
    /// Load a config from a file. When `format` is not given it is
    /// deduced from the file extension.
    ///
    /// # Errors
    ///
    /// Fails on unreadable files, undeducible formats, parse errors,
    /// depth violations, and broken includes.
    pub fn from_file(path: &Path, format: Option<Format>) -> ConfigResult<Config> {
        let format = match format.or_else(|| Format::from_ext(path)) {
            Some(format) => format,
            None => {
                return Err(ConfigError::UndeducibleFormat {
                    path: path.to_path_buf(),
                });
            }
        };
        let text = fs::read_to_string(path)?;
        Self::from_source(&text, format, Some(path.to_path_buf()))
    }

    /// Parse a config from text with no source path. Relative includes
    /// are not resolvable from such a config.
    pub fn from_text(text: &str, format: Format) -> ConfigResult<Config> {
        Self::from_source(text, format, None)
    }

    /// Parse a config from standard input. The stream is read once and
    /// cached, so repeated construction sees the same bytes.
    pub fn from_stdin(format: Format) -> ConfigResult<Config> {
        let text = read_stdin()?;
        Self::from_source(&text, format, None)
    }

    /// Wrap an existing tree. The format's depth constraint still
    /// applies, and include directives in the tree are still expanded.
    pub fn from_tree(tree: Node, format: Format) -> ConfigResult<Config> {
        Self::adopt(tree, format, None)
    }

    fn from_source(text: &str, format: Format, path: Option<PathBuf>) -> ConfigResult<Config> {
        let tree = codec_for(format).parse(text)?;
        Self::adopt(tree, format, path)
    }

    fn adopt(tree: Node, format: Format, path: Option<PathBuf>) -> ConfigResult<Config> {
        if let Some(expected) = format.max_depth() {
            let actual = tree.depth();
            if actual != expected {
                return Err(ConfigError::DepthMismatch {
                    format,
                    expected,
                    actual,
                });
            }
        }
        let mut config = Config { tree, format, path };
        config.expand_includes()?;
        Ok(config)
    }

    pub fn tree(&self) -> &Node {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Node {
        &mut self.tree
    }

    pub fn into_tree(self) -> Node {
        self.tree
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    /// Deep merge-update from another config's tree: mapping values merge
    /// recursively, everything else is replaced wholesale.
    pub fn update_from(&mut self, other: &Config) {
        deep_update(&mut self.tree, other.tree());
    }

    /// Merge-update from a bare tree.
    pub fn update_from_tree(&mut self, tree: &Node) {
        deep_update(&mut self.tree, tree);
    }

    /// Render template expressions in place until a fixpoint, with the
    /// tree itself (plus `extra`, which overrides) as the context.
    ///
    /// # Errors
    ///
    /// Malformed templates and unknown filters fail; unresolved names
    /// just leave their leaves unchanged.
    pub fn dereference(&mut self, extra: Option<&Mapping>) -> ConfigResult<()> {
        self.tree = dereference(&self.tree, extra)?;
        Ok(())
    }

    /// True iff the two trees are structurally equal, mapping order
    /// ignored. On inequality, logs one diff row per differing key.
    pub fn compare(&self, other: &Config) -> bool {
        let rows = diff(self.tree(), other.tree());
        if rows.is_empty() {
            return true;
        }
        info!(
            "{:<20} {:<20} {:<20} {:<8} {:<20} {:<8}",
            "section", "key", "left", "type", "right", "type"
        );
        for row in &rows {
            info!("{row}");
        }
        false
    }

    /// Classify every leaf as complete, empty, or template-bearing.
    pub fn characterize(&self) -> Characterization {
        characterize(&self.tree)
    }

    /// Serialize through this config's codec.
    pub fn to_text(&self) -> ConfigResult<String> {
        Ok(codec_for(self.format).to_text(&self.tree)?)
    }

    /// Serialize and write to `path`.
    pub fn write_to(&self, path: &Path) -> ConfigResult<()> {
        fs::write(path, self.to_text()?)?;
        Ok(())
    }

    // --- include expansion --------------------------------------------------

    fn expand_includes(&mut self) -> ConfigResult<()> {
        let tree = std::mem::replace(&mut self.tree, Node::Null);
        self.tree = self.expand_node(tree)?;
        Ok(())
    }

    fn expand_node(&self, node: Node) -> ConfigResult<Node> {
        match node {
            Node::Map(map) => {
                let mut out = Mapping::new();
                let mut loaded = Vec::new();
                for (key, value) in map {
                    if let Node::Str(text) = &value
                        && let Some(captures) = INCLUDE_RE.captures(text)
                    {
                        // The directive key disappears; its targets merge
                        // into the containing mapping in declared order.
                        loaded.extend(self.load_includes(&captures[1])?);
                        continue;
                    }
                    out.insert(key, self.expand_node(value)?);
                }
                let mut merged = Node::Map(out);
                for tree in &loaded {
                    deep_update(&mut merged, tree);
                }
                Ok(merged)
            }
            Node::Seq(items) => {
                let items = items
                    .into_iter()
                    .map(|item| self.expand_node(item))
                    .collect::<ConfigResult<Vec<_>>>()?;
                Ok(Node::Seq(items))
            }
            other => Ok(other),
        }
    }

    fn load_includes(&self, paths: &str) -> ConfigResult<Vec<Node>> {
        let mut trees = Vec::new();
        for entry in paths.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let target = self.resolve_include(Path::new(entry))?;
            // Loading through the same codec handles nested includes and
            // re-checks the depth constraint.
            let included =
                Config::from_file(&target, Some(self.format)).map_err(|e| match e {
                    ConfigError::Io(e) => ConfigError::BadInclude {
                        message: format!("cannot load include target '{}': {e}", target.display()),
                    },
                    other => other,
                })?;
            trees.push(included.into_tree());
        }
        Ok(trees)
    }

    fn resolve_include(&self, target: &Path) -> ConfigResult<PathBuf> {
        if target.is_absolute() {
            return Ok(target.to_path_buf());
        }
        match self.path.as_ref().and_then(|p| p.parent()) {
            Some(parent) => Ok(parent.join(target)),
            None => Err(ConfigError::BadInclude {
                message: format!(
                    "cannot resolve relative include path '{}' without a source file",
                    target.display()
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_from_file_deduces_format() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "c.yaml", "a: 1\n");
        let config = Config::from_file(&path, None).unwrap();
        assert_eq!(config.format(), Format::Yaml);
        assert_eq!(config.tree().get("a"), Some(&Node::Int(1)));
    }

    #[test]
    fn test_undeducible_extension() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "c.txt", "a: 1\n");
        assert!(matches!(
            Config::from_file(&path, None),
            Err(ConfigError::UndeducibleFormat { .. })
        ));
    }

    #[test]
    fn test_depth_mismatch_at_construction() {
        let tree = Node::from([(
            "a",
            Node::from([("b", Node::from([("c", Node::Int(1))]))]),
        )]);
        let err = Config::from_tree(tree, Format::Ini).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot instantiate depth-2 ini config with depth-3 tree"
        );
    }

    #[test]
    fn test_include_merges_and_drops_key() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "base.yaml", "fcst:\n  length: 12\n  grid: c96\n");
        let path = write_file(
            &dir,
            "main.yaml",
            "inherit: '!INCLUDE [base.yaml]'\nfcst:\n  grid: c384\n",
        );
        let config = Config::from_file(&path, None).unwrap();
        assert_eq!(config.tree().get("inherit"), None);
        let fcst = config.tree().get("fcst").unwrap();
        assert_eq!(fcst.get("length"), Some(&Node::Int(12)));
        // Included values merge over siblings declared alongside.
        assert_eq!(fcst.get("grid"), Some(&Node::Str("c96".into())));
    }

    #[test]
    fn test_include_declared_order() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "one.yaml", "k: 1\n");
        write_file(&dir, "two.yaml", "k: 2\n");
        let path = write_file(&dir, "main.yaml", "all: '!INCLUDE [one.yaml, two.yaml]'\n");
        let config = Config::from_file(&path, None).unwrap();
        assert_eq!(config.tree().get("k"), Some(&Node::Int(2)));
    }

    #[test]
    fn test_nested_include() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "inner.yaml", "deepest: true\n");
        write_file(&dir, "mid.yaml", "via: '!INCLUDE [inner.yaml]'\n");
        let path = write_file(&dir, "main.yaml", "top: '!INCLUDE [mid.yaml]'\n");
        let config = Config::from_file(&path, None).unwrap();
        assert_eq!(config.tree().get("deepest"), Some(&Node::Bool(true)));
    }

    #[test]
    fn test_relative_include_without_source_path() {
        let err = Config::from_text("k: '!INCLUDE [other.yaml]'\n", Format::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::BadInclude { .. }));
    }

    #[test]
    fn test_missing_include_target() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "main.yaml", "k: '!INCLUDE [nope.yaml]'\n");
        let err = Config::from_file(&path, None).unwrap_err();
        assert!(matches!(err, ConfigError::BadInclude { .. }));
    }

    #[test]
    fn test_update_from_merges_deeply() {
        let mut base = Config::from_text("s:\n  a: 1\n  b: 2\n", Format::Yaml).unwrap();
        let over = Config::from_text("s:\n  b: 3\n", Format::Yaml).unwrap();
        base.update_from(&over);
        let s = base.tree().get("s").unwrap();
        assert_eq!(s.get("a"), Some(&Node::Int(1)));
        assert_eq!(s.get("b"), Some(&Node::Int(3)));
    }

    #[test]
    fn test_dereference_in_place() {
        let mut config = Config::from_text("a: '{{ b }}'\nb: 42\n", Format::Yaml).unwrap();
        config.dereference(None).unwrap();
        assert_eq!(config.tree().get("a"), Some(&Node::Int(42)));
    }

    #[test]
    fn test_compare_order_insensitive() {
        let a = Config::from_text("x: 1\ny: 2\n", Format::Yaml).unwrap();
        let b = Config::from_text("y: 2\nx: 1\n", Format::Yaml).unwrap();
        assert!(a.compare(&b));
        assert!(a.compare(&a));
        let c = Config::from_text("x: 1\ny: 3\n", Format::Yaml).unwrap();
        assert!(!a.compare(&c));
        assert!(!c.compare(&a));
    }

    #[test]
    fn test_roundtrip_through_codec() {
        let source = "fcst:\n  length: 12\n  grids:\n    - c96\n    - c384\n";
        let config = Config::from_text(source, Format::Yaml).unwrap();
        let text = config.to_text().unwrap();
        let reparsed = Config::from_text(&text, Format::Yaml).unwrap();
        assert_eq!(config.tree(), reparsed.tree());
    }
}
