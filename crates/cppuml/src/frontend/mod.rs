//! Concrete syntax-tree providers
//!
//! [`TreeSitterProvider`] parses C++ with tree-sitter-cpp and lowers the
//! concrete syntax tree into the provider-neutral [`crate::core::SyntaxTree`].

mod lower;
mod treesitter;

pub use treesitter::TreeSitterProvider;

use std::path::{Path, PathBuf};

/// Include search directories taken from compiler-style flags
///
/// `-I<dir>`, `-I <dir>`, `-iquote<dir>` and `-iquote <dir>` are recognised;
/// every other flag is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    dirs: Vec<PathBuf>,
}

impl SearchPaths {
    pub fn from_flags(flags: &[String]) -> Self {
        let mut dirs = Vec::new();
        let mut iter = flags.iter();
        while let Some(flag) = iter.next() {
            let value = if flag == "-I" || flag == "-iquote" {
                iter.next().cloned()
            } else if let Some(rest) = flag.strip_prefix("-iquote") {
                Some(rest.to_string())
            } else {
                flag.strip_prefix("-I").map(str::to_string)
            };
            if let Some(dir) = value.filter(|dir| !dir.is_empty()) {
                dirs.push(PathBuf::from(dir));
            }
        }
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Locate an included header
    ///
    /// Quoted includes pass the including file's directory, which is tried
    /// before the search directories.
    pub fn resolve(&self, name: &str, including_dir: Option<&Path>) -> Option<PathBuf> {
        including_dir
            .into_iter()
            .chain(self.dirs.iter().map(PathBuf::as_path))
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_search_paths_from_flags() {
        let paths = SearchPaths::from_flags(&flags(&[
            "-std=c++17",
            "-Iinclude",
            "-I",
            "third_party",
            "-iquote",
            "src",
            "-iquotegen",
            "-DNDEBUG",
        ]));
        let dirs: Vec<&str> = paths.dirs().iter().map(|d| d.to_str().unwrap()).collect();
        assert_eq!(dirs, vec!["include", "third_party", "src", "gen"]);
    }

    #[test]
    fn test_trailing_flag_without_value() {
        let paths = SearchPaths::from_flags(&flags(&["-I"]));
        assert!(paths.dirs().is_empty());
    }

    #[test]
    fn test_resolve_prefers_including_dir() {
        let local = tempfile::tempdir().unwrap();
        let include = tempfile::tempdir().unwrap();
        std::fs::write(local.path().join("shape.h"), "struct Shape {};").unwrap();
        std::fs::write(include.path().join("shape.h"), "struct Shape {};").unwrap();
        std::fs::write(include.path().join("only.h"), "struct Only {};").unwrap();

        let paths = SearchPaths::from_flags(&[format!("-I{}", include.path().display())]);
        assert_eq!(
            paths.resolve("shape.h", Some(local.path())),
            Some(local.path().join("shape.h"))
        );
        assert_eq!(
            paths.resolve("only.h", Some(local.path())),
            Some(include.path().join("only.h"))
        );
        assert_eq!(paths.resolve("only.h", None), Some(include.path().join("only.h")));
        assert_eq!(paths.resolve("missing.h", Some(local.path())), None);
    }
}
