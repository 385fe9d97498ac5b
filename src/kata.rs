//! Kata resolution
//!
//! A kata is a directory with a `tests/` folder. It is named either by a
//! slug under the kata root or implicitly by the current directory.

use std::path::{Path, PathBuf};

use crate::error::{Result, SenseiError};

const TESTS_DIR: &str = "tests";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kata {
    /// Directory name, also the rate-limit key
    pub slug: String,
    pub dir: PathBuf,
}

impl Kata {
    /// Resolve `slug` under `root`, or fall back to `cwd` when no slug is given
    pub fn resolve(root: &Path, slug: Option<&str>, cwd: &Path) -> Result<Self> {
        let dir = match slug {
            Some(slug) => {
                let dir = root.join(slug);
                if !dir.is_dir() {
                    return Err(SenseiError::KataNotFound {
                        path: dir.display().to_string(),
                    });
                }
                dir
            }
            None => cwd.to_path_buf(),
        };
        Self::at(&dir)
    }

    /// Treat `dir` as a kata, checking for its `tests/` folder
    pub fn at(dir: &Path) -> Result<Self> {
        if !dir.join(TESTS_DIR).is_dir() {
            return Err(SenseiError::NotAKata {
                path: dir.display().to_string(),
            });
        }
        let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let slug = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "kata".to_string());
        Ok(Self { slug, dir })
    }
}
