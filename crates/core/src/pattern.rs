//! Ignore and preprocess masks
//!
//! Masks follow deployment-tool conventions rather than gitignore: evaluated
//! in list order, every matching mask flips the verdict, `!` re-includes,
//! a trailing `/` restricts the mask to directories, a mask without `/`
//! matches the basename anywhere in the tree, and anything else is anchored
//! at the deploy root. Matching is case-insensitive and `/` is the separator
//! regardless of host OS.

use globset::{GlobBuilder, GlobMatcher};

#[derive(Debug, Clone)]
struct Pattern {
    negated: bool,
    dir_only: bool,
    basename: bool,
    matcher: GlobMatcher,
}

/// A compiled, ordered mask list.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Compile a mask list. Masks may use `*`, `?` and `[...]`; in
    /// root-anchored masks `*` does not cross `/`.
    ///
    /// # Errors
    /// Returns an error if any mask is not a valid glob.
    pub fn new<I, S>(masks: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();

        for mask in masks {
            let mut mask = mask.as_ref().replace('\\', "/");

            let negated = mask.starts_with('!');
            if negated {
                mask.remove(0);
            }

            let dir_only = mask.ends_with('/');
            if dir_only {
                mask.pop();
            }

            let basename = !mask.contains('/');
            let glob = if basename {
                GlobBuilder::new(&mask).case_insensitive(true).build()?
            } else {
                let anchored = if mask.starts_with('/') {
                    mask
                } else {
                    format!("/{mask}")
                };
                GlobBuilder::new(&anchored)
                    .case_insensitive(true)
                    .literal_separator(true)
                    .build()?
            };

            patterns.push(Pattern {
                negated,
                dir_only,
                basename,
                matcher: glob.compile_matcher(),
            });
        }

        Ok(Self { patterns })
    }

    /// A set that matches nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Decide whether `path` is matched by the mask list.
    ///
    /// `path` is `/`-rooted; a trailing `/` on directory paths is tolerated.
    /// Later masks override earlier ones, so a negated mask can re-include a
    /// previously excluded path and vice versa.
    #[must_use]
    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        let full = path.trim_end_matches('/');
        let base = full.rsplit('/').next().unwrap_or(full);

        let mut result = false;
        for pattern in &self.patterns {
            if pattern.dir_only && !is_dir {
                continue;
            }
            let hit = if pattern.basename {
                pattern.matcher.is_match(base)
            } else {
                pattern.matcher.is_match(full)
            };
            if hit {
                result = !pattern.negated;
            }
        }
        result
    }
}
