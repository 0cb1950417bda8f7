//! Trusted resolution of skill packages.
//!
//! The containment rules are pure functions over paths: nothing here touches
//! the filesystem until every candidate path has been checked to stay inside
//! its trusted root. Probing for descriptors and entry files goes through the
//! [`PackageProbe`] port (implemented over `tokio::fs` in skillgate-infra).

use std::future::Future;
use std::path::{Component, Path, PathBuf};

use skillgate_types::config::ResolveConfig;
use skillgate_types::error::{SkillError, StoreError};
use skillgate_types::skill::{PackageManifest, ResolvedPackage, SkillSource};

// ---------------------------------------------------------------------------
// Pure containment checks
// ---------------------------------------------------------------------------

/// Normalise `.` and `..` without filesystem access.
///
/// `..` never climbs above the root or prefix component.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        PathBuf::from(".")
    } else {
        out.iter().collect()
    }
}

/// Whether normalised `path` lies at or below normalised `base`.
///
/// A base of `.` has no component for `starts_with` to match, so any relative
/// path that does not climb out with `..` is inside it.
fn is_within(path: &Path, base: &Path) -> bool {
    if base == Path::new(".") {
        return path.is_relative() && !matches!(path.components().next(), Some(Component::ParentDir));
    }
    path.starts_with(base)
}

/// Join `relative` onto `base` and require the result to stay inside `base`.
fn contained_join(base: &Path, relative: &str, what: &str) -> Result<PathBuf, SkillError> {
    let base = normalize_path(base);
    let joined = normalize_path(&base.join(relative));
    if is_within(&joined, &base) {
        Ok(joined)
    } else {
        Err(SkillError::BadConfig(format!(
            "{what} '{relative}' escapes '{}'",
            base.display()
        )))
    }
}

/// Absolute path of a configured local root, which must stay inside the
/// repository root.
pub fn resolve_local_root(repo_root: &Path, local_path: &str) -> Result<PathBuf, SkillError> {
    contained_join(repo_root, local_path, "local skill path")
}

/// Directories that may hold the package for `id` under `root`: the root
/// itself, then `<root>/<id>`. Fails if `<root>/<id>` escapes `root`.
pub fn candidate_dirs(root: &Path, id: &str) -> Result<Vec<PathBuf>, SkillError> {
    if id.is_empty() {
        return Err(SkillError::BadParams("skill id must not be empty".to_string()));
    }
    let root = normalize_path(root);
    let by_id = contained_join(&root, id, "skill id")?;
    if by_id == root {
        return Err(SkillError::BadConfig(format!(
            "skill id '{id}' does not name a directory below '{}'",
            root.display()
        )));
    }
    Ok(vec![root, by_id])
}

/// Entry file named by a package descriptor, which must stay inside the
/// package directory.
pub fn resolve_entry(package_dir: &Path, manifest: &PackageManifest) -> Result<PathBuf, SkillError> {
    let entry = contained_join(package_dir, manifest.entry_spec(), "package entry")?;
    if entry == normalize_path(package_dir) {
        return Err(SkillError::BadConfig(format!(
            "package entry of '{}' resolves to the package directory itself",
            manifest.name
        )));
    }
    Ok(entry)
}

// ---------------------------------------------------------------------------
// Probe port
// ---------------------------------------------------------------------------

/// Read-only view of candidate package directories.
pub trait PackageProbe: Send + Sync {
    /// Parse the package descriptor in `dir`; `Ok(None)` when there is none.
    fn read_manifest(
        &self,
        dir: &Path,
    ) -> impl Future<Output = Result<Option<PackageManifest>, StoreError>> + Send;

    /// True when `path` is an existing regular file.
    fn is_file(&self, path: &Path) -> impl Future<Output = bool> + Send;
}

// ---------------------------------------------------------------------------
// TrustedResolver
// ---------------------------------------------------------------------------

struct Candidate {
    dir: PathBuf,
    source: SkillSource,
}

/// Resolves skill ids against the package store and configured local roots.
pub struct TrustedResolver<P> {
    probe: P,
    repo_root: PathBuf,
    package_store: Option<PathBuf>,
}

impl<P: PackageProbe> TrustedResolver<P> {
    pub fn new(probe: P, repo_root: impl Into<PathBuf>, package_store: Option<PathBuf>) -> Self {
        Self {
            probe,
            repo_root: normalize_path(&repo_root.into()),
            package_store: package_store.map(|p| normalize_path(&p)),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Every candidate in trial order. Containment is checked for all of them
    /// before any is probed.
    fn candidates(&self, id: &str, config: &ResolveConfig) -> Result<(Vec<Candidate>, Vec<String>), SkillError> {
        let mut candidates = Vec::new();
        let mut notes = Vec::new();

        if config.package_manager {
            match &self.package_store {
                Some(store) => {
                    let dir = contained_join(store, id, "skill id")?;
                    candidates.push(Candidate {
                        source: SkillSource::PackageManager { path: dir.clone() },
                        dir,
                    });
                }
                None => notes.push("package manager: no package store configured".to_string()),
            }
        }

        for local in &config.local_paths {
            let root = resolve_local_root(&self.repo_root, local)?;
            for dir in candidate_dirs(&root, id)? {
                candidates.push(Candidate {
                    source: SkillSource::Local {
                        root: local.clone(),
                        path: dir.clone(),
                    },
                    dir,
                });
            }
        }

        Ok((candidates, notes))
    }

    /// Resolve `id` to a package whose descriptor names it and whose entry
    /// file exists. The first candidate that fully resolves wins.
    pub async fn resolve(&self, id: &str, config: &ResolveConfig) -> Result<ResolvedPackage, SkillError> {
        let (candidates, mut attempts) = self.candidates(id, config)?;

        for candidate in candidates {
            let dir = &candidate.dir;
            let manifest = match self.probe.read_manifest(dir).await {
                Ok(Some(m)) => m,
                Ok(None) => {
                    attempts.push(format!("{}: no package descriptor", dir.display()));
                    continue;
                }
                Err(e) => {
                    attempts.push(format!("{}: {e}", dir.display()));
                    continue;
                }
            };
            if manifest.name != id {
                attempts.push(format!(
                    "{}: descriptor names '{}', not '{id}'",
                    dir.display(),
                    manifest.name
                ));
                continue;
            }

            let entry = resolve_entry(dir, &manifest)?;
            if !self.probe.is_file(&entry).await {
                attempts.push(format!("{}: entry file missing", entry.display()));
                continue;
            }

            tracing::debug!(skill = %id, source = %candidate.source, entry = %entry.display(), "skill resolved");
            return Ok(ResolvedPackage {
                id: id.to_string(),
                package_dir: candidate.dir,
                entry,
                manifest,
                source: candidate.source,
            });
        }

        if attempts.is_empty() {
            attempts.push("no resolution strategy configured".to_string());
        }
        Err(SkillError::ResolveFailed {
            id: id.to_string(),
            detail: attempts.join("; "),
        })
    }
}
