//! Locating the subprojects of a multi-project build.

use std::path::{Path, PathBuf};

use testhaul_config::settings::ProjectSettings;

use crate::error::EngineError;

const BUILD_FILES: [&str; 2] = ["build.gradle", "build.gradle.kts"];

/// A participating subproject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subproject {
    pub name: String,
    pub dir: PathBuf,
}

/// The subprojects under `root`, before filtering.
///
/// Configured names are returned in configured order. Without a configured
/// list, every immediate child directory holding a build file or a results
/// directory is a subproject, sorted by name.
///
/// # Errors
/// Returns a configuration error if a configured subproject has no directory,
/// or an I/O error if `root` cannot be listed.
pub fn discover_subprojects(root: &Path, project: &ProjectSettings) -> Result<Vec<Subproject>, EngineError> {
    if let Some(names) = &project.subprojects {
        return names
            .iter()
            .map(|name| {
                let dir = root.join(name);
                if dir.is_dir() {
                    Ok(Subproject {
                        name: name.clone(),
                        dir,
                    })
                } else {
                    Err(EngineError::Config {
                        key: "project.subprojects".to_owned(),
                        message: format!("subproject `{name}` has no directory at {}", dir.display()),
                    })
                }
            })
            .collect();
    }

    let mut found = Vec::new();
    for dir in testhaul_util::fs::read_dir_sorted(root)? {
        if !dir.is_dir() || !looks_like_subproject(&dir, &project.results_dir) {
            continue;
        }
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            log::warn!("skipping subproject with non-UTF-8 name: {}", dir.display());
            continue;
        };
        found.push(Subproject {
            name: name.to_owned(),
            dir: dir.clone(),
        });
    }
    log::debug!("discovered {} subprojects under {}", found.len(), root.display());
    Ok(found)
}

fn looks_like_subproject(dir: &Path, results_dir: &str) -> bool {
    BUILD_FILES.iter().any(|f| dir.join(f).is_file()) || dir.join(results_dir).is_dir()
}
