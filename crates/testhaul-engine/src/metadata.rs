//! The JSON record describing one pipeline run.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Build facts published next to the report archive.
///
/// Serialized with keys in the order `id, branch, commit, version, rc, type,
/// projects`. Absent optionals are written as `null`, and an empty string
/// stays an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    id: u64,
    branch: String,
    commit: String,
    version: Option<String>,
    rc: Option<String>,
    #[serde(rename = "type")]
    build_type: Option<String>,
    projects: Vec<String>,
}

impl BuildMetadata {
    /// Assemble the record. `projects` keeps its order.
    ///
    /// # Errors
    /// Returns [`EngineError::DuplicateProject`] if a project name repeats.
    pub fn new(
        id: u64,
        branch: &str,
        commit: &str,
        version: Option<&str>,
        rc: Option<&str>,
        build_type: Option<&str>,
        projects: Vec<String>,
    ) -> Result<Self, EngineError> {
        let metadata = Self {
            id,
            branch: branch.to_owned(),
            commit: commit.to_owned(),
            version: version.map(str::to_owned),
            rc: rc.map(str::to_owned),
            build_type: build_type.map(str::to_owned),
            projects,
        };
        metadata.check_projects()?;
        Ok(metadata)
    }

    fn check_projects(&self) -> Result<(), EngineError> {
        let mut seen = BTreeSet::new();
        for name in &self.projects {
            if !seen.insert(name.as_str()) {
                return Err(EngineError::DuplicateProject { name: name.clone() });
            }
        }
        Ok(())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn rc(&self) -> Option<&str> {
        self.rc.as_deref()
    }

    pub fn build_type(&self) -> Option<&str> {
        self.build_type.as_deref()
    }

    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    /// Compact JSON. Identical records always produce identical bytes.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(|e| EngineError::Metadata {
            message: e.to_string(),
        })
    }

    /// Parse a record produced by [`BuildMetadata::serialize`].
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or lists a project twice.
    pub fn deserialize(json: &str) -> Result<Self, EngineError> {
        let metadata: Self = serde_json::from_str(json).map_err(|e| EngineError::Metadata {
            message: e.to_string(),
        })?;
        metadata.check_projects()?;
        Ok(metadata)
    }

    /// Write the JSON record to `path` through a temporary file, so readers
    /// never observe a partial document.
    ///
    /// # Errors
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), EngineError> {
        let content = self.serialize()?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content).map_err(|source| EngineError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
        if let Err(source) = std::fs::rename(&tmp_path, path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(EngineError::Io {
                path: path.display().to_string(),
                source,
            });
        }
        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use super::BuildMetadata;

    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    proptest! {
        #[test]
        fn round_trip(
            id in 0u64..u64::MAX,
            branch in ".*",
            commit in "[a-f0-9]{0,40}",
            version in proptest::option::of(".*"),
            rc in proptest::option::of("RC[0-9]{2}(_build)?"),
            build_type in proptest::option::of("[A-Z]{0,8}"),
            names in proptest::collection::btree_set("[a-z][a-z0-9-]{0,12}", 0..6),
        ) {
            let projects: Vec<String> = names.into_iter().collect();
            let metadata = BuildMetadata::new(
                id,
                &branch,
                &commit,
                version.as_deref(),
                rc.as_deref(),
                build_type.as_deref(),
                projects,
            );
            prop_assert!(metadata.is_ok());
            if let Ok(metadata) = metadata {
                let json = metadata.serialize();
                prop_assert!(json.is_ok());
                let json = json.unwrap_or_default();
                for key in ["\"version\":", "\"rc\":", "\"type\":"] {
                    prop_assert!(json.contains(key));
                }
                let back = BuildMetadata::deserialize(&json);
                prop_assert!(back.is_ok());
                if let Ok(back) = back {
                    prop_assert_eq!(back, metadata);
                }
            }
        }
    }
}
