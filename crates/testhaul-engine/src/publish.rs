//! Shipping artifacts to a REST endpoint or a file share.

use std::path::{Path, PathBuf};

use testhaul_config::settings::ShareSettings;
use testhaul_util::error::UtilError;
use testhaul_util::http::{post_multipart, FormPart};
use testhaul_util::version::{version_abcx, version_abx, version_ax};

use crate::error::{EngineError, PublishErrorKind};

/// Prefix marking a release-candidate label.
pub const RC_MARKER: &str = "RC";
/// Suffix marking a release-candidate label that is only a build, not a candidate.
pub const BUILD_ONLY_SUFFIX: &str = "_build";

/// Share subdirectory receiving the report archive.
pub const ARCHIVE_SUBDIR: &str = "junit-qa";

/// Whether `rc` names a real release candidate: `RC01` is, `RC01_build` is not.
pub fn is_release_candidate(rc: &str) -> bool {
    rc.starts_with(RC_MARKER) && !rc.ends_with(BUILD_ONLY_SUFFIX)
}

/// Turn a branch name into a single path segment: `feature/x` becomes `feature--x`.
pub fn encode_branch_name(branch: &str) -> String {
    branch.replace('/', "--")
}

/// Upload `parts` to `endpoint` as one multipart POST. Not retried.
///
/// # Errors
/// Returns [`EngineError::Publish`] with [`PublishErrorKind::Transport`] if the
/// request fails or is answered with a non-success status, and a filesystem
/// error if a part cannot be read.
pub fn send_rest(endpoint: &str, parts: &[FormPart]) -> Result<(), EngineError> {
    let status = post_multipart(endpoint, parts).map_err(|e| match e {
        UtilError::Transport { .. } => EngineError::Publish {
            kind: PublishErrorKind::Transport,
            message: e.to_string(),
        },
        other => EngineError::Util(other),
    })?;
    let fields: Vec<&str> = parts.iter().map(|p| p.field.as_str()).collect();
    log::info!(
        "uploaded {} to {endpoint} (status {status})",
        fields.join(", ")
    );
    Ok(())
}

/// The three share destinations, chosen by the patch flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareTemplates {
    pub default: Option<String>,
    pub version: Option<String>,
    pub patch: Option<String>,
}

impl ShareTemplates {
    pub fn from_settings(share: &ShareSettings) -> Self {
        Self {
            default: share.default_template.clone(),
            version: share.version_template.clone(),
            patch: share.patch_template.clone(),
        }
    }

    /// `Some(true)` selects the patch template, `Some(false)` the version
    /// template, and `None` the default template.
    ///
    /// # Errors
    /// Returns a configuration error if the selected template is not set.
    pub fn select(&self, is_patch: Option<bool>) -> Result<&str, EngineError> {
        let (key, template) = match is_patch {
            Some(true) => ("endpoint.share.patch_template", self.patch.as_deref()),
            Some(false) => ("endpoint.share.version_template", self.version.as_deref()),
            None => ("endpoint.share.default_template", self.default.as_deref()),
        };
        template.ok_or_else(|| EngineError::Config {
            key: key.to_owned(),
            message: "required for this build but not set".to_owned(),
        })
    }
}

/// Values substituted into share templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    pub version: Option<String>,
    pub rc: Option<String>,
    pub branch: Option<String>,
    pub build_id: Option<u64>,
}

const TOKENS: [&str; 7] = [
    "{VERSION}",
    "{VERSION_ABCx}",
    "{VERSION_ABx}",
    "{VERSION_Ax}",
    "{RC}",
    "{BRANCH}",
    "{BUILDID}",
];

impl TokenSet {
    /// Substitute every known token in `template`.
    ///
    /// The template is scanned once, left to right. Substituted values are
    /// never rescanned, so a branch name holding braces is copied as is. A
    /// token is `{NAME}` where NAME starts with an uppercase ASCII letter;
    /// anything else in braces, such as `{path}`, is literal text.
    ///
    /// # Errors
    /// Returns [`EngineError::MissingToken`] if a used token has no value, and
    /// [`EngineError::UnresolvedToken`] if the template holds an unknown token.
    pub fn resolve(&self, template: &str) -> Result<String, EngineError> {
        let mut resolved = String::with_capacity(template.len());
        let mut rest = template;
        while let Some((start, token)) = find_token(rest) {
            resolved.push_str(rest.get(..start).unwrap_or_default());
            if !TOKENS.contains(&token) {
                return Err(EngineError::UnresolvedToken {
                    template: template.to_owned(),
                    token: token.to_owned(),
                });
            }
            resolved.push_str(&self.value(token, template)?);
            rest = rest.get(start.saturating_add(token.len())..).unwrap_or_default();
        }
        resolved.push_str(rest);
        Ok(resolved)
    }

    fn value(&self, token: &str, template: &str) -> Result<String, EngineError> {
        let missing = |reason: &str| EngineError::MissingToken {
            template: template.to_owned(),
            token: token.to_owned(),
            reason: reason.to_owned(),
        };

        match token {
            "{VERSION}" | "{VERSION_ABCx}" | "{VERSION_ABx}" | "{VERSION_Ax}" => {
                let version = self
                    .version
                    .as_deref()
                    .ok_or_else(|| missing("no product version is configured"))?;
                let value = match token {
                    "{VERSION_ABCx}" => version_abcx(version)?,
                    "{VERSION_ABx}" => version_abx(version)?,
                    "{VERSION_Ax}" => version_ax(version)?,
                    _ => version.to_owned(),
                };
                Ok(value)
            }
            "{RC}" => self
                .rc
                .clone()
                .ok_or_else(|| missing("no release candidate is configured")),
            "{BRANCH}" => self
                .branch
                .as_deref()
                .map(encode_branch_name)
                .ok_or_else(|| missing("BRANCH_NAME is not set")),
            "{BUILDID}" => self
                .build_id
                .map(|id| id.to_string())
                .ok_or_else(|| missing("BUILD_NUMBER is not set")),
            _ => Err(missing("it is not a known token")),
        }
    }
}

/// The first `{NAME}` token in `text` and its byte offset, braces included.
fn find_token(text: &str) -> Option<(usize, &str)> {
    let mut rest = text;
    let mut offset = 0usize;
    while let Some(open) = rest.find('{') {
        let after = rest.get(open.saturating_add(1)..)?;
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let is_token = after.starts_with(|c: char| c.is_ascii_uppercase())
            && after.get(name_len..).is_some_and(|s| s.starts_with('}'));
        if is_token {
            let start = offset.saturating_add(open);
            let token = text.get(start..start.saturating_add(name_len).saturating_add(2))?;
            return Some((start, token));
        }
        offset = offset.saturating_add(open).saturating_add(1);
        rest = after;
    }
    None
}

/// A file to place on the share, optionally under a subdirectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub source: PathBuf,
    pub subdir: Option<String>,
}

impl Placement {
    pub fn root(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            subdir: None,
        }
    }

    pub fn under(source: &Path, subdir: &str) -> Self {
        Self {
            source: source.to_path_buf(),
            subdir: Some(subdir.to_owned()),
        }
    }
}

/// Resolve `template` and copy every placement into the destination.
///
/// Directories are created as needed; existing files are overwritten without
/// staging, so concurrent publishers race and the last writer wins. Returns
/// the resolved destination.
///
/// # Errors
/// Returns a token error if the template cannot be resolved, or
/// [`EngineError::Publish`] with [`PublishErrorKind::Filesystem`] naming the
/// path that could not be created or copied.
pub fn save_to_share(
    template: &str,
    tokens: &TokenSet,
    placements: &[Placement],
) -> Result<PathBuf, EngineError> {
    let destination = PathBuf::from(tokens.resolve(template)?);

    let filesystem = |e: UtilError| EngineError::Publish {
        kind: PublishErrorKind::Filesystem,
        message: e.to_string(),
    };

    testhaul_util::fs::ensure_dir(&destination).map_err(filesystem)?;
    for placement in placements {
        let dir = match &placement.subdir {
            Some(subdir) => destination.join(subdir),
            None => destination.clone(),
        };
        testhaul_util::fs::ensure_dir(&dir).map_err(filesystem)?;
        let copied = testhaul_util::fs::copy_file_into(&placement.source, &dir).map_err(filesystem)?;
        log::info!("copied {} to {}", placement.source.display(), copied.display());
    }
    Ok(destination)
}
