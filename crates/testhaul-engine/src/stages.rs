//! The domain pipeline: combine, gather, archive, extract, publish.
//!
//! Every stage always reruns. Stages talk to each other only through files
//! under the workspace root; the closures share the read-only [`Layout`]
//! through an [`Rc`].

use std::path::{Path, PathBuf};
use std::rc::Rc;

use testhaul_config::context::BuildContext;
use testhaul_config::settings::Settings;
use testhaul_report::render::write_report;
use testhaul_report::TestResults;
use testhaul_util::http::FormPart;

use crate::error::EngineError;
use crate::filter::{has_likely_test_cases, select, ProjectFilter};
use crate::graph::{Pipeline, Stage};
use crate::listing::write_failed_list;
use crate::metadata::BuildMetadata;
use crate::publish::{
    is_release_candidate, save_to_share, send_rest, Placement, ShareTemplates, TokenSet,
    ARCHIVE_SUBDIR,
};
use crate::workspace::{discover_subprojects, Subproject};

pub const GATHER_HTML: &str = "gather-html";
pub const GATHER_XML: &str = "gather-xml";
pub const ARCHIVE: &str = "archive";
pub const EXTRACT_FAILED_LIST: &str = "extract-failed-list";
pub const BUILD_METADATA: &str = "build-metadata";
pub const PUBLISH_REST: &str = "publish-rest";
pub const PUBLISH_RC_SHARE: &str = "publish-rc-share";
pub const PUBLISH_FINAL: &str = "publish-final";
pub const CLEAN_ARTIFACTS: &str = "clean-artifacts";

/// Subdirectory of a report directory holding the raw XML results.
pub const XML_RESULTS_DIR: &str = "xmlresults";
/// Subdirectory of the root report directory holding per-subproject copies.
pub const PROJECTS_DIR: &str = "projects";
/// Result subdirectory that holds binary test output, never copied.
const BINARY_DIR: &str = "binary";

/// Title of the combined root report.
const ROOT_REPORT_TITLE: &str = "All tests";

pub fn combine_html_stage(subproject: &str) -> String {
    format!("{subproject}:combine-html")
}

pub fn combine_xml_stage(subproject: &str) -> String {
    format!("{subproject}:combine-xml")
}

/// Where every input and artifact of a run lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    results_dir: String,
    report_dir: String,
    pub archive: PathBuf,
    pub metadata: PathBuf,
    pub failed_list: PathBuf,
}

impl Layout {
    pub fn new(root: &Path, settings: &Settings) -> Self {
        Self {
            root: root.to_path_buf(),
            results_dir: settings.project.results_dir.clone(),
            report_dir: settings.project.report_dir.clone(),
            archive: root.join(&settings.artifacts.archive),
            metadata: root.join(&settings.artifacts.metadata),
            failed_list: root.join(&settings.artifacts.failed_list),
        }
    }

    pub fn results_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.results_dir)
    }

    pub fn report_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.report_dir)
    }

    pub fn xml_results_dir(&self, project_dir: &Path) -> PathBuf {
        self.report_dir(project_dir).join(XML_RESULTS_DIR)
    }

    pub fn root_report_dir(&self) -> PathBuf {
        self.report_dir(&self.root)
    }

    pub fn root_index(&self) -> PathBuf {
        self.root_report_dir().join("index.html")
    }
}

/// The stage `run` executes when none is named.
pub fn default_target(pipeline: &Pipeline) -> &'static str {
    if pipeline.contains(PUBLISH_FINAL) {
        PUBLISH_FINAL
    } else {
        EXTRACT_FAILED_LIST
    }
}

/// Build the pipeline for the workspace at `root`.
///
/// `settings` must already be resolved for the active profile. Everything
/// that can be checked without running a stage is checked here: subproject
/// directories, filter patterns, and on a build server the build facts, the
/// REST endpoint and the share template.
///
/// # Errors
/// Returns a configuration error describing the first problem found.
pub fn assemble_pipeline(
    root: &Path,
    settings: &Settings,
    ctx: &BuildContext,
) -> Result<Pipeline, EngineError> {
    settings.validate()?;
    let layout = Rc::new(Layout::new(root, settings));

    // 1. Select participating subprojects.
    let subprojects = select_subprojects(root, settings)?;
    log::info!(
        "{} participating subprojects: {}",
        subprojects.len(),
        subprojects
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    let subprojects = Rc::new(subprojects);

    let mut pipeline = Pipeline::new();

    // 2. Per-subproject report and XML collection.
    for sub in subprojects.iter() {
        register_combine_stages(&mut pipeline, &layout, sub)?;
    }

    // 3. Root aggregation, archive and failure listing.
    register_gather_stages(&mut pipeline, &layout, &subprojects)?;

    let archive_layout = Rc::clone(&layout);
    pipeline.register(
        Stage::new(ARCHIVE, move || {
            let count = testhaul_util::archive::zip_dir(
                &archive_layout.root_report_dir(),
                &archive_layout.archive,
            )?;
            log::info!("archived {count} files into {}", archive_layout.archive.display());
            Ok(())
        })
        .describe("zip the combined report")
        .depends_on(GATHER_XML),
    )?;

    let listing_layout = Rc::clone(&layout);
    pipeline.register(
        Stage::new(EXTRACT_FAILED_LIST, move || {
            if testhaul_util::fs::remove_file_if_exists(&listing_layout.failed_list)? {
                log::debug!("removed stale {}", listing_layout.failed_list.display());
            }
            write_failed_list(&listing_layout.root_index(), &listing_layout.failed_list)?;
            Ok(())
        })
        .describe("list failing tests from the combined report")
        .depends_on(ARCHIVE),
    )?;

    // 4. Build-server only: metadata and publishing.
    if ctx.on_build_server() {
        register_publish_stages(&mut pipeline, &layout, &subprojects, settings, ctx)?;
    } else {
        log::debug!("not on a build server; publish stages are not registered");
    }

    // 5. Housekeeping.
    let clean_layout = Rc::clone(&layout);
    pipeline.register(
        Stage::new(CLEAN_ARTIFACTS, move || {
            for artifact in [
                &clean_layout.failed_list,
                &clean_layout.metadata,
                &clean_layout.archive,
            ] {
                if testhaul_util::fs::remove_file_if_exists(artifact)? {
                    log::info!("removed {}", artifact.display());
                }
            }
            Ok(())
        })
        .describe("delete the archive, metadata and failure listing"),
    )?;

    Ok(pipeline)
}

fn select_subprojects(root: &Path, settings: &Settings) -> Result<Vec<Subproject>, EngineError> {
    let candidates = discover_subprojects(root, &settings.project)?;
    let filter = ProjectFilter::from_settings(&settings.product.filter)?;
    let test_sources = &settings.project.test_sources;

    let selected = select(candidates.iter().map(|s| s.name.as_str()), |name| {
        if !filter.accepts(name) {
            log::info!("subproject `{name}` is excluded by the filter");
            return Ok::<_, EngineError>(false);
        }
        Ok(has_likely_test_cases(name, &root.join(name), test_sources))
    })?;

    Ok(candidates
        .into_iter()
        .filter(|s| selected.contains(&s.name))
        .collect())
}

fn register_combine_stages(
    pipeline: &mut Pipeline,
    layout: &Rc<Layout>,
    sub: &Subproject,
) -> Result<(), EngineError> {
    let html_name = combine_html_stage(&sub.name);

    let html_layout = Rc::clone(layout);
    let html_sub = sub.clone();
    pipeline.register(
        Stage::new(&html_name, move || {
            let results = TestResults::load_dir(&html_layout.results_dir(&html_sub.dir))?;
            write_report(&results, &html_layout.report_dir(&html_sub.dir), &html_sub.name)?;
            log::info!("{}: {} tests", html_sub.name, results.total());
            Ok(())
        })
        .describe("render the subproject report"),
    )?;

    let xml_layout = Rc::clone(layout);
    let xml_sub = sub.clone();
    pipeline.register(
        Stage::new(&combine_xml_stage(&sub.name), move || {
            let count = testhaul_util::fs::copy_dir_filtered(
                &xml_layout.results_dir(&xml_sub.dir),
                &xml_layout.xml_results_dir(&xml_sub.dir),
                &[BINARY_DIR],
            )?;
            log::debug!("{}: copied {count} result files", xml_sub.name);
            Ok(())
        })
        .describe("copy raw XML results next to the subproject report")
        .depends_on(&html_name),
    )?;
    Ok(())
}

fn register_gather_stages(
    pipeline: &mut Pipeline,
    layout: &Rc<Layout>,
    subprojects: &Rc<Vec<Subproject>>,
) -> Result<(), EngineError> {
    let html_layout = Rc::clone(layout);
    let html_subs = Rc::clone(subprojects);
    pipeline.register(
        Stage::new(GATHER_HTML, move || {
            let out_dir = html_layout.root_report_dir();
            testhaul_util::fs::remove_dir_all_if_exists(&out_dir)?;

            let mut results = TestResults::default();
            for sub in html_subs.iter() {
                results.merge(TestResults::load_dir(&html_layout.xml_results_dir(&sub.dir))?);
            }
            write_report(&results, &out_dir, ROOT_REPORT_TITLE)?;
            log::info!(
                "combined {} tests from {} subprojects",
                results.total(),
                html_subs.len()
            );
            Ok(())
        })
        .describe("render the combined root report")
        .depends_on_all(subprojects.iter().map(|s| combine_xml_stage(&s.name))),
    )?;

    let xml_layout = Rc::clone(layout);
    let xml_subs = Rc::clone(subprojects);
    pipeline.register(
        Stage::new(GATHER_XML, move || {
            let projects_dir = xml_layout.root_report_dir().join(PROJECTS_DIR);
            for sub in xml_subs.iter() {
                testhaul_util::fs::copy_dir_filtered(
                    &xml_layout.report_dir(&sub.dir),
                    &projects_dir.join(&sub.name),
                    &[],
                )?;
            }
            Ok(())
        })
        .describe("copy subproject reports into the root report")
        .depends_on(GATHER_HTML),
    )?;
    Ok(())
}

fn register_publish_stages(
    pipeline: &mut Pipeline,
    layout: &Rc<Layout>,
    subprojects: &Rc<Vec<Subproject>>,
    settings: &Settings,
    ctx: &BuildContext,
) -> Result<(), EngineError> {
    let info = ctx.require_build_info()?;
    let product = &settings.product;

    let endpoint = settings
        .endpoint
        .rest
        .clone()
        .ok_or_else(|| EngineError::Config {
            key: "endpoint.rest".to_owned(),
            message: "required on the build server but not set".to_owned(),
        })?;

    let rc = product.rc.clone().unwrap_or_default();
    let is_rc = is_release_candidate(&rc);
    let tokens = TokenSet {
        version: product.version.clone(),
        rc: product.rc.clone(),
        branch: Some(info.branch.clone()),
        build_id: Some(info.build_id),
    };
    let share_template = if is_rc {
        let template = ShareTemplates::from_settings(&settings.endpoint.share)
            .select(product.patch)?
            .to_owned();
        let destination = tokens.resolve(&template)?;
        log::debug!("release candidate {rc} will be saved to {destination}");
        Some(template)
    } else {
        None
    };

    let metadata_layout = Rc::clone(layout);
    let metadata_info = info.clone();
    let metadata_version = product.version.clone();
    let metadata_rc = product.rc.clone();
    let build_type = ctx.build_server.clone();
    let projects: Vec<String> = subprojects.iter().map(|s| s.name.clone()).collect();
    pipeline.register(
        Stage::new(BUILD_METADATA, move || {
            let metadata = BuildMetadata::new(
                metadata_info.build_id,
                &metadata_info.branch,
                &metadata_info.commit,
                metadata_version.as_deref(),
                metadata_rc.as_deref(),
                build_type.as_deref(),
                projects.clone(),
            )?;
            metadata.write_to(&metadata_layout.metadata)?;
            log::info!("wrote {}", metadata_layout.metadata.display());
            Ok(())
        })
        .describe("write the build metadata JSON")
        .depends_on(EXTRACT_FAILED_LIST),
    )?;

    let rest_layout = Rc::clone(layout);
    pipeline.register(
        Stage::new(PUBLISH_REST, move || {
            let mut parts = vec![
                FormPart::new("zip_file", &rest_layout.archive),
                FormPart::new("metadata_file", &rest_layout.metadata),
            ];
            if has_content(&rest_layout.failed_list) {
                parts.push(FormPart::new("failed_junit_tests", &rest_layout.failed_list));
            }
            send_rest(&endpoint, &parts)
        })
        .describe("upload the artifacts to the REST endpoint")
        .depends_on(BUILD_METADATA),
    )?;

    let share_layout = Rc::clone(layout);
    pipeline.register(
        Stage::new(PUBLISH_RC_SHARE, move || {
            let Some(template) = share_template.as_deref() else {
                return Ok(());
            };
            let mut placements = Vec::new();
            if share_layout.failed_list.is_file() {
                placements.push(Placement::root(&share_layout.failed_list));
            }
            placements.push(Placement::root(&share_layout.metadata));
            placements.push(Placement::under(&share_layout.archive, ARCHIVE_SUBDIR));
            let destination = save_to_share(template, &tokens, &placements)?;
            log::info!("saved release candidate artifacts to {}", destination.display());
            Ok(())
        })
        .describe("save release candidate artifacts to the file share")
        .depends_on(BUILD_METADATA)
        .only_if(move || is_rc),
    )?;

    let build_id = info.build_id;
    pipeline.register(
        Stage::new(PUBLISH_FINAL, move || {
            log::info!("published test results of build {build_id}");
            Ok(())
        })
        .describe("publish everything")
        .depends_on_all([PUBLISH_REST, PUBLISH_RC_SHARE]),
    )?;
    Ok(())
}

fn has_content(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use testhaul_config::settings::{EndpointSettings, FilterSettings, ProductSettings, ShareSettings};

    use super::*;
    use crate::graph::StageOutcome;

    const PASSING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuite name="com.acme.core.MathTest" tests="2">
  <testcase name="adds" classname="com.acme.core.MathTest" time="0.01"/>
  <testcase name="skips" classname="com.acme.core.MathTest" time="0"><skipped/></testcase>
</testsuite>"#;

    const FAILING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuite name="com.acme.app.ParserTest" tests="2">
  <testcase name="parsesEmpty" classname="com.acme.app.ParserTest" time="0.01"/>
  <testcase name="parsesNested" classname="com.acme.app.ParserTest" time="0.02">
    <failure message="expected 2 but was 3">java.lang.AssertionError</failure>
  </testcase>
</testsuite>"#;

    /// A workspace with `app` (one failure), `core` (one skip) and `docs`
    /// (no tests at all).
    fn workspace() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for (name, xml, source) in [
            ("app", FAILING, "ParserTest.java"),
            ("core", PASSING, "MathTest.kt"),
        ] {
            let dir = tmp.path().join(name);
            fs::create_dir_all(dir.join("build/test-results/test/binary")).unwrap();
            fs::write(dir.join("build.gradle"), "").unwrap();
            fs::write(dir.join("build/test-results/test/TEST-suite.xml"), xml).unwrap();
            fs::write(dir.join("build/test-results/test/binary/output.bin"), b"\0").unwrap();
            let sources = dir.join(if source.ends_with(".kt") {
                "src/test/kotlin"
            } else {
                "src/test/java"
            });
            fs::create_dir_all(&sources).unwrap();
            fs::write(sources.join(source), "@Test").unwrap();
        }
        fs::create_dir_all(tmp.path().join("docs")).unwrap();
        fs::write(tmp.path().join("docs/build.gradle"), "").unwrap();
        tmp
    }

    fn build_server_ctx() -> BuildContext {
        BuildContext {
            build_id: Some(42),
            branch: Some("feature/JIRA-1".to_owned()),
            commit: Some("abc123".to_owned()),
            build_server: Some("DAILY".to_owned()),
            profile_flag: None,
        }
    }

    fn publishing_settings(rest: &str, share_root: &Path, rc: &str) -> Settings {
        Settings {
            product: ProductSettings {
                version: Some("5.3.1".to_owned()),
                rc: Some(rc.to_owned()),
                patch: Some(false),
                filter: FilterSettings::default(),
            },
            endpoint: EndpointSettings {
                rest: Some(rest.to_owned()),
                share: ShareSettings {
                    default_template: None,
                    version_template: Some(format!(
                        "{}/{{VERSION_ABx}}/{{VERSION}}/{{RC}}",
                        share_root.display()
                    )),
                    patch_template: None,
                },
            },
            ..Settings::default()
        }
    }

    fn names(pipeline: &Pipeline) -> Vec<String> {
        pipeline.stages().map(|s| s.name().to_owned()).collect()
    }

    #[test]
    fn local_pipeline_has_no_publish_stages() {
        let ws = workspace();
        let pipeline =
            assemble_pipeline(ws.path(), &Settings::default(), &BuildContext::default()).unwrap();

        let stages = names(&pipeline);
        assert!(stages.contains(&"app:combine-html".to_owned()));
        assert!(stages.contains(&"core:combine-xml".to_owned()));
        assert!(!stages.iter().any(|s| s.starts_with("docs:")));
        assert!(!pipeline.contains(BUILD_METADATA));
        assert!(!pipeline.contains(PUBLISH_FINAL));
        assert_eq!(default_target(&pipeline), EXTRACT_FAILED_LIST);
    }

    #[test]
    fn plan_orders_the_artifact_chain() {
        let ws = workspace();
        let pipeline =
            assemble_pipeline(ws.path(), &Settings::default(), &BuildContext::default()).unwrap();
        let plan = pipeline.plan(EXTRACT_FAILED_LIST).unwrap();
        assert_eq!(
            plan,
            [
                "app:combine-html",
                "app:combine-xml",
                "core:combine-html",
                "core:combine-xml",
                GATHER_HTML,
                GATHER_XML,
                ARCHIVE,
                EXTRACT_FAILED_LIST,
            ]
        );
    }

    #[test]
    fn local_run_produces_artifacts() {
        let ws = workspace();
        let root = ws.path();
        let mut pipeline =
            assemble_pipeline(root, &Settings::default(), &BuildContext::default()).unwrap();
        let report = pipeline.run(EXTRACT_FAILED_LIST).unwrap();
        assert_eq!(report.count(StageOutcome::Executed), 8);

        assert!(root.join("app/build/jUnit/index.html").is_file());
        assert!(root.join("app/build/jUnit/xmlresults/test/TEST-suite.xml").is_file());
        assert!(!root.join("app/build/jUnit/xmlresults/test/binary").exists());
        assert!(root
            .join("build/jUnit/projects/core/xmlresults/test/TEST-suite.xml")
            .is_file());
        assert!(root.join("build/jUnit/index.html").is_file());
        assert!(root.join("jUnit.zip").is_file());

        let listing = fs::read_to_string(root.join("failed_junit_tests.txt")).unwrap();
        assert!(
            listing.contains("- com.acme.app.ParserTest.parsesNested\n"),
            "listing was: {listing}"
        );
        assert!(listing.contains("There were 1 ignored jUnit tests"));
    }

    #[test]
    fn stale_listing_is_removed() {
        let ws = workspace();
        let root = ws.path();
        fs::remove_file(root.join("app/build/test-results/test/TEST-suite.xml")).unwrap();
        fs::write(root.join("failed_junit_tests.txt"), "old").unwrap();

        let mut pipeline =
            assemble_pipeline(root, &Settings::default(), &BuildContext::default()).unwrap();
        pipeline.run(EXTRACT_FAILED_LIST).unwrap();
        assert!(!root.join("failed_junit_tests.txt").exists());
    }

    #[test]
    fn filter_excludes_subproject() {
        let ws = workspace();
        let settings = Settings {
            product: ProductSettings {
                filter: FilterSettings {
                    include: vec!["*".to_owned()],
                    exclude: vec!["core".to_owned()],
                },
                ..ProductSettings::default()
            },
            ..Settings::default()
        };
        let pipeline = assemble_pipeline(ws.path(), &settings, &BuildContext::default()).unwrap();
        assert!(pipeline.contains("app:combine-html"));
        assert!(!pipeline.contains("core:combine-html"));
    }

    #[test]
    fn build_server_run_publishes_everywhere() {
        let ws = workspace();
        let root = ws.path();
        let share = tempfile::tempdir().unwrap();

        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/junit")
            .match_body(mockito::Matcher::Regex("name=\"failed_junit_tests\"".to_owned()))
            .with_status(201)
            .create();

        let settings = publishing_settings(&format!("{}/junit", server.url()), share.path(), "RC02");
        let mut pipeline = assemble_pipeline(root, &settings, &build_server_ctx()).unwrap();
        assert_eq!(default_target(&pipeline), PUBLISH_FINAL);

        let report = pipeline.run(PUBLISH_FINAL).unwrap();
        assert_eq!(report.outcome(PUBLISH_RC_SHARE), Some(StageOutcome::Executed));
        mock.assert();

        let metadata = fs::read_to_string(root.join("jUnit.json")).unwrap();
        assert_eq!(
            metadata,
            r#"{"id":42,"branch":"feature/JIRA-1","commit":"abc123","version":"5.3.1","rc":"RC02","type":"DAILY","projects":["app","core"]}"#
        );

        let dest = share.path().join("5.3.x").join("5.3.1").join("RC02");
        assert!(dest.join("jUnit.json").is_file());
        assert!(dest.join("failed_junit_tests.txt").is_file());
        assert!(dest.join("junit-qa").join("jUnit.zip").is_file());
    }

    #[test]
    fn metadata_is_created_when_its_stage_runs() {
        let ws = workspace();
        let root = ws.path();
        let share = tempfile::tempdir().unwrap();
        let settings = publishing_settings("http://127.0.0.1:9/junit", share.path(), "RC02");

        let mut pipeline = assemble_pipeline(root, &settings, &build_server_ctx()).unwrap();
        assert!(!root.join("jUnit.json").exists());

        let report = pipeline.run(BUILD_METADATA).unwrap();
        assert_eq!(report.outcome(BUILD_METADATA), Some(StageOutcome::Executed));
        assert_eq!(report.outcome(PUBLISH_FINAL), None);
        let metadata = fs::read_to_string(root.join("jUnit.json")).unwrap();
        assert!(metadata.contains(r#""projects":["app","core"]"#), "metadata was: {metadata}");
    }

    #[test]
    fn build_only_rc_skips_share() {
        let ws = workspace();
        let share = tempfile::tempdir().unwrap();

        let mut server = mockito::Server::new();
        let _mock = server.mock("POST", "/junit").with_status(200).create();

        let settings =
            publishing_settings(&format!("{}/junit", server.url()), share.path(), "RC02_build");
        let mut pipeline = assemble_pipeline(ws.path(), &settings, &build_server_ctx()).unwrap();
        let report = pipeline.run(PUBLISH_FINAL).unwrap();

        assert_eq!(report.outcome(PUBLISH_RC_SHARE), Some(StageOutcome::Skipped));
        assert_eq!(report.outcome(PUBLISH_FINAL), Some(StageOutcome::Executed));
        assert!(fs::read_dir(share.path()).unwrap().next().is_none());
    }

    #[test]
    fn rest_failure_halts_run() {
        let ws = workspace();
        let share = tempfile::tempdir().unwrap();

        let mut server = mockito::Server::new();
        let _mock = server.mock("POST", "/junit").with_status(500).create();

        let settings = publishing_settings(&format!("{}/junit", server.url()), share.path(), "RC02");
        let mut pipeline = assemble_pipeline(ws.path(), &settings, &build_server_ctx()).unwrap();
        let err = pipeline.run(PUBLISH_FINAL).unwrap_err();
        match err {
            EngineError::StageFailed { ref stage, .. } => assert_eq!(stage, PUBLISH_REST),
            other => panic!("expected StageFailed, got {other:?}"),
        }
    }

    #[test]
    fn missing_endpoint_fails_before_running() {
        let ws = workspace();
        let mut settings = publishing_settings("http://unused", ws.path(), "RC02");
        settings.endpoint.rest = None;

        let err = assemble_pipeline(ws.path(), &settings, &build_server_ctx())
            .unwrap_err()
            .to_string();
        assert!(err.contains("endpoint.rest"), "error was: {err}");
        assert!(!ws.path().join("build/jUnit").exists());
    }

    #[test]
    fn missing_build_number_fails_on_build_server() {
        let ws = workspace();
        let settings = publishing_settings("http://unused", ws.path(), "RC02");
        let ctx = BuildContext {
            build_id: None,
            ..build_server_ctx()
        };
        let err = assemble_pipeline(ws.path(), &settings, &ctx).unwrap_err().to_string();
        assert!(err.contains("BUILD_NUMBER"), "error was: {err}");
    }

    #[test]
    fn unresolvable_share_template_fails_early() {
        let ws = workspace();
        let mut settings = publishing_settings("http://unused", ws.path(), "RC02");
        settings.endpoint.share.version_template = Some("/share/{PRODUCT}/{RC}".to_owned());

        let err = assemble_pipeline(ws.path(), &settings, &build_server_ctx()).unwrap_err();
        assert!(
            matches!(err, EngineError::UnresolvedToken { ref token, .. } if token == "{PRODUCT}"),
            "error was: {err}"
        );
    }

    #[test]
    fn clean_removes_root_artifacts() {
        let ws = workspace();
        let root = ws.path();
        for name in ["jUnit.zip", "jUnit.json", "failed_junit_tests.txt", "keep.txt"] {
            fs::write(root.join(name), "x").unwrap();
        }

        let mut pipeline =
            assemble_pipeline(root, &Settings::default(), &BuildContext::default()).unwrap();
        let report = pipeline.run(CLEAN_ARTIFACTS).unwrap();
        assert_eq!(report.count(StageOutcome::Executed), 1);

        assert!(!root.join("jUnit.zip").exists());
        assert!(!root.join("jUnit.json").exists());
        assert!(!root.join("failed_junit_tests.txt").exists());
        assert!(root.join("keep.txt").exists());
    }
}
