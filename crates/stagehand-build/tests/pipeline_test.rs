use std::path::{Path, PathBuf};

use stagehand_build::bundle::BundleError;
use stagehand_build::fingerprint::content_hash;
use stagehand_build::{BundleInvocation, BundlerRunner, Pipeline, Stage};
use stagehand_core::{BuildConfig, BuildMode, SiteLayout};
use tempfile::TempDir;

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <!-- styles -->
    <link rel="stylesheet" href="style.css">
  </head>
  <body>
    {{#scripts}}
    <script src="{{.}}"></script>
    {{/scripts}}
  </body>
</html>
"#;

const STYLE: &str = "body { color: red; }\n";

/// Writes fixed bundles into the `--output-path` directory.
struct FakeBundler {
    bundles: Vec<(&'static str, &'static str)>,
}

impl FakeBundler {
    fn single() -> Self {
        Self {
            bundles: vec![("index.js", "console.log('hi');")],
        }
    }
}

impl BundlerRunner for FakeBundler {
    fn run(&self, invocation: &BundleInvocation) -> Result<(), BundleError> {
        let out = output_path(invocation);
        for (name, content) in &self.bundles {
            std::fs::write(out.join(name), content).unwrap();
        }
        Ok(())
    }
}

struct FailingBundler;

impl BundlerRunner for FailingBundler {
    fn run(&self, invocation: &BundleInvocation) -> Result<(), BundleError> {
        Err(BundleError::Failed {
            command: invocation.to_string(),
            status: "exit status: 2".to_owned(),
            detail: "Module not found".to_owned(),
        })
    }
}

fn output_path(invocation: &BundleInvocation) -> PathBuf {
    let i = invocation
        .args
        .iter()
        .position(|a| a == "--output-path")
        .unwrap();
    PathBuf::from(&invocation.args[i + 1])
}

fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    std::fs::create_dir_all(src.join("js")).unwrap();
    std::fs::write(src.join("js/index.js"), "console.log('hi');").unwrap();
    std::fs::write(src.join("index.html"), TEMPLATE).unwrap();
    std::fs::write(src.join("style.css"), STYLE).unwrap();
    tmp
}

fn pipeline<R: BundlerRunner>(root: &Path, base: BuildConfig, runner: R) -> Pipeline<R> {
    Pipeline::with_runner(root, &SiteLayout::default(), base, runner)
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn dev_build_references_assets_verbatim() {
    let tmp = project();
    let report = pipeline(tmp.path(), BuildConfig::default(), FakeBundler::single())
        .dev()
        .unwrap();

    let dist = tmp.path().join("dist");
    let html = read(&dist.join("index.html"));
    assert_eq!(report.mode, BuildMode::Development);
    assert_eq!(report.html, dist.join("index.html"));
    assert!(html.contains(r#"<script src="index.js"></script>"#));
    assert!(html.contains(r#"href="style.css""#));
    assert!(html.contains("<!-- styles -->"));
    assert_eq!(read(&dist.join("style.css")), STYLE);
    assert!(report.references.is_empty());

    assert_eq!(report.files.stage_of(Path::new("index.js")), Some(Stage::Bundle));
    assert_eq!(report.files.stage_of(Path::new("style.css")), Some(Stage::Css));
    assert_eq!(
        report.files.stage_of(Path::new("index.html")),
        Some(Stage::Template)
    );
}

#[test]
fn prod_build_minifies_and_fingerprints() {
    let tmp = project();
    let report = pipeline(tmp.path(), BuildConfig::default(), FakeBundler::single())
        .prod()
        .unwrap();

    let dist = tmp.path().join("dist");
    let html = read(&dist.join("index.html"));
    let fingerprinted = format!("style.{}.css", content_hash(STYLE.as_bytes()));

    // attribute quotes are dropped by the minifier
    assert!(html.contains(&format!("href={fingerprinted}")), "{html}");
    assert!(!html.contains("style.css"));
    assert!(!html.contains("<!--"));
    assert!(!html.contains("\n  "));
    assert!(html.contains("<script src=index.js></script>"), "{html}");

    assert!(dist.join(&fingerprinted).is_file());
    assert!(!dist.join("style.css").exists());
    assert_eq!(report.references.get("style.css"), Some(fingerprinted.as_str()));
    assert_eq!(
        report.files.stage_of(Path::new(&fingerprinted)),
        Some(Stage::Css)
    );
    assert!(!report.files.contains(Path::new("style.css")));
    // every rewritten reference points at a file the build wrote
    for (_, target) in report.references.iter() {
        assert!(report.files.contains(Path::new(target)));
        assert!(dist.join(target).is_file());
    }
}

#[test]
fn repeated_dev_builds_are_identical() {
    let tmp = project();
    let pipeline = pipeline(tmp.path(), BuildConfig::default(), FakeBundler::single());

    let first = pipeline.dev().unwrap();
    let first_html = read(&first.html);
    let second = pipeline.dev().unwrap();

    assert_eq!(first.files, second.files);
    assert_eq!(first_html, read(&second.html));
}

#[test]
fn dev_after_prod_sees_no_production_flags() {
    let tmp = project();
    let pipeline = pipeline(tmp.path(), BuildConfig::default(), FakeBundler::single());

    pipeline.prod().unwrap();
    let report = pipeline.dev().unwrap();

    let html = read(&report.html);
    assert!(html.contains("<!-- styles -->"));
    assert!(html.contains(r#"href="style.css""#));
    assert_eq!(pipeline.base(), &BuildConfig::default());
}

#[test]
fn prod_output_is_stable_across_runs() {
    let tmp = project();
    let pipeline = pipeline(tmp.path(), BuildConfig::default(), FakeBundler::single());

    let first = pipeline.prod().unwrap();
    let second = pipeline.prod().unwrap();
    assert_eq!(first.references, second.references);
}

#[test]
fn scripts_are_listed_in_sorted_order() {
    let tmp = project();
    let bundler = FakeBundler {
        bundles: vec![("vendor.js", "v"), ("app.js", "a"), ("app.js.map", "{}")],
    };
    let report = pipeline(tmp.path(), BuildConfig::default(), bundler)
        .dev()
        .unwrap();

    let html = read(&report.html);
    let app = html.find(r#"src="app.js""#).unwrap();
    let vendor = html.find(r#"src="vendor.js""#).unwrap();
    assert!(app < vendor);
    assert!(!html.contains("app.js.map"));
}

#[test]
fn bundle_failure_stops_before_template() {
    let tmp = project();
    let err = pipeline(tmp.path(), BuildConfig::default(), FailingBundler)
        .dev()
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Bundle);
    let source = std::error::Error::source(&err).unwrap().to_string();
    assert!(source.contains("Module not found"));
    assert!(!tmp.path().join("dist/index.html").exists());
    assert!(!tmp.path().join("dist/style.css").exists());
}

#[test]
fn missing_template_fails_template_stage() {
    let tmp = project();
    std::fs::remove_file(tmp.path().join("src/index.html")).unwrap();

    let err = pipeline(tmp.path(), BuildConfig::default(), FakeBundler::single())
        .dev()
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Template);
    // earlier stages' output is left in place
    assert!(tmp.path().join("dist/index.js").exists());
}

#[test]
fn clean_removes_stale_output() {
    let tmp = project();
    let dist = tmp.path().join("dist");
    std::fs::create_dir_all(&dist).unwrap();
    std::fs::write(dist.join("stale.js"), "old").unwrap();

    let report = pipeline(tmp.path(), BuildConfig::default(), FakeBundler::single())
        .dev()
        .unwrap();

    assert!(!dist.join("stale.js").exists());
    assert!(!report.files.contains(Path::new("stale.js")));
}

#[test]
fn css_stage_can_be_disabled() {
    let tmp = project();
    let base = BuildConfig {
        css: false,
        ..BuildConfig::default()
    };
    let report = pipeline(tmp.path(), base, FakeBundler::single())
        .prod()
        .unwrap();

    let dist = tmp.path().join("dist");
    assert!(!dist.join("style.css").exists());
    assert_eq!(report.files.written_by(Stage::Css).count(), 0);
    assert!(report.references.is_empty());
    // minification still applies without the CSS stage
    assert!(!read(&report.html).contains("<!--"));
}
