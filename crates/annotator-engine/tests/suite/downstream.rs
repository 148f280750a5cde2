use std::path::{Path, PathBuf};

use annotator_config::AnalysisMode;
use annotator_engine::Annotator;
use pretty_assertions::assert_eq;
use serde_json::Value;

use super::analyzer::{
    config, downstream_config, error, method_fix, method_info, offset_of, parameter_fix, Reports, ScriptedAnalyzer,
    Workspace, DOWNSTREAM_BUILD, NO_FIX, TARGET_BUILD,
};

const CLASS: &str = "demo.Box";
const TAKE: &str = "take(java.lang.Object)";

const BOX: &str = r#"package demo;

public class Box {
    public Object get() {
        return null;
    }

    public void take(Object value) {
    }

    public Object unused() {
        return new Object();
    }
}
"#;

const MAIN: &str = r#"package app;

public class Main {
    void main(demo.Box box) {
        box.get().toString();
        box.take(box.get());
    }
}
"#;

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    target: PathBuf,
    app: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let target = root.join("lib/src/demo/Box.java");
    let app = root.join("app/src/app/Main.java");
    for (path, text) in [(&target, BOX), (&app, MAIN)] {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }
    Fixture {
        _dir: dir,
        root,
        target,
        app,
    }
}

/// `get()` returns null; nothing else in the target reports errors.
fn target_rules(path: PathBuf) -> impl Fn(&Workspace<'_>) -> Reports + Send + Sync + 'static {
    move |_: &Workspace<'_>| {
        let text = std::fs::read_to_string(&path).unwrap();
        let mut errors = Vec::new();
        if !text.contains("@Nullable public Object get()") {
            errors.push(error(
                "RETURN_NULLABLE",
                "returning @Nullable expression from method with @NonNull return type",
                (CLASS, "get()"),
                offset_of(&text, "return null"),
                &path,
                &method_fix(CLASS, "get()", &path),
            ));
        }
        Reports {
            errors,
            methods: vec![
                method_info(0, CLASS, "get()", 0, true, &path),
                method_info(1, CLASS, TAKE, 1, false, &path),
                method_info(2, CLASS, "unused()", 0, true, &path),
            ],
            class_info: vec![format!("{CLASS}\t{}", path.display())],
            ..Reports::default()
        }
    }
}

fn get_is_modeled_nullable(workspace: &Workspace<'_>) -> bool {
    workspace
        .read("library-model/nullable-methods.tsv")
        .lines()
        .any(|line| line == format!("{CLASS}\tget()"))
}

fn app_reports(errors: Vec<String>) -> Reports {
    Reports {
        errors,
        calls: vec![
            format!("app.Main\tmain(demo.Box)\tget()\t{CLASS}"),
            format!("app.Main\tmain(demo.Box)\t{TAKE}\t{CLASS}"),
        ],
        ..Reports::default()
    }
}

fn read_reports(root: &Path) -> Vec<Value> {
    let text = std::fs::read_to_string(root.join("out/reports.json")).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    value["REPORTS"].as_array().unwrap().clone()
}

#[test]
fn downstream_errors_outweigh_a_local_improvement() {
    let fixture = fixture();
    let app = fixture.app.clone();
    let (analyzer, runner) = ScriptedAnalyzer::new(&fixture.root, target_rules(fixture.target.clone()))
        .with_downstream(move |workspace| {
            let text = std::fs::read_to_string(&app).unwrap();
            let errors = if get_is_modeled_nullable(workspace) {
                ["box.get().toString()", "box.take(box.get())"]
                    .iter()
                    .map(|needle| {
                        error(
                            "DEREFERENCE_NULLABLE",
                            "dereferenced expression box.get() is @Nullable",
                            ("app.Main", "main(demo.Box)"),
                            offset_of(&text, needle),
                            &app,
                            NO_FIX,
                        )
                    })
                    .collect()
            } else {
                Vec::new()
            };
            app_reports(errors)
        })
        .into_runner();
    let mut config = downstream_config(config(&fixture.root), &fixture.root);
    config.mode = AnalysisMode::LowerBound;

    let summary = Annotator::new(config, runner, &fixture.root).unwrap().run().unwrap();

    assert!(summary.applied.is_empty());
    let source = std::fs::read_to_string(&fixture.target).unwrap();
    assert!(source.contains("    public Object get() {"), "{source}");
    assert_eq!(summary.log.downstream_seeds, 1);
    assert_eq!(
        analyzer.builds(),
        vec![TARGET_BUILD, DOWNSTREAM_BUILD, DOWNSTREAM_BUILD, TARGET_BUILD]
    );

    let reports = read_reports(&fixture.root);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["LOCAL EFFECT"], -1);
    assert_eq!(reports[0]["Lower Bound EFFECT"], 2);
    assert_eq!(reports[0]["OVERALL EFFECT"], 1);

    let model = fixture.root.join("library-model/nullable-methods.tsv");
    assert_eq!(std::fs::read_to_string(model).unwrap(), "");
}

#[test]
fn target_parameters_absorb_downstream_impact() {
    let fixture = fixture();
    let app = fixture.app.clone();
    let target = fixture.target.clone();
    let (analyzer, runner) = ScriptedAnalyzer::new(&fixture.root, target_rules(fixture.target.clone()))
        .with_downstream(move |workspace| {
            let text = std::fs::read_to_string(&app).unwrap();
            let errors = if get_is_modeled_nullable(workspace) {
                vec![error(
                    "PASS_NULLABLE",
                    "passing @Nullable parameter 'box.get()' where @NonNull is required",
                    ("app.Main", "main(demo.Box)"),
                    offset_of(&text, "box.take(box.get())"),
                    &app,
                    &parameter_fix(CLASS, TAKE, 0, &target),
                )]
            } else {
                Vec::new()
            };
            app_reports(errors)
        })
        .into_runner();
    let mut config = downstream_config(config(&fixture.root), &fixture.root);
    config.mode = AnalysisMode::LowerBound;

    let summary = Annotator::new(config, runner, &fixture.root).unwrap().run().unwrap();

    let source = std::fs::read_to_string(&fixture.target).unwrap();
    assert!(source.contains("@Nullable public Object get()"), "{source}");
    assert!(source.contains("take(@Nullable Object value)"), "{source}");
    assert_eq!(summary.applied.len(), 2);

    let reports = read_reports(&fixture.root);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["Lower Bound EFFECT"], 0);
    assert_eq!(reports[0]["OVERALL EFFECT"], -1);
    assert_eq!(
        analyzer.builds(),
        vec![TARGET_BUILD, DOWNSTREAM_BUILD, DOWNSTREAM_BUILD, TARGET_BUILD, TARGET_BUILD]
    );

    // Applied methods stay modeled as nullable for later downstream builds.
    let model = fixture.root.join("library-model/nullable-methods.tsv");
    assert_eq!(std::fs::read_to_string(model).unwrap(), format!("{CLASS}\tget()\n"));
}
