use std::path::{Path, PathBuf};

use annotator_engine::{Annotator, EngineError};
use pretty_assertions::assert_eq;
use serde_json::Value;

use super::analyzer::{
    config, error, field_fix, method_fix, method_info, offset_of, parameter_fix, Reports, ScriptedAnalyzer, Workspace, NO_FIX, TARGET_BUILD,
};

const CLASS: &str = "demo.Box";
const M: &str = "m(java.lang.Object)";

const BOX: &str = r#"package demo;

public class Box {
    Object get() {
        return null;
    }

    void run() {
        m(null);
    }

    void m(Object p) {
        p.toString();
        p.hashCode();
    }

    void use() {
        Object o = null;
        o.toString();
    }
}
"#;

fn source_path(root: &Path) -> PathBuf {
    root.join("src/demo/Box.java")
}

fn write_source(root: &Path) -> PathBuf {
    let path = source_path(root);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, BOX).unwrap();
    path
}

/// Annotating `get()` silences its return error. Annotating `m`'s parameter
/// silences the call in `run()` but surfaces two dereferences inside `m`.
/// The dereference in `use()` has no fix at all.
fn box_rules(workspace: &Workspace<'_>) -> Reports {
    let text = workspace.read("src/demo/Box.java");
    let path = source_path(workspace.root);
    let mut errors = Vec::new();
    if !text.contains("@Nullable Object get()") {
        errors.push(error(
            "RETURN_NULLABLE",
            "returning @Nullable expression from method with @NonNull return type",
            (CLASS, "get()"),
            offset_of(&text, "return null"),
            &path,
            &method_fix(CLASS, "get()", &path),
        ));
    }
    if text.contains("m(@Nullable Object p)") {
        for offset in [offset_of(&text, "p.toString()"), offset_of(&text, "p.hashCode()")] {
            errors.push(error(
                "DEREFERENCE_NULLABLE",
                "dereferenced expression p is @Nullable",
                (CLASS, M),
                offset,
                &path,
                NO_FIX,
            ));
        }
    } else {
        errors.push(error(
            "PASS_NULLABLE",
            "passing @Nullable parameter 'null' where @NonNull is required",
            (CLASS, "run()"),
            offset_of(&text, "m(null)"),
            &path,
            &parameter_fix(CLASS, M, 0, &path),
        ));
    }
    errors.push(error(
        "DEREFERENCE_NULLABLE",
        "dereferenced expression o is @Nullable",
        (CLASS, "use()"),
        offset_of(&text, "o.toString()"),
        &path,
        NO_FIX,
    ));

    Reports {
        errors,
        methods: vec![
            method_info(0, CLASS, "get()", 0, true, &path),
            method_info(1, CLASS, "run()", 0, false, &path),
            method_info(2, CLASS, M, 1, false, &path),
            method_info(3, CLASS, "use()", 0, false, &path),
        ],
        calls: vec![format!("{CLASS}\trun()\t{M}\t{CLASS}")],
        class_info: vec![format!("{CLASS}\t{}", path.display())],
        ..Reports::default()
    }
}

fn read_reports(root: &Path) -> Vec<Value> {
    let text = std::fs::read_to_string(root.join("out/reports.json")).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    value["REPORTS"].as_array().unwrap().clone()
}

#[test]
fn keeps_fixes_that_reduce_errors_and_rejects_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let path = write_source(root);
    let (analyzer, runner) = ScriptedAnalyzer::new(root, box_rules).into_runner();

    let mut annotator = Annotator::new(config(root), runner, root).unwrap();
    let summary = annotator.run().unwrap();

    let source = std::fs::read_to_string(&path).unwrap();
    assert!(source.contains("@Nullable Object get()"));
    assert!(source.contains("void m(Object p)"));
    assert!(source.contains("import javax.annotation.Nullable;"));
    assert_eq!(summary.applied.len(), 1);

    let reports = read_reports(root);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["location"]["kind"], "PARAMETER");
    assert_eq!(reports[0]["OVERALL EFFECT"], 1);
    assert_eq!(reports[1]["location"]["kind"], "METHOD");
    assert_eq!(reports[1]["OVERALL EFFECT"], -1);
    assert_eq!(reports[1]["LOCAL EFFECT"], -1);

    // Baseline, one batch, the rebuild after injection. The parameter's second
    // evaluation is served from the cache.
    assert_eq!(analyzer.builds(), vec![TARGET_BUILD; 3]);
    assert_eq!(summary.log.rounds.len(), 2);
    assert_eq!(summary.log.cache_hits, 1);
    let log = std::fs::read_to_string(root.join("out/log.txt")).unwrap();
    assert!(log.starts_with("round 1: nodes=2 batches=1 approved=1 builds=2"));
}

#[test]
fn errors_without_fixes_are_reported_unfixable() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_source(root);
    let (_, runner) = ScriptedAnalyzer::new(root, box_rules).into_runner();

    let summary = Annotator::new(config(root), runner, root).unwrap().run().unwrap();

    assert_eq!(summary.unfixable, 1);
    assert!(summary
        .reports
        .iter()
        .all(|report| report.root.location.method_signature() != Some("use()")));
    let unfixable = std::fs::read_to_string(root.join("out/unfixable.tsv")).unwrap();
    let rows: Vec<&str> = unfixable.lines().skip(1).collect();
    assert_eq!(rows.len(), 1);
    // Offsets are reported against the sources before any injection.
    let expected = format!(
        "DEREFERENCE_NULLABLE\tdereferenced expression o is @Nullable\tdemo.Box\tuse()\t{}\t",
        offset_of(BOX, "o.toString()")
    );
    assert!(rows[0].starts_with(&expected), "{}", rows[0]);
}

#[test]
fn a_single_round_when_the_outer_loop_is_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_source(root);
    let (analyzer, runner) = ScriptedAnalyzer::new(root, box_rules).into_runner();
    let mut config = config(root);
    config.disable_outer_loop = true;
    config.use_cache = false;

    let summary = Annotator::new(config, runner, root).unwrap().run().unwrap();

    assert_eq!(summary.log.rounds.len(), 1);
    assert_eq!(summary.log.cache_hits, 0);
    assert_eq!(analyzer.builds().len(), 3);
}

#[test]
fn failed_builds_without_reports_abort_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_source(root);
    let (_, runner) = ScriptedAnalyzer::new(root, box_rules).failing().into_runner();

    let err = Annotator::new(config(root), runner, root).unwrap().run().unwrap_err();
    assert!(matches!(err, EngineError::Build(_)), "{err}");
    assert_eq!(std::fs::read_to_string(source_path(root)).unwrap(), BOX);
}

#[test]
fn invalid_configs_are_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let (_, runner) = ScriptedAnalyzer::new(dir.path(), box_rules).into_runner();
    let mut config = config(dir.path());
    config.serialization_version = 2;
    assert!(matches!(
        Annotator::new(config, runner, dir.path()),
        Err(EngineError::Config(_))
    ));
}

const INIT: &str = r#"package demo;

public class Service {
    Object client;
    Object cache;

    void setUp() {
        client = new Object();
        cache = new Object();
    }
}
"#;

#[test]
fn infers_initializer_methods_before_the_main_loop() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let path = root.join("src/demo/Service.java");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, INIT).unwrap();

    let rule_path = path.clone();
    let (_, runner) = ScriptedAnalyzer::new(root, move |workspace| {
        let text = workspace.read("src/demo/Service.java");
        let path = &rule_path;
        let mut errors = Vec::new();
        if !text.contains("@Initializer") {
            for field in ["client", "cache"] {
                errors.push(error(
                    "FIELD_NO_INIT",
                    &format!("@NonNull field {field} not initialized"),
                    ("demo.Service", "null"),
                    offset_of(&text, &format!("Object {field};")),
                    path,
                    &field_fix("demo.Service", field, path),
                ));
            }
        }
        Reports {
            errors,
            class_info: vec![format!("demo.Service\t{}", path.display())],
            field_init: ["client", "cache"]
                .iter()
                .map(|field| format!("METHOD\tdemo.Service\tsetUp()\t{field}\t0\t{}", path.display()))
                .collect(),
            ..Reports::default()
        }
    })
    .into_runner();
    let mut config = config(root);
    config.infer_initializers = true;

    let summary = Annotator::new(config, runner, root).unwrap().run().unwrap();

    assert_eq!(summary.log.initializers, 1);
    let source = std::fs::read_to_string(&path).unwrap();
    assert!(source.contains("@Initializer void setUp()"));
    assert!(source.contains("import com.uber.nullaway.annotations.Initializer;"));
    assert_eq!(summary.unfixable, 0);
}

const CHAIN: &str = r#"package demo;

public class Chain {
    Object a() {
        return null;
    }

    Object b() {
        return a();
    }
}
"#;

/// Annotating `a()` moves its error into `b()`, whose own fix only shows up
/// once `a()` is annotated. Both together clear the class.
fn chain_rules(workspace: &Workspace<'_>) -> Reports {
    let text = workspace.read("src/demo/Chain.java");
    let path = workspace.root.join("src/demo/Chain.java");
    let mut errors = Vec::new();
    let a_nullable = text.contains("@Nullable Object a()");
    if !a_nullable {
        errors.push(error(
            "RETURN_NULLABLE",
            "returning @Nullable expression from method with @NonNull return type",
            ("demo.Chain", "a()"),
            offset_of(&text, "return null"),
            &path,
            &method_fix("demo.Chain", "a()", &path),
        ));
    } else if !text.contains("@Nullable Object b()") {
        errors.push(error(
            "RETURN_NULLABLE",
            "returning @Nullable expression from method with @NonNull return type",
            ("demo.Chain", "b()"),
            offset_of(&text, "return a()"),
            &path,
            &method_fix("demo.Chain", "b()", &path),
        ));
    }
    Reports {
        errors,
        methods: vec![
            method_info(0, "demo.Chain", "a()", 0, true, &path),
            method_info(1, "demo.Chain", "b()", 0, true, &path),
        ],
        calls: vec!["demo.Chain\tb()\ta()\tdemo.Chain".to_string()],
        class_info: vec![format!("demo.Chain\t{}", path.display())],
        ..Reports::default()
    }
}

fn run_chain(configure: impl FnOnce(&mut annotator_config::AnnotatorConfig)) -> (tempfile::TempDir, Vec<String>, Value) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let path = root.join("src/demo/Chain.java");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, CHAIN).unwrap();
    let (analyzer, runner) = ScriptedAnalyzer::new(root, chain_rules).into_runner();
    let mut config = config(root);
    configure(&mut config);

    Annotator::new(config, runner, root).unwrap().run().unwrap();

    let reports = read_reports(root);
    assert_eq!(reports.len(), 1);
    (dir, analyzer.builds(), reports[0].clone())
}

fn chain_source(dir: &tempfile::TempDir) -> String {
    std::fs::read_to_string(dir.path().join("src/demo/Chain.java")).unwrap()
}

#[test]
fn triggered_fixes_are_chained_into_the_tree() {
    let (dir, builds, report) = run_chain(|config| {
        config.chain = true;
        config.depth = 2;
        config.bailout = false;
    });

    let source = chain_source(&dir);
    assert!(source.contains("@Nullable Object a()"), "{source}");
    assert!(source.contains("@Nullable Object b()"), "{source}");
    assert_eq!(report["LOCAL EFFECT"], -1);
    assert_eq!(report["FINISHED"], true);
    let tree = report["TREE"].as_array().unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0]["location"]["method"], "b()");
    // Baseline, two chained passes, the rebuild after injection.
    assert_eq!(builds.len(), 4);
}

#[test]
fn without_chaining_the_moved_error_cancels_the_gain() {
    let (dir, builds, report) = run_chain(|_| {});

    assert_eq!(chain_source(&dir), CHAIN);
    assert_eq!(report["LOCAL EFFECT"], 0);
    assert_eq!(report["TREE"].as_array().unwrap().len(), 0);
    assert_eq!(builds.len(), 2);
}

#[test]
fn a_depth_of_one_stops_before_the_triggered_fix() {
    let (dir, builds, report) = run_chain(|config| {
        config.chain = true;
        config.depth = 1;
        config.bailout = false;
    });

    assert_eq!(chain_source(&dir), CHAIN);
    assert_eq!(report["LOCAL EFFECT"], 0);
    assert_eq!(report["FINISHED"], false);
    assert_eq!(builds.len(), 2);
}

#[test]
fn bailout_drops_nodes_that_did_not_reduce_errors() {
    let (dir, builds, report) = run_chain(|config| {
        config.chain = true;
        config.depth = 5;
        config.bailout = true;
    });

    assert_eq!(chain_source(&dir), CHAIN);
    assert_eq!(report["LOCAL EFFECT"], 0);
    assert_eq!(report["OVERALL EFFECT"], 0);
    // The triggered fix on `b()` was found but never explored.
    assert_eq!(report["FINISHED"], false);
    assert_eq!(builds.len(), 2);
}
