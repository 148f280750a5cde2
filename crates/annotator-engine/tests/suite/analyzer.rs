//! A scripted stand-in for the analyzer-instrumented build.
//!
//! Each "build" reads the current sources, asks a rule closure which reports
//! the analyzer would produce for them, and writes those reports as TSV files
//! into the module's output directory.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use annotator_build::{CommandOutput, CommandRunner, ShellCommand};
use annotator_config::{AnnotatorConfig, DownstreamConfig, ModuleInfoConfig};

pub const TARGET_BUILD: &str = "build-target";
pub const DOWNSTREAM_BUILD: &str = "build-downstream";
pub const NO_FIX: &str = "null\tnull\tnull\tnull\tnull\tnull";

/// Rows of one build's reports, without headers.
#[derive(Debug, Default, Clone)]
pub struct Reports {
    pub errors: Vec<String>,
    pub methods: Vec<String>,
    pub calls: Vec<String>,
    pub field_init: Vec<String>,
    pub class_info: Vec<String>,
}

/// The files a rule may inspect.
pub struct Workspace<'a> {
    pub root: &'a Path,
}

impl Workspace<'_> {
    /// Contents of `relative`, or an empty string if it does not exist.
    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.root.join(relative)).unwrap_or_default()
    }
}

type Rule = Box<dyn Fn(&Workspace<'_>) -> Reports + Send + Sync>;

pub struct ScriptedAnalyzer {
    root: PathBuf,
    target: Rule,
    downstream: Option<Rule>,
    builds: Mutex<Vec<String>>,
    /// Target builds exit non-zero without writing reports.
    fail_target: bool,
}

impl std::fmt::Debug for ScriptedAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedAnalyzer").field("root", &self.root).finish_non_exhaustive()
    }
}

impl ScriptedAnalyzer {
    pub fn new(root: &Path, target: impl Fn(&Workspace<'_>) -> Reports + Send + Sync + 'static) -> Self {
        Self {
            root: root.to_path_buf(),
            target: Box::new(target),
            downstream: None,
            builds: Mutex::new(Vec::new()),
            fail_target: false,
        }
    }

    pub fn with_downstream(mut self, rule: impl Fn(&Workspace<'_>) -> Reports + Send + Sync + 'static) -> Self {
        self.downstream = Some(Box::new(rule));
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_target = true;
        self
    }

    pub fn builds(&self) -> Vec<String> {
        self.builds.lock().unwrap().clone()
    }

    pub fn into_runner(self) -> (Arc<Self>, Arc<dyn CommandRunner>) {
        let analyzer = Arc::new(self);
        let runner: Arc<dyn CommandRunner> = analyzer.clone();
        (analyzer, runner)
    }
}

fn write_table(path: PathBuf, header: &str, rows: &[String]) -> std::io::Result<()> {
    let mut text = format!("{header}\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    std::fs::write(path, text)
}

fn write_reports(dir: &Path, reports: &Reports) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    write_table(
        dir.join("errors.tsv"),
        "kind\tmessage\tclass\tmember\toffset\tpath\tloc_kind\tloc_class\tloc_method\tloc_var\tloc_index\tloc_path",
        &reports.errors,
    )?;
    write_table(
        dir.join("method_info.tsv"),
        "id\tclass\tmethod\tparent\tsize\tflags\tnullable\tvisibility\tnon_primitive\tpath",
        &reports.methods,
    )?;
    write_table(dir.join("call_graph.tsv"), "caller_class\tcaller_member\tmember\tcallee_class", &reports.calls)?;
    write_table(dir.join("field_graph.tsv"), "caller_class\tcaller_member\tfield\tcallee_class", &[])?;
    write_table(dir.join("class_info.tsv"), "class\tpath", &reports.class_info)?;
    write_table(dir.join("field_init.tsv"), "kind\tclass\tmethod\tfield\tindex\tpath", &reports.field_init)
}

impl CommandRunner for ScriptedAnalyzer {
    fn run(&self, command: &ShellCommand) -> std::io::Result<CommandOutput> {
        self.builds.lock().unwrap().push(command.script.clone());
        let workspace = Workspace { root: &self.root };
        let (dir, rule) = match command.script.as_str() {
            TARGET_BUILD if self.fail_target => {
                return Ok(CommandOutput {
                    code: Some(1),
                    stdout: String::new(),
                    stderr: "error: cannot find symbol".into(),
                })
            }
            TARGET_BUILD => (self.root.join("out/0"), Some(&self.target)),
            DOWNSTREAM_BUILD => (self.root.join("out/1"), self.downstream.as_ref()),
            other => panic!("unexpected build command {other}"),
        };
        let Some(rule) = rule else {
            panic!("no downstream rule configured");
        };
        let reports = rule(&workspace);
        let code = if reports.errors.is_empty() { 0 } else { 1 };
        write_reports(&dir, &reports)?;
        Ok(CommandOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: format!("{} errors", reports.errors.len()),
        })
    }
}

pub fn config(root: &Path) -> AnnotatorConfig {
    AnnotatorConfig {
        build_command: TARGET_BUILD.into(),
        output_dir: root.join("out"),
        target_module_info: ModuleInfoConfig {
            checker_config: root.join("config/checker.xml"),
            scanner_config: root.join("config/scanner.xml"),
        },
        ..AnnotatorConfig::default()
    }
}

pub fn downstream_config(mut config: AnnotatorConfig, root: &Path) -> AnnotatorConfig {
    config.downstream = DownstreamConfig {
        enabled: true,
        build_command: DOWNSTREAM_BUILD.into(),
        modules: vec![ModuleInfoConfig {
            checker_config: root.join("config/app-checker.xml"),
            scanner_config: root.join("config/app-scanner.xml"),
        }],
        library_model_path: root.join("library-model"),
    };
    config
}

pub fn error(kind: &str, message: &str, region: (&str, &str), offset: u32, path: &Path, fix: &str) -> String {
    format!(
        "{kind}\t{message}\t{}\t{}\t{offset}\t{}\t{fix}",
        region.0,
        region.1,
        path.display()
    )
}

/// Byte offset of `needle` in `text`, as the analyzer would report it.
pub fn offset_of(text: &str, needle: &str) -> u32 {
    text.find(needle).unwrap_or_else(|| panic!("{needle} not in source")) as u32
}

pub fn field_fix(class: &str, field: &str, path: &Path) -> String {
    format!("FIELD\t{class}\tnull\t{field}\t0\t{}", path.display())
}

pub fn method_fix(class: &str, method: &str, path: &Path) -> String {
    format!("METHOD\t{class}\t{method}\tnull\t0\t{}", path.display())
}

pub fn parameter_fix(class: &str, method: &str, index: usize, path: &Path) -> String {
    format!("PARAMETER\t{class}\t{method}\tnull\t{index}\t{}", path.display())
}

/// One `method_info.tsv` row for a public method without parents.
pub fn method_info(id: i64, class: &str, method: &str, params: usize, non_primitive: bool, path: &Path) -> String {
    let flags = vec!["false"; params].join(",");
    format!(
        "{id}\t{class}\t{method}\t-1\t{params}\t[{flags}]\tfalse\tpublic\t{non_primitive}\t{}",
        path.display()
    )
}
