use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use annotator_ai::{ChatClient, ChatClientConfig};
use annotator_build::{CommandRunner, DefaultCommandRunner};
use annotator_config::{init_tracing, json_schema, AnalysisMode, AnnotatorConfig, ModuleInfoConfig};
use annotator_engine::{Annotator, RunSummary};
use anyhow::{Context, Result};
use clap::{Args, Parser, ValueEnum};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "annotator", version, about = "Infer @Nullable annotations by rebuilding with the analyzer attached")]
struct Cli {
    /// JSON config file; flags below are ignored when present
    #[arg(long, conflicts_with = "build_command")]
    path: Option<PathBuf>,

    #[command(flatten)]
    flags: FlagConfig,

    /// Print the config file's JSON schema and exit
    #[arg(long)]
    print_config_schema: bool,

    /// Emit the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    Local,
    LowerBound,
    UpperBound,
    Strict,
}

impl From<ModeArg> for AnalysisMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Local => AnalysisMode::Local,
            ModeArg::LowerBound => AnalysisMode::LowerBound,
            ModeArg::UpperBound => AnalysisMode::UpperBound,
            ModeArg::Strict => AnalysisMode::Strict,
        }
    }
}

#[derive(Args)]
struct FlagConfig {
    /// Command building the target module with the analyzer attached
    #[arg(long, required_unless_present_any = ["path", "print_config_schema"])]
    build_command: Option<String>,
    /// Directory for analyzer output and reports
    #[arg(long, default_value = "annotator-out")]
    output_dir: PathBuf,
    /// Analyzer settings file of the target module
    #[arg(long, requires = "build_command")]
    checker_config: Option<PathBuf>,
    /// Scanner settings file of the target module
    #[arg(long, requires = "build_command")]
    scanner_config: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "local")]
    mode: ModeArg,
    /// Maximum chain depth per fix
    #[arg(long, default_value_t = 5)]
    depth: u32,
    /// Follow fixes triggered by a tree
    #[arg(long)]
    chain: bool,
    /// Keep chaining trees that do not reduce errors
    #[arg(long)]
    disable_bailout: bool,
    #[arg(long)]
    max_rounds: Option<u32>,
    #[arg(long, default_value_t = 3)]
    serialization_version: u8,
    #[arg(long, default_value = "javax.annotation.Nullable")]
    nullable_annotation: String,
    #[arg(long, default_value = "com.uber.nullaway.annotations.Initializer")]
    initializer_annotation: String,
    #[arg(long)]
    disable_cache: bool,
    /// Stop after the first round
    #[arg(long)]
    disable_outer_loop: bool,
    /// Annotate initializer methods before the first round
    #[arg(long)]
    infer_initializers: bool,
    #[arg(long)]
    build_timeout_secs: Option<u64>,
    /// Command building every downstream module with the analyzer attached
    #[arg(long)]
    downstream_build_command: Option<String>,
    /// Downstream module as `CHECKER_CONFIG:SCANNER_CONFIG`; repeatable
    #[arg(long = "downstream-module", value_parser = parse_module)]
    downstream_modules: Vec<ModuleInfoConfig>,
    #[arg(long)]
    library_model_path: Option<PathBuf>,
    /// Rewrite methods with unfixable dereferences using a chat model
    #[arg(long)]
    ai: bool,
    #[arg(long)]
    ai_endpoint: Option<String>,
    #[arg(long)]
    ai_model: Option<String>,
    /// Log level or `EnvFilter` directives
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_module(raw: &str) -> Result<ModuleInfoConfig, String> {
    let (checker, scanner) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected CHECKER_CONFIG:SCANNER_CONFIG, got `{raw}`"))?;
    Ok(ModuleInfoConfig {
        checker_config: PathBuf::from(checker),
        scanner_config: PathBuf::from(scanner),
    })
}

impl FlagConfig {
    fn into_config(self) -> AnnotatorConfig {
        let mut config = AnnotatorConfig {
            build_command: self.build_command.unwrap_or_default(),
            target_module_info: ModuleInfoConfig {
                checker_config: self
                    .checker_config
                    .unwrap_or_else(|| self.output_dir.join("checker.xml")),
                scanner_config: self
                    .scanner_config
                    .unwrap_or_else(|| self.output_dir.join("scanner.xml")),
            },
            output_dir: self.output_dir,
            mode: self.mode.into(),
            depth: self.depth,
            chain: self.chain,
            bailout: !self.disable_bailout,
            max_rounds: self.max_rounds,
            serialization_version: self.serialization_version,
            nullable_annotation: self.nullable_annotation,
            initializer_annotation: self.initializer_annotation,
            use_cache: !self.disable_cache,
            disable_outer_loop: self.disable_outer_loop,
            infer_initializers: self.infer_initializers,
            build_timeout_secs: self.build_timeout_secs,
            ..AnnotatorConfig::default()
        };
        if let Some(command) = self.downstream_build_command {
            config.downstream.enabled = true;
            config.downstream.build_command = command;
            config.downstream.modules = self.downstream_modules;
        }
        if let Some(path) = self.library_model_path {
            config.downstream.library_model_path = path;
        }
        config.ai.enabled = self.ai;
        if let Some(endpoint) = self.ai_endpoint {
            config.ai.endpoint = endpoint;
        }
        if let Some(model) = self.ai_model {
            config.ai.model = model;
        }
        config.logging.level = self.log_level;
        config
    }
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    if cli.print_config_schema {
        println!("{}", serde_json::to_string_pretty(&json_schema())?);
        return Ok(0);
    }

    let config = match &cli.path {
        Some(path) => AnnotatorConfig::load_from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            let config = cli.flags.into_config();
            config.validate().context("invalid command line configuration")?;
            config
        }
    };
    init_tracing(&config.logging);

    let cwd = std::env::current_dir().context("failed to resolve the working directory")?;
    let runner: Arc<dyn CommandRunner> = Arc::new(DefaultCommandRunner::with_timeout(config.build_timeout()));
    let fixer = if config.ai.enabled {
        Some(chat_client(&config)?)
    } else {
        None
    };
    let output_dir = config.output_dir.clone();

    let mut annotator = Annotator::new(config, runner, cwd).context("failed to set up the annotator")?;
    if let Some(fixer) = fixer {
        annotator = annotator.with_fixer(Box::new(fixer));
    }
    let summary = annotator.run().context("annotation run failed")?;
    print_summary(&summary, &output_dir, cli.json)?;
    Ok(0)
}

fn chat_client(config: &AnnotatorConfig) -> Result<ChatClient> {
    let api_key = std::env::var(&config.ai.api_key_env).ok();
    if api_key.is_none() {
        tracing::warn!(var = %config.ai.api_key_env, "no API key in the environment; sending unauthenticated requests");
    }
    ChatClient::new(&ChatClientConfig {
        endpoint: config.ai.endpoint.clone(),
        model: config.ai.model.clone(),
        api_key,
        timeout: Duration::from_millis(config.ai.timeout_ms),
    })
    .context("failed to create the generative fix client")
}

#[derive(Serialize)]
struct SummaryOutput {
    rounds: usize,
    approved: usize,
    applied: usize,
    unfixable: usize,
    builds: u32,
    cache_hits: u32,
    elapsed_ms: u128,
    reports: PathBuf,
}

fn print_summary(summary: &RunSummary, output_dir: &std::path::Path, json: bool) -> Result<()> {
    let output = SummaryOutput {
        rounds: summary.log.rounds.len(),
        approved: summary.log.approved(),
        applied: summary.applied.len(),
        unfixable: summary.unfixable,
        builds: summary.log.total_builds,
        cache_hits: summary.log.cache_hits,
        elapsed_ms: summary.log.total_elapsed.as_millis(),
        reports: output_dir.join(annotator_engine::report::REPORTS),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    println!("rounds: {}", output.rounds);
    println!("applied: {}", output.applied);
    println!("unfixable: {}", output.unfixable);
    println!("builds: {}", output.builds);
    println!("cache_hits: {}", output.cache_hits);
    println!("elapsed_ms: {}", output.elapsed_ms);
    println!("reports: {}", output.reports.display());
    Ok(())
}
