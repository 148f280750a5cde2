use std::path::PathBuf;
use std::sync::Arc;

use annotator_build::{BuildRequest, BuildStats, Builder, CommandRunner, ModuleTarget};
use annotator_config::{AnnotatorConfig, ConfigError};
use annotator_core::Fix;
use annotator_index::SerializationVersion;
use annotator_injector::{AnnotationEdit, FileOffsetStore, InjectionReport, Injector};

use crate::snapshot::{Snapshot, SnapshotSource};
use crate::Result;

/// Everything a run mutates outside its own bookkeeping: the builds it
/// triggers and the source files it edits. Snapshots are produced here and
/// handed to each round by reference.
#[derive(Debug)]
pub struct Context {
    config: AnnotatorConfig,
    version: SerializationVersion,
    builder: Builder,
    injector: Injector,
    offsets: FileOffsetStore,
}

impl Context {
    pub fn new(config: AnnotatorConfig, runner: Arc<dyn CommandRunner>, cwd: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        let version = SerializationVersion::from_number(config.serialization_version).ok_or_else(|| {
            ConfigError::Invalid(format!("unsupported serialization_version {}", config.serialization_version))
        })?;
        let builder = Builder::new(
            runner,
            cwd,
            config.nullable_annotation.clone(),
            config.initializer_annotation.clone(),
        );
        Ok(Self {
            config,
            version,
            builder,
            injector: Injector::new(),
            offsets: FileOffsetStore::default(),
        })
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn build_stats(&self) -> BuildStats {
        self.builder.stats()
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    fn target_module(&self) -> ModuleTarget {
        ModuleTarget {
            output_dir: self.config.target_dir(),
            checker_config: self.config.target_module_info.checker_config.clone(),
            scanner_config: self.config.target_module_info.scanner_config.clone(),
        }
    }

    fn downstream_modules(&self) -> Vec<ModuleTarget> {
        self.config
            .downstream
            .modules
            .iter()
            .enumerate()
            .map(|(i, module)| ModuleTarget {
                output_dir: self.config.downstream_dir(i),
                checker_config: module.checker_config.clone(),
                scanner_config: module.scanner_config.clone(),
            })
            .collect()
    }

    fn downstream_dirs(&self) -> Vec<PathBuf> {
        (0..self.config.downstream.modules.len())
            .map(|i| self.config.downstream_dir(i))
            .collect()
    }

    /// Builds the target module and loads its reports.
    pub fn build_target(&mut self, field_init_info: bool) -> Result<Snapshot> {
        let modules = [self.target_module()];
        self.builder.build(&BuildRequest {
            script: &self.config.build_command,
            modules: &modules,
            field_init_info,
        })?;
        self.load_target()
    }

    /// Loads the target's reports from the last build.
    pub fn load_target(&self) -> Result<Snapshot> {
        let target = vec![self.config.target_dir()];
        let source = SnapshotSource {
            version: self.version,
            annotation: self.config.nullable_annotation.clone(),
            report_dirs: target.clone(),
            module_dirs: target,
            dependency_dirs: self.downstream_dirs(),
            keep_unresolved_fixes: false,
        };
        Snapshot::load(&source, &self.offsets)
    }

    /// Builds every downstream module against the target and loads their
    /// reports. Target methods are the module, downstream ones dependencies.
    pub fn build_downstream(&mut self) -> Result<Snapshot> {
        let modules = self.downstream_modules();
        self.builder.build(&BuildRequest {
            script: &self.config.downstream.build_command,
            modules: &modules,
            field_init_info: false,
        })?;
        let source = SnapshotSource {
            version: self.version,
            annotation: self.config.nullable_annotation.clone(),
            report_dirs: self.downstream_dirs(),
            module_dirs: vec![self.config.target_dir()],
            dependency_dirs: self.downstream_dirs(),
            keep_unresolved_fixes: true,
        };
        // Downstream sources are never edited, so their offsets need no mapping.
        Snapshot::load(&source, &FileOffsetStore::default())
    }

    /// Applies `edits` to the sources, recording offset maps and logging
    /// edits that could not be placed.
    pub fn apply_edits(&mut self, edits: &[AnnotationEdit]) -> Result<InjectionReport> {
        let report = self.injector.apply(edits)?;
        for (edit, outcome) in report.failures() {
            tracing::warn!(edit = %edit, outcome = ?outcome, "annotation edit failed");
        }
        self.offsets.record(&report);
        Ok(report)
    }

    pub fn inject<'a>(&mut self, fixes: impl IntoIterator<Item = &'a Fix>) -> Result<InjectionReport> {
        let edits: Vec<AnnotationEdit> = fixes.into_iter().map(AnnotationEdit::from_fix).collect();
        self.apply_edits(&edits)
    }

    pub fn remove<'a>(&mut self, fixes: impl IntoIterator<Item = &'a Fix>) -> Result<InjectionReport> {
        let edits: Vec<AnnotationEdit> = fixes
            .into_iter()
            .map(|fix| AnnotationEdit::from_fix(fix).reverse())
            .collect();
        self.apply_edits(&edits)
    }
}
