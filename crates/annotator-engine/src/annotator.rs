//! The outer loop: evaluate every suggested fix, keep the ones that remove
//! errors, rebuild, repeat until nothing more helps.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use annotator_ai::MethodFixer;
use annotator_build::CommandRunner;
use annotator_config::{AnalysisMode, AnnotatorConfig};
use annotator_core::{Fix, Location};

use crate::cache::EffectCache;
use crate::context::Context;
use crate::downstream::{DownstreamImpactModel, DownstreamModel, LocalOnly};
use crate::evaluator::evaluate;
use crate::generative::apply_generative_fixes;
use crate::graph::{Expansion, Node};
use crate::initializer::infer_initializers;
use crate::report::{self, Report, RoundLog, RunLog};
use crate::snapshot::Snapshot;
use crate::Result;

/// Knobs of one round, copied out of the config.
#[derive(Debug, Clone, Copy)]
struct RoundSettings {
    mode: AnalysisMode,
    chain: bool,
    depth: u32,
    bailout: bool,
    use_cache: bool,
}

impl RoundSettings {
    fn from_config(config: &AnnotatorConfig) -> Self {
        Self {
            mode: config.mode,
            chain: config.chain,
            depth: config.depth,
            bailout: config.bailout,
            use_cache: config.use_cache,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Latest report per root fix.
    pub reports: Vec<Report>,
    /// Every fix injected into the target sources.
    pub applied: BTreeSet<Fix>,
    pub unfixable: usize,
    pub log: RunLog,
}

pub struct Annotator {
    ctx: Context,
    fixer: Option<Box<dyn MethodFixer>>,
}

impl Annotator {
    pub fn new(config: AnnotatorConfig, runner: Arc<dyn CommandRunner>, cwd: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            ctx: Context::new(config, runner, cwd)?,
            fixer: None,
        })
    }

    /// Enables method rewrites for unfixable dereferences when the config
    /// turns them on.
    pub fn with_fixer(mut self, fixer: Box<dyn MethodFixer>) -> Self {
        self.fixer = Some(fixer);
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        let started = Instant::now();
        let config = self.ctx.config().clone();
        let settings = RoundSettings::from_config(&config);
        let mut log = RunLog::default();

        let mut snapshot = self.ctx.build_target(config.infer_initializers)?;
        if config.infer_initializers {
            log.initializers = infer_initializers(&mut self.ctx, &snapshot)?;
            if log.initializers > 0 {
                snapshot = self.ctx.build_target(false)?;
            }
        }

        let mut downstream: Box<dyn DownstreamModel> = if config.mode.uses_downstream() {
            let model = DownstreamImpactModel::analyze(&mut self.ctx, &snapshot.methods)?;
            log.downstream_seeds = model.seeds().count();
            Box::new(model)
        } else {
            Box::new(LocalOnly)
        };

        let mut cache = EffectCache::default();
        let mut reports: BTreeMap<Location, Report> = BTreeMap::new();
        let mut applied: BTreeSet<Fix> = BTreeSet::new();
        let mut round: u32 = 0;
        loop {
            round += 1;
            let round_started = Instant::now();
            let builds_before = self.ctx.build_stats().builds;

            let candidates: Vec<Fix> = snapshot
                .candidate_fixes()
                .into_iter()
                .filter(|fix| !applied.contains(fix))
                .collect();
            if candidates.is_empty() {
                tracing::info!(round, "no candidate fixes left");
                break;
            }
            let node_count = candidates.len();
            let (verdicts, batches) = self.run_round(&snapshot, candidates, downstream.as_ref(), settings, &mut cache)?;

            let approved: BTreeSet<Fix> = verdicts
                .iter()
                .filter(|report| report.approved)
                .flat_map(|report| report.tree.iter().cloned())
                .filter(|fix| !applied.contains(fix))
                .collect();
            for verdict in verdicts {
                reports.insert(verdict.root.location.clone(), verdict);
            }

            if !approved.is_empty() {
                let approved_list: Vec<Fix> = approved.iter().cloned().collect();
                self.ctx.inject(&approved_list)?;
                downstream.update_impacts_after_injection(&approved_list)?;
                applied.extend(approved_list);
                snapshot = self.ctx.build_target(false)?;
            }

            log.rounds.push(RoundLog {
                nodes: node_count,
                batches,
                approved: approved.len(),
                builds: self.ctx.build_stats().builds - builds_before,
                elapsed: round_started.elapsed(),
            });
            tracing::info!(round, nodes = node_count, batches, approved = approved.len(), "round finished");

            if approved.is_empty() {
                break;
            }
            if config.disable_outer_loop || config.max_rounds.is_some_and(|max| round >= max) {
                tracing::info!(round, "stopping at the round limit");
                break;
            }
        }

        if config.ai.enabled {
            if let Some(fixer) = self.fixer.as_deref() {
                let (after, outcome) = apply_generative_fixes(&mut self.ctx, fixer, snapshot)?;
                snapshot = after;
                log.generative_attempts = outcome.attempted;
                log.generative_kept = outcome.kept;
            }
        }

        let unfixable = snapshot.unfixable_errors();
        log.cache_hits = cache.hits();
        log.total_builds = self.ctx.build_stats().builds;
        log.total_elapsed = started.elapsed();

        let reports: Vec<Report> = reports.into_values().collect();
        report::write_reports(&config.output_dir.join(report::REPORTS), &reports, config.chain)?;
        report::write_unfixable(&config.output_dir.join(report::UNFIXABLE), &unfixable)?;
        log.write(&config.output_dir.join(report::LOG))?;
        tracing::info!(
            rounds = log.rounds.len(),
            applied = applied.len(),
            unfixable = unfixable.len(),
            builds = log.total_builds,
            "annotation finished"
        );

        Ok(RunSummary {
            reports,
            applied,
            unfixable: unfixable.len(),
            log,
        })
    }

    /// Expands, scores and judges one node per candidate. Returns the
    /// reports and the number of batches built.
    fn run_round(
        &mut self,
        snapshot: &Snapshot,
        candidates: Vec<Fix>,
        downstream: &dyn DownstreamModel,
        settings: RoundSettings,
        cache: &mut EffectCache,
    ) -> Result<(Vec<Report>, usize)> {
        let annotation = self.ctx.config().nullable_annotation.clone();
        let scheduled: BTreeSet<Location> = candidates.iter().map(|fix| fix.location.clone()).collect();
        let expansion = Expansion {
            methods: &snapshot.methods,
            fields: &snapshot.fields,
            downstream,
            annotation: &annotation,
        };
        let tracker = snapshot.tracker();

        let mut nodes: Vec<Node> = candidates
            .into_iter()
            .enumerate()
            .map(|(id, root)| {
                let mut node = Node::new(id, root);
                node.set_root_source(&snapshot.fixes, &snapshot.fields);
                node.expand(&expansion, &scheduled);
                node.update_regions(&tracker);
                node
            })
            .collect();

        // A node without regions cannot change any error count.
        let mut active: Vec<usize> = (0..nodes.len()).filter(|&i| !nodes[i].regions.is_empty()).collect();
        let passes = if settings.chain { settings.depth } else { 1 };
        let mut batches = 0;
        for pass in 0..passes {
            if active.is_empty() {
                break;
            }
            let cache = settings.use_cache.then_some(&mut *cache);
            batches += evaluate(&mut self.ctx, snapshot, &mut nodes, &active, cache)?;
            if !settings.chain || pass + 1 == passes {
                break;
            }
            active.retain(|&i| {
                let node = &nodes[i];
                node.changed && !(settings.bailout && node.effect >= 0)
            });
            for &i in &active {
                let node = &mut nodes[i];
                node.merge_triggered();
                node.expand(&expansion, &scheduled);
                node.update_regions(&tracker);
                tracing::debug!(node = node.id, pass = pass + 1, tree = node.tree.len(), "chaining node");
            }
        }

        let verdicts = nodes
            .into_iter()
            .map(|node| judge(node, downstream, settings.mode))
            .collect();
        Ok((verdicts, batches))
    }
}

/// Combines the local effect with downstream bounds per `mode`. Only a
/// strictly negative overall effect is approved.
fn judge(node: Node, downstream: &dyn DownstreamModel, mode: AnalysisMode) -> Report {
    let lower_bound = downstream.lower_bound(&node.tree);
    let upper_bound = downstream.upper_bound(&node.tree);
    let overall_effect = match mode {
        AnalysisMode::Local => node.effect,
        AnalysisMode::LowerBound | AnalysisMode::Strict => node.effect + lower_bound,
        AnalysisMode::UpperBound => node.effect + upper_bound,
    };
    let blocked = mode == AnalysisMode::Strict && node.tree.iter().any(|fix| downstream.is_not_fixable_on_target(fix));
    let approved = !node.regions.is_empty() && overall_effect < 0 && !blocked;
    if blocked {
        tracing::debug!(root = %node.root.location, "tree triggers downstream errors not fixable on target");
    }
    Report {
        finished: node.triggered.is_empty(),
        local_effect: node.effect,
        lower_bound,
        upper_bound,
        overall_effect,
        approved,
        tree: node.tree,
        root: node.root,
    }
}
