//! Scores fix trees by injecting them and rebuilding.

use std::collections::BTreeSet;

use annotator_core::{Fix, Location};

use crate::cache::EffectCache;
use crate::context::Context;
use crate::graph::{partition, Node};
use crate::snapshot::Snapshot;
use crate::Result;

/// Scores `active` nodes against `baseline`, one build per batch of
/// non-conflicting nodes. Sources are restored after every batch. Returns
/// the number of batches.
pub fn evaluate(
    ctx: &mut Context,
    baseline: &Snapshot,
    nodes: &mut [Node],
    active: &[usize],
    cache: Option<&mut EffectCache>,
) -> Result<usize> {
    let mut cache = cache;
    let refs: Vec<&Node> = active.iter().map(|&i| &nodes[i]).collect();
    let batches: Vec<Vec<usize>> = partition(&refs)
        .into_iter()
        .map(|batch| batch.into_iter().map(|k| active[k]).collect())
        .collect();

    for (number, batch) in batches.iter().enumerate() {
        tracing::info!(batch = number + 1, of = batches.len(), nodes = batch.len(), "evaluating batch");
        let batch_locations: BTreeSet<Location> = batch.iter().flat_map(|&i| nodes[i].locations()).collect();

        let mut scored: Vec<(usize, i32, Vec<Fix>)> = Vec::new();
        let mut pending: Vec<(usize, u64)> = Vec::new();
        for &i in batch {
            let fingerprint = baseline.fingerprint(&nodes[i].regions);
            match cache.as_deref_mut().and_then(|cache| cache.get(&nodes[i].locations(), fingerprint)) {
                Some(hit) => {
                    tracing::debug!(node = nodes[i].id, "reusing cached evaluation");
                    scored.push((i, hit.local_effect, hit.reported));
                }
                None => pending.push((i, fingerprint)),
            }
        }

        if !pending.is_empty() {
            let fixes: BTreeSet<Fix> = pending
                .iter()
                .flat_map(|&(i, _)| nodes[i].tree.iter().cloned())
                .collect();
            ctx.inject(&fixes)?;
            let after = ctx.build_target(false);
            ctx.remove(&fixes)?;
            let after = after?;

            for (i, fingerprint) in pending {
                let node = &nodes[i];
                let local_effect = after.error_count(&node.regions) as i32 - baseline.error_count(&node.regions) as i32;
                let known = baseline.fixes_in(&node.regions);
                let reported: Vec<Fix> = after
                    .fixes_in(&node.regions)
                    .into_iter()
                    .filter(|fix| !known.contains(fix))
                    .collect();
                if let Some(cache) = cache.as_deref_mut() {
                    cache.insert(node.locations(), fingerprint, local_effect, reported.clone());
                }
                scored.push((i, local_effect, reported));
            }
        }

        for (i, local_effect, reported) in scored {
            let own = nodes[i].locations();
            let together: BTreeSet<Location> = batch_locations.difference(&own).cloned().collect();
            let node = &mut nodes[i];
            node.update_status(local_effect, &together, reported, &baseline.methods, &baseline.fields);
            tracing::debug!(
                node = node.id,
                root = %node.root.location,
                effect = node.effect,
                triggered = node.triggered.len(),
                "scored node"
            );
        }
    }
    Ok(batches.len())
}
