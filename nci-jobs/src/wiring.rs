// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Trigger wiring.

Jobs declare what they depend on. [DependencyWirer] turns every declaration into a
pair of edges: an upstream trigger on the dependent job and a downstream trigger
on the job it depends on. Jobs may additionally declare downstreams they trigger
without being depended upon.

The resulting graph must be acyclic. A cycle means the generator wired jobs
wrongly, so it aborts the run before anything is handed on.
*/

use {
    crate::{
        error::{JobsError, Result},
        job::JobKey,
        registry::Registry,
    },
    log::debug,
    petgraph::{
        algo::toposort,
        graph::{DiGraph, NodeIndex},
    },
    std::collections::HashMap,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct DependencyWirer;

impl DependencyWirer {
    /// Populate trigger sets of every registered job and verify the result.
    ///
    /// Fails without touching the registry when any declaration names an
    /// unregistered job.
    pub fn wire(&self, registry: &mut Registry) -> Result<()> {
        // (upstream, downstream)
        let mut edges = vec![];

        for job in registry.iter() {
            for dependency in job.kind().dependencies() {
                edges.push((dependency, job.key().clone()));
            }
            for downstream in job.kind().downstreams() {
                edges.push((job.key().clone(), downstream));
            }
        }

        for (upstream, downstream) in &edges {
            for (job, trigger) in [(downstream, upstream), (upstream, downstream)] {
                if !registry.contains(trigger) {
                    return Err(JobsError::UnknownTrigger {
                        job: job.clone(),
                        trigger: trigger.clone(),
                    });
                }
            }
        }

        debug!("wiring {} trigger edges", edges.len());

        for (upstream, downstream) in edges {
            if let Some(job) = registry.get_mut(&downstream) {
                job.add_upstream(upstream.clone());
            }
            if let Some(job) = registry.get_mut(&upstream) {
                job.add_downstream(downstream);
            }
        }

        self.check_acyclic(registry)
    }

    /// Verify the trigger graph has no cycle.
    pub fn check_acyclic(&self, registry: &Registry) -> Result<()> {
        let mut graph = DiGraph::<&JobKey, ()>::new();
        let mut nodes: HashMap<&JobKey, NodeIndex> = HashMap::new();

        for job in registry.iter() {
            nodes.insert(job.key(), graph.add_node(job.key()));
        }

        for job in registry.iter() {
            let from = nodes[job.key()];
            for downstream in job.downstream_triggers() {
                if let Some(to) = nodes.get(downstream) {
                    graph.add_edge(from, *to, ());
                }
            }
        }

        toposort(&graph, None)
            .map(|_| ())
            .map_err(|cycle| JobsError::TriggerCycle(graph[cycle.node_id()].clone()))
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{
            job::JobKind,
            management::{ManagementJob, ManagementTask},
        },
    };

    fn mgmt(task: ManagementTask, deps: &[&str]) -> JobKind {
        JobKind::Management(
            ManagementJob::new(task).depends_on(deps.iter().map(|x| JobKey::new(*x))),
        )
    }

    #[test]
    fn edges_are_mirrored() -> Result<()> {
        let mut registry = Registry::new();
        registry.register(mgmt(ManagementTask::Merger, &[]))?;
        registry.register(mgmt(ManagementTask::Progenitor, &["mgmt_merger"]))?;
        registry.register(JobKind::Management(
            ManagementJob::new(ManagementTask::PauseIntegration)
                .triggers([JobKey::new("mgmt_progenitor")]),
        ))?;
        registry.register(mgmt(ManagementTask::Aptly, &["mgmt_progenitor"]))?;

        DependencyWirer.wire(&mut registry)?;

        let progenitor = registry
            .get(&JobKey::new("mgmt_progenitor"))
            .expect("progenitor registered");
        assert_eq!(
            progenitor.upstream_triggers().iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            vec!["mgmt_merger", "mgmt_pause_integration"]
        );
        assert_eq!(
            progenitor.downstream_triggers().iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            vec!["mgmt_aptly"]
        );

        let pause = registry
            .get(&JobKey::new("mgmt_pause_integration"))
            .expect("pause registered");
        assert!(pause.upstream_triggers().is_empty());

        Ok(())
    }

    #[test]
    fn unknown_trigger() -> Result<()> {
        let mut registry = Registry::new();
        registry.register(mgmt(ManagementTask::Aptly, &["mgmt_progenitor"]))?;

        assert!(matches!(
            DependencyWirer.wire(&mut registry),
            Err(JobsError::UnknownTrigger { job, trigger })
                if job.as_str() == "mgmt_aptly" && trigger.as_str() == "mgmt_progenitor"
        ));
        assert!(registry.all()[0].upstream_triggers().is_empty());

        Ok(())
    }

    #[test]
    fn cycles() -> Result<()> {
        let mut registry = Registry::new();
        registry.register(mgmt(ManagementTask::Merger, &["mgmt_aptly"]))?;
        registry.register(mgmt(ManagementTask::Progenitor, &["mgmt_merger"]))?;
        registry.register(mgmt(ManagementTask::Aptly, &["mgmt_progenitor"]))?;

        assert!(matches!(
            DependencyWirer.wire(&mut registry),
            Err(JobsError::TriggerCycle(key))
                if ["mgmt_merger", "mgmt_progenitor", "mgmt_aptly"].contains(&key.as_str())
        ));

        Ok(())
    }

    #[test]
    fn self_dependency_is_a_cycle() -> Result<()> {
        let mut registry = Registry::new();
        registry.register(mgmt(ManagementTask::Merger, &["mgmt_merger"]))?;

        assert!(matches!(
            DependencyWirer.wire(&mut registry),
            Err(JobsError::TriggerCycle(key)) if key.as_str() == "mgmt_merger"
        ));

        Ok(())
    }
}
