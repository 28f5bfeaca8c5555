// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Matrix expansion.

[GraphBuilder] walks series × type × project × architecture and registers every
job that should exist for one generation run. Jobs only declare what they depend
on; [crate::wiring::DependencyWirer] turns that into trigger edges afterwards.

Projects excluded from a series are not an error. They are logged and collected as
[Skip] records for operators to review. Anything that would make the job set
incomplete or wrong (unknown upstream kinds, branches naming nothing we build) is
fatal.
*/

use {
    crate::{
        axes::{Axes, MERGE_TYPE, WATCH_TYPE},
        error::Result,
        images::image_jobs,
        job::{BuildJob, JobKey, JobKind, MergeJob, MetaJob, PromotionJob, SourceJob, WatcherJob},
        management::{aggregate_jobs, global_jobs, meta_dependent_jobs, series_jobs},
        project::{BranchTarget, ProjectDescriptor, ProjectSet},
        registry::Registry,
        sourcer::{anonymous_packaging_url, fetch_step, ScmKind},
    },
    log::{info, warn},
    std::{
        collections::{BTreeMap, BTreeSet},
        fmt::{Display, Formatter},
    },
};

/// Why a project got no jobs for a series.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The project's series restrictions exclude the series.
    SeriesRestriction(BTreeSet<String>),
    /// The packaging branch is specific to another series.
    BranchPinned(String),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SeriesRestriction(series) => write!(
                f,
                "restricted to {}",
                series.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
            Self::BranchPinned(branch) => {
                write!(f, "packaging branch {} is specific to another series", branch)
            }
        }
    }
}

/// A project left out of one series and type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Skip {
    pub project: String,
    pub series: String,
    pub release_type: String,
    pub reason: SkipReason,
}

impl Display for Skip {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}; not creating {} jobs for {}",
            self.project, self.reason, self.release_type, self.series
        )
    }
}

/// Result of a generation run.
#[derive(Debug)]
pub struct Generation {
    pub registry: Registry,
    pub skips: Vec<Skip>,
}

pub struct GraphBuilder<'a> {
    axes: &'a Axes,
    projects: &'a ProjectSet,
}

/// Accumulated state of one run.
#[derive(Default)]
struct State {
    registry: Registry,
    skips: Vec<Skip>,
    /// Build jobs of every project, across all series and types.
    builds_by_project: BTreeMap<String, Vec<JobKey>>,
    /// Meta jobs the progenitor waits for.
    daily_metas: Vec<JobKey>,
    watchers: Vec<WatcherJob>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(axes: &'a Axes, projects: &'a ProjectSet) -> Self {
        Self { axes, projects }
    }

    /// Expand the matrix into a registry of unwired jobs.
    pub fn build(&self) -> Result<Generation> {
        let mut state = State::default();

        for series in &self.axes.series {
            for release_type in &self.axes.types {
                self.build_series_type(&mut state, series, release_type)?;
            }

            for image in image_jobs(self.axes, series) {
                state.registry.register(JobKind::Image(image))?;
            }
            for job in series_jobs(series) {
                state.registry.register(JobKind::Management(job))?;
            }
        }

        // Mergers depend on builds of every series and type, so they can only be
        // created once the matrix is complete.
        let mergers = self.build_mergers(&mut state)?;

        let mut seen = BTreeSet::new();
        for watcher in std::mem::take(&mut state.watchers) {
            let job = JobKind::Watcher(watcher);
            if seen.insert(job.key()) {
                state.registry.register(job)?;
            }
        }

        let metas = std::mem::take(&mut state.daily_metas);
        for job in aggregate_jobs(mergers, metas)
            .into_iter()
            .chain(global_jobs(self.axes))
        {
            state.registry.register(JobKind::Management(job))?;
        }

        info!(
            "generated {} jobs, skipped {} project/series combinations",
            state.registry.len(),
            state.skips.len()
        );

        Ok(Generation {
            registry: state.registry,
            skips: state.skips,
        })
    }

    /// Whether `project` gets jobs for `series`, recording a skip if not.
    fn eligible(
        &self,
        state: &mut State,
        project: &ProjectDescriptor,
        series: &str,
        release_type: &str,
    ) -> Result<bool> {
        // Malformed branches are fatal regardless of restrictions.
        let target = project.branch_target(self.axes)?;

        let reason = if !project.allows_series(series) {
            Some(SkipReason::SeriesRestriction(
                project.series_restrictions.clone(),
            ))
        } else {
            match target {
                BranchTarget::Series(pinned) if pinned != series => Some(SkipReason::BranchPinned(
                    project.packaging_branch().unwrap_or_default().to_string(),
                )),
                _ => None,
            }
        };

        Ok(match reason {
            Some(reason) => {
                let skip = Skip {
                    project: project.name.clone(),
                    series: series.to_string(),
                    release_type: release_type.to_string(),
                    reason,
                };
                warn!("{}", skip);
                state.skips.push(skip);

                false
            }
            None => true,
        })
    }

    fn build_series_type(&self, state: &mut State, series: &str, release_type: &str) -> Result<()> {
        let architectures = self.axes.architectures_for_type(release_type);
        let mut builds = vec![];

        for project in self.projects.get(release_type) {
            if !self.eligible(state, project, series, release_type)? {
                continue;
            }

            let fetch = fetch_step(project)?;

            for arch in &architectures {
                let source = state.registry.register(JobKind::Source(SourceJob {
                    series: series.to_string(),
                    release_type: release_type.to_string(),
                    architecture: arch.clone(),
                    project: project.name.clone(),
                    component: project.component.clone(),
                    packaging_url: anonymous_packaging_url(&project.packaging_source.url),
                    packaging_branch: project.packaging_source.branch.clone(),
                    fetch: fetch.clone(),
                }))?;

                let build = state.registry.register(JobKind::Build(BuildJob {
                    series: series.to_string(),
                    release_type: release_type.to_string(),
                    architecture: arch.clone(),
                    project: project.name.clone(),
                    component: project.component.clone(),
                    source,
                }))?;

                state
                    .builds_by_project
                    .entry(project.name.clone())
                    .or_default()
                    .push(build.clone());
                builds.push(build);
            }

            if self.is_watched(project, series, release_type) {
                if let Some(upstream) = &project.upstream_source {
                    state.watchers.push(WatcherJob {
                        project: project.name.clone(),
                        component: project.component.clone(),
                        upstream_url: upstream.url.clone(),
                    });
                }
            }
        }

        // Qt staging is never aggregated and thus gets nothing that hangs off an
        // aggregate either.
        if self.axes.is_qt_stage(release_type) {
            return Ok(());
        }

        let meta = state.registry.register(JobKind::Meta(MetaJob {
            series: series.to_string(),
            release_type: release_type.to_string(),
            builds,
        }))?;

        // The old series is only built on demand; the progenitor never hears of it.
        if !self.axes.is_old(series) {
            state.daily_metas.push(meta.clone());
        }

        state.registry.register(JobKind::Promotion(PromotionJob {
            series: series.to_string(),
            release_type: release_type.to_string(),
            meta: meta.clone(),
        }))?;

        for job in meta_dependent_jobs(self.axes, series, release_type, &meta) {
            state.registry.register(JobKind::Management(job))?;
        }

        Ok(())
    }

    /// Whether a watcher polls the upstream of `project`.
    ///
    /// Only uscan upstreams of release builds on the current or future series
    /// whose packaging follows the plain release branch. Native projects have
    /// nothing to watch.
    fn is_watched(&self, project: &ProjectDescriptor, series: &str, release_type: &str) -> bool {
        release_type == WATCH_TYPE
            && (self.axes.is_current(series) || self.axes.is_future(series))
            && project
                .upstream_source
                .as_ref()
                .map(|upstream| upstream.kind == ScmKind::Uscan.to_string())
                .unwrap_or(false)
            && project.packaging_branch() == Some("Neon/release")
    }

    fn build_mergers(&self, state: &mut State) -> Result<Vec<JobKey>> {
        let mut res = vec![];

        if !self.axes.has_type(MERGE_TYPE) {
            return Ok(res);
        }

        let branches = self.axes.recognized_branches();

        for project in self.projects.get(MERGE_TYPE) {
            let mergeable = project
                .packaging_branch()
                .map(|branch| branches.iter().any(|b| branch.starts_with(b.as_str())))
                .unwrap_or(false);
            if !mergeable || !project.branch_target(self.axes)?.is_mergeable() {
                continue;
            }

            let dependees = state
                .builds_by_project
                .get(&project.name)
                .cloned()
                .unwrap_or_default();

            res.push(state.registry.register(JobKind::Merge(MergeJob {
                project: project.name.clone(),
                component: project.component.clone(),
                branches: branches.clone(),
                dependees,
            }))?);
        }

        Ok(res)
    }
}
