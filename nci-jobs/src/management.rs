// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Management jobs.

Management jobs maintain the CI itself and its repositories. Some hang off the
build graph (install checks after a meta job, the progenitor after all of them),
most run on their own schedule.
*/

use {
    crate::{axes::Axes, job::JobKey},
    serde::Serialize,
    std::collections::BTreeMap,
    strum::{Display, EnumIter, IntoEnumIterator},
};

#[derive(Clone, Copy, Debug, Display, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ManagementTask {
    // Build graph.
    /// Depends on every merger.
    Merger,
    /// Depends on every daily meta job and the merger aggregate.
    Progenitor,
    PauseIntegration,
    Aptly,

    // Per series and type.
    InstallCheck,
    RepoTestVersions,
    RepoTestVersionsUpgrade,
    Cnf,

    // Per series.
    RepoDivert,
    RepoUndoDivert,
    AppstreamUbuntuFilter,

    // Infrastructure, one of each.
    GitJeweller,
    MergerDebianFrameworks,
    DigitalOcean,
    DigitalOceanDangler,
    DockerEphemerals,
    GitSemaphore,
    DockerPersistents,
    DockerPersistentsCleanup,
    DockerPersistentsDailyCleanup,
    JenkinsJobScorer,
    JenkinsPruneParameterList,
    JenkinsPruneOld,
    JobUpdater,
    RepoCleanup,
    RepoMetadataCheck,
    SeedDeploy,
    Tooling,
    ToolingPersistents,
    ToolingEphemerals,
    ToolingUpdateSubmodules,

    // Repository QA and publishing.
    WorkspaceCleaner,
    AppstreamComponentsDuplicates,
    AppstreamGenerator,
    AppstreamHealth,
    SnapshotUser,
    SnapshotTesting,
    VersionList,
    FwupdCheck,
}

impl ManagementTask {
    /// Tasks that exist exactly once and take no parameters.
    pub fn is_singleton(&self) -> bool {
        matches!(
            self,
            Self::GitJeweller
                | Self::MergerDebianFrameworks
                | Self::DigitalOcean
                | Self::DigitalOceanDangler
                | Self::DockerEphemerals
                | Self::GitSemaphore
                | Self::DockerPersistents
                | Self::DockerPersistentsCleanup
                | Self::DockerPersistentsDailyCleanup
                | Self::JenkinsJobScorer
                | Self::JenkinsPruneParameterList
                | Self::JenkinsPruneOld
                | Self::JobUpdater
                | Self::RepoCleanup
                | Self::RepoMetadataCheck
                | Self::SeedDeploy
                | Self::Tooling
                | Self::ToolingPersistents
                | Self::ToolingEphemerals
                | Self::ToolingUpdateSubmodules
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ManagementJob {
    pub task: ManagementTask,
    pub series: Option<String>,
    pub release_type: Option<String>,
    /// Distinguishes jobs that would otherwise share series and type.
    pub label: Option<String>,
    pub params: BTreeMap<String, String>,
    pub dependees: Vec<JobKey>,
    /// Jobs this one triggers without them depending on it.
    pub downstreams: Vec<JobKey>,
}

impl ManagementJob {
    pub fn new(task: ManagementTask) -> Self {
        Self {
            task,
            series: None,
            release_type: None,
            label: None,
            params: BTreeMap::new(),
            dependees: vec![],
            downstreams: vec![],
        }
    }

    pub fn series(mut self, series: impl ToString) -> Self {
        self.series = Some(series.to_string());
        self
    }

    pub fn release_type(mut self, release_type: impl ToString) -> Self {
        self.release_type = Some(release_type.to_string());
        self
    }

    pub fn label(mut self, label: impl ToString) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn param(mut self, key: impl ToString, value: impl ToString) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn depends_on(mut self, keys: impl IntoIterator<Item = JobKey>) -> Self {
        self.dependees.extend(keys);
        self
    }

    pub fn triggers(mut self, keys: impl IntoIterator<Item = JobKey>) -> Self {
        self.downstreams.extend(keys);
        self
    }

    /// `mgmt_<task>[_<series>][_<type>][_<label>]`.
    pub fn name(&self) -> String {
        let mut name = format!("mgmt_{}", self.task);
        for part in [&self.series, &self.release_type, &self.label]
            .into_iter()
            .flatten()
        {
            name.push('_');
            name.push_str(part);
        }

        name
    }
}

/// Jobs hanging off the meta job of a series and type.
pub fn meta_dependent_jobs(
    axes: &Axes,
    series: &str,
    release_type: &str,
    meta: &JobKey,
) -> Vec<ManagementJob> {
    let mut res = vec![
        ManagementJob::new(ManagementTask::InstallCheck)
            .series(series)
            .release_type(release_type)
            .depends_on([meta.clone()]),
        ManagementJob::new(ManagementTask::RepoTestVersions)
            .series(series)
            .release_type(release_type)
            .depends_on([meta.clone()]),
        ManagementJob::new(ManagementTask::Cnf)
            .series(series)
            .release_type(release_type)
            .param("repo", release_type),
    ];

    // Upgrades into the future series and out of the old one need their versions
    // ordered against the neighbouring series.
    if axes.is_future(series) || axes.is_old(series) {
        res.push(
            ManagementJob::new(ManagementTask::RepoTestVersionsUpgrade)
                .series(series)
                .release_type(release_type),
        );
    }

    res
}

/// Repository maintenance jobs of a series.
pub fn series_jobs(series: &str) -> Vec<ManagementJob> {
    let target = format!("unstable_{}", series);

    vec![
        ManagementJob::new(ManagementTask::RepoDivert)
            .series(series)
            .param("target", &target),
        ManagementJob::new(ManagementTask::RepoUndoDivert)
            .series(series)
            .param("target", &target),
        ManagementJob::new(ManagementTask::AppstreamUbuntuFilter).series(series),
    ]
}

/// The build graph's top: merger aggregate, progenitor and their satellites.
pub fn aggregate_jobs(mergers: Vec<JobKey>, metas: Vec<JobKey>) -> Vec<ManagementJob> {
    let merger = ManagementJob::new(ManagementTask::Merger).depends_on(mergers);
    let merger_key = JobKey::new(merger.name());

    let progenitor = ManagementJob::new(ManagementTask::Progenitor)
        .depends_on(metas)
        .depends_on([merger_key]);
    let progenitor_key = JobKey::new(progenitor.name());

    vec![
        merger,
        progenitor,
        ManagementJob::new(ManagementTask::PauseIntegration).triggers([progenitor_key.clone()]),
        ManagementJob::new(ManagementTask::Aptly).depends_on([progenitor_key]),
    ]
}

/// Infrastructure jobs and the repository QA and publishing jobs of the current
/// and future series.
pub fn global_jobs(axes: &Axes) -> Vec<ManagementJob> {
    let current = axes.current_series.as_str();

    let mut res = ManagementTask::iter()
        .filter(|task| task.is_singleton())
        .map(ManagementJob::new)
        .collect::<Vec<_>>();

    res.push(ManagementJob::new(ManagementTask::WorkspaceCleaner).series(current));

    // Only the user edition, component availability differs between editions.
    res.push(
        ManagementJob::new(ManagementTask::AppstreamComponentsDuplicates)
            .series(current)
            .release_type("user"),
    );

    for repo in ["unstable", "stable", "testing", "release", "user"] {
        res.push(appstream_generator(current, repo));
    }
    res.push(ManagementJob::new(ManagementTask::AppstreamHealth).series(current));

    if let Some(future) = &axes.future_series {
        res.push(ManagementJob::new(ManagementTask::AppstreamHealth).series(future));
        res.push(appstream_generator(future, "unstable"));
    }

    // The user repository is not a type. Its command-not-found data is generated
    // from release and pushed to user.
    res.push(
        ManagementJob::new(ManagementTask::Cnf)
            .series(current)
            .release_type("release")
            .label("user")
            .param("repo", "user"),
    );

    let published = std::iter::once(current).chain(axes.future_series.as_deref());

    for series in published.clone() {
        res.push(
            ManagementJob::new(ManagementTask::SnapshotUser)
                .series(series)
                .param("origin", "release")
                .param("target", "user"),
        );
        res.push(
            ManagementJob::new(ManagementTask::SnapshotTesting)
                .series(series)
                .param("origin", "stable")
                .param("target", "testing"),
        );
    }

    for series in published.clone() {
        for release_type in ["user", "release", "testing", "stable", "unstable"] {
            res.push(notifying(
                ManagementJob::new(ManagementTask::VersionList)
                    .series(series)
                    .release_type(release_type),
            ));
        }
    }

    for series in published {
        for release_type in ["user", "testing"] {
            res.push(notifying(
                ManagementJob::new(ManagementTask::FwupdCheck)
                    .series(series)
                    .release_type(release_type),
            ));
        }
    }

    res
}

fn appstream_generator(series: &str, repo: &str) -> ManagementJob {
    ManagementJob::new(ManagementTask::AppstreamGenerator)
        .series(series)
        .release_type(repo)
        .param("repo", repo)
}

/// Reports of the user edition notify on changes.
fn notifying(job: ManagementJob) -> ManagementJob {
    let notify = job.release_type.as_deref() == Some("user");
    job.param("notify", notify)
}
