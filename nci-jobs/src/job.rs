// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Job descriptors.

A [JobDescriptor] is a schedulable unit handed to the renderer. Its [JobKey] is
the job name on the CI server, so it has to be stable across runs: regenerating
updates existing jobs instead of duplicating them.

Each [JobKind] declares the jobs it depends on. The dependency wirer turns these
declarations into the trigger sets of the descriptors.
*/

use {
    crate::{images::ImageJob, management::ManagementJob, sourcer::FetchStep},
    serde::Serialize,
    std::{
        collections::BTreeSet,
        fmt::{Display, Formatter},
    },
};

/// Stable identity of a job.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct JobKey(String);

impl JobKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for JobKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// `<series>_<type>_<component>_<name>`, shared by all jobs of one project in one
/// matrix cell.
pub fn project_basename(series: &str, release_type: &str, component: &str, name: &str) -> String {
    format!("{}_{}_{}_{}", series, release_type, component, name)
}

/// Fetches upstream and packaging sources for one architecture.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SourceJob {
    pub series: String,
    pub release_type: String,
    pub architecture: String,
    pub project: String,
    pub component: String,
    pub packaging_url: String,
    pub packaging_branch: Option<String>,
    pub fetch: FetchStep,
}

/// Builds binaries of one project for one architecture.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BuildJob {
    pub series: String,
    pub release_type: String,
    pub architecture: String,
    pub project: String,
    pub component: String,
    pub source: JobKey,
}

/// Merges packaging branches of a project.
///
/// Depends on every build of the project so that no build triggers while a merge is
/// still pending; an upstream change would otherwise cause pointless build cycles.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MergeJob {
    pub project: String,
    pub component: String,
    /// Branches that get merged into each other.
    pub branches: Vec<String>,
    pub dependees: Vec<JobKey>,
}

/// Represents "all builds of this series and type are done".
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MetaJob {
    pub series: String,
    pub release_type: String,
    pub builds: Vec<JobKey>,
}

/// Promotes the daily snapshot of a series and type after its meta job.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PromotionJob {
    pub series: String,
    pub release_type: String,
    pub meta: JobKey,
}

/// Polls a project's upstream for new releases.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct WatcherJob {
    pub project: String,
    pub component: String,
    pub upstream_url: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    Source(SourceJob),
    Build(BuildJob),
    Merge(MergeJob),
    Meta(MetaJob),
    Promotion(PromotionJob),
    Watcher(WatcherJob),
    Image(ImageJob),
    Management(ManagementJob),
}

impl JobKind {
    /// The identity of this job.
    pub fn key(&self) -> JobKey {
        JobKey::new(match self {
            Self::Source(job) => format!(
                "{}_{}_src",
                project_basename(&job.series, &job.release_type, &job.component, &job.project),
                job.architecture
            ),
            Self::Build(job) => format!(
                "{}_bin_{}",
                project_basename(&job.series, &job.release_type, &job.component, &job.project),
                job.architecture
            ),
            Self::Merge(job) => format!("merger_{}", job.project),
            Self::Meta(job) => format!("mgmt_build_{}_{}", job.series, job.release_type),
            Self::Promotion(job) => {
                format!("mgmt_daily_promotion_{}_{}", job.series, job.release_type)
            }
            Self::Watcher(job) => format!("watcher_release_{}_{}", job.component, job.project),
            Self::Image(job) => job.name(),
            Self::Management(job) => job.name(),
        })
    }

    /// Jobs that must complete before this one may start.
    pub fn dependencies(&self) -> Vec<JobKey> {
        match self {
            Self::Source(_) | Self::Watcher(_) | Self::Image(_) => vec![],
            Self::Build(job) => vec![job.source.clone()],
            Self::Merge(job) => job.dependees.clone(),
            Self::Meta(job) => job.builds.clone(),
            Self::Promotion(job) => vec![job.meta.clone()],
            Self::Management(job) => job.dependees.clone(),
        }
    }

    /// Jobs this one triggers beyond those declaring it as a dependency.
    pub fn downstreams(&self) -> Vec<JobKey> {
        match self {
            Self::Management(job) => job.downstreams.clone(),
            _ => vec![],
        }
    }

    /// The project this job belongs to, if any.
    pub fn project(&self) -> Option<&str> {
        match self {
            Self::Source(job) => Some(&job.project),
            Self::Build(job) => Some(&job.project),
            Self::Merge(job) => Some(&job.project),
            Self::Watcher(job) => Some(&job.project),
            _ => None,
        }
    }

    /// The series this job belongs to, if any.
    pub fn series(&self) -> Option<&str> {
        match self {
            Self::Source(job) => Some(&job.series),
            Self::Build(job) => Some(&job.series),
            Self::Meta(job) => Some(&job.series),
            Self::Promotion(job) => Some(&job.series),
            Self::Image(job) => Some(&job.series),
            Self::Management(job) => job.series.as_deref(),
            Self::Merge(_) | Self::Watcher(_) => None,
        }
    }
}

/// A job with its trigger edges.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct JobDescriptor {
    key: JobKey,
    #[serde(flatten)]
    kind: JobKind,
    upstream_triggers: BTreeSet<JobKey>,
    downstream_triggers: BTreeSet<JobKey>,
}

impl JobDescriptor {
    pub fn new(kind: JobKind) -> Self {
        Self {
            key: kind.key(),
            kind,
            upstream_triggers: BTreeSet::new(),
            downstream_triggers: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> &JobKey {
        &self.key
    }

    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    /// Jobs that must complete before this one starts.
    pub fn upstream_triggers(&self) -> &BTreeSet<JobKey> {
        &self.upstream_triggers
    }

    /// Jobs started when this one completes.
    pub fn downstream_triggers(&self) -> &BTreeSet<JobKey> {
        &self.downstream_triggers
    }

    pub(crate) fn add_upstream(&mut self, key: JobKey) {
        self.upstream_triggers.insert(key);
    }

    pub(crate) fn add_downstream(&mut self, key: JobKey) {
        self.downstream_triggers.insert(key);
    }
}

impl From<JobKind> for JobDescriptor {
    fn from(kind: JobKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn build(arch: &str) -> JobKind {
        JobKind::Build(BuildJob {
            series: "jammy".into(),
            release_type: "unstable".into(),
            architecture: arch.into(),
            project: "kcalc".into(),
            component: "kde".into(),
            source: JobKey::new(format!("jammy_unstable_kde_kcalc_{}_src", arch)),
        })
    }

    #[test]
    fn keys() {
        assert_eq!(build("amd64").key().as_str(), "jammy_unstable_kde_kcalc_bin_amd64");
        assert_ne!(build("amd64").key(), build("arm64").key());

        let meta = JobKind::Meta(MetaJob {
            series: "jammy".into(),
            release_type: "unstable".into(),
            builds: vec![build("amd64").key()],
        });
        assert_eq!(meta.key().as_str(), "mgmt_build_jammy_unstable");
        assert_eq!(meta.dependencies(), vec![build("amd64").key()]);

        let source = JobKind::Source(SourceJob {
            series: "jammy".into(),
            release_type: "unstable".into(),
            architecture: "arm64".into(),
            project: "kcalc".into(),
            component: "kde".into(),
            packaging_url: "https://invent.kde.org/neon/kde/kcalc".into(),
            packaging_branch: None,
            fetch: FetchStep::None,
        });
        assert_eq!(source.key().as_str(), "jammy_unstable_kde_kcalc_arm64_src");
    }

    #[test]
    fn build_depends_on_source() {
        assert_eq!(
            build("arm64").dependencies(),
            vec![JobKey::new("jammy_unstable_kde_kcalc_arm64_src")]
        );
        assert_eq!(build("arm64").project(), Some("kcalc"));
        assert_eq!(build("arm64").series(), Some("jammy"));
    }

    #[test]
    fn descriptor_starts_unwired() {
        let job = JobDescriptor::new(build("amd64"));
        assert_eq!(job.key(), &build("amd64").key());
        assert!(job.upstream_triggers().is_empty());
        assert!(job.downstream_triggers().is_empty());
    }
}
