// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {crate::job::JobKey, thiserror::Error};

/// Primary crate error type.
///
/// Every variant is fatal for a generation run. Expected exclusions (a project
/// restricted away from a series) are not errors; see [crate::builder::Skip].
#[derive(Debug, Error)]
pub enum JobsError {
    #[error("I/O error on path {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("YAML error: {0:?}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("required configuration value missing: {0}")]
    MissingAxis(&'static str),

    #[error("{0} names undeclared series {1}")]
    UnknownSeries(&'static str, String),

    #[error("{0} names undeclared type {1}")]
    UnknownType(&'static str, String),

    #[error("{0} lists {1} more than once")]
    RepeatedAxisValue(&'static str, String),

    #[error("{0} and {1} both designate series {2}")]
    ConflictingSeries(&'static str, &'static str, String),

    #[error("projects file for type {0} not found at {1}")]
    MissingProjectsFile(String, String),

    #[error("project {0} defined more than once for type {1}")]
    DuplicateProject(String, String),

    #[error("unknown upstream_scm type encountered '{kind}' on project {project}")]
    UnknownUpstreamScm { project: String, kind: String },

    #[error("packaging branch {branch} of project {project} does not map to a known type/series")]
    UnresolvableBranch { project: String, branch: String },

    #[error("job {0} registered twice")]
    DuplicateJob(JobKey),

    #[error("job {job} references unknown job {trigger}")]
    UnknownTrigger { job: JobKey, trigger: JobKey },

    #[error("trigger graph contains a cycle through {0}")]
    TriggerCycle(JobKey),
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, JobsError>;
