// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Job registry. */

use {
    crate::{
        error::{JobsError, Result},
        job::{JobDescriptor, JobKey},
    },
    std::collections::HashMap,
};

/// Jobs keyed by identity, in registration order.
///
/// Registration order is the output order, so regenerating from the same
/// configuration yields the same job list.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    jobs: Vec<JobDescriptor>,
    index: HashMap<JobKey, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job.
    ///
    /// A key registered twice means two jobs were generated with the same identity,
    /// which is always a generation bug.
    pub fn register(&mut self, job: impl Into<JobDescriptor>) -> Result<JobKey> {
        let job = job.into();
        let key = job.key().clone();

        if self.index.contains_key(&key) {
            return Err(JobsError::DuplicateJob(key));
        }

        self.index.insert(key.clone(), self.jobs.len());
        self.jobs.push(job);

        Ok(key)
    }

    pub fn get(&self, key: &JobKey) -> Option<&JobDescriptor> {
        self.index.get(key).map(|i| &self.jobs[*i])
    }

    pub(crate) fn get_mut(&mut self, key: &JobKey) -> Option<&mut JobDescriptor> {
        match self.index.get(key) {
            Some(i) => self.jobs.get_mut(*i),
            None => None,
        }
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.index.contains_key(key)
    }

    /// All jobs in registration order.
    pub fn all(&self) -> &[JobDescriptor] {
        &self.jobs
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobDescriptor> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{
            job::{JobKind, WatcherJob},
            management::{ManagementJob, ManagementTask},
        },
    };

    fn watcher(name: &str) -> JobKind {
        JobKind::Watcher(WatcherJob {
            project: name.into(),
            component: "kde".into(),
            upstream_url: "https://download.kde.org".into(),
        })
    }

    #[test]
    fn register() -> Result<()> {
        let mut registry = Registry::new();
        assert!(registry.is_empty());

        let kcalc = registry.register(watcher("kcalc"))?;
        let aptly = registry.register(JobKind::Management(ManagementJob::new(
            ManagementTask::Aptly,
        )))?;
        registry.register(watcher("okular"))?;

        assert_eq!(registry.len(), 3);
        assert_eq!(kcalc.as_str(), "watcher_release_kde_kcalc");
        assert!(registry.contains(&aptly));
        assert_eq!(registry.get(&aptly).map(|j| j.key()), Some(&aptly));
        assert!(registry.get(&JobKey::new("mgmt_progenitor")).is_none());

        let order = registry.iter().map(|j| j.key().as_str()).collect::<Vec<_>>();
        assert_eq!(
            order,
            vec!["watcher_release_kde_kcalc", "mgmt_aptly", "watcher_release_kde_okular"]
        );

        Ok(())
    }

    #[test]
    fn duplicate_key() -> Result<()> {
        let mut registry = Registry::new();
        registry.register(watcher("kcalc"))?;

        assert!(matches!(
            registry.register(watcher("kcalc")),
            Err(JobsError::DuplicateJob(key)) if key.as_str() == "watcher_release_kde_kcalc"
        ));
        assert_eq!(registry.len(), 1);

        Ok(())
    }
}
