// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Source package projects and their per-type sets.

Each release type has its own projects file, `<type>.yaml`, listing the projects
built for that type:

```yaml
- name: kcalc
  component: kde
  upstream_source:
    type: git
    url: https://invent.kde.org/utilities/kcalc
  packaging_source:
    url: https://invent.kde.org/neon/kde/kcalc
- name: kf6-kconfig
  component: frameworks
  packaging_source:
    url: https://invent.kde.org/neon/kf6/kconfig
    branch: Neon/unstable_noble
  series_restrictions: [noble]
```

A project without a packaging branch builds from `Neon/<type>`.
*/

use {
    crate::{
        axes::Axes,
        error::{JobsError, Result},
    },
    serde::{Deserialize, Serialize},
    std::{
        collections::{BTreeMap, BTreeSet},
        path::Path,
    },
};

/// Where upstream code comes from.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamSource {
    /// One of `git`, `svn`, `uscan` or `tarball`. Validated when the source
    /// job is created.
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// Where the Debian packaging lives.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PackagingSource {
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectDescriptor {
    pub name: String,
    pub component: String,
    /// Native packages have no upstream.
    #[serde(default)]
    pub upstream_source: Option<UpstreamSource>,
    pub packaging_source: PackagingSource,
    /// Series this project is limited to. Empty means all.
    #[serde(default)]
    pub series_restrictions: BTreeSet<String>,
}

/// What a packaging branch says about the series a project builds for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BranchTarget {
    /// `master` or `Neon/<type>`.
    AnySeries,
    /// `Neon/<type>_<series>`.
    Series(String),
    /// A branch outside the `Neon/` namespace, or none at all. Built everywhere,
    /// never merged.
    Foreign,
}

impl BranchTarget {
    /// Whether the branch participates in branch merging.
    pub fn is_mergeable(&self) -> bool {
        !matches!(self, Self::Foreign)
    }
}

impl ProjectDescriptor {
    pub fn new(
        name: impl ToString,
        component: impl ToString,
        packaging_url: impl ToString,
        branch: Option<&str>,
    ) -> Self {
        Self {
            name: name.to_string(),
            component: component.to_string(),
            upstream_source: None,
            packaging_source: PackagingSource {
                url: packaging_url.to_string(),
                branch: branch.map(|x| x.to_string()),
            },
            series_restrictions: BTreeSet::new(),
        }
    }

    pub fn with_upstream(mut self, kind: impl ToString, url: impl ToString) -> Self {
        self.upstream_source = Some(UpstreamSource {
            kind: kind.to_string(),
            url: url.to_string(),
        });
        self
    }

    pub fn with_series_restrictions<'a>(
        mut self,
        series: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.series_restrictions = series.into_iter().map(|x| x.to_string()).collect();
        self
    }

    pub fn packaging_branch(&self) -> Option<&str> {
        self.packaging_source.branch.as_deref()
    }

    /// Whether the project's restrictions allow building for `series`.
    pub fn allows_series(&self, series: &str) -> bool {
        self.series_restrictions.is_empty() || self.series_restrictions.contains(series)
    }

    /// Resolve the packaging branch against the axes.
    ///
    /// A `Neon/` branch that names no declared type (or type and series) is a
    /// configuration error.
    pub fn branch_target(&self, axes: &Axes) -> Result<BranchTarget> {
        let branch = match self.packaging_branch() {
            Some(branch) => branch,
            None => return Ok(BranchTarget::Foreign),
        };

        if branch == "master" {
            return Ok(BranchTarget::AnySeries);
        }

        let rest = match branch.strip_prefix("Neon/") {
            Some(rest) => rest,
            None => return Ok(BranchTarget::Foreign),
        };

        if axes.has_type(rest) {
            return Ok(BranchTarget::AnySeries);
        }

        // Types may contain underscores themselves, so try each declared type as prefix.
        for t in &axes.types {
            if let Some(series) = rest
                .strip_prefix(t.as_str())
                .and_then(|x| x.strip_prefix('_'))
            {
                if axes.has_series(series) {
                    return Ok(BranchTarget::Series(series.to_string()));
                }
            }
        }

        Err(JobsError::UnresolvableBranch {
            project: self.name.clone(),
            branch: branch.to_string(),
        })
    }
}

/// Parse a projects file for `release_type`.
///
/// Projects without a packaging branch get `Neon/<release_type>`.
pub fn parse_projects(release_type: &str, s: &str) -> Result<Vec<ProjectDescriptor>> {
    let mut projects: Vec<ProjectDescriptor> = serde_yaml::from_str(s)?;

    for project in projects.iter_mut() {
        if project.packaging_source.branch.is_none() {
            project.packaging_source.branch = Some(format!("Neon/{}", release_type));
        }
    }

    Ok(projects)
}

/// Projects keyed by the release type they are built for.
#[derive(Clone, Debug, Default)]
pub struct ProjectSet {
    by_type: BTreeMap<String, Vec<ProjectDescriptor>>,
}

impl ProjectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define the projects of a type, replacing any previous definition.
    pub fn insert(
        &mut self,
        release_type: impl ToString,
        projects: Vec<ProjectDescriptor>,
    ) -> Result<()> {
        let release_type = release_type.to_string();

        let mut seen = BTreeSet::new();
        for project in &projects {
            if !seen.insert(project.name.as_str()) {
                return Err(JobsError::DuplicateProject(
                    project.name.clone(),
                    release_type,
                ));
            }
        }

        self.by_type.insert(release_type, projects);

        Ok(())
    }

    /// Projects of a type. Types without projects yield an empty slice.
    pub fn get(&self, release_type: &str) -> &[ProjectDescriptor] {
        self.by_type
            .get(release_type)
            .map(|x| x.as_slice())
            .unwrap_or_default()
    }

    /// Load `<dir>/<type>.yaml` for every type of `axes`.
    pub fn load_dir(dir: &Path, axes: &Axes) -> Result<Self> {
        let mut res = Self::new();

        for release_type in &axes.types {
            let path = dir.join(format!("{}.yaml", release_type));
            if !path.exists() {
                return Err(JobsError::MissingProjectsFile(
                    release_type.clone(),
                    format!("{}", path.display()),
                ));
            }

            let data = std::fs::read_to_string(&path)
                .map_err(|e| JobsError::IoPath(format!("{}", path.display()), e))?;

            res.insert(release_type, parse_projects(release_type, &data)?)?;
        }

        Ok(res)
    }
}
