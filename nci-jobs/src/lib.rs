// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Job graph generation for the neon CI.

This crate computes the set of CI jobs that should exist for a configuration and
how they trigger each other. It does not render or install jobs; the finished
[registry::Registry] is handed to whatever does.

Configuration comes in two parts. [axes::Axes] declares the matrix: series of the
base distribution, release types and architectures, plus the designations of
current, old and future series and the Qt staging type. [project::ProjectSet]
holds the [project::ProjectDescriptor]s built for each release type.

[builder::GraphBuilder] expands the matrix into [job::JobDescriptor]s and
registers them. [wiring::DependencyWirer] then populates the trigger edges from
the dependencies each job declares and rejects cyclic graphs. [generate()] does
both.

Errors are fatal for a run; see [error::JobsError]. Projects excluded from a
series by configuration are collected as [builder::Skip]s instead.
*/

pub mod axes;
pub mod builder;
pub mod error;
pub mod images;
pub mod job;
pub mod management;
pub mod project;
pub mod registry;
pub mod sourcer;
pub mod wiring;

use {
    axes::Axes,
    builder::{Generation, GraphBuilder},
    error::Result,
    project::ProjectSet,
    wiring::DependencyWirer,
};

/// Build and wire the job graph.
pub fn generate(axes: &Axes, projects: &ProjectSet) -> Result<Generation> {
    let mut generation = GraphBuilder::new(axes, projects).build()?;
    DependencyWirer.wire(&mut generation.registry)?;

    Ok(generation)
}
