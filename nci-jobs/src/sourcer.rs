// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! How source jobs obtain upstream code. */

use {
    crate::{
        error::{JobsError, Result},
        project::ProjectDescriptor,
    },
    serde::Serialize,
    std::str::FromStr,
    strum::{Display, EnumString},
};

/// Projects whose upstream checkout is never part of the source job.
///
/// These are settings and artwork packages where the packaging repository is the
/// only source.
pub const EXCLUDE_UPSTREAM_SCM: &[&str] = &[
    "mintinstall",
    "rootactions-servicemenu",
    "software-properties",
    "default-settings-thunderbird",
    "default-systemsettings-settings",
    "default-settings-xsession",
    "default-settings-applications",
    "default-settings-kdeapps",
    "default-settings-plasma",
    "default-settings-pulseaudio",
    "default-settings-autostart",
    "default-settings-profiled",
    "default-settings-e2fsprogs",
    "default-settings-systemd",
    "default-settings-xdg-user-dirs",
    "artwork-windows-cursor",
];

/// Known upstream source control kinds.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum ScmKind {
    Git,
    Svn,
    /// Upstream releases are found via the packaging's watch file.
    Uscan,
    Tarball,
}

/// What the source job does to obtain upstream code.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FetchStep {
    /// Nothing to check out; uscan, native packages and excluded projects.
    None,
    Git { url: String },
    Svn { url: String },
    /// The URL is handed to the sourcer, which downloads it.
    Tarball { url: String },
}

/// Decide the fetch step of a project.
///
/// An upstream kind we do not know is fatal. Skipping it would hide a packaging
/// misconfiguration.
pub fn fetch_step(project: &ProjectDescriptor) -> Result<FetchStep> {
    if EXCLUDE_UPSTREAM_SCM.contains(&project.name.as_str()) {
        return Ok(FetchStep::None);
    }

    let upstream = match &project.upstream_source {
        Some(upstream) => upstream,
        None => return Ok(FetchStep::None),
    };

    let kind =
        ScmKind::from_str(&upstream.kind).map_err(|_| JobsError::UnknownUpstreamScm {
            project: project.name.clone(),
            kind: upstream.kind.clone(),
        })?;

    let url = upstream.url.clone();

    Ok(match kind {
        ScmKind::Git => FetchStep::Git { url },
        ScmKind::Svn => FetchStep::Svn { url },
        ScmKind::Uscan => FetchStep::None,
        ScmKind::Tarball => FetchStep::Tarball { url },
    })
}

/// Rewrite the legacy alioth ssh location to its anonymous equivalent.
pub fn anonymous_packaging_url(url: &str) -> String {
    url.replace("git.debian.org:/git/", "git://anonscm.debian.org/")
}

#[cfg(test)]
mod test {
    use super::*;

    fn project(name: &str) -> ProjectDescriptor {
        ProjectDescriptor::new(name, "kde", "https://invent.kde.org/neon/kde/kcalc", None)
    }

    #[test]
    fn steps() -> Result<()> {
        assert_eq!(fetch_step(&project("kcalc"))?, FetchStep::None);
        assert_eq!(
            fetch_step(&project("kcalc").with_upstream("git", "https://invent.kde.org/utilities/kcalc"))?,
            FetchStep::Git {
                url: "https://invent.kde.org/utilities/kcalc".into()
            }
        );
        assert_eq!(
            fetch_step(&project("kcalc").with_upstream("svn", "svn://anonsvn.kde.org/home/kde"))?,
            FetchStep::Svn {
                url: "svn://anonsvn.kde.org/home/kde".into()
            }
        );
        assert_eq!(
            fetch_step(&project("kcalc").with_upstream("uscan", "https://download.kde.org"))?,
            FetchStep::None
        );
        assert_eq!(
            fetch_step(&project("kcalc").with_upstream("tarball", "https://example.org/x.tar.xz"))?,
            FetchStep::Tarball {
                url: "https://example.org/x.tar.xz".into()
            }
        );

        Ok(())
    }

    #[test]
    fn unknown_kind_is_fatal() {
        assert!(matches!(
            fetch_step(&project("kcalc").with_upstream("bzr", "lp:kcalc")),
            Err(JobsError::UnknownUpstreamScm { kind, .. }) if kind == "bzr"
        ));
    }

    #[test]
    fn excluded_projects_fetch_nothing() -> Result<()> {
        assert_eq!(
            fetch_step(&project("default-settings-plasma").with_upstream("bzr", "lp:x"))?,
            FetchStep::None
        );

        Ok(())
    }

    #[test]
    fn anonscm() {
        assert_eq!(
            anonymous_packaging_url("git.debian.org:/git/pkg-kde/kcalc.git"),
            "git://anonscm.debian.org/pkg-kde/kcalc.git"
        );
        assert_eq!(
            anonymous_packaging_url("https://invent.kde.org/neon/kde/kcalc"),
            "https://invent.kde.org/neon/kde/kcalc"
        );
    }
}
