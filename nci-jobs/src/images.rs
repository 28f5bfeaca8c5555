// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Installation and container image jobs.

Every series gets ISO and Docker images for its editions on the standard
architectures, and a reduced set on the extra architectures. Images run on a
schedule and are not wired into the build graph.
*/

use {
    crate::axes::Axes,
    serde::Serialize,
    strum::Display,
};

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageFormat {
    Iso,
    Docker,
    /// Raw disk images for boards.
    Img,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ImageJob {
    pub format: ImageFormat,
    pub imagename: String,
    /// Edition name such as `unstable`, `developer` or `user`.
    pub edition: String,
    pub series: String,
    pub architecture: String,
    pub metapackage: String,
    /// Repository the image is assembled from.
    pub archive: String,
    pub cron: String,
    pub is_future: bool,
}

impl ImageJob {
    /// Job name. The archive is part of it since one edition may be built from
    /// several archives.
    pub fn name(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}",
            self.format,
            self.imagename,
            self.archive.replace('/', "-"),
            self.edition,
            self.series,
            self.architecture
        )
    }
}

/// One row of an edition table.
struct Edition {
    formats: &'static [ImageFormat],
    edition: &'static str,
    archive: &'static str,
    cron: &'static str,
    metapackage: &'static str,
}

const ISO: &[ImageFormat] = &[ImageFormat::Iso];
const ISO_DOCKER: &[ImageFormat] = &[ImageFormat::Iso, ImageFormat::Docker];

const DESKTOP: &str = "neon-desktop";
const DESKTOP_KO: &str = "neon-desktop-ko";
const PHONE: &str = "plasma-phone";

/// Editions built while a future series is in early mode.
const EARLY_EDITIONS: &[Edition] = &[Edition {
    formats: ISO_DOCKER,
    edition: "unstable",
    archive: "unstable",
    cron: "H H * * 0",
    metapackage: DESKTOP,
}];

/// Editions of the standard architectures after the unstable one.
const STANDARD_EDITIONS: &[Edition] = &[
    Edition {
        formats: ISO,
        edition: "ko",
        archive: "unstable",
        cron: "H H * * 5",
        metapackage: DESKTOP_KO,
    },
    Edition {
        formats: ISO,
        edition: "mobile",
        archive: "unstable",
        cron: "H H * * 0",
        metapackage: PHONE,
    },
    Edition {
        formats: ISO_DOCKER,
        edition: "developer",
        archive: "unstable",
        cron: "H H * * 1",
        metapackage: DESKTOP,
    },
    Edition {
        formats: ISO,
        edition: "stable",
        archive: "stable",
        cron: "H H * * 2",
        metapackage: DESKTOP,
    },
    Edition {
        formats: ISO_DOCKER,
        edition: "testing",
        archive: "testing",
        cron: "H H * * 2",
        metapackage: DESKTOP,
    },
    Edition {
        formats: ISO,
        edition: "ko",
        archive: "testing",
        cron: "H H * * 5",
        metapackage: DESKTOP_KO,
    },
    Edition {
        formats: ISO,
        edition: "mobile",
        archive: "testing",
        cron: "H H * * 0",
        metapackage: PHONE,
    },
    Edition {
        formats: ISO,
        edition: "release",
        archive: "release",
        cron: "H H * * 3",
        metapackage: DESKTOP,
    },
    // The archive of the user edition depends on the series, see user_archive().
    Edition {
        formats: ISO_DOCKER,
        edition: "user",
        archive: "user",
        cron: "H H * * 4",
        metapackage: DESKTOP,
    },
    Edition {
        formats: ISO,
        edition: "ko",
        archive: "user",
        cron: "H H * * 5",
        metapackage: DESKTOP_KO,
    },
    Edition {
        formats: ISO,
        edition: "mobile",
        archive: "user",
        cron: "H H * * 0",
        metapackage: PHONE,
    },
];

/// The only edition of the extra architectures that is not a board image.
const EXTRA_EDITIONS: &[Edition] = &[Edition {
    formats: ISO,
    edition: "unstable",
    archive: "unstable",
    cron: "H H * * 0",
    metapackage: DESKTOP,
}];

/// Legacy board images of the extra architectures.
const BOARD_EDITIONS: &[Edition] = &[
    Edition {
        formats: &[ImageFormat::Img],
        edition: "devedition-gitunstable",
        archive: "dev/unstable",
        cron: "H H * * 0",
        metapackage: DESKTOP,
    },
    Edition {
        formats: &[ImageFormat::Img],
        edition: "useredition",
        archive: "user",
        cron: "H H * * 0",
        metapackage: DESKTOP,
    },
];

/// A future series has no user repository yet.
fn user_archive(axes: &Axes, series: &str) -> &'static str {
    if axes.is_future(series) {
        "release"
    } else {
        "user"
    }
}

fn expand(
    res: &mut Vec<ImageJob>,
    editions: &[Edition],
    imagename: &str,
    series: &str,
    architecture: &str,
    axes: &Axes,
) {
    let is_future = axes.is_future(series);

    for edition in editions {
        let archive = if edition.edition == "user" {
            user_archive(axes, series)
        } else {
            edition.archive
        };

        for format in edition.formats {
            res.push(ImageJob {
                format: *format,
                imagename: imagename.to_string(),
                edition: edition.edition.to_string(),
                series: series.to_string(),
                architecture: architecture.to_string(),
                metapackage: edition.metapackage.to_string(),
                archive: archive.to_string(),
                cron: edition.cron.to_string(),
                // Only containers care about the series being in the future.
                is_future: is_future && *format == ImageFormat::Docker,
            });
        }
    }
}

/// All image jobs of a series.
pub fn image_jobs(axes: &Axes, series: &str) -> Vec<ImageJob> {
    let mut res = vec![];

    for arch in &axes.architectures {
        expand(&mut res, EARLY_EDITIONS, "neon", series, arch, axes);

        if axes.is_early(series) {
            continue;
        }

        expand(&mut res, STANDARD_EDITIONS, "neon", series, arch, axes);
    }

    for arch in &axes.extra_architectures {
        expand(&mut res, EXTRA_EDITIONS, "neon-arm64", series, arch, axes);

        expand(&mut res, BOARD_EDITIONS, "neon", series, arch, axes);
    }

    res
}

#[cfg(test)]
mod test {
    use {super::*, crate::error::Result, indoc::formatdoc};

    fn axes(early: bool) -> Result<Axes> {
        Axes::from_yaml_str(&formatdoc! {"
            series: [jammy, noble]
            current_series: jammy
            future_series: noble
            future_is_early: {}
            types: [unstable, release]
            architectures: [amd64]
            extra_architectures: [arm64]
        ", early})
    }

    fn names(jobs: &[ImageJob]) -> Vec<String> {
        jobs.iter().map(|j| j.name()).collect()
    }

    #[test]
    fn early_future_series_only_gets_unstable() -> Result<()> {
        let axes = axes(true)?;
        let jobs = image_jobs(&axes, "noble");

        assert_eq!(
            names(&jobs),
            vec![
                "iso_neon_unstable_unstable_noble_amd64",
                "docker_neon_unstable_unstable_noble_amd64",
                "iso_neon-arm64_unstable_unstable_noble_arm64",
                "img_neon_dev-unstable_devedition-gitunstable_noble_arm64",
                "img_neon_user_useredition_noble_arm64",
            ]
        );
        assert!(jobs.iter().filter(|j| j.format == ImageFormat::Docker).all(|j| j.is_future));

        // The current series is unaffected by early mode.
        assert!(image_jobs(&axes, "jammy").len() > jobs.len());

        Ok(())
    }

    #[test]
    fn full_edition_set() -> Result<()> {
        let axes = axes(false)?;
        let jobs = image_jobs(&axes, "jammy");

        let standard = jobs.iter().filter(|j| j.architecture == "amd64").count();
        // 12 editions, 4 of which also get a docker image.
        assert_eq!(standard, 16);

        let mut names = names(&jobs);
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);

        let user = jobs
            .iter()
            .find(|j| j.edition == "user" && j.format == ImageFormat::Iso)
            .unwrap();
        assert_eq!(user.archive, "user");
        assert_eq!(user.cron, "H H * * 4");
        assert!(!user.is_future);

        let ko: Vec<_> = jobs.iter().filter(|j| j.edition == "ko").collect();
        assert_eq!(ko.len(), 3);
        assert!(ko.iter().all(|j| j.metapackage == "neon-desktop-ko"));

        Ok(())
    }

    #[test]
    fn future_user_edition_uses_release() -> Result<()> {
        let axes = axes(false)?;
        let jobs = image_jobs(&axes, "noble");

        let user: Vec<_> = jobs.iter().filter(|j| j.edition == "user").collect();
        assert_eq!(user.len(), 2);
        assert!(user.iter().all(|j| j.archive == "release"));
        assert!(user
            .iter()
            .any(|j| j.format == ImageFormat::Docker && j.is_future));

        Ok(())
    }
}
