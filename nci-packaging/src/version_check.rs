// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package version lints.

Our packages must always be newer than whatever the archive already offers,
otherwise an upgrade would never pick them up. When preparing a series upgrade
the opposite holds for the current series: its packages must be older than the
ones in the future series or users would be stuck on them after upgrading.

The version available in the archive ("theirs") comes from `apt-cache policy`
output. Checks are table driven: [VersionReport] runs one check per package of a
loaded list and keeps every outcome.
*/

use {
    crate::{
        error::{PackagingError, Result},
        package_version::PackageVersion,
    },
    once_cell::sync::Lazy,
    regex::Regex,
    serde::{Deserialize, Serialize},
    std::collections::{BTreeMap, BTreeSet},
};

/// Package header lines are not indented.
static POLICY_PACKAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w.+:").expect("static regex should compile"));

/// Candidate lines are always indented.
static POLICY_CANDIDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+Candidate:").expect("static regex should compile"));

static OVERRIDE_PACKAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Package: (.*)").expect("static regex should compile"));

/// A package name and version as listed from one of our repositories.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Package {
    pub name: String,
    pub version: String,
}

impl Package {
    pub fn new(name: impl ToString, version: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    /// Name under which the check of this package is reported.
    pub fn check_name(&self) -> String {
        format!("test_{}_{}", self.name, self.version)
    }
}

/// Candidate versions available in apt, keyed by package name.
///
/// A `None` value means apt knows the package but has no candidate.
#[derive(Clone, Debug, Default)]
pub struct TheirVersions {
    versions: BTreeMap<String, Option<PackageVersion>>,
}

impl TheirVersions {
    /// Parse the output of `apt-cache policy <names...>`.
    pub fn from_apt_cache_policy(output: &str) -> Result<Self> {
        let mut versions = BTreeMap::new();
        let mut name: Option<String> = None;

        for line in output.lines() {
            if POLICY_PACKAGE_RE.is_match(line) {
                name = line
                    .split_once(':')
                    .map(|(name, _)| name.trim().to_string());
                continue;
            }

            if POLICY_CANDIDATE_RE.is_match(line) {
                let version = line
                    .split_once(':')
                    .map(|(_, version)| version.trim())
                    .unwrap_or_default();

                let package = match name.take() {
                    Some(package) if !package.is_empty() && !version.is_empty() => package,
                    _ => return Err(PackagingError::AptCachePolicyParse(line.to_string())),
                };

                let version = if version == "(none)" {
                    None
                } else {
                    Some(PackageVersion::parse(version)?)
                };

                versions.insert(package, version);
            }
        }

        Ok(Self { versions })
    }

    pub fn get(&self, package: &str) -> Option<&PackageVersion> {
        self.versions.get(package).and_then(|x| x.as_ref())
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

impl FromIterator<(String, Option<PackageVersion>)> for TheirVersions {
    fn from_iter<T: IntoIterator<Item = (String, Option<PackageVersion>)>>(iter: T) -> Self {
        Self {
            versions: iter.into_iter().collect(),
        }
    }
}

/// Extract package names pinned by an apt preferences override file.
pub fn parse_override_packages(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .filter_map(|line| OVERRIDE_PACKAGE_RE.captures(line))
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Reduce a package listing to the highest version of each package name.
pub fn latest_versions<'a>(
    packages: impl IntoIterator<Item = &'a Package>,
) -> Result<BTreeMap<String, PackageVersion>> {
    let mut res: BTreeMap<String, PackageVersion> = BTreeMap::new();

    for package in packages {
        let version = PackageVersion::parse(&package.version)?;

        match res.get(&package.name) {
            Some(existing) if existing >= &version => {}
            _ => {
                res.insert(package.name.clone(), version);
            }
        }
    }

    Ok(res)
}

/// A version lint run against one package.
pub trait VersionCheck {
    fn check(&self, package: &Package) -> Result<()>;
}

/// Ours must be greater than the apt candidate, if there is one.
pub struct PackageVersionCheck<'a> {
    theirs: &'a TheirVersions,
}

impl<'a> PackageVersionCheck<'a> {
    pub fn new(theirs: &'a TheirVersions) -> Self {
        Self { theirs }
    }
}

impl<'a> VersionCheck for PackageVersionCheck<'a> {
    fn check(&self, package: &Package) -> Result<()> {
        let ours = PackageVersion::parse(&package.version)?;

        let theirs = match self.theirs.get(&package.name) {
            Some(theirs) => theirs,
            None => return Ok(()),
        };

        if &ours > theirs {
            Ok(())
        } else {
            Err(PackagingError::VersionNotGreater {
                package: package.name.clone(),
                ours: ours.to_string(),
                theirs: theirs.to_string(),
            })
        }
    }
}

/// Ours (current series) must be lower than what the future series will offer.
///
/// The future offer is the higher of the apt candidate and the version in the
/// future series repository. Packages without an apt candidate pass.
pub struct PackageUpgradeVersionCheck<'a> {
    theirs: &'a TheirVersions,
    future: &'a BTreeMap<String, PackageVersion>,
    overrides: &'a BTreeSet<String>,
}

impl<'a> PackageUpgradeVersionCheck<'a> {
    pub fn new(
        theirs: &'a TheirVersions,
        future: &'a BTreeMap<String, PackageVersion>,
        overrides: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            theirs,
            future,
            overrides,
        }
    }
}

impl<'a> VersionCheck for PackageUpgradeVersionCheck<'a> {
    fn check(&self, package: &Package) -> Result<()> {
        if package.name.contains("dbg") {
            return Ok(());
        }

        // Already pinned by the settings package.
        if self.overrides.contains(&package.name) {
            return Ok(());
        }

        let mut theirs = match self.theirs.get(&package.name) {
            Some(theirs) => theirs,
            None => return Ok(()),
        };

        if let Some(future) = self.future.get(&package.name) {
            if future > theirs {
                theirs = future;
            }
        }

        let ours = PackageVersion::parse(&package.version)?;

        if &ours < theirs {
            Ok(())
        } else {
            Err(PackagingError::VersionNotLower {
                package: package.name.clone(),
                ours: ours.to_string(),
                theirs: theirs.to_string(),
            })
        }
    }
}

/// Outcome of running a [VersionCheck] over a package list.
#[derive(Debug, Default)]
pub struct VersionReport {
    outcomes: Vec<(Package, Result<()>)>,
}

impl VersionReport {
    pub fn run<'a>(
        packages: impl IntoIterator<Item = &'a Package>,
        check: &dyn VersionCheck,
    ) -> Self {
        Self {
            outcomes: packages
                .into_iter()
                .map(|package| (package.clone(), check.check(package)))
                .collect(),
        }
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &(Package, Result<()>)> {
        self.outcomes.iter()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Package, &PackagingError)> {
        self.outcomes
            .iter()
            .filter_map(|(package, res)| res.as_ref().err().map(|err| (package, err)))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[cfg(test)]
mod test {
    use {super::*, indoc::indoc};

    const POLICY: &str = indoc! {"
        kcalc:
          Installed: (none)
          Candidate: 4:23.08.0-0ubuntu1
          Version table:
             4:23.08.0-0ubuntu1 500
                500 http://archive.ubuntu.com/ubuntu jammy/universe amd64 Packages
        okular:
          Installed: (none)
          Candidate: (none)
          Version table:
        libkf5config-bin:
          Installed: 5.98.0-0ubuntu1
          Candidate: 5.108.0-0xneon+22.04+jammy+release+build20
    "};

    fn theirs() -> TheirVersions {
        TheirVersions::from_apt_cache_policy(POLICY).unwrap()
    }

    #[test]
    fn parse_policy() -> Result<()> {
        let theirs = TheirVersions::from_apt_cache_policy(POLICY)?;
        assert_eq!(theirs.len(), 3);
        assert_eq!(
            theirs.get("kcalc"),
            Some(&PackageVersion::parse("4:23.08.0-0ubuntu1")?)
        );
        assert_eq!(theirs.get("okular"), None);
        assert_eq!(theirs.get("dolphin"), None);

        Ok(())
    }

    #[test]
    fn parse_policy_candidate_without_package() {
        assert!(matches!(
            TheirVersions::from_apt_cache_policy("  Candidate: 1.0\n"),
            Err(PackagingError::AptCachePolicyParse(_))
        ));
    }

    #[test]
    fn overrides() {
        let content = indoc! {"
            Package: libdrm2
            Pin: release o=Ubuntu
            Pin-Priority: 1100

            Package: neon-settings
        "};
        assert_eq!(
            parse_override_packages(content),
            ["libdrm2", "neon-settings"]
                .iter()
                .map(|x| x.to_string())
                .collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn latest() -> Result<()> {
        let packages = vec![
            Package::new("kcalc", "4:23.04.0-0xneon"),
            Package::new("kcalc", "4:23.08.0-0xneon"),
            Package::new("kcalc", "4:23.04.3-0xneon"),
        ];
        let latest = latest_versions(&packages)?;
        assert_eq!(
            latest.get("kcalc"),
            Some(&PackageVersion::parse("4:23.08.0-0xneon")?)
        );

        Ok(())
    }

    #[test]
    fn version_check_table() {
        let theirs = theirs();
        let check = PackageVersionCheck::new(&theirs);

        // (package, version, passes)
        let table = [
            ("kcalc", "4:23.08.0-0xneon+22.04+jammy+build12", true),
            ("kcalc", "4:23.08.0-0ubuntu1", false),
            ("kcalc", "4:23.04.3-0xneon+22.04+jammy+build3", false),
            ("okular", "4:23.08.0-0xneon", true),
            ("dolphin", "4:23.08.0-0xneon", true),
        ];

        let packages = table
            .iter()
            .map(|(name, version, _)| Package::new(name, version))
            .collect::<Vec<_>>();
        let report = VersionReport::run(&packages, &check);

        for ((package, res), (_, _, passes)) in report.outcomes().zip(table.iter()) {
            assert_eq!(res.is_ok(), *passes, "{}", package.check_name());
        }
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 2);
    }

    #[test]
    fn version_check_error_names_versions() {
        let theirs = theirs();
        let check = PackageVersionCheck::new(&theirs);

        match check.check(&Package::new("kcalc", "4:22.12.3-0xneon")) {
            Err(PackagingError::VersionNotGreater {
                package,
                ours,
                theirs,
            }) => {
                assert_eq!(package, "kcalc");
                assert_eq!(ours, "4:22.12.3-0xneon");
                assert_eq!(theirs, "4:23.08.0-0ubuntu1");
            }
            res => panic!("unexpected result: {:?}", res),
        }
    }

    #[test]
    fn upgrade_check_table() -> Result<()> {
        let theirs = theirs();
        let future = latest_versions(&[Package::new(
            "kcalc",
            "4:23.08.0-0xneon+24.04+noble+build1",
        )])?;
        let overrides = ["libkf5config-bin".to_string()]
            .into_iter()
            .collect::<BTreeSet<_>>();
        let check = PackageUpgradeVersionCheck::new(&theirs, &future, &overrides);

        let table = [
            // Lower than the future repository version, which beats the apt candidate.
            ("kcalc", "4:23.08.0-0xneon+22.04+jammy+build12", true),
            ("kcalc", "4:23.08.1-0xneon+22.04+jammy+build13", false),
            ("kcalc-dbgsym", "99:1", true),
            ("libkf5config-bin", "99:1", true),
            ("okular", "99:1", true),
        ];

        for (name, version, passes) in table {
            let res = check.check(&Package::new(name, version));
            assert_eq!(res.is_ok(), passes, "{} {}", name, version);
        }

        Ok(())
    }
}
