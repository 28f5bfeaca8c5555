// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian package version strings and their ordering.

Versions coming out of our repositories look like `4:23.08.0-0xneon+22.04+jammy+build12`
and are compared against whatever `apt-cache policy` reports for the archive. Both sides
must order exactly like `dpkg --compare-versions` or the version lints report nonsense.
*/

use {
    std::{
        cmp::Ordering,
        fmt::{Display, Formatter},
        num::ParseIntError,
        str::FromStr,
    },
    thiserror::Error,
};

#[derive(Clone, Debug, Error)]
pub enum VersionError {
    #[error("error parsing epoch: {0}")]
    ParseInt(#[from] ParseIntError),

    #[error("empty version string")]
    Empty,

    #[error("the epoch component has non-digit characters: {0}")]
    EpochNonNumeric(String),

    #[error("upstream_version component has illegal character: {0}")]
    UpstreamVersionIllegalChar(String),

    #[error("upstream_version must start with a digit: {0}")]
    UpstreamVersionLeadingNonDigit(String),

    #[error("debian_revision component has illegal character: {0}")]
    DebianRevisionIllegalChar(String),
}

pub type Result<T> = std::result::Result<T, VersionError>;

/// A Debian package version.
///
/// The format is `[epoch:]upstream_version[-debian_revision]`. Ordering follows
/// <https://www.debian.org/doc/debian-policy/ch-controlfields.html#version>.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageVersion {
    epoch: Option<u32>,
    upstream_version: String,
    debian_revision: Option<String>,
}

impl PackageVersion {
    /// Construct an instance by parsing a version string.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::Empty);
        }

        let (epoch, remainder) = match s.split_once(':') {
            Some((epoch, remainder)) => {
                if epoch.is_empty() || !epoch.chars().all(|c| c.is_ascii_digit()) {
                    return Err(VersionError::EpochNonNumeric(s.to_string()));
                }

                (Some(u32::from_str(epoch)?), remainder)
            }
            None => (None, s),
        };

        let (upstream, revision) = match remainder.rsplit_once('-') {
            Some((upstream, revision)) => (upstream, Some(revision)),
            None => (remainder, None),
        };

        if !upstream.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(VersionError::UpstreamVersionLeadingNonDigit(s.to_string()));
        }

        // Hyphens are only legal in upstream_version when a debian_revision follows. Colons
        // were consumed by the epoch split above, so any remaining one is illegal.
        let upstream_legal = upstream.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '.' | '+' | '~')
                || (c == '-' && revision.is_some())
        });
        if !upstream_legal {
            return Err(VersionError::UpstreamVersionIllegalChar(s.to_string()));
        }

        if let Some(revision) = revision {
            if revision.is_empty()
                || !revision
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '~'))
            {
                return Err(VersionError::DebianRevisionIllegalChar(s.to_string()));
            }
        }

        Ok(Self {
            epoch,
            upstream_version: upstream.to_string(),
            debian_revision: revision.map(|x| x.to_string()),
        })
    }

    /// The `epoch` component, if present in the version string.
    pub fn epoch(&self) -> Option<u32> {
        self.epoch
    }

    /// Epoch used for comparisons. Absent epochs count as `0`.
    pub fn epoch_assumed(&self) -> u32 {
        self.epoch.unwrap_or(0)
    }

    /// `upstream_version` component.
    ///
    /// Release listings compare this against the version of the published tarball.
    pub fn upstream_version(&self) -> &str {
        &self.upstream_version
    }

    /// `debian_revision` component.
    pub fn debian_revision(&self) -> Option<&str> {
        self.debian_revision.as_deref()
    }
}

impl FromStr for PackageVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Display for PackageVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{}:", epoch)?;
        }

        f.write_str(&self.upstream_version)?;

        if let Some(revision) = &self.debian_revision {
            write!(f, "-{}", revision)?;
        }

        Ok(())
    }
}

/// Sort weight of a character in the non-digit parts of a version.
///
/// A tilde sorts before anything, even the end of a part. Letters sort before
/// everything else.
fn char_weight(c: Option<char>) -> i32 {
    match c {
        Some('~') => -1,
        None => 0,
        Some(c) if c.is_ascii_alphabetic() => c as i32,
        Some(c) => c as i32 + 256,
    }
}

fn compare_non_digits(a: &str, b: &str) -> Ordering {
    let mut a = a.chars();
    let mut b = b.chars();

    loop {
        let (a_char, b_char) = (a.next(), b.next());
        if a_char.is_none() && b_char.is_none() {
            return Ordering::Equal;
        }

        match char_weight(a_char).cmp(&char_weight(b_char)) {
            Ordering::Equal => {}
            res => return res,
        }
    }
}

/// Compare two runs of digits numerically without parsing them into a bounded integer.
///
/// An empty run counts as zero.
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');

    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn split_leading(s: &str, digits: bool) -> (&str, &str) {
    let pos = s
        .find(|c: char| c.is_ascii_digit() != digits)
        .unwrap_or(s.len());

    s.split_at(pos)
}

/// Compare an upstream_version or debian_revision using the dpkg algorithm.
///
/// Alternates between comparing the leading non-digit run lexically and the leading
/// digit run numerically until both inputs are exhausted.
fn compare_component(a: &str, b: &str) -> Ordering {
    let mut a_remaining = a;
    let mut b_remaining = b;

    while !a_remaining.is_empty() || !b_remaining.is_empty() {
        let (a_text, a_rest) = split_leading(a_remaining, false);
        let (b_text, b_rest) = split_leading(b_remaining, false);

        match compare_non_digits(a_text, b_text) {
            Ordering::Equal => {}
            res => return res,
        }

        let (a_number, a_rest) = split_leading(a_rest, true);
        let (b_number, b_rest) = split_leading(b_rest, true);

        match compare_digits(a_number, b_number) {
            Ordering::Equal => {}
            res => return res,
        }

        a_remaining = a_rest;
        b_remaining = b_rest;
    }

    Ordering::Equal
}

impl PartialOrd<Self> for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // A missing debian_revision compares like `0`.
        self.epoch_assumed()
            .cmp(&other.epoch_assumed())
            .then_with(|| compare_component(&self.upstream_version, &other.upstream_version))
            .then_with(|| {
                compare_component(
                    self.debian_revision.as_deref().unwrap_or("0"),
                    other.debian_revision.as_deref().unwrap_or("0"),
                )
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn v(s: &str) -> PackageVersion {
        PackageVersion::parse(s).unwrap()
    }

    #[test]
    fn parse() -> Result<()> {
        assert_eq!(
            PackageVersion::parse("4:23.08.0-0xneon+22.04+jammy+build12")?,
            PackageVersion {
                epoch: Some(4),
                upstream_version: "23.08.0".into(),
                debian_revision: Some("0xneon+22.04+jammy+build12".into()),
            }
        );
        assert_eq!(
            PackageVersion::parse("5.27.7")?,
            PackageVersion {
                epoch: None,
                upstream_version: "5.27.7".into(),
                debian_revision: None,
            }
        );
        assert_eq!(
            PackageVersion::parse("1.2-3-4ubuntu1")?,
            PackageVersion {
                epoch: None,
                upstream_version: "1.2-3".into(),
                debian_revision: Some("4ubuntu1".into()),
            }
        );

        Ok(())
    }

    #[test]
    fn parse_rejects() {
        assert!(matches!(
            PackageVersion::parse("a:1.0"),
            Err(VersionError::EpochNonNumeric(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0_beta"),
            Err(VersionError::UpstreamVersionIllegalChar(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0-"),
            Err(VersionError::DebianRevisionIllegalChar(_))
        ));
        assert!(matches!(
            PackageVersion::parse("beta1"),
            Err(VersionError::UpstreamVersionLeadingNonDigit(_))
        ));
        assert!(matches!(PackageVersion::parse(" "), Err(VersionError::Empty)));
    }

    #[test]
    fn format() -> Result<()> {
        for s in [
            "1:4.7.0+dfsg1-2",
            "3.3.2.final~github",
            "4:23.08.0-0xneon+22.04+jammy+build12",
        ] {
            assert_eq!(PackageVersion::parse(s)?.to_string(), s);
        }

        Ok(())
    }

    #[test]
    fn non_digit_ordering() {
        assert_eq!(compare_non_digits("~~", "~~a"), Ordering::Less);
        assert_eq!(compare_non_digits("~~a", "~"), Ordering::Less);
        assert_eq!(compare_non_digits("~", ""), Ordering::Less);
        assert_eq!(compare_non_digits("", "a"), Ordering::Less);
        assert_eq!(compare_non_digits("a", "+"), Ordering::Less);
        assert_eq!(compare_non_digits("xneon", "ubuntu"), Ordering::Greater);
    }

    #[test]
    fn component_ordering() {
        assert_eq!(
            compare_component("1.0~beta1~svn1245", "1.0~beta1"),
            Ordering::Less
        );
        assert_eq!(compare_component("1.0~beta1", "1.0"), Ordering::Less);
        assert_eq!(compare_component("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_component("1.010", "1.10"), Ordering::Equal);
        assert_eq!(
            compare_component("99999999999999999999999", "1"),
            Ordering::Greater
        );
    }

    #[test]
    fn version_ordering() {
        assert!(v("1:0.1") > v("5.27.7"));
        assert!(v("5.27.7-0ubuntu1") < v("5.27.7-0xneon+22.04"));
        assert_eq!(v("5.27.7").cmp(&v("5.27.7-0")), Ordering::Equal);
        assert!(v("23.08.0~rc1-0xneon") < v("23.08.0-0xneon"));

        let mut versions = vec![v("1.0-2"), v("1:0.5"), v("1.0~rc1-1"), v("1.0-1")];
        versions.sort();
        assert_eq!(
            versions.iter().map(|x| x.to_string()).collect::<Vec<_>>(),
            vec!["1.0~rc1-1", "1.0-1", "1.0-2", "1:0.5"]
        );
    }
}
