// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The generation matrix: series, release types and architectures.

Axes are loaded from a YAML document like:

```yaml
series: [focal, jammy, noble]
current_series: jammy
old_series: focal
future_series: noble
future_is_early: true
types: [unstable, stable, release, experimental, qt_6_stage]
qt_stage_type: qt_6_stage
architectures: [amd64]
extra_architectures: [arm64]
```
*/

use {
    crate::error::{JobsError, Result},
    serde::{Deserialize, Serialize},
    std::{collections::BTreeSet, path::Path},
};

/// Types whose builds run on every architecture, including the extra ones.
///
/// All other types only build on the standard architectures; builders for the extra
/// architectures are scarce.
pub const ALL_ARCHITECTURE_TYPES: &[&str] = &["unstable", "stable", "release", "experimental"];

/// The type whose projects are merged between packaging branches.
pub const MERGE_TYPE: &str = "unstable";

/// The type whose upstreams are watched for new releases.
pub const WATCH_TYPE: &str = "release";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Axes {
    /// Series of the base distribution, oldest first.
    pub series: Vec<String>,
    pub current_series: String,
    /// Legacy series. Still built on demand but never part of the daily cycle.
    #[serde(default)]
    pub old_series: Option<String>,
    #[serde(default)]
    pub future_series: Option<String>,
    /// While set, the future series only gets the unstable images.
    #[serde(default)]
    pub future_is_early: bool,
    pub types: Vec<String>,
    /// Staging type for Qt that never gets aggregated.
    #[serde(default)]
    pub qt_stage_type: Option<String>,
    /// Standard architectures.
    pub architectures: Vec<String>,
    /// Secondary architectures.
    #[serde(default)]
    pub extra_architectures: Vec<String>,
}

impl Axes {
    /// Parse and validate axes from YAML.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let axes: Self = serde_yaml::from_str(s)?;
        axes.validate()?;

        Ok(axes)
    }

    /// Parse and validate axes from a YAML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| JobsError::IoPath(format!("{}", path.display()), e))?;

        Self::from_yaml_str(&data)
    }

    /// Ensure every designation refers to something declared.
    pub fn validate(&self) -> Result<()> {
        if self.series.is_empty() {
            return Err(JobsError::MissingAxis("series"));
        }
        if self.types.is_empty() {
            return Err(JobsError::MissingAxis("types"));
        }
        if self.architectures.is_empty() {
            return Err(JobsError::MissingAxis("architectures"));
        }
        if self.current_series.is_empty() {
            return Err(JobsError::MissingAxis("current_series"));
        }

        for (field, values) in [
            ("series", &self.series),
            ("types", &self.types),
            ("architectures", &self.architectures),
        ] {
            let mut seen = BTreeSet::new();
            if let Some(value) = values.iter().find(|v| !seen.insert(v.as_str())) {
                return Err(JobsError::RepeatedAxisValue(field, value.clone()));
            }
        }

        let designations = [
            ("current_series", Some(&self.current_series)),
            ("old_series", self.old_series.as_ref()),
            ("future_series", self.future_series.as_ref()),
        ]
        .into_iter()
        .filter_map(|(field, series)| series.map(|series| (field, series)))
        .collect::<Vec<_>>();

        for (i, &(field, series)) in designations.iter().enumerate() {
            if !self.has_series(series) {
                return Err(JobsError::UnknownSeries(field, series.clone()));
            }
            if let Some(&(other, _)) = designations[..i].iter().find(|(_, s)| *s == series) {
                return Err(JobsError::ConflictingSeries(other, field, series.clone()));
            }
        }

        if let Some(qt) = &self.qt_stage_type {
            if !self.has_type(qt) {
                return Err(JobsError::UnknownType("qt_stage_type", qt.clone()));
            }
        }

        Ok(())
    }

    pub fn has_series(&self, series: &str) -> bool {
        self.series.iter().any(|s| s == series)
    }

    pub fn has_type(&self, release_type: &str) -> bool {
        self.types.iter().any(|t| t == release_type)
    }

    pub fn is_current(&self, series: &str) -> bool {
        self.current_series == series
    }

    pub fn is_old(&self, series: &str) -> bool {
        self.old_series.as_deref() == Some(series)
    }

    pub fn is_future(&self, series: &str) -> bool {
        self.future_series.as_deref() == Some(series)
    }

    /// Whether `series` is the future series and still in early mode.
    pub fn is_early(&self, series: &str) -> bool {
        self.future_is_early && self.is_future(series)
    }

    pub fn is_qt_stage(&self, release_type: &str) -> bool {
        self.qt_stage_type.as_deref() == Some(release_type)
    }

    /// Standard architectures followed by the extra ones, without duplicates.
    pub fn all_architectures(&self) -> Vec<String> {
        let mut res: Vec<String> = vec![];
        for arch in self.architectures.iter().chain(self.extra_architectures.iter()) {
            if !res.contains(arch) {
                res.push(arch.clone());
            }
        }

        res
    }

    /// Architectures builds of `release_type` run on.
    pub fn architectures_for_type(&self, release_type: &str) -> Vec<String> {
        if ALL_ARCHITECTURE_TYPES.contains(&release_type) {
            self.all_architectures()
        } else {
            self.architectures.clone()
        }
    }

    /// Packaging branch names that map onto the matrix.
    ///
    /// `Neon/<type>` for every type, `Neon/<type>_<series>` for branches only
    /// applicable to one series, and `master`.
    pub fn recognized_branches(&self) -> Vec<String> {
        let mut res = vec![];
        for t in &self.types {
            res.push(format!("Neon/{}", t));
            for s in &self.series {
                res.push(format!("Neon/{}_{}", t, s));
            }
        }
        res.push("master".to_string());

        res
    }
}

#[cfg(test)]
mod test {
    use {super::*, indoc::indoc};

    const AXES: &str = indoc! {"
        series: [focal, jammy, noble]
        current_series: jammy
        old_series: focal
        future_series: noble
        future_is_early: true
        types: [unstable, stable, release, experimental, testing, qt_6_stage]
        qt_stage_type: qt_6_stage
        architectures: [amd64]
        extra_architectures: [arm64]
    "};

    #[test]
    fn parse() -> Result<()> {
        let axes = Axes::from_yaml_str(AXES)?;
        assert!(axes.is_old("focal"));
        assert!(axes.is_current("jammy"));
        assert!(axes.is_early("noble"));
        assert!(!axes.is_early("jammy"));
        assert!(axes.is_qt_stage("qt_6_stage"));
        assert_eq!(axes.all_architectures(), vec!["amd64", "arm64"]);

        Ok(())
    }

    #[test]
    fn architecture_policy() -> Result<()> {
        let axes = Axes::from_yaml_str(AXES)?;

        for t in ["unstable", "stable", "release", "experimental"] {
            assert_eq!(axes.architectures_for_type(t), vec!["amd64", "arm64"], "{}", t);
        }
        for t in ["testing", "qt_6_stage"] {
            assert_eq!(axes.architectures_for_type(t), vec!["amd64"], "{}", t);
        }

        Ok(())
    }

    #[test]
    fn recognized_branches() -> Result<()> {
        let axes = Axes::from_yaml_str(indoc! {"
            series: [jammy]
            current_series: jammy
            types: [unstable, release]
            architectures: [amd64]
        "})?;

        assert_eq!(
            axes.recognized_branches(),
            vec![
                "Neon/unstable",
                "Neon/unstable_jammy",
                "Neon/release",
                "Neon/release_jammy",
                "master"
            ]
        );

        Ok(())
    }

    #[test]
    fn validation() {
        assert!(matches!(
            Axes::from_yaml_str("series: []\ncurrent_series: jammy\ntypes: [unstable]\narchitectures: [amd64]\n"),
            Err(JobsError::MissingAxis("series"))
        ));
        assert!(matches!(
            Axes::from_yaml_str("series: [jammy]\ncurrent_series: noble\ntypes: [unstable]\narchitectures: [amd64]\n"),
            Err(JobsError::UnknownSeries("current_series", _))
        ));
        assert!(matches!(
            Axes::from_yaml_str("series: [jammy]\ncurrent_series: jammy\ntypes: [unstable]\nqt_stage_type: qt\narchitectures: [amd64]\n"),
            Err(JobsError::UnknownType("qt_stage_type", _))
        ));
        assert!(matches!(
            Axes::from_yaml_str("series: [jammy]\ntypes: [unstable]\narchitectures: [amd64]\n"),
            Err(JobsError::SerdeYaml(_))
        ));
    }

    #[test]
    fn repeated_axis_values() {
        assert!(matches!(
            Axes::from_yaml_str("series: [jammy, jammy]\ncurrent_series: jammy\ntypes: [unstable]\narchitectures: [amd64]\n"),
            Err(JobsError::RepeatedAxisValue("series", s)) if s == "jammy"
        ));
        assert!(matches!(
            Axes::from_yaml_str("series: [jammy]\ncurrent_series: jammy\ntypes: [unstable, release, unstable]\narchitectures: [amd64]\n"),
            Err(JobsError::RepeatedAxisValue("types", s)) if s == "unstable"
        ));
        assert!(matches!(
            Axes::from_yaml_str("series: [jammy]\ncurrent_series: jammy\ntypes: [unstable]\narchitectures: [amd64, amd64]\n"),
            Err(JobsError::RepeatedAxisValue("architectures", s)) if s == "amd64"
        ));
    }

    #[test]
    fn conflicting_series_designations() {
        assert!(matches!(
            Axes::from_yaml_str("series: [jammy, noble]\ncurrent_series: jammy\nfuture_series: jammy\ntypes: [unstable]\narchitectures: [amd64]\n"),
            Err(JobsError::ConflictingSeries("current_series", "future_series", s)) if s == "jammy"
        ));
        assert!(matches!(
            Axes::from_yaml_str("series: [focal, jammy]\ncurrent_series: jammy\nold_series: jammy\ntypes: [unstable]\narchitectures: [amd64]\n"),
            Err(JobsError::ConflictingSeries("current_series", "old_series", s)) if s == "jammy"
        ));
        assert!(matches!(
            Axes::from_yaml_str("series: [focal, jammy]\ncurrent_series: jammy\nold_series: focal\nfuture_series: focal\ntypes: [unstable]\narchitectures: [amd64]\n"),
            Err(JobsError::ConflictingSeries("old_series", "future_series", s)) if s == "focal"
        ));
    }
}
