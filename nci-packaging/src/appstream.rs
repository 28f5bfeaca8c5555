// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Filtering of base distribution appstream components.

Third party applications coming from the base distribution should not show up in
software centers; bundles are the supported way to get those. We generate an
exclusion list of all base distribution components of kind `desktop-app`.

Removal only affects lower scored appstream sources, so our own components are
unaffected even when they appear in the list.

Two files are maintained in the target directory:

`removed-components.json`
   The effective exclusion list. Humans may add entries by hand.
`auto-removed-components.json`
   The entries the filter itself added last time. Used to tell manual entries
   apart from generated ones so manual entries are never dropped.
*/

use {
    crate::error::{PackagingError, Result},
    log::info,
    once_cell::sync::Lazy,
    regex::Regex,
    std::{collections::BTreeSet, path::Path, str::FromStr},
    strum::{Display, EnumString},
};

const ID_PREFIX: &str = "Identifier:";

static ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Identifier: (?P<id>[^\s]+) \[(?P<kind>.+)\]")
        .expect("static regex should compile")
});

pub const REMOVED_COMPONENTS_FILE: &str = "removed-components.json";
pub const AUTO_REMOVED_COMPONENTS_FILE: &str = "auto-removed-components.json";

/// Every component kind we have an opinion on.
///
/// The list is explicit on purpose: an unknown kind is an error so somebody has
/// to decide whether it should be filtered.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ComponentKind {
    DesktopApp,
    Unknown,
    Generic,
    ConsoleApp,
    WebApp,
    Service,
    /// Addons do not appear on their own, and filtering them would make the
    /// packages show up with poor metadata.
    Addon,
    Runtime,
    Font,
    Codec,
    InputMethod,
    OperatingSystem,
    Firmware,
    Driver,
    Localization,
    Repository,
    IconTheme,
}

impl ComponentKind {
    pub fn is_filtered(&self) -> bool {
        matches!(self, Self::DesktopApp)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Component {
    pub id: String,
    pub kind: ComponentKind,
}

/// Parse the output of `appstreamcli search '*'`.
pub fn parse_components(search_output: &str) -> Result<Vec<Component>> {
    let mut res = vec![];

    for line in search_output.lines() {
        if !line.starts_with(ID_PREFIX) {
            continue;
        }

        let captures = ID_RE
            .captures(line)
            .ok_or_else(|| PackagingError::AppstreamUnexpectedLine(line.to_string()))?;

        let id = captures["id"].to_string();
        let kind = ComponentKind::from_str(&captures["kind"]).map_err(|_| {
            PackagingError::AppstreamUnknownKind {
                id: id.clone(),
                kind: captures["kind"].to_string(),
            }
        })?;

        res.push(Component { id, kind });
    }

    if res.is_empty() {
        return Err(PackagingError::AppstreamNoComponents);
    }

    Ok(res)
}

/// Ids of components that should be excluded.
pub fn filtered_ids(components: &[Component]) -> BTreeSet<String> {
    components
        .iter()
        .filter(|c| c.kind.is_filtered())
        .map(|c| c.id.clone())
        .collect()
}

/// New content of the two exclusion lists.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RemovedComponents {
    /// Entries generated by this run.
    pub auto: BTreeSet<String>,
    /// Effective exclusion list.
    pub removed: BTreeSet<String>,
}

/// Combine the existing lists with a freshly filtered set.
///
/// Entries of `removed` that were not generated last time (i.e. are not in
/// `previously_auto`) are manual and survive. Generated entries are replaced
/// wholesale by `filtered`.
pub fn merge_removed_components(
    removed: &BTreeSet<String>,
    previously_auto: &BTreeSet<String>,
    filtered: BTreeSet<String>,
) -> RemovedComponents {
    let manual = removed.difference(previously_auto).cloned();

    RemovedComponents {
        removed: manual.chain(filtered.iter().cloned()).collect(),
        auto: filtered,
    }
}

fn read_list(path: &Path) -> Result<BTreeSet<String>> {
    let data = std::fs::read(path)
        .map_err(|e| PackagingError::IoPath(format!("{}", path.display()), e))?;

    Ok(serde_json::from_slice::<Vec<String>>(&data)?
        .into_iter()
        .collect())
}

fn write_list(path: &Path, list: &BTreeSet<String>, pretty: bool) -> Result<()> {
    let list = list.iter().collect::<Vec<_>>();
    let mut data = if pretty {
        serde_json::to_string_pretty(&list)?
    } else {
        serde_json::to_string(&list)?
    };
    data.push('\n');

    std::fs::write(path, data)
        .map_err(|e| PackagingError::IoPath(format!("{}", path.display()), e))
}

/// Update the exclusion lists in `dir` from `appstreamcli search` output.
///
/// `removed-components.json` must already exist. The auto list is optional.
pub fn apply_to_dir(dir: &Path, search_output: &str) -> Result<RemovedComponents> {
    let components = parse_components(search_output)?;
    let filtered = filtered_ids(&components);
    info!(
        "{} of {} appstream components filtered",
        filtered.len(),
        components.len()
    );

    let auto_path = dir.join(AUTO_REMOVED_COMPONENTS_FILE);
    let removed_path = dir.join(REMOVED_COMPONENTS_FILE);

    let previously_auto = if auto_path.exists() {
        read_list(&auto_path)?
    } else {
        BTreeSet::new()
    };
    let removed = read_list(&removed_path)?;

    let res = merge_removed_components(&removed, &previously_auto, filtered);

    write_list(&auto_path, &res.auto, false)?;
    write_list(&removed_path, &res.removed, true)?;

    Ok(res)
}
