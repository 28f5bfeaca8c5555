// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Packaging primitives used by the neon CI tooling.

This crate holds the pieces of the CI that reason about packages rather than
about jobs.

The [package_version] module implements Debian package version parsing,
formatting and comparison. [package_version::PackageVersion] is the main type.

The [version_check] module implements the package version lints run against our
repositories: [version_check::PackageVersionCheck] makes sure our packages are newer
than what apt already offers and [version_check::PackageUpgradeVersionCheck] makes
sure the current series stays below the future series. Candidates are read from
`apt-cache policy` output via [version_check::TheirVersions].

The [apt] module plans `apt-get`, `apt-key` and `add-apt-repository` invocations from
an explicit command set. [apt::AptContext] carries the state deciding when package
lists need refreshing.

The [appstream] module maintains the exclusion list of base distribution appstream
components.

Nothing in this crate spawns processes or talks to the network.
*/

pub mod appstream;
pub mod apt;
pub mod error;
pub mod package_version;
pub mod version_check;
