// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {crate::package_version::VersionError, thiserror::Error};

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0:?}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("I/O error on path {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("unexpected apt-cache policy line: {0}")]
    AptCachePolicyParse(String),

    #[error("appstream identifier line not understood: {0}")]
    AppstreamUnexpectedLine(String),

    #[error("unexpected appstream component kind {kind} on {id}")]
    AppstreamUnknownKind { id: String, kind: String },

    #[error("no appstream components found")]
    AppstreamNoComponents,

    #[error("our version of {package} {ours} is not greater than {theirs} available in apt; the package is out of date or regressed in version")]
    VersionNotGreater {
        package: String,
        ours: String,
        theirs: String,
    },

    #[error("current series version of {package} {ours} is not lower than future series version {theirs}")]
    VersionNotLower {
        package: String,
        ours: String,
        theirs: String,
    },
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, PackagingError>;
