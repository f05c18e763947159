// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::element::ElementId;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or querying the geometry substrate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Construction parameters of an index or terrain grid are unusable.
    /// Always fatal for the structure being built.
    #[error("Invalid grid parameters: {0}")]
    InvalidGrid(String),

    #[error("Invalid tolerance configuration: {0}")]
    InvalidConfig(String),

    /// Self-intersecting, zero-area or otherwise unusable input geometry.
    /// Recoverable: the offending item is skipped and reported.
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Invalid clip boundary: {0}")]
    InvalidBoundary(String),

    #[error("Duplicate map element id {0}")]
    DuplicateElement(ElementId),
}

impl Error {
    /// Whether a batch may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::DegenerateGeometry(_))
    }
}
