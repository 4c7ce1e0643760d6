// Copyright 2026 Placefind Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for the search engine.

use thiserror::Error;

use crate::area::AreaKind;
use crate::predicate::SpatialOp;

/// Structural problems with an [`AreaFilter`](crate::area::AreaFilter).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AreaError {
    /// Longitude/latitude not finite or outside the WGS84 range.
    #[error("coordinate out of range: lng={lng}, lat={lat}")]
    CoordinateOutOfRange { lng: f64, lat: f64 },

    /// Radius negative or not a finite number.
    #[error("radius must be a finite, non-negative number of kilometers, got {0}")]
    InvalidRadius(f64),

    /// Circle built without a radius.
    #[error("circle filter requires a radius")]
    MissingRadius,

    /// Polygon ring with fewer than four positions.
    #[error("polygon ring needs at least 4 positions, got {0}")]
    PolygonTooShort(usize),

    /// Polygon ring whose first and last positions differ.
    #[error("polygon ring is not closed")]
    PolygonNotClosed,

    /// Bounds with min greater than max on an axis.
    #[error("bounds are inverted: min must not exceed max")]
    BoundsInverted,

    /// Region filter with a blank name.
    #[error("region filter requires a name")]
    EmptyRegion,

    /// Flat coordinate list of the wrong length for its kind.
    #[error("{kind} filter expects {expected} numbers, got {actual}")]
    Arity {
        kind: AreaKind,
        expected: &'static str,
        actual: usize,
    },

    /// Shape that has no meaning for the requested spatial operation.
    #[error("{kind} filter cannot be used for a {op} predicate")]
    Unsupported { op: SpatialOp, kind: AreaKind },
}

/// Failures surfaced by a search call.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Area filter rejected under the `reject` policy.
    #[error("invalid {slot} area filter: {source}")]
    InvalidArea {
        slot: String,
        #[source]
        source: AreaError,
    },

    /// Cancellation token fired or the deadline passed.
    #[error("search cancelled")]
    Cancelled,

    /// Query execution failed in the store.
    #[error("store query failed: {0}")]
    Store(#[from] rusqlite::Error),

    /// Placeholder bookkeeping produced an inconsistent statement.
    #[error("query composition failed: {0}")]
    Compose(String),
}

/// Result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
