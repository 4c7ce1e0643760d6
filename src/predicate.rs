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

//! Turns one `(operation, area)` pair into a parameterized predicate over the
//! `location`/`bounds` geometry columns.
//!
//! | op \ shape  | circle                    | polygon / bounds           | region         |
//! |-------------|---------------------------|----------------------------|----------------|
//! | within      | distance(location) <= r   | location within ring       | name match     |
//! | near        | dwithin(location, r)      | unsupported                | unsupported    |
//! | intersects  | dwithin(bounds or loc, r) | bounds or loc intersects   | name match     |
//!
//! Geometry and radius are always bound parameters; the fragment text only
//! carries relative `$k` markers.

use std::fmt;

use rusqlite::types::Value as SqlValue;

use crate::area::AreaFilter;
use crate::error::AreaError;
use crate::geometry::GeometryPayload;
use crate::model::Coordinate;
use crate::sql::SqlColumn;
use crate::sql::SqlFragment;
use crate::sql::folded_contains;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialOp {
    Within,
    Near,
    Intersects,
}

impl SpatialOp {
    pub fn as_str(self) -> &'static str {
        match self {
            SpatialOp::Within => "within",
            SpatialOp::Near => "near",
            SpatialOp::Intersects => "intersects",
        }
    }
}

impl fmt::Display for SpatialOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a place used by intersection tests: its bounds when it has them.
const PLACE_SHAPE: &str = "coalesce(place.bounds, place.location)";

pub struct SpatialPredicateBuilder;

impl SpatialPredicateBuilder {
    /// Builds the predicate, or explains why the pair cannot produce one.
    /// Callers decide whether an error skips the filter or fails the search.
    pub fn build(op: SpatialOp, area: &AreaFilter) -> Result<SqlFragment, AreaError> {
        area.validate()?;
        let unsupported = || AreaError::Unsupported {
            op,
            kind: area.kind(),
        };

        match area {
            AreaFilter::Circle { center, .. } => {
                let meters = area.radius_meters().ok_or_else(unsupported)?;
                let params = vec![point_param(*center), SqlValue::from(meters)];
                let sql = match op {
                    SpatialOp::Within => {
                        format!("st_distance({}, $1) <= $2", SqlColumn::Location.sql())
                    }
                    SpatialOp::Near => {
                        format!("st_dwithin({}, $1, $2)", SqlColumn::Location.sql())
                    }
                    SpatialOp::Intersects => format!("st_dwithin({PLACE_SHAPE}, $1, $2)"),
                };
                Ok(SqlFragment::raw_with_params(sql, params))
            }
            AreaFilter::Polygon { .. } | AreaFilter::Bounds { .. } => {
                let ring = area.ring().ok_or_else(unsupported)?;
                let params = vec![SqlValue::from(GeometryPayload::polygon(&ring).encode())];
                let sql = match op {
                    SpatialOp::Within => {
                        format!("st_within({}, $1)", SqlColumn::Location.sql())
                    }
                    SpatialOp::Intersects => format!("st_intersects({PLACE_SHAPE}, $1)"),
                    SpatialOp::Near => return Err(unsupported()),
                };
                Ok(SqlFragment::raw_with_params(sql, params))
            }
            AreaFilter::Region { name } => match op {
                SpatialOp::Within | SpatialOp::Intersects => Ok(region_match(name)),
                SpatialOp::Near => Err(unsupported()),
            },
        }
    }
}

fn point_param(coord: Coordinate) -> SqlValue {
    SqlValue::from(GeometryPayload::point(coord).encode())
}

/// Region names match anywhere in the address hierarchy.
fn region_match(name: &str) -> SqlFragment {
    folded_contains(&[SqlColumn::City, SqlColumn::State, SqlColumn::Country], name)
}
