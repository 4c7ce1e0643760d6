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

//! Point/polygon payload stored in the `location` and `bounds` columns and
//! bound as a parameter for every spatial predicate.
//!
//! The encoding is GeoJSON geometry text: `{"type":"Point","coordinates":[lng,lat]}`
//! or `{"type":"Polygon","coordinates":[[[lng,lat],...]]}`. Only the outer
//! ring of a polygon is meaningful here.

use geo_types::Geometry;
use geo_types::LineString;
use geo_types::Point;
use geo_types::Polygon;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

use crate::model::Coordinate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeometryPayload {
    Point { coordinates: [f64; 2] },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

impl GeometryPayload {
    pub fn point(coord: Coordinate) -> Self {
        GeometryPayload::Point {
            coordinates: coord.into(),
        }
    }

    pub fn polygon(ring: &[Coordinate]) -> Self {
        GeometryPayload::Polygon {
            coordinates: vec![ring.iter().map(|c| (*c).into()).collect()],
        }
    }

    pub fn encode(&self) -> String {
        let value = match self {
            GeometryPayload::Point { coordinates } => {
                json!({ "type": "Point", "coordinates": coordinates })
            }
            GeometryPayload::Polygon { coordinates } => {
                json!({ "type": "Polygon", "coordinates": coordinates })
            }
        };
        value.to_string()
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn as_point(&self) -> Option<Coordinate> {
        match self {
            GeometryPayload::Point { coordinates } => Some((*coordinates).into()),
            GeometryPayload::Polygon { .. } => None,
        }
    }

    pub fn outer_ring(&self) -> Option<Vec<Coordinate>> {
        match self {
            GeometryPayload::Polygon { coordinates } => coordinates
                .first()
                .map(|ring| ring.iter().map(|pair| (*pair).into()).collect()),
            GeometryPayload::Point { .. } => None,
        }
    }

    pub fn to_geo(&self) -> Geometry<f64> {
        match self {
            GeometryPayload::Point { coordinates } => {
                Geometry::Point(Point::new(coordinates[0], coordinates[1]))
            }
            GeometryPayload::Polygon { coordinates } => {
                let mut rings = coordinates.iter().map(|ring| {
                    LineString::from(
                        ring.iter()
                            .map(|pair| (pair[0], pair[1]))
                            .collect::<Vec<_>>(),
                    )
                });
                let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
                Geometry::Polygon(Polygon::new(exterior, rings.collect()))
            }
        }
    }
}
