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

//! Geometric area constraints and the per-call spatial search context.
//!
//! Radii are kilometers throughout the public API. [`AreaFilter::radius_meters`]
//! is the only conversion to the store's distance unit.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::error::AreaError;
use crate::model::Coordinate;

pub const METERS_PER_KILOMETER: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
    Circle,
    Polygon,
    Bounds,
    Region,
}

impl AreaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AreaKind::Circle => "circle",
            AreaKind::Polygon => "polygon",
            AreaKind::Bounds => "bounds",
            AreaKind::Region => "region",
        }
    }
}

impl fmt::Display for AreaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One geometric constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AreaFilter {
    Circle {
        center: Coordinate,
        radius_km: f64,
    },
    /// Closed ring: first position equals last.
    Polygon {
        ring: Vec<Coordinate>,
    },
    Bounds {
        min_lng: f64,
        min_lat: f64,
        max_lng: f64,
        max_lat: f64,
    },
    /// Named region, matched against city/state/country.
    Region {
        name: String,
    },
}

impl AreaFilter {
    pub fn circle(lng: f64, lat: f64, radius_km: f64) -> Self {
        AreaFilter::Circle {
            center: Coordinate::new(lng, lat),
            radius_km,
        }
    }

    pub fn polygon(ring: impl IntoIterator<Item = (f64, f64)>) -> Self {
        AreaFilter::Polygon {
            ring: ring
                .into_iter()
                .map(|(lng, lat)| Coordinate::new(lng, lat))
                .collect(),
        }
    }

    pub fn bounds(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        AreaFilter::Bounds {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    pub fn region(name: impl Into<String>) -> Self {
        AreaFilter::Region { name: name.into() }
    }

    /// Builds a filter from flat, loosely typed input such as query-string
    /// parameters. Only arity is checked here; call [`validate`](Self::validate)
    /// for the shape rules.
    pub fn from_parts(
        kind: AreaKind,
        coordinates: &[f64],
        radius_km: Option<f64>,
        name: Option<&str>,
    ) -> Result<Self, AreaError> {
        match kind {
            AreaKind::Circle => {
                let [lng, lat] = coordinates else {
                    return Err(AreaError::Arity {
                        kind,
                        expected: "2",
                        actual: coordinates.len(),
                    });
                };
                let radius_km = radius_km.ok_or(AreaError::MissingRadius)?;
                Ok(AreaFilter::circle(*lng, *lat, radius_km))
            }
            AreaKind::Polygon => {
                if coordinates.len() < 8 || coordinates.len() % 2 != 0 {
                    return Err(AreaError::Arity {
                        kind,
                        expected: "an even count of at least 8",
                        actual: coordinates.len(),
                    });
                }
                Ok(AreaFilter::polygon(
                    coordinates.chunks_exact(2).map(|pair| (pair[0], pair[1])),
                ))
            }
            AreaKind::Bounds => {
                let [min_lng, min_lat, max_lng, max_lat] = coordinates else {
                    return Err(AreaError::Arity {
                        kind,
                        expected: "4",
                        actual: coordinates.len(),
                    });
                };
                Ok(AreaFilter::bounds(*min_lng, *min_lat, *max_lng, *max_lat))
            }
            AreaKind::Region => match name.map(str::trim) {
                Some(name) if !name.is_empty() => Ok(AreaFilter::region(name)),
                _ => Err(AreaError::EmptyRegion),
            },
        }
    }

    pub fn kind(&self) -> AreaKind {
        match self {
            AreaFilter::Circle { .. } => AreaKind::Circle,
            AreaFilter::Polygon { .. } => AreaKind::Polygon,
            AreaFilter::Bounds { .. } => AreaKind::Bounds,
            AreaFilter::Region { .. } => AreaKind::Region,
        }
    }

    pub fn validate(&self) -> Result<(), AreaError> {
        match self {
            AreaFilter::Circle { center, radius_km } => {
                check_coordinate(center)?;
                if !radius_km.is_finite() || *radius_km < 0.0 {
                    return Err(AreaError::InvalidRadius(*radius_km));
                }
                Ok(())
            }
            AreaFilter::Polygon { ring } => {
                if ring.len() < 4 {
                    return Err(AreaError::PolygonTooShort(ring.len()));
                }
                for coord in ring {
                    check_coordinate(coord)?;
                }
                if ring.first() != ring.last() {
                    return Err(AreaError::PolygonNotClosed);
                }
                Ok(())
            }
            AreaFilter::Bounds {
                min_lng,
                min_lat,
                max_lng,
                max_lat,
            } => {
                check_coordinate(&Coordinate::new(*min_lng, *min_lat))?;
                check_coordinate(&Coordinate::new(*max_lng, *max_lat))?;
                if min_lng > max_lng || min_lat > max_lat {
                    return Err(AreaError::BoundsInverted);
                }
                Ok(())
            }
            AreaFilter::Region { name } => {
                if name.trim().is_empty() {
                    return Err(AreaError::EmptyRegion);
                }
                Ok(())
            }
        }
    }

    pub fn center(&self) -> Option<Coordinate> {
        match self {
            AreaFilter::Circle { center, .. } => Some(*center),
            _ => None,
        }
    }

    pub fn radius_meters(&self) -> Option<f64> {
        match self {
            AreaFilter::Circle { radius_km, .. } => Some(radius_km * METERS_PER_KILOMETER),
            _ => None,
        }
    }

    /// Outer ring for polygon-like shapes; bounds expand to a closed
    /// counter-clockwise rectangle.
    pub fn ring(&self) -> Option<Vec<Coordinate>> {
        match self {
            AreaFilter::Polygon { ring } => Some(ring.clone()),
            AreaFilter::Bounds {
                min_lng,
                min_lat,
                max_lng,
                max_lat,
            } => Some(vec![
                Coordinate::new(*min_lng, *min_lat),
                Coordinate::new(*max_lng, *min_lat),
                Coordinate::new(*max_lng, *max_lat),
                Coordinate::new(*min_lng, *max_lat),
                Coordinate::new(*min_lng, *min_lat),
            ]),
            AreaFilter::Circle { .. } | AreaFilter::Region { .. } => None,
        }
    }
}

fn check_coordinate(coord: &Coordinate) -> Result<(), AreaError> {
    if coord.is_valid() {
        Ok(())
    } else {
        Err(AreaError::CoordinateOutOfRange {
            lng: coord.lng,
            lat: coord.lat,
        })
    }
}

/// How the entries of [`SpatialSearchContext::areas`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaMatch {
    AnyOf,
    AllOf,
}

/// What to do with an area filter that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidAreaPolicy {
    /// Drop the filter, log it, and run the rest of the query.
    #[default]
    Skip,
    /// Fail the search with `SearchError::InvalidArea`.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialSearchContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub within: Option<AreaFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub near: Option<AreaFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersects: Option<AreaFilter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub areas: Vec<AreaFilter>,
    pub area_match: AreaMatch,
}

impl SpatialSearchContext {
    pub fn new(area_match: AreaMatch) -> Self {
        Self {
            within: None,
            near: None,
            intersects: None,
            areas: Vec::new(),
            area_match,
        }
    }

    pub fn within(mut self, area: AreaFilter) -> Self {
        self.within = Some(area);
        self
    }

    pub fn near(mut self, area: AreaFilter) -> Self {
        self.near = Some(area);
        self
    }

    pub fn intersects(mut self, area: AreaFilter) -> Self {
        self.intersects = Some(area);
        self
    }

    pub fn area(mut self, area: AreaFilter) -> Self {
        self.areas.push(area);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.within.is_none()
            && self.near.is_none()
            && self.intersects.is_none()
            && self.areas.is_empty()
    }

    /// Point used for distance ordering: `near`, then `within`, then
    /// `intersects`, whichever is a circle first.
    pub fn reference_point(&self) -> Option<Coordinate> {
        [&self.near, &self.within, &self.intersects]
            .into_iter()
            .flatten()
            .filter(|area| area.validate().is_ok())
            .find_map(AreaFilter::center)
    }
}
