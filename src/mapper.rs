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

//! Row decoding. A row whose geometry or set columns fail to decode keeps
//! its other fields; the broken field is left empty and logged.

use std::collections::BTreeSet;

use rusqlite::Row;
use tracing::warn;

use crate::area::METERS_PER_KILOMETER;
use crate::geometry::GeometryPayload;
use crate::model::Coordinate;
use crate::model::Place;

/// Raw place row as read from the store, columns in `PLACE_COLUMNS` order
/// followed by the optional distance in meters.
#[derive(Debug, Clone, Default)]
pub struct PlaceRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub place_type: Option<String>,
    pub location: Option<String>,
    pub bounds: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub categories: Option<String>,
    pub tags: Option<String>,
    pub rating_avg: Option<f64>,
    pub rating_count: i64,
    pub is_public: bool,
    pub created_by: Option<String>,
    pub created_at: String,
    pub distance_m: Option<f64>,
}

impl PlaceRecord {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            place_type: row.get(3)?,
            location: row.get(4)?,
            bounds: row.get(5)?,
            address: row.get(6)?,
            city: row.get(7)?,
            state: row.get(8)?,
            country: row.get(9)?,
            postal_code: row.get(10)?,
            categories: row.get(11)?,
            tags: row.get(12)?,
            rating_avg: row.get(13)?,
            rating_count: row.get(14)?,
            is_public: row.get(15)?,
            created_by: row.get(16)?,
            created_at: row.get(17)?,
            distance_m: row.get(18)?,
        })
    }
}

pub fn map_record(record: PlaceRecord) -> Place {
    let location = record
        .location
        .as_deref()
        .and_then(|text| decode_point(&record.id, text));
    let bounds = record
        .bounds
        .as_deref()
        .and_then(|text| decode_ring(&record.id, text));
    let categories = decode_set(&record.id, "categories", record.categories.as_deref());
    let tags = decode_set(&record.id, "tags", record.tags.as_deref());

    Place {
        id: record.id,
        name: record.name,
        description: record.description,
        place_type: record.place_type,
        location,
        bounds,
        address: record.address,
        city: record.city,
        state: record.state,
        country: record.country,
        postal_code: record.postal_code,
        categories,
        tags,
        rating_avg: record.rating_avg,
        rating_count: record.rating_count,
        is_public: record.is_public,
        created_by: record.created_by,
        created_at: record.created_at,
        distance_km: record.distance_m.map(|m| m / METERS_PER_KILOMETER),
    }
}

fn decode_point(id: &str, text: &str) -> Option<Coordinate> {
    match GeometryPayload::decode(text) {
        Ok(payload) => {
            let point = payload.as_point();
            if point.is_none() {
                warn!(place = id, "location is not a point; leaving it empty");
            }
            point
        }
        Err(err) => {
            warn!(place = id, error = %err, "undecodable location; leaving it empty");
            None
        }
    }
}

fn decode_ring(id: &str, text: &str) -> Option<Vec<Coordinate>> {
    match GeometryPayload::decode(text) {
        Ok(payload) => {
            let ring = payload.outer_ring();
            if ring.is_none() {
                warn!(place = id, "bounds is not a polygon; leaving it empty");
            }
            ring
        }
        Err(err) => {
            warn!(place = id, error = %err, "undecodable bounds; leaving it empty");
            None
        }
    }
}

fn decode_set(id: &str, field: &str, text: Option<&str>) -> BTreeSet<String> {
    let Some(text) = text else {
        return BTreeSet::new();
    };
    serde_json::from_str(text).unwrap_or_else(|err| {
        warn!(place = id, field, error = %err, "undecodable set column; leaving it empty");
        BTreeSet::new()
    })
}
