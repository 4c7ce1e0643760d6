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

//! `st_distance`, `st_dwithin`, `st_within` and `st_intersects` as SQL
//! scalar functions. NULL or undecodable geometry yields NULL.

use geo::Contains;
use geo::Intersects;
use geo_types::Geometry;
use geo_types::Line;
use geo_types::Point;
use rusqlite::Connection;
use rusqlite::functions::Context;
use rusqlite::functions::FunctionFlags;

use crate::geometry::GeometryPayload;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

pub fn register_spatial_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("st_distance", 2, flags, |ctx| {
        Ok(match (geometry_arg(ctx, 0), geometry_arg(ctx, 1)) {
            (Some(geom), Some(point)) => distance_meters(&geom, &point),
            _ => None,
        })
    })?;

    conn.create_scalar_function("st_dwithin", 3, flags, |ctx| {
        let meters: Option<f64> = ctx.get(2)?;
        Ok(match (geometry_arg(ctx, 0), geometry_arg(ctx, 1), meters) {
            (Some(geom), Some(point), Some(meters)) => {
                distance_meters(&geom, &point).map(|d| d <= meters)
            }
            _ => None,
        })
    })?;

    conn.create_scalar_function("st_within", 2, flags, |ctx| {
        Ok(match (geometry_arg(ctx, 0), geometry_arg(ctx, 1)) {
            (Some(geom), Some(area)) => within(&geom, &area),
            _ => None,
        })
    })?;

    conn.create_scalar_function("st_intersects", 2, flags, |ctx| {
        Ok(match (geometry_arg(ctx, 0), geometry_arg(ctx, 1)) {
            (Some(a), Some(b)) => Some(a.intersects(&b)),
            _ => None,
        })
    })?;

    Ok(())
}

fn geometry_arg(ctx: &Context<'_>, idx: usize) -> Option<Geometry<f64>> {
    let text: Option<String> = ctx.get(idx).ok().flatten();
    let payload = GeometryPayload::decode(text.as_deref()?).ok()?;
    Some(payload.to_geo())
}

/// Great-circle distance between two WGS84 points, in meters.
pub fn haversine_meters(a: Point<f64>, b: Point<f64>) -> f64 {
    let lat1 = a.y().to_radians();
    let lat2 = b.y().to_radians();
    let delta_lat = (b.y() - a.y()).to_radians();
    let delta_lng = (b.x() - a.x()).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Distance from a point or polygon to a point. For polygons this is the
/// smallest distance to any ring segment.
pub fn distance_meters(geom: &Geometry<f64>, point: &Geometry<f64>) -> Option<f64> {
    let Geometry::Point(target) = point else {
        return None;
    };
    match geom {
        Geometry::Point(p) => Some(haversine_meters(*p, *target)),
        Geometry::Polygon(poly) => {
            if poly.intersects(target) {
                return Some(0.0);
            }
            std::iter::once(poly.exterior())
                .chain(poly.interiors())
                .flat_map(|ring| ring.lines())
                .map(|segment| segment_distance_meters(segment, *target))
                .reduce(f64::min)
        }
        _ => None,
    }
}

// Projection runs in a local equirectangular frame at the target latitude so
// longitude degrees shrink with cos(lat); endpoints are always candidates.
fn segment_distance_meters(segment: Line<f64>, target: Point<f64>) -> f64 {
    let start = Point::from(segment.start);
    let end = Point::from(segment.end);
    let ends = haversine_meters(start, target).min(haversine_meters(end, target));

    let scale = target.y().to_radians().cos();
    let dx = (end.x() - start.x()) * scale;
    let dy = end.y() - start.y();
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return ends;
    }

    let t = (((target.x() - start.x()) * scale) * dx + (target.y() - start.y()) * dy) / len2;
    let t = t.clamp(0.0, 1.0);
    let foot = Point::new(
        start.x() + t * (end.x() - start.x()),
        start.y() + t * (end.y() - start.y()),
    );
    haversine_meters(foot, target).min(ends)
}

/// `geom` lies inside `area` or on its boundary.
pub fn within(geom: &Geometry<f64>, area: &Geometry<f64>) -> Option<bool> {
    let Geometry::Polygon(area) = area else {
        return None;
    };
    match geom {
        Geometry::Point(p) => Some(area.intersects(p)),
        Geometry::Polygon(poly) => Some(area.contains(poly)),
        _ => None,
    }
}
