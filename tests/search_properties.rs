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

use std::cell::Cell;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use geo_types::Point;
use placefind::AreaFilter;
use placefind::AreaMatch;
use placefind::Cancellation;
use placefind::Coordinate;
use placefind::InvalidAreaPolicy;
use placefind::Place;
use placefind::PlaceSearch;
use placefind::PlaceSource;
use placefind::SearchError;
use placefind::SearchFilters;
use placefind::SearchOptions;
use placefind::SpatialSearchContext;
use placefind::Visibility;
use placefind::mapper::PlaceRecord;
use placefind::sql::BoundQuery;
use placefind::spatial::haversine_meters;
use placefind::store::Store;
use placefind::store::StoreMode;
use tempfile::TempDir;

fn place(id: &str, lng: f64, lat: f64) -> Place {
    Place {
        id: id.to_string(),
        name: format!("Place {id}"),
        description: None,
        place_type: None,
        location: Some(Coordinate::new(lng, lat)),
        bounds: None,
        address: None,
        city: None,
        state: None,
        country: None,
        postal_code: None,
        categories: BTreeSet::new(),
        tags: BTreeSet::new(),
        rating_avg: None,
        rating_count: 0,
        is_public: true,
        created_by: None,
        created_at: "2026-01-01T00:00:00Z".to_string(),
        distance_km: None,
    }
}

fn with_category(mut place: Place, category: &str) -> Place {
    place.categories.insert(category.to_string());
    place
}

struct Fixture {
    _dir: TempDir,
    path: PathBuf,
}

impl Fixture {
    fn new(places: &[Place]) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("places.db");
        seed(&path, places);
        Self { _dir: dir, path }
    }

    fn reader(&self) -> Store {
        Store::open(&self.path, StoreMode::ReadOnly).expect("open reader")
    }
}

fn seed(path: &Path, places: &[Place]) {
    Store::init(path).expect("init");
    let store = Store::open(path, StoreMode::ReadWrite).expect("open writer");
    store.insert_places(places).expect("insert");
}

fn spatial(area_match: AreaMatch) -> SpatialSearchContext {
    SpatialSearchContext::new(area_match)
}

fn ids(places: &[Place]) -> Vec<&str> {
    places.iter().map(|p| p.id.as_str()).collect()
}

fn sorted_ids(places: &[Place]) -> Vec<String> {
    let mut ids: Vec<String> = places.iter().map(|p| p.id.clone()).collect();
    ids.sort();
    ids
}

fn km_between(a: Coordinate, b: Coordinate) -> f64 {
    haversine_meters(Point::new(a.lng, a.lat), Point::new(b.lng, b.lat)) / 1000.0
}

#[test]
fn circle_scenario_returns_nearest_first() {
    let fixture = Fixture::new(&[place("C", 10.0, 10.0), place("B", 0.0, 0.01), place("A", 0.0, 0.0)]);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());

    let result = engine
        .get_within_distance(0.0, 0.0, 2.0, 10, &Cancellation::new())
        .expect("search");
    assert_eq!(ids(&result.places), vec!["A", "B"]);
    assert_eq!(result.total, 2);

    let nearby = engine
        .get_nearby(0.0, 0.0, 2.0, 10, &Cancellation::new())
        .expect("nearby");
    assert_eq!(ids(&nearby.places), vec!["A", "B"]);
    let b = nearby.places[1].distance_km.expect("distance");
    assert!((b - 1.111_95).abs() < 0.001, "distance was {b}");
}

#[test]
fn bounds_scenario_returns_only_inside_place() {
    let fixture = Fixture::new(&[place("A", 0.5, 0.5), place("B", 5.0, 5.0)]);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());
    let result = engine
        .get_in_area(AreaFilter::bounds(0.0, 0.0, 1.0, 1.0), 10, &Cancellation::new())
        .expect("search");
    assert_eq!(ids(&result.places), vec!["A"]);
}

#[test]
fn circle_results_respect_radius() {
    let center = Coordinate::new(-9.14, 38.72);
    let places: Vec<Place> = (0..40)
        .map(|i| {
            let step = i as f64 * 0.002;
            place(&format!("p{i:02}"), center.lng + step, center.lat - step / 2.0)
        })
        .collect();
    let fixture = Fixture::new(&places);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());

    for radius_km in [0.3, 1.0, 2.5] {
        let result = engine
            .get_nearby(center.lat, center.lng, radius_km, 100, &Cancellation::new())
            .expect("search");
        assert!(!result.places.is_empty());
        for found in &result.places {
            let location = found.location.expect("location");
            assert!(km_between(location, center) <= radius_km + 1e-6);
        }
        let outside = places
            .iter()
            .filter(|p| km_between(p.location.expect("location"), center) > radius_km + 1e-6)
            .count();
        assert_eq!(result.total as usize + outside, places.len());
    }
}

#[test]
fn polygon_containment() {
    let fixture = Fixture::new(&[place("inside", 1.0, 1.0), place("outside", 3.0, 1.0)]);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());
    let triangle = AreaFilter::polygon([(0.0, 0.0), (2.0, 0.0), (1.0, 2.0), (0.0, 0.0)]);
    let result = engine
        .get_in_area(triangle, 10, &Cancellation::new())
        .expect("search");
    assert_eq!(ids(&result.places), vec!["inside"]);
}

#[test]
fn bounds_center_in_and_one_unit_out() {
    let fixture = Fixture::new(&[
        place("center", 15.0, 45.0),
        place("west", 9.0, 45.0),
        place("east", 21.0, 45.0),
        place("south", 15.0, 39.0),
        place("north", 15.0, 51.0),
    ]);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());
    let result = engine
        .get_in_area(AreaFilter::bounds(10.0, 40.0, 20.0, 50.0), 10, &Cancellation::new())
        .expect("search");
    assert_eq!(ids(&result.places), vec!["center"]);
}

#[test]
fn distance_ordering_is_non_decreasing() {
    let reference = Coordinate::new(2.35, 48.85);
    let places = vec![
        place("far", 2.45, 48.90),
        place("mid", 2.38, 48.86),
        place("near", 2.351, 48.851),
        place("tie-b", 2.36, 48.85),
        place("tie-a", 2.36, 48.85),
    ];
    let fixture = Fixture::new(&places);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());
    let result = engine
        .get_nearby(reference.lat, reference.lng, 50.0, 10, &Cancellation::new())
        .expect("search");

    let distances: Vec<f64> = result
        .places
        .iter()
        .map(|p| p.distance_km.expect("distance"))
        .collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]), "{distances:?}");
    assert_eq!(ids(&result.places), vec!["near", "tie-a", "tie-b", "mid", "far"]);
}

#[test]
fn category_and_area_filters_intersect() {
    let places = vec![
        with_category(place("food-in", 0.5, 0.5), "food"),
        with_category(place("food-out", 5.0, 5.0), "food"),
        with_category(place("art-in", 0.6, 0.6), "art"),
        with_category(place("art-out", 6.0, 6.0), "art"),
        with_category(with_category(place("both-in", 0.7, 0.7), "art"), "food"),
    ];
    let fixture = Fixture::new(&places);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());
    let area = AreaFilter::bounds(0.0, 0.0, 1.0, 1.0);

    let combined = engine
        .search(
            &SearchFilters::default().with_category("food"),
            &spatial(AreaMatch::AllOf).within(area.clone()),
            &Cancellation::new(),
        )
        .expect("combined");
    let by_category = engine
        .search(
            &SearchFilters::default().with_category("food"),
            &spatial(AreaMatch::AllOf),
            &Cancellation::new(),
        )
        .expect("category");
    let by_area = engine
        .get_in_area(area, 100, &Cancellation::new())
        .expect("area");

    let category_ids: BTreeSet<String> = sorted_ids(&by_category.places).into_iter().collect();
    let area_ids: BTreeSet<String> = sorted_ids(&by_area.places).into_iter().collect();
    let expected: Vec<String> = category_ids.intersection(&area_ids).cloned().collect();
    assert_eq!(sorted_ids(&combined.places), expected);
    assert_eq!(expected, vec!["both-in".to_string(), "food-in".to_string()]);
}

#[test]
fn pages_cover_every_match_once() {
    let places: Vec<Place> = (0..23)
        .map(|i| {
            let mut p = place(&format!("p{i:02}"), 0.001 * i as f64, 0.0);
            p.created_at = format!("2026-01-{:02}T00:00:00Z", 1 + i % 5);
            p
        })
        .collect();
    let fixture = Fixture::new(&places);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());

    for ctx in [
        spatial(AreaMatch::AllOf),
        spatial(AreaMatch::AllOf).near(AreaFilter::circle(0.0, 0.0, 10.0)),
    ] {
        let mut seen = Vec::new();
        let mut offset = 0;
        loop {
            let page = engine
                .search(
                    &SearchFilters::default().with_limit(5).with_offset(offset),
                    &ctx,
                    &Cancellation::new(),
                )
                .expect("page");
            assert_eq!(page.total, 23);
            seen.extend(page.places.iter().map(|p| p.id.clone()));
            match page.next_offset {
                Some(next) => offset = next,
                None => break,
            }
        }
        assert_eq!(seen.len(), 23);
        let unique: BTreeSet<&String> = seen.iter().collect();
        assert_eq!(unique.len(), 23);
    }
}

#[test]
fn zero_radius_matches_only_the_center() {
    let fixture = Fixture::new(&[place("at", 1.0, 1.0), place("close", 1.0, 1.000_01)]);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());
    let result = engine
        .get_within_distance(1.0, 1.0, 0.0, 10, &Cancellation::new())
        .expect("search");
    assert_eq!(ids(&result.places), vec!["at"]);

    let empty = engine
        .get_nearby(2.0, 2.0, 0.0, 10, &Cancellation::new())
        .expect("search");
    assert!(empty.places.is_empty());
    assert_eq!(empty.total, 0);
}

#[test]
fn radius_is_kilometers_on_every_path() {
    let fixture = Fixture::new(&[place("A", 0.0, 0.0), place("B", 0.0, 0.01)]);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());
    let cancel = Cancellation::new();

    // B is ~1.11 km away: inside 1.5 km, outside 1.0 km, on all three circle paths.
    for radius_km in [1.0, 1.5] {
        let expected = if radius_km > 1.2 { vec!["A", "B"] } else { vec!["A"] };
        let within = engine.get_within_distance(0.0, 0.0, radius_km, 10, &cancel).expect("within");
        let near = engine.get_nearby(0.0, 0.0, radius_km, 10, &cancel).expect("near");
        let intersects = engine
            .get_intersecting(AreaFilter::circle(0.0, 0.0, radius_km), 10, &cancel)
            .expect("intersects");
        assert_eq!(ids(&within.places), expected);
        assert_eq!(ids(&near.places), expected);
        assert_eq!(ids(&intersects.places), expected);
    }
}

#[test]
fn areas_combine_by_explicit_match() {
    let fixture = Fixture::new(&[
        place("west", 0.5, 0.5),
        place("overlap", 1.5, 0.5),
        place("east", 2.5, 0.5),
        place("away", 9.0, 9.0),
    ]);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());
    let ctx = |m| {
        spatial(m)
            .area(AreaFilter::bounds(0.0, 0.0, 2.0, 1.0))
            .area(AreaFilter::bounds(1.0, 0.0, 3.0, 1.0))
    };

    let any = engine
        .search(&SearchFilters::default(), &ctx(AreaMatch::AnyOf), &Cancellation::new())
        .expect("any");
    assert_eq!(sorted_ids(&any.places), vec!["east", "overlap", "west"]);

    let all = engine
        .search(&SearchFilters::default(), &ctx(AreaMatch::AllOf), &Cancellation::new())
        .expect("all");
    assert_eq!(ids(&all.places), vec!["overlap"]);
}

#[test]
fn total_counts_all_matches() {
    let places: Vec<Place> = (0..12).map(|i| place(&format!("p{i:02}"), 0.0, 0.0)).collect();
    let fixture = Fixture::new(&places);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());
    let page = engine
        .get_in_area(AreaFilter::bounds(-1.0, -1.0, 1.0, 1.0), 5, &Cancellation::new())
        .expect("search");
    assert_eq!(page.places.len(), 5);
    assert_eq!(page.total, 12);
    assert_eq!(page.next_offset, Some(5));
}

#[test]
fn invalid_area_skip_and_reject() {
    let fixture = Fixture::new(&[place("A", 0.0, 0.0), place("B", 50.0, 50.0)]);
    let store = fixture.reader();
    let open_ring = AreaFilter::polygon([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);

    let skip = PlaceSearch::new(&store, SearchOptions::default());
    let result = skip
        .get_in_area(open_ring.clone(), 10, &Cancellation::new())
        .expect("skip");
    assert_eq!(result.total, 2);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("ring is not closed"), "{:?}", result.warnings);

    let reject = PlaceSearch::new(
        &store,
        SearchOptions::default().with_invalid_area(InvalidAreaPolicy::Reject),
    );
    let err = reject
        .get_in_area(open_ring, 10, &Cancellation::new())
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidArea { .. }), "{err:?}");

    let err = reject
        .search(
            &SearchFilters::default(),
            &spatial(AreaMatch::AllOf).near(AreaFilter::region("Lisbon")),
            &Cancellation::new(),
        )
        .unwrap_err();
    assert!(err.to_string().contains("near"), "{err}");
}

#[test]
fn cancelled_search_fails_without_results() {
    let fixture = Fixture::new(&[place("A", 0.0, 0.0)]);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());
    let cancel = Cancellation::new();
    cancel.cancel();
    let err = engine
        .get_nearby(0.0, 0.0, 1.0, 10, &cancel)
        .unwrap_err();
    assert!(matches!(err, SearchError::Cancelled));
}

#[test]
fn visibility_limits_private_places() {
    let mut mine = place("mine", 0.0, 0.0);
    mine.is_public = false;
    mine.created_by = Some("u1".to_string());
    let mut theirs = place("theirs", 0.0, 0.0);
    theirs.is_public = false;
    theirs.created_by = Some("u2".to_string());
    let fixture = Fixture::new(&[place("public", 0.0, 0.0), mine, theirs]);
    let store = fixture.reader();
    let cancel = Cancellation::new();
    let everything = spatial(AreaMatch::AllOf);

    let public = PlaceSearch::new(&store, SearchOptions::default())
        .search(&SearchFilters::default(), &everything, &cancel)
        .expect("public");
    assert_eq!(sorted_ids(&public.places), vec!["public"]);

    let user = PlaceSearch::new(&store, SearchOptions::default())
        .with_visibility(Visibility::User("u1".to_string()))
        .search(&SearchFilters::default(), &everything, &cancel)
        .expect("user");
    assert_eq!(sorted_ids(&user.places), vec!["mine", "public"]);

    let all = PlaceSearch::new(&store, SearchOptions::default())
        .with_visibility(Visibility::Unrestricted)
        .search(&SearchFilters::default(), &everything, &cancel)
        .expect("all");
    assert_eq!(all.total, 3);
}

#[test]
fn text_region_and_bounds_intersection() {
    let mut cafe = place("cafe", -9.14, 38.71);
    cafe.name = "Café Central".to_string();
    cafe.city = Some("Lisbon".to_string());
    let mut park = place("park", -8.61, 41.15);
    park.description = Some("A central park".to_string());
    park.city = Some("Porto".to_string());
    let mut campus = place("campus", 5.0, 5.0);
    campus.location = None;
    campus.bounds = Some(vec![
        Coordinate::new(0.0, 0.0),
        Coordinate::new(2.0, 0.0),
        Coordinate::new(2.0, 2.0),
        Coordinate::new(0.0, 2.0),
        Coordinate::new(0.0, 0.0),
    ]);
    let fixture = Fixture::new(&[cafe, park, campus]);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());
    let cancel = Cancellation::new();

    let text = engine
        .search(
            &SearchFilters::default().with_query("CENTRAL"),
            &spatial(AreaMatch::AllOf),
            &cancel,
        )
        .expect("text");
    assert_eq!(sorted_ids(&text.places), vec!["cafe", "park"]);

    let region = engine
        .search(
            &SearchFilters::default().with_query("central"),
            &spatial(AreaMatch::AllOf).within(AreaFilter::region("lisbon")),
            &cancel,
        )
        .expect("region");
    assert_eq!(ids(&region.places), vec!["cafe"]);

    let accented = engine
        .search(
            &SearchFilters::default().with_query("CAFÉ"),
            &spatial(AreaMatch::AllOf),
            &cancel,
        )
        .expect("accented");
    assert_eq!(ids(&accented.places), vec!["cafe"]);

    let touching = engine
        .get_intersecting(AreaFilter::bounds(1.5, 1.5, 3.0, 3.0), 10, &cancel)
        .expect("intersects");
    assert_eq!(ids(&touching.places), vec!["campus"]);
    assert!(touching.places[0].distance_km.is_none());
}

#[test]
fn concurrent_readers_search_independently() {
    let places: Vec<Place> = (0..10).map(|i| place(&format!("p{i}"), 0.01 * i as f64, 0.0)).collect();
    let fixture = Fixture::new(&places);
    let path = fixture.path.clone();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let path = path.clone();
            std::thread::spawn(move || {
                let store = Store::open(&path, StoreMode::ReadOnly).expect("open");
                let engine = PlaceSearch::new(&store, SearchOptions::default());
                let radius = 1.0 + worker as f64;
                engine
                    .get_nearby(0.0, 0.0, radius, 100, &Cancellation::new())
                    .expect("search")
                    .total
            })
        })
        .collect();
    let totals: Vec<u64> = handles
        .into_iter()
        .map(|h| h.join().expect("worker"))
        .collect();
    assert!(totals.windows(2).all(|w| w[0] <= w[1]), "{totals:?}");
    assert_eq!(totals[0], 1);
}

#[test]
fn circle_intersects_polygon_bounds_at_high_latitude() {
    let mut tri = place("tri", 0.0, 0.0);
    tri.location = None;
    tri.bounds = Some(vec![
        Coordinate::new(1.0, 60.0),
        Coordinate::new(0.0, 60.9),
        Coordinate::new(1.0, 60.9),
        Coordinate::new(1.0, 60.0),
    ]);
    let fixture = Fixture::new(&[tri, place("far", 3.0, 60.0)]);
    let store = fixture.reader();
    let engine = PlaceSearch::new(&store, SearchOptions::default());

    // the slanted edge is about 48 km away, the nearest vertex about 55.6 km
    let wide = engine
        .get_intersecting(AreaFilter::circle(0.0, 60.0, 50.0), 10, &Cancellation::new())
        .expect("intersects");
    assert_eq!(ids(&wide.places), vec!["tri"]);

    let narrow = engine
        .get_intersecting(AreaFilter::circle(0.0, 60.0, 40.0), 10, &Cancellation::new())
        .expect("intersects");
    assert!(narrow.places.is_empty());
    assert_eq!(narrow.total, 0);
}

struct CountingSource<'a> {
    inner: &'a Store,
    counts: Cell<usize>,
    fetches: Cell<usize>,
}

impl PlaceSource for CountingSource<'_> {
    fn fetch(
        &self,
        query: &BoundQuery,
        cancel: &Cancellation,
    ) -> Result<Vec<PlaceRecord>, SearchError> {
        self.fetches.set(self.fetches.get() + 1);
        self.inner.fetch(query, cancel)
    }

    fn count(&self, query: &BoundQuery, cancel: &Cancellation) -> Result<u64, SearchError> {
        self.counts.set(self.counts.get() + 1);
        self.inner.count(query, cancel)
    }
}

#[test]
fn store_failure_propagates_without_retry() {
    let fixture = Fixture::new(&[place("A", 0.0, 0.0)]);
    rusqlite::Connection::open(&fixture.path)
        .expect("open raw")
        .execute_batch("DROP TABLE place")
        .expect("drop table");

    let store = fixture.reader();
    let source = CountingSource {
        inner: &store,
        counts: Cell::new(0),
        fetches: Cell::new(0),
    };
    let err = PlaceSearch::new(&source, SearchOptions::default())
        .get_nearby(0.0, 0.0, 1.0, 10, &Cancellation::new())
        .unwrap_err();
    assert!(matches!(err, SearchError::Store(_)), "{err:?}");
    assert!(err.to_string().contains("no such table"), "{err}");
    assert_eq!(source.counts.get(), 1);
    assert_eq!(source.fetches.get(), 0);
}
