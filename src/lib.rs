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

//! Spatial place search over a SQLite store.
//!
//! [`search::PlaceSearch`] composes text, attribute and area constraints into
//! one parameterized query, runs it through a [`executor::PlaceSource`] and
//! returns a page of places plus the total match count.

pub mod area;
pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod executor;
pub mod geometry;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod output;
pub mod predicate;
pub mod search;
pub mod spatial;
pub mod sql;
pub mod store;
pub mod transfer;

pub use area::AreaFilter;
pub use area::AreaMatch;
pub use area::InvalidAreaPolicy;
pub use area::SpatialSearchContext;
pub use error::AreaError;
pub use error::SearchError;
pub use executor::Cancellation;
pub use executor::PlaceSource;
pub use model::Coordinate;
pub use model::Place;
pub use model::SearchFilters;
pub use model::SearchResult;
pub use model::Visibility;
pub use search::PlaceSearch;
pub use search::SearchOptions;
