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

use tracing::debug;

use crate::area::AreaFilter;
use crate::area::AreaMatch;
use crate::area::InvalidAreaPolicy;
use crate::area::SpatialSearchContext;
use crate::compose::QueryComposer;
use crate::config::Config;
use crate::error::Result;
use crate::executor::Cancellation;
use crate::executor::PlaceSource;
use crate::executor::SearchExecutor;
use crate::model::SearchFilters;
use crate::model::SearchResult;
use crate::model::Visibility;

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub invalid_area: InvalidAreaPolicy,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            invalid_area: InvalidAreaPolicy::Skip,
            default_limit: 20,
            max_limit: 100,
        }
    }
}

impl From<&Config> for SearchOptions {
    fn from(config: &Config) -> Self {
        Self {
            invalid_area: config.invalid_area,
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        }
    }
}

impl SearchOptions {
    pub fn with_invalid_area(mut self, policy: InvalidAreaPolicy) -> Self {
        self.invalid_area = policy;
        self
    }

    fn effective_limit(&self, requested: Option<usize>) -> usize {
        let max = self.max_limit.max(1);
        requested.unwrap_or(self.default_limit).clamp(1, max)
    }
}

/// Place search over any [`PlaceSource`]. Holds no per-call state, so one
/// instance can serve any number of sequential searches.
pub struct PlaceSearch<'a, S: PlaceSource + ?Sized> {
    source: &'a S,
    options: SearchOptions,
    visibility: Visibility,
}

impl<'a, S: PlaceSource + ?Sized> PlaceSearch<'a, S> {
    pub fn new(source: &'a S, options: SearchOptions) -> Self {
        Self {
            source,
            options,
            visibility: Visibility::default(),
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn search(
        &self,
        filters: &SearchFilters,
        spatial: &SpatialSearchContext,
        cancel: &Cancellation,
    ) -> Result<SearchResult> {
        let limit = self.options.effective_limit(filters.limit);

        let mut composer = QueryComposer::new(self.options.invalid_area);
        composer
            .visibility(&self.visibility)
            .text(filters.query.as_deref())
            .categories(&filters.categories)
            .tags(&filters.tags);
        composer.spatial(spatial)?;
        let predicates = composer.predicate_count();
        let composed = composer.compose(limit, filters.offset)?;

        debug!(
            sql = %composed.select.sql,
            params = composed.select.params.len(),
            predicates,
            limit,
            offset = filters.offset,
            "composed place search"
        );
        SearchExecutor::new(self.source).run(&composed, cancel)
    }

    /// Places whose point lies within `radius_km` of the center, nearest first.
    pub fn get_nearby(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
        limit: usize,
        cancel: &Cancellation,
    ) -> Result<SearchResult> {
        let spatial =
            SpatialSearchContext::new(AreaMatch::AllOf).near(AreaFilter::circle(lng, lat, radius_km));
        self.search(&limited(limit), &spatial, cancel)
    }

    pub fn get_in_area(
        &self,
        area: AreaFilter,
        limit: usize,
        cancel: &Cancellation,
    ) -> Result<SearchResult> {
        let spatial = SpatialSearchContext::new(AreaMatch::AllOf).within(area);
        self.search(&limited(limit), &spatial, cancel)
    }

    pub fn get_intersecting(
        &self,
        area: AreaFilter,
        limit: usize,
        cancel: &Cancellation,
    ) -> Result<SearchResult> {
        let spatial = SpatialSearchContext::new(AreaMatch::AllOf).intersects(area);
        self.search(&limited(limit), &spatial, cancel)
    }

    pub fn get_within_distance(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
        limit: usize,
        cancel: &Cancellation,
    ) -> Result<SearchResult> {
        let spatial = SpatialSearchContext::new(AreaMatch::AllOf)
            .within(AreaFilter::circle(lng, lat, radius_km));
        self.search(&limited(limit), &spatial, cancel)
    }
}

fn limited(limit: usize) -> SearchFilters {
    SearchFilters::default().with_limit(limit)
}
