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

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;

use crate::compose::ComposedQuery;
use crate::error::Result;
use crate::error::SearchError;
use crate::mapper::PlaceRecord;
use crate::mapper::map_record;
use crate::model::SearchResult;
use crate::sql::BoundQuery;

/// Cooperative cancellation shared between a caller and a running search.
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SearchError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Anything that can run a bound place query.
pub trait PlaceSource {
    fn fetch(&self, query: &BoundQuery, cancel: &Cancellation) -> Result<Vec<PlaceRecord>>;

    fn count(&self, query: &BoundQuery, cancel: &Cancellation) -> Result<u64>;
}

pub struct SearchExecutor<'a, S: PlaceSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: PlaceSource + ?Sized> SearchExecutor<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Counts all matches, then fetches the requested page. The page query is
    /// not issued when nothing matches or the offset is past the end.
    pub fn run(&self, query: &ComposedQuery, cancel: &Cancellation) -> Result<SearchResult> {
        cancel.check()?;
        let started = Instant::now();

        let total = self.source.count(&query.count, cancel)?;
        if total <= query.offset as u64 {
            debug!(total, offset = query.offset, "no rows in requested page");
            let mut result = SearchResult::empty(query.limit, query.offset);
            result.total = total;
            result.warnings = query.warnings.clone();
            return Ok(result);
        }

        let records = self.source.fetch(&query.select, cancel)?;
        let places: Vec<_> = records.into_iter().map(map_record).collect();
        let end = query.offset + places.len();
        let next_offset = (!places.is_empty() && (end as u64) < total).then_some(end);

        debug!(
            total,
            returned = places.len(),
            took_ms = started.elapsed().as_millis() as u64,
            "place search complete"
        );
        Ok(SearchResult {
            places,
            total,
            limit: query.limit,
            offset: query.offset,
            next_offset,
            warnings: query.warnings.clone(),
        })
    }
}
