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

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::area::SpatialSearchContext;
use crate::model::Place;
use crate::model::SearchFilters;
use crate::model::SearchResult;

#[derive(Debug, Clone, Serialize, Default)]
pub struct StatsOut {
    pub took_ms: i64,
    pub total_hits: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOut {
    pub text: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub spatial: Option<Value>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorOut {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct JsonResponse {
    pub ok: bool,
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsOut>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOut>,
}

impl JsonResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            schema_version: "1".to_string(),
            ..Default::default()
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            ok: false,
            schema_version: "1".to_string(),
            error: Some(ErrorOut {
                code: code.to_string(),
                message: message.to_string(),
                details: None,
                hint: None,
            }),
            ..Default::default()
        }
    }

    pub fn with_hint(mut self, hint: Option<String>) -> Self {
        if let Some(error) = &mut self.error {
            error.hint = hint;
        }
        self
    }

    pub fn with_query(
        mut self,
        filters: &SearchFilters,
        spatial: &SpatialSearchContext,
        limit: usize,
    ) -> Self {
        let spatial = (!spatial.is_empty())
            .then(|| serde_json::to_value(spatial).ok())
            .flatten();
        self.query = Some(QueryOut {
            text: filters.query.clone(),
            categories: filters.categories.iter().cloned().collect(),
            tags: filters.tags.iter().cloned().collect(),
            spatial,
            limit: limit as i64,
            offset: filters.offset as i64,
        });
        self
    }

    /// Places, their pagination cursor and hit counts.
    pub fn with_search_result(mut self, result: &SearchResult, took_ms: i64) -> Self {
        self.results = Some(result.places.iter().map(place_json).collect());
        self.next_offset = result.next_offset;
        self.warnings = result.warnings.clone();
        self.stats = Some(StatsOut {
            took_ms,
            total_hits: result.total as i64,
            returned: Some(result.places.len() as i64),
            ..Default::default()
        });
        self
    }

    pub fn with_stats(mut self, stats: StatsOut) -> Self {
        self.stats = Some(stats);
        self
    }
}

fn place_json(place: &Place) -> Value {
    serde_json::to_value(place).unwrap_or(Value::Null)
}

pub fn print_json(resp: &JsonResponse) -> Result<()> {
    let text = serde_json::to_string_pretty(resp)?;
    println!("{text}");
    Ok(())
}

/// Plain-text rendering, one place per line.
pub fn print_table(result: &SearchResult) {
    for place in &result.places {
        let distance = place
            .distance_km
            .map(|km| format!("{km:.3} km"))
            .unwrap_or_else(|| "-".to_string());
        let city = place.city.as_deref().unwrap_or("-");
        println!("{}\t{}\t{}\t{}", place.id, place.name, city, distance);
    }
    match result.next_offset {
        Some(next) => println!(
            "{} of {} places (next offset {next})",
            result.places.len(),
            result.total
        ),
        None => println!("{} of {} places", result.places.len(), result.total),
    }
    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }
}
