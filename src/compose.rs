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

//! Accumulates predicate fragments for one search and renders the page query
//! and its count query.
//!
//! Fragment order is fixed: visibility, text, categories, tags, `within`,
//! `near`, `intersects`, then the `areas` group. Everything is ANDed; the
//! `areas` entries are first combined with the context's [`AreaMatch`].

use std::collections::BTreeSet;

use rusqlite::types::Value as SqlValue;
use tracing::warn;

use crate::area::AreaFilter;
use crate::area::AreaMatch;
use crate::area::InvalidAreaPolicy;
use crate::area::SpatialSearchContext;
use crate::error::Result;
use crate::error::SearchError;
use crate::geometry::GeometryPayload;
use crate::model::Coordinate;
use crate::model::Visibility;
use crate::predicate::SpatialOp;
use crate::predicate::SpatialPredicateBuilder;
use crate::sql::BoundQuery;
use crate::sql::PLACE_COLUMNS;
use crate::sql::SqlColumn;
use crate::sql::SqlExpr;
use crate::sql::SqlFragment;
use crate::sql::SqlOrderBy;
use crate::sql::SqlSelectBuilder;
use crate::sql::SqlSelectItem;
use crate::sql::SqlTable;
use crate::sql::folded_contains;

pub const DISTANCE_ALIAS: &str = "distance_m";

#[derive(Debug, Clone)]
pub struct ComposedQuery {
    pub select: BoundQuery,
    pub count: BoundQuery,
    pub reference: Option<Coordinate>,
    pub limit: usize,
    pub offset: usize,
    /// Area filters dropped under the skip policy.
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct QueryComposer {
    predicates: Vec<SqlFragment>,
    reference: Option<Coordinate>,
    policy: InvalidAreaPolicy,
    warnings: Vec<String>,
}

impl QueryComposer {
    pub fn new(policy: InvalidAreaPolicy) -> Self {
        Self {
            predicates: Vec::new(),
            reference: None,
            policy,
            warnings: Vec::new(),
        }
    }

    pub fn visibility(&mut self, visibility: &Visibility) -> &mut Self {
        match visibility {
            Visibility::Public => {
                self.predicates
                    .push(SqlFragment::raw(format!("{} = 1", SqlColumn::IsPublic.sql())));
            }
            Visibility::User(user) => {
                let public = SqlFragment::raw(format!("{} = 1", SqlColumn::IsPublic.sql()));
                let owned = SqlFragment::cmp(
                    SqlExpr::column(SqlColumn::CreatedBy),
                    "=",
                    SqlValue::from(user.clone()),
                );
                self.predicates.push(public.or(owned));
            }
            Visibility::Unrestricted => {}
        }
        self
    }

    /// Case-insensitive substring match over name, description and address.
    pub fn text(&mut self, query: Option<&str>) -> &mut Self {
        let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
            return self;
        };
        self.predicates.push(folded_contains(
            &[SqlColumn::Name, SqlColumn::Description, SqlColumn::Address],
            query,
        ));
        self
    }

    pub fn categories(&mut self, categories: &BTreeSet<String>) -> &mut Self {
        if let Some(frag) = any_member(SqlColumn::Categories, categories) {
            self.predicates.push(frag);
        }
        self
    }

    pub fn tags(&mut self, tags: &BTreeSet<String>) -> &mut Self {
        if let Some(frag) = any_member(SqlColumn::Tags, tags) {
            self.predicates.push(frag);
        }
        self
    }

    pub fn spatial(&mut self, ctx: &SpatialSearchContext) -> Result<&mut Self> {
        let slots = [
            ("within", SpatialOp::Within, &ctx.within),
            ("near", SpatialOp::Near, &ctx.near),
            ("intersects", SpatialOp::Intersects, &ctx.intersects),
        ];
        for (slot, op, area) in slots {
            if let Some(area) = area
                && let Some(frag) = self.spatial_fragment(slot, op, area)?
            {
                self.predicates.push(frag);
            }
        }

        let mut group = Vec::with_capacity(ctx.areas.len());
        for (idx, area) in ctx.areas.iter().enumerate() {
            let slot = format!("areas[{idx}]");
            if let Some(frag) = self.spatial_fragment(&slot, SpatialOp::Within, area)? {
                group.push(frag);
            }
        }
        let combined = match ctx.area_match {
            AreaMatch::AnyOf => SqlFragment::any_of(group),
            AreaMatch::AllOf => SqlFragment::all_of(group),
        };
        if let Some(frag) = combined {
            self.predicates.push(frag);
        }

        self.reference = ctx.reference_point();
        Ok(self)
    }

    fn spatial_fragment(
        &mut self,
        slot: &str,
        op: SpatialOp,
        area: &AreaFilter,
    ) -> Result<Option<SqlFragment>> {
        match SpatialPredicateBuilder::build(op, area) {
            Ok(frag) => Ok(Some(frag)),
            Err(err) => match self.policy {
                InvalidAreaPolicy::Skip => {
                    warn!(slot, kind = %area.kind(), error = %err, "skipping area filter");
                    self.warnings
                        .push(format!("skipped {slot} {} filter: {err}", area.kind()));
                    Ok(None)
                }
                InvalidAreaPolicy::Reject => Err(SearchError::InvalidArea {
                    slot: slot.to_string(),
                    source: err,
                }),
            },
        }
    }

    pub fn predicate_count(&self) -> usize {
        self.predicates.len()
    }

    pub fn compose(self, limit: usize, offset: usize) -> Result<ComposedQuery> {
        let where_clause = SqlFragment::all_of(self.predicates);

        let columns = PLACE_COLUMNS
            .iter()
            .map(|col| SqlSelectItem::new(SqlExpr::column(*col)));
        let mut builder = SqlSelectBuilder::new(SqlTable::Place)
            .select(columns)
            .where_clause(where_clause);

        builder = match self.reference {
            Some(point) => builder
                .select([SqlSelectItem::fragment(SqlFragment::raw_with_params(
                    format!("st_distance({}, $1)", SqlColumn::Location.sql()),
                    vec![SqlValue::from(GeometryPayload::point(point).encode())],
                ))
                .alias(DISTANCE_ALIAS)])
                .order_by(SqlOrderBy::asc(SqlExpr::raw("distance_m IS NULL")))
                .order_by(SqlOrderBy::asc(SqlExpr::alias(DISTANCE_ALIAS))),
            None => builder
                .select([SqlSelectItem::new(SqlExpr::raw("NULL")).alias(DISTANCE_ALIAS)])
                .order_by(SqlOrderBy::desc(SqlExpr::column(SqlColumn::CreatedAt))),
        };
        builder = builder
            .order_by(SqlOrderBy::asc(SqlExpr::column(SqlColumn::Id)))
            .limit(limit)
            .offset(offset);

        let count = builder.build_count()?;
        let select = builder.build()?;
        Ok(ComposedQuery {
            select,
            count,
            reference: self.reference,
            limit,
            offset,
            warnings: self.warnings,
        })
    }
}

/// The JSON array column shares at least one element with `values`.
fn any_member(column: SqlColumn, values: &BTreeSet<String>) -> Option<SqlFragment> {
    let values: Vec<SqlValue> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| SqlValue::from(v.to_string()))
        .collect();
    let list = SqlFragment::value_list(values)?;
    Some(list.wrap(&format!(
        "EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.value IN ({{}}))",
        column.sql()
    )))
}
