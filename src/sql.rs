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

//! SQL fragments with relative placeholders and the select builder that
//! renders them into one statement.
//!
//! A fragment's text refers to its own parameters as `$1..$n`. Fragments are
//! built independently and combined freely; [`renumber`] turns the relative
//! markers into absolute `?N` placeholders in a single left-to-right pass when
//! the statement is assembled.

use std::fmt::Write as _;

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value as SqlValue;

use crate::error::Result;
use crate::error::SearchError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlTable {
    Place,
}

impl SqlTable {
    pub fn as_str(self) -> &'static str {
        match self {
            SqlTable::Place => "place",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlColumn {
    Id,
    Name,
    Description,
    PlaceType,
    Location,
    Bounds,
    Address,
    City,
    State,
    Country,
    PostalCode,
    Categories,
    Tags,
    RatingAvg,
    RatingCount,
    IsPublic,
    CreatedBy,
    CreatedAt,
}

impl SqlColumn {
    pub fn sql(self) -> &'static str {
        match self {
            SqlColumn::Id => "place.id",
            SqlColumn::Name => "place.name",
            SqlColumn::Description => "place.description",
            SqlColumn::PlaceType => "place.place_type",
            SqlColumn::Location => "place.location",
            SqlColumn::Bounds => "place.bounds",
            SqlColumn::Address => "place.address",
            SqlColumn::City => "place.city",
            SqlColumn::State => "place.state",
            SqlColumn::Country => "place.country",
            SqlColumn::PostalCode => "place.postal_code",
            SqlColumn::Categories => "place.categories",
            SqlColumn::Tags => "place.tags",
            SqlColumn::RatingAvg => "place.rating_avg",
            SqlColumn::RatingCount => "place.rating_count",
            SqlColumn::IsPublic => "place.is_public",
            SqlColumn::CreatedBy => "place.created_by",
            SqlColumn::CreatedAt => "place.created_at",
        }
    }

    pub fn name(self) -> &'static str {
        let sql = self.sql();
        sql.strip_prefix("place.").unwrap_or(sql)
    }
}

/// Columns read back into a place, in row order.
pub const PLACE_COLUMNS: [SqlColumn; 18] = [
    SqlColumn::Id,
    SqlColumn::Name,
    SqlColumn::Description,
    SqlColumn::PlaceType,
    SqlColumn::Location,
    SqlColumn::Bounds,
    SqlColumn::Address,
    SqlColumn::City,
    SqlColumn::State,
    SqlColumn::Country,
    SqlColumn::PostalCode,
    SqlColumn::Categories,
    SqlColumn::Tags,
    SqlColumn::RatingAvg,
    SqlColumn::RatingCount,
    SqlColumn::IsPublic,
    SqlColumn::CreatedBy,
    SqlColumn::CreatedAt,
];

#[derive(Clone, Debug)]
pub enum SqlExpr {
    Column(SqlColumn),
    Raw(&'static str),
    Alias(&'static str),
}

impl SqlExpr {
    pub fn column(column: SqlColumn) -> Self {
        Self::Column(column)
    }

    pub fn raw(sql: &'static str) -> Self {
        Self::Raw(sql)
    }

    pub fn alias(alias: &'static str) -> Self {
        Self::Alias(alias)
    }

    pub fn to_sql(&self) -> String {
        match self {
            SqlExpr::Column(column) => column.sql().to_string(),
            SqlExpr::Raw(sql) => (*sql).to_string(),
            SqlExpr::Alias(alias) => (*alias).to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqlSelectItem {
    expr: SqlFragment,
    alias: Option<&'static str>,
}

impl SqlSelectItem {
    pub fn new(expr: SqlExpr) -> Self {
        Self {
            expr: SqlFragment::raw(expr.to_sql()),
            alias: None,
        }
    }

    pub fn fragment(expr: SqlFragment) -> Self {
        Self { expr, alias: None }
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlOrderDir {
    Asc,
    Desc,
}

impl SqlOrderDir {
    fn as_str(self) -> &'static str {
        match self {
            SqlOrderDir::Asc => "ASC",
            SqlOrderDir::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqlOrderBy {
    expr: SqlExpr,
    dir: SqlOrderDir,
}

impl SqlOrderBy {
    pub fn new(expr: SqlExpr, dir: SqlOrderDir) -> Self {
        Self { expr, dir }
    }

    pub fn asc(expr: SqlExpr) -> Self {
        Self::new(expr, SqlOrderDir::Asc)
    }

    pub fn desc(expr: SqlExpr) -> Self {
        Self::new(expr, SqlOrderDir::Desc)
    }

    fn to_sql(&self) -> String {
        format!("{} {}", self.expr.to_sql(), self.dir.as_str())
    }
}

/// SQL text plus the values its relative `$k` markers refer to.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlFragment {
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn raw_with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn cmp(expr: SqlExpr, op: &str, value: SqlValue) -> Self {
        let sql = format!("{} {} $1", expr.to_sql(), op);
        Self {
            sql,
            params: vec![value],
        }
    }

    /// Comma-separated `$1, $2, ...` for use inside `IN (...)`.
    pub fn value_list(values: Vec<SqlValue>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let markers: Vec<String> = (1..=values.len()).map(|i| format!("${i}")).collect();
        Some(Self {
            sql: markers.join(", "),
            params: values,
        })
    }

    pub fn and(self, other: SqlFragment) -> SqlFragment {
        self.join("AND", other)
    }

    pub fn or(self, other: SqlFragment) -> SqlFragment {
        self.join("OR", other)
    }

    pub fn all_of(fragments: impl IntoIterator<Item = SqlFragment>) -> Option<SqlFragment> {
        fragments.into_iter().reduce(SqlFragment::and)
    }

    pub fn any_of(fragments: impl IntoIterator<Item = SqlFragment>) -> Option<SqlFragment> {
        fragments.into_iter().reduce(SqlFragment::or)
    }

    /// Wraps this fragment's text into `template`, which must contain `{}`
    /// exactly once. Parameters are unchanged.
    pub fn wrap(self, template: &str) -> SqlFragment {
        SqlFragment {
            sql: template.replacen("{}", &self.sql, 1),
            params: self.params,
        }
    }

    fn join(self, op: &str, other: SqlFragment) -> SqlFragment {
        let offset = self.params.len();
        let other_sql = shift_markers(&other.sql, offset);
        let sql = format!("({}) {} ({})", self.sql, op, other_sql);
        let mut params = self.params;
        params.extend(other.params);
        SqlFragment { sql, params }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Replaces every relative `$k` marker with `?{base + k}`.
///
/// Markers inside single-quoted literals are left alone. Fails when a marker
/// points past the fragment's parameters or a parameter is never referenced.
pub fn renumber(fragment: &SqlFragment, base: usize) -> Result<String> {
    let count = fragment.params.len();
    let mut used = vec![false; count];
    let sql = map_markers(&fragment.sql, |k| {
        if k == 0 || k > count {
            return Err(SearchError::Compose(format!(
                "placeholder ${k} out of range for {count} parameters in `{}`",
                fragment.sql
            )));
        }
        used[k - 1] = true;
        Ok(format!("?{}", base + k))
    })?;
    if let Some(unused) = used.iter().position(|u| !u) {
        return Err(SearchError::Compose(format!(
            "parameter ${} is never referenced in `{}`",
            unused + 1,
            fragment.sql
        )));
    }
    Ok(sql)
}

fn shift_markers(sql: &str, offset: usize) -> String {
    if offset == 0 {
        return sql.to_string();
    }
    // Shifting cannot fail; malformed markers surface later in `renumber`.
    map_markers(sql, |k| Ok(format!("${}", k + offset))).unwrap_or_else(|_| sql.to_string())
}

fn map_markers(sql: &str, mut f: impl FnMut(usize) -> Result<String>) -> Result<String> {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;
    while let Some(ch) = chars.next() {
        if ch == '\'' {
            in_literal = !in_literal;
            out.push(ch);
            continue;
        }
        if ch != '$' || in_literal {
            out.push(ch);
            continue;
        }
        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        if digits.is_empty() {
            return Err(SearchError::Compose(format!(
                "dangling placeholder marker in `{sql}`"
            )));
        }
        let k: usize = digits
            .parse()
            .map_err(|_| SearchError::Compose(format!("placeholder ${digits} too large")))?;
        out.push_str(&f(k)?);
    }
    Ok(out)
}

#[derive(Clone, Debug)]
pub struct SqlSelectBuilder {
    select: Vec<SqlSelectItem>,
    from: SqlTable,
    where_clause: Option<SqlFragment>,
    order_by: Vec<SqlOrderBy>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl SqlSelectBuilder {
    pub fn new(from: SqlTable) -> Self {
        Self {
            select: Vec::new(),
            from,
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn select<I>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = SqlSelectItem>,
    {
        self.select.extend(items);
        self
    }

    pub fn where_clause(mut self, clause: Option<SqlFragment>) -> Self {
        self.where_clause = clause;
        self
    }

    pub fn order_by(mut self, order: SqlOrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    // params in textual order: select list, WHERE, LIMIT, OFFSET
    pub fn build(self) -> Result<BoundQuery> {
        let mut sql = String::new();
        let mut params: Vec<SqlValue> = Vec::new();

        sql.push_str("SELECT ");
        if self.select.is_empty() {
            sql.push('*');
        } else {
            let mut first = true;
            for item in &self.select {
                if !first {
                    sql.push_str(", ");
                }
                first = false;
                sql.push_str(&renumber(&item.expr, params.len())?);
                params.extend(item.expr.params.iter().cloned());
                if let Some(alias) = item.alias {
                    let _ = write!(sql, " AS {alias}");
                }
            }
        }
        sql.push_str(" FROM ");
        sql.push_str(self.from.as_str());

        if let Some(where_clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&renumber(where_clause, params.len())?);
            params.extend(where_clause.params.iter().cloned());
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let orders: Vec<String> = self.order_by.iter().map(SqlOrderBy::to_sql).collect();
            sql.push_str(&orders.join(", "));
        }
        if let Some(limit) = self.limit {
            params.push(SqlValue::from(limit as i64));
            let _ = write!(sql, " LIMIT ?{}", params.len());
        }
        if let Some(offset) = self.offset {
            params.push(SqlValue::from(offset as i64));
            let _ = write!(sql, " OFFSET ?{}", params.len());
        }

        Ok(BoundQuery { sql, params })
    }

    /// `SELECT COUNT(*)` over the same table and WHERE clause, ignoring the
    /// select list, ordering and pagination.
    pub fn build_count(&self) -> Result<BoundQuery> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.from.as_str());
        let mut params = Vec::new();
        if let Some(where_clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&renumber(where_clause, 0)?);
            params.extend(where_clause.params.iter().cloned());
        }
        Ok(BoundQuery { sql, params })
    }
}

/// Registers `casefold(text)`, a Unicode-aware lowercase. SQLite's own
/// `lower()` only folds ASCII.
pub fn register_text_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

/// Case-insensitive substring match of `needle` against any of `columns`.
/// The needle is folded before binding and referenced once per column.
pub fn folded_contains(columns: &[SqlColumn], needle: &str) -> SqlFragment {
    let clauses: Vec<String> = columns
        .iter()
        .map(|col| format!("instr(casefold(coalesce({}, '')), $1) > 0", col.sql()))
        .collect();
    SqlFragment::raw_with_params(
        format!("({})", clauses.join(" OR ")),
        vec![SqlValue::from(needle.trim().to_lowercase())],
    )
}
