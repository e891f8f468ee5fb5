//! # Search — Filtered, Sorted and Paged Queries
//!
//! One builder behind every listing on the site (movies, news, user accounts).
//! A search is a fixed [`BaseQuery`] shape plus an ordered [`SearchCriteria`]
//! list, a [`SortSpec`] and a [`PageSpec`]. From these it builds two queries:
//!
//! - the data query: `SELECT … FROM …[ WHERE …][ GROUP BY …] ORDER BY …[ LIMIT … OFFSET …]`
//! - the count query: `SELECT COUNT(*) AS count FROM (SELECT … FROM …[ WHERE …][ GROUP BY …]) AS matched`
//!
//! Both take their WHERE clause from the same [`SearchCriteria::build_where`]
//! call, so they always agree on which rows match and carry identical
//! parameter lists.
//!
//! ## Injection rules
//!
//! Values only ever travel as positional placeholders (`$1`, `$2`, …).
//! Column expressions, sort expressions and fixed clauses are `&'static str`,
//! so nothing taken from a request can be spliced into the SQL text. Sort
//! columns requested by name are looked up in a static allow-list. LIMIT and
//! OFFSET are validated integers written into the text.

use crate::error::{Error, Result};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::future::Future;
use tracing::debug;

/// One result row: named fields in column order.
pub type Row = Map<String, Value>;

/// Bind values for positional placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    Text(String),
    Int(i64),
}

fn push_bind(params: &mut Vec<BindValue>, value: BindValue) -> usize {
    params.push(value);
    params.len()
}

/// Comparison used by a value criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    /// `LIKE` with the value as given; callers write their own `%` wildcards.
    Like,
    /// `LIKE` with the value wrapped in `%…%`.
    Contains,
    Ge,
    Le,
}

impl Op {
    fn sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Like | Op::Contains => "LIKE",
            Op::Ge => ">=",
            Op::Le => "<=",
        }
    }
}

#[derive(Debug, Clone)]
enum Criterion {
    Value {
        column: &'static str,
        op: Op,
        value: Option<BindValue>,
    },
    Fixed(&'static str),
}

/// Ordered list of optional filter predicates.
///
/// Criteria without a value are kept in the list but contribute nothing to
/// the query, never a `col = NULL` predicate.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    items: Vec<Criterion>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text criterion. Absent, empty and whitespace-only values are skipped.
    pub fn text(mut self, column: &'static str, op: Op, value: Option<&str>) -> Self {
        let value = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| match op {
                Op::Contains => format!("%{v}%"),
                _ => v.to_string(),
            })
            .map(BindValue::Text);
        self.items.push(Criterion::Value { column, op, value });
        self
    }

    /// Add an integer criterion. `None` is skipped.
    pub fn int(mut self, column: &'static str, op: Op, value: Option<i64>) -> Self {
        self.items.push(Criterion::Value {
            column,
            op,
            value: value.map(BindValue::Int),
        });
        self
    }

    /// Add a clause with no variable part, e.g. `type = 'post'`.
    pub fn fixed(mut self, clause: &'static str) -> Self {
        self.items.push(Criterion::Fixed(clause));
        self
    }

    /// Number of declared criteria, active or not.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of criteria that will contribute a clause.
    pub fn active_count(&self) -> usize {
        self.items
            .iter()
            .filter(|c| match c {
                Criterion::Value { value, .. } => value.is_some(),
                Criterion::Fixed(_) => true,
            })
            .count()
    }

    /// Build the WHERE clause in declaration order, numbering placeholders from `$1`.
    pub fn build_where(&self) -> WhereClause {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        for criterion in &self.items {
            match criterion {
                Criterion::Value {
                    column,
                    op,
                    value: Some(value),
                } => {
                    let idx = push_bind(&mut params, value.clone());
                    clauses.push(format!("{} {} ${}", column, op.sql(), idx));
                }
                Criterion::Value { value: None, .. } => {}
                Criterion::Fixed(clause) => clauses.push((*clause).to_string()),
            }
        }

        WhereClause { clauses, params }
    }
}

/// The filtering part shared by the data and count queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    clauses: Vec<String>,
    params: Vec<BindValue>,
}

impl WhereClause {
    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    pub fn params(&self) -> &[BindValue] {
        &self.params
    }

    /// ` WHERE a AND b`, or an empty string when nothing filters.
    pub fn to_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Accepts `asc`/`desc` in any case; absent or empty means ascending.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(SortDirection::Asc),
            Some(s) if s.eq_ignore_ascii_case("asc") => Ok(SortDirection::Asc),
            Some(s) if s.eq_ignore_ascii_case("desc") => Ok(SortDirection::Desc),
            Some(other) => Err(Error::Validation(format!(
                "sort order must be 'asc' or 'desc', got '{other}'"
            ))),
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Allow-listed sort column (SQL expression) and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: &'static str,
    pub direction: SortDirection,
}

impl SortSpec {
    pub const fn new(column: &'static str, direction: SortDirection) -> Self {
        Self { column, direction }
    }

    /// Resolve a requested sort against `allowed`, a list of
    /// `(request name, SQL expression)` pairs whose first entry is the default.
    ///
    /// Names are matched case-insensitively. A name outside the list is a
    /// validation error rather than a silent fallback.
    pub fn parse(
        allowed: &[(&'static str, &'static str)],
        orderby: Option<&str>,
        order: Option<&str>,
    ) -> Result<Self> {
        let direction = SortDirection::parse(order)?;
        let (_, default_expr) = allowed
            .first()
            .ok_or_else(|| Error::Validation("no sortable columns".to_string()))?;

        let column = match orderby.map(str::trim).filter(|s| !s.is_empty()) {
            None => default_expr,
            Some(name) => allowed
                .iter()
                .find(|(public, _)| public.eq_ignore_ascii_case(name))
                .map(|(_, expr)| expr)
                .ok_or_else(|| Error::Validation(format!("cannot sort by '{name}'")))?,
        };

        Ok(SortSpec::new(*column, direction))
    }

    fn to_sql(self) -> String {
        format!(" ORDER BY {} {}", self.column, self.direction.sql())
    }
}

/// Page size and 1-based page number.
///
/// Without `hits_per_page` every matching row is returned and `page` is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub hits_per_page: Option<u32>,
    pub page: u32,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self::all()
    }
}

impl PageSpec {
    /// No pagination: every matching row.
    pub const fn all() -> Self {
        Self {
            hits_per_page: None,
            page: 1,
        }
    }

    pub fn new(hits_per_page: u32, page: u32) -> Result<Self> {
        if hits_per_page == 0 {
            return Err(Error::Validation(
                "hits per page must be a positive integer".to_string(),
            ));
        }
        if page == 0 {
            return Err(Error::Validation(
                "page must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            hits_per_page: Some(hits_per_page),
            page,
        })
    }

    /// Parse request values. Missing `hits` falls back to `default_hits`
    /// (`None` = unlimited); missing `page` means page 1.
    pub fn parse(hits: Option<&str>, page: Option<&str>, default_hits: Option<u32>) -> Result<Self> {
        let hits = parse_positive("hits", hits)?.or(default_hits);
        let page = parse_positive("page", page)?.unwrap_or(1);
        match hits {
            Some(h) => Self::new(h, page),
            None => Ok(Self::all()),
        }
    }

    /// Row offset of the first row on this page; `None` without pagination.
    pub fn offset(&self) -> Option<u64> {
        self.hits_per_page
            .map(|hits| u64::from(self.page.saturating_sub(1)) * u64::from(hits))
    }

    /// `ceil(total / hits)`; 0 when nothing matched, `None` without pagination.
    pub fn max_pages(&self, total_count: i64) -> Option<u64> {
        let hits = u64::from(self.hits_per_page?);
        let total = total_count.max(0) as u64;
        Some(total.div_ceil(hits))
    }

    fn to_sql(self) -> String {
        match (self.hits_per_page, self.offset()) {
            (Some(hits), Some(offset)) => format!(" LIMIT {hits} OFFSET {offset}"),
            _ => String::new(),
        }
    }
}

/// Parse an optional positive integer request value. Empty means absent.
pub(crate) fn parse_positive(name: &str, raw: Option<&str>) -> Result<Option<u32>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<u32>() {
        Ok(0) | Err(_) => Err(Error::Validation(format!(
            "{name} must be a positive integer, got '{raw}'"
        ))),
        Ok(n) => Ok(Some(n)),
    }
}

/// Parse an optional integer request value (e.g. a year bound). Empty means absent.
pub(crate) fn parse_int(name: &str, raw: Option<&str>) -> Result<Option<i64>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| Error::Validation(format!("{name} must be numeric, got '{raw}'")))
}

/// Fixed shape of a search: selected columns, tables/joins, grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseQuery {
    pub select: &'static str,
    pub from: &'static str,
    pub group_by: Option<&'static str>,
}

impl BaseQuery {
    fn filtered(&self, where_clause: &WhereClause) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.select, self.from);
        sql.push_str(&where_clause.to_sql());
        if let Some(group_by) = self.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }
        sql
    }
}

/// SQL text plus its bind values, ready for a [`RowStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<BindValue>,
}

/// Data query for the current page.
pub fn build_filtered_query(
    base: &BaseQuery,
    criteria: &SearchCriteria,
    sort: &SortSpec,
    page: &PageSpec,
) -> BuiltQuery {
    let where_clause = criteria.build_where();
    let mut sql = base.filtered(&where_clause);
    sql.push_str(&sort.to_sql());
    sql.push_str(&page.to_sql());
    BuiltQuery {
        sql,
        params: where_clause.params,
    }
}

/// Count of all rows the data query would match without LIMIT/OFFSET.
pub fn build_count_query(base: &BaseQuery, criteria: &SearchCriteria) -> BuiltQuery {
    let where_clause = criteria.build_where();
    let sql = format!(
        "SELECT COUNT(*) AS count FROM ({}) AS matched",
        base.filtered(&where_clause)
    );
    BuiltQuery {
        sql,
        params: where_clause.params,
    }
}

/// Parameterized query execution returning rows in store order.
pub trait RowStore: Sync {
    fn fetch_rows(&self, query: &BuiltQuery) -> impl Future<Output = Result<Vec<Row>>> + Send;
}

/// Run a built query. Store failures propagate; they are never an empty result.
pub async fn execute<S: RowStore + ?Sized>(store: &S, query: &BuiltQuery) -> Result<Vec<Row>> {
    debug!(sql = %query.sql, params = query.params.len(), "executing query");
    store.fetch_rows(query).await
}

fn count_from_rows(rows: &[Row]) -> Result<i64> {
    rows.first()
        .and_then(|row| row.get("count"))
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::Query("count query returned no usable count".to_string()))
}

/// A complete search: shape, criteria, sort and page.
#[derive(Debug, Clone)]
pub struct FilteredSearch {
    base: BaseQuery,
    criteria: SearchCriteria,
    sort: SortSpec,
    page: PageSpec,
}

impl FilteredSearch {
    pub fn new(base: BaseQuery, criteria: SearchCriteria, sort: SortSpec, page: PageSpec) -> Self {
        Self {
            base,
            criteria,
            sort,
            page,
        }
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub fn page(&self) -> PageSpec {
        self.page
    }

    pub fn build_filtered_query(&self) -> BuiltQuery {
        build_filtered_query(&self.base, &self.criteria, &self.sort, &self.page)
    }

    pub fn build_count_query(&self) -> BuiltQuery {
        build_count_query(&self.base, &self.criteria)
    }

    /// Fetch the current page, then the total from the count query.
    pub async fn search<S: RowStore + ?Sized>(&self, store: &S) -> Result<SearchResult> {
        let rows = execute(store, &self.build_filtered_query()).await?;
        let total_count = count_from_rows(&execute(store, &self.build_count_query()).await?)?;
        Ok(SearchResult {
            rows,
            total_count,
            page: self.page,
        })
    }
}

/// Rows of the current page plus the unpaged match count.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub rows: Vec<Row>,
    pub total_count: i64,
    pub page: PageSpec,
}

impl SearchResult {
    pub fn max_pages(&self) -> Option<u64> {
        self.page.max_pages(self.total_count)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Serialize for SearchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("SearchResult", 5)?;
        s.serialize_field("rows", &self.rows)?;
        s.serialize_field("total", &self.total_count)?;
        s.serialize_field("page", &self.page.page)?;
        s.serialize_field("hits", &self.page.hits_per_page)?;
        s.serialize_field("max_pages", &self.max_pages())?;
        s.end()
    }
}

// ── Tests ───────────────────────────────────────────────────────
