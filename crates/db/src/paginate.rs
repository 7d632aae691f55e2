//! Generic filtered, sorted, paginated queries over a single table.

use serde::Serialize;
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::{DbError, DbResult};

pub const DEFAULT_LIMIT: i64 = 10;
pub const DEFAULT_PAGE: i64 = 1;

/// A table-backed record that can be listed with [`paginate`].
pub trait Entity: for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    const TABLE: &'static str;

    /// Public field names paired with the column they live in. Only these
    /// may appear in filters and sort keys.
    const FIELDS: &'static [(&'static str, &'static str)];

    /// Sort expression used when the caller gives none.
    const DEFAULT_SORT: &'static str;

    /// Unique column appended to every ordering as a tiebreaker.
    const KEY: &'static str = "id";

    fn column(field: &str) -> Option<&'static str> {
        Self::FIELDS
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, column)| *column)
    }
}

/// Equality conditions on public field names, joined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Add the condition only when a value is present.
    pub fn eq_opt(self, field: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.eq(field, value),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn push_where<'a, E: Entity>(&'a self, query: &mut QueryBuilder<'a, Sqlite>) -> DbResult<()> {
        for (index, (field, value)) in self.conditions.iter().enumerate() {
            let column = E::column(field).ok_or_else(|| DbError::UnknownField(field.clone()))?;
            query.push(if index == 0 { " WHERE " } else { " AND " });
            query.push(column).push(" = ").push_bind(value.as_str());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

/// Parsed `field:direction[,field:direction...]` sort expression.
///
/// A direction of `desc` sorts descending; anything else, including a
/// missing direction, sorts ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBy(Vec<SortKey>);

impl SortBy {
    pub fn parse(raw: &str) -> Self {
        let keys = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (field, direction) = match part.split_once(':') {
                    Some((field, "desc")) => (field, Direction::Desc),
                    Some((field, _)) => (field, Direction::Asc),
                    None => (part, Direction::Asc),
                };
                SortKey {
                    field: field.trim().to_string(),
                    direction,
                }
            })
            .collect();
        Self(keys)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    /// Map every key onto a column of `E`, failing on the first unknown one.
    pub fn resolve<E: Entity>(&self) -> DbResult<Vec<(&'static str, Direction)>> {
        self.0
            .iter()
            .map(|key| {
                E::column(&key.field)
                    .map(|column| (column, key.direction))
                    .ok_or_else(|| DbError::UnknownSortField(key.field.clone()))
            })
            .collect()
    }
}

/// Sort and window settings for a list query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub sort_by: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl QueryOptions {
    /// Results per page; non-positive or missing values use the default.
    pub fn limit(&self) -> i64 {
        match self.limit {
            Some(limit) if limit > 0 => limit,
            _ => DEFAULT_LIMIT,
        }
    }

    /// 1-indexed page; non-positive or missing values use the default.
    pub fn page(&self) -> i64 {
        match self.page {
            Some(page) if page > 0 => page,
            _ => DEFAULT_PAGE,
        }
    }

    fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// One page of results plus the totals needed to walk the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub results: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub total_results: i64,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, page: i64, limit: i64, total_results: i64) -> Self {
        // ceil(total / limit), safe for limits near i64::MAX
        let total_pages = if limit > 0 {
            total_results / limit + i64::from(total_results % limit != 0)
        } else {
            0
        };
        Self {
            results,
            page,
            limit,
            total_pages,
            total_results,
        }
    }

    /// Convert every result, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            results: self.results.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
            total_results: self.total_results,
        }
    }
}

/// Count the rows of `E` matching `filter` and fetch the requested page.
pub async fn paginate<E: Entity>(
    pool: &SqlitePool,
    filter: &Filter,
    options: &QueryOptions,
) -> DbResult<Page<E>> {
    let sort_by = SortBy::parse(options.sort_by.as_deref().unwrap_or(E::DEFAULT_SORT));
    let ordering = sort_by.resolve::<E>()?;
    let limit = options.limit();
    let page = options.page();

    let mut count = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", E::TABLE));
    filter.push_where::<E>(&mut count)?;
    let total_results: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {}", E::TABLE));
    filter.push_where::<E>(&mut select)?;
    select.push(" ORDER BY ");
    for (column, direction) in &ordering {
        select.push(*column).push(" ").push(direction.as_sql()).push(", ");
    }
    select.push(E::KEY).push(" ASC");
    select
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(options.offset());

    let results = select.build_query_as::<E>().fetch_all(pool).await?;

    Ok(Page::new(results, page, limit, total_results))
}
