//! Keyset ("cursor") pagination shared by every list procedure.
//!
//! Rows are ordered by `(created_at, id)`. A cursor is the id of the last row
//! a client received; the next page starts strictly after it, so inserts at
//! the head of the list never shift what a client sees further down.

use rusqlite::types::ToSql;
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::error::{AppError, AppResult};

pub const MAX_PAGE_SIZE: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(cursor: Option<String>, limit: i64) -> AppResult<Self> {
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(Self {
            cursor: cursor.filter(|c| !c.trim().is_empty()),
            limit: limit as u32,
        })
    }

    pub fn first(limit: u32) -> Self {
        Self {
            cursor: None,
            limit,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }

    /// Cuts an over-fetched list (`limit + 1` rows) down to a page.
    /// `key` yields the cursor for a row.
    pub fn from_overfetch(mut rows: Vec<T>, limit: u32, key: impl Fn(&T) -> String) -> Self {
        let limit = limit as usize;
        let next_cursor = if rows.len() > limit {
            rows.truncate(limit);
            rows.last().map(&key)
        } else {
            None
        };
        Page {
            items: rows,
            next_cursor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    NewestFirst,
    OldestFirst,
}

impl Order {
    fn comparator(self) -> &'static str {
        match self {
            Order::NewestFirst => "<",
            Order::OldestFirst => ">",
        }
    }

    fn direction(self) -> &'static str {
        match self {
            Order::NewestFirst => "DESC",
            Order::OldestFirst => "ASC",
        }
    }
}

/// Describes a paginated query. `table`/`alias` name the relation whose
/// `id` and `created_at` form the key; `columns`, `joins` and `filter` are
/// spliced in verbatim and may reference named parameters.
#[derive(Debug, Clone, Copy)]
pub struct Keyset<'a> {
    pub table: &'a str,
    pub alias: &'a str,
    pub columns: &'a str,
    pub joins: &'a str,
    pub filter: Option<&'a str>,
    pub order: Order,
}

impl Keyset<'_> {
    fn sql(&self) -> String {
        let a = self.alias;
        let mut clauses = Vec::with_capacity(2);
        if let Some(filter) = self.filter {
            clauses.push(format!("({})", filter));
        }
        clauses.push(format!(
            "(:cursor IS NULL OR ({a}.created_at, {a}.id) {cmp} \
             (SELECT k.created_at, k.id FROM {t} k WHERE k.id = :cursor))",
            a = a,
            t = self.table,
            cmp = self.order.comparator(),
        ));
        format!(
            "SELECT {cols}, {a}.id AS page_key FROM {t} {a} {joins} WHERE {clauses} \
             ORDER BY {a}.created_at {dir}, {a}.id {dir} LIMIT :take",
            cols = self.columns,
            a = a,
            t = self.table,
            joins = self.joins,
            clauses = clauses.join(" AND "),
            dir = self.order.direction(),
        )
    }
}

/// Runs `keyset` for one page. `params` binds the named parameters used in
/// the keyset's fragments; `:cursor` and `:take` are bound here.
pub fn paginate<T, F>(
    conn: &Connection,
    keyset: &Keyset<'_>,
    params: &[(&str, &dyn ToSql)],
    page: &PageRequest,
    mut map: F,
) -> AppResult<Page<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    if let Some(cursor) = &page.cursor {
        let known: bool = conn.query_row(
            &format!("SELECT COUNT(*) > 0 FROM {} WHERE id = ?1", keyset.table),
            params![cursor],
            |row| row.get(0),
        )?;
        if !known {
            return Err(AppError::BadRequest("Invalid cursor".into()));
        }
    }

    let take = i64::from(page.limit) + 1;
    let mut bound: Vec<(&str, &dyn ToSql)> = params.to_vec();
    bound.push((":cursor", &page.cursor));
    bound.push((":take", &take));

    let mut stmt = conn.prepare(&keyset.sql())?;
    let rows = stmt
        .query_map(bound.as_slice(), |row| {
            let key: String = row.get("page_key")?;
            Ok((key, map(row)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::from_overfetch(rows, page.limit, |(key, _)| key.clone()).map(|(_, item)| item))
}
