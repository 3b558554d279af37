use std::sync::Arc;

use log::{debug, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};

use crate::database::{Database, DbPool};
use crate::error::SocietyError;

use super::columns::{quote_ident, Catalog, JoinKind, RelationRef, TableDescriptor};
use super::criteria::{PageMeta, PaginationRequest, PaginationResult, Record};
use super::filter::FilterSet;
use super::order::Order;
use super::relations::load_relations;
use super::row::select_records;

pub const DEFAULT_MAX_LIMIT: i64 = 200;

/// A validated request, ready to run. Count and page queries are both built
/// from the same FROM and WHERE text, so they always agree on the row set.
#[derive(Debug)]
pub struct CompiledQuery {
    table: &'static TableDescriptor,
    filter: FilterSet,
    order: Order,
    joins: Vec<RelationRef>,
    with: Vec<RelationRef>,
    page: i64,
    limit: i64,
    offset: i64,
}

impl CompiledQuery {
    pub fn compile(
        catalog: &Catalog,
        table_name: &str,
        request: &PaginationRequest,
        max_limit: i64,
    ) -> Result<Self, SocietyError> {
        if request.page < 1 {
            return Err(SocietyError::InvalidRequest(format!(
                "Invalid page {}: page must be at least 1",
                request.page
            )));
        }
        if request.limit < 1 || request.limit > max_limit {
            return Err(SocietyError::InvalidRequest(format!(
                "Invalid limit {}: limit must be between 1 and {}",
                request.limit, max_limit
            )));
        }
        let offset = (request.page - 1)
            .checked_mul(request.limit)
            .ok_or_else(|| {
                SocietyError::InvalidRequest(format!("Page {} is out of range", request.page))
            })?;

        let table = catalog.table(table_name)?;
        let filter = FilterSet::compile(catalog, table, &request.search_criterias)?;
        let order = Order::compile(catalog, table, &request.sort_criterias)?;

        let mut with = Vec::new();
        for (name, enabled) in &request.with {
            let relation = catalog.resolve_relation(table, name)?;
            if *enabled {
                with.push(relation);
            }
        }

        let joins = join_set(&with, filter.required_joins(), order.required_joins());
        debug!(
            "Compiled '{}': {} criteria, sort {:?}, {} joins, {} relations",
            table.name,
            filter.len(),
            order.keys().collect::<Vec<_>>(),
            joins.len(),
            with.len()
        );

        Ok(CompiledQuery {
            table,
            filter,
            order,
            joins,
            with,
            page: request.page,
            limit: request.limit,
            offset,
        })
    }

    fn from_clause(&self) -> Result<String, SocietyError> {
        let mut from_clause = quote_ident(self.table.table_db);
        for relation in &self.joins {
            from_clause.push_str(&relation.to_join_clause()?);
        }
        Ok(from_clause)
    }

    /// SQL and params for the count query (`count_only`) or the page query.
    pub fn build_sql(&self, count_only: bool) -> Result<(String, Vec<SqlValue>), SocietyError> {
        let from_clause = self.from_clause()?;
        let (where_clause, mut params_vec) = self.filter.to_where_clause();

        let sql = match count_only {
            true => format!("SELECT COUNT(*)\nFROM {from_clause}{where_clause}"),
            false => {
                params_vec.push(SqlValue::Integer(self.limit));
                params_vec.push(SqlValue::Integer(self.offset));
                format!(
                    "SELECT {}\nFROM {}{}{}\nLIMIT ? OFFSET ?",
                    self.table.cols_as_select_list(),
                    from_clause,
                    where_clause,
                    self.order.to_order_clause()
                )
            }
        };

        Ok((sql, params_vec))
    }

    pub fn execute_count(&self, conn: &Connection) -> Result<i64, SocietyError> {
        let (sql, params_vec) = self.build_sql(true)?;
        debug!("Count query: {sql}");

        let count: i64 =
            conn.query_row(&sql, params_from_iter(params_vec.iter()), |row| row.get(0))?;
        Ok(count)
    }

    pub fn execute_page(&self, conn: &Connection) -> Result<Vec<Record>, SocietyError> {
        let (sql, params_vec) = self.build_sql(false)?;
        debug!("Page query: {sql}");

        let records = select_records(conn, &sql, &params_vec, self.table)?;
        Ok(records)
    }

    pub fn has_relations(&self) -> bool {
        !self.with.is_empty()
    }

    pub fn load_relations(
        &self,
        conn: &Connection,
        records: &mut [Record],
    ) -> Result<(), SocietyError> {
        load_relations(conn, &self.with, records)
    }

    pub fn assemble(&self, data: Vec<Record>, total_count: i64) -> PaginationResult<Record> {
        info!(
            "Listed '{}' page {} ({} of {} rows)",
            self.table.name,
            self.page,
            data.len(),
            total_count
        );
        PaginationResult {
            data,
            meta: PageMeta::new(self.page, self.limit, total_count),
        }
    }
}

/// belongsTo relations from `with`, then filter joins, then order joins.
/// Each relation appears once.
fn join_set(
    with: &[RelationRef],
    filter_joins: &[RelationRef],
    order_joins: &[RelationRef],
) -> Vec<RelationRef> {
    let mut joins: Vec<RelationRef> = Vec::new();
    let candidates = with
        .iter()
        .filter(|r| r.join_kind() == JoinKind::BelongsTo)
        .chain(filter_joins)
        .chain(order_joins);

    for relation in candidates {
        if !joins.iter().any(|j| j.name == relation.name) {
            joins.push(*relation);
        }
    }
    joins
}

/// Run a listing sequentially on one connection.
pub fn paginate_on(
    conn: &Connection,
    catalog: &Catalog,
    table_name: &str,
    request: &PaginationRequest,
    max_limit: i64,
) -> Result<PaginationResult<Record>, SocietyError> {
    let query = CompiledQuery::compile(catalog, table_name, request, max_limit)?;

    let total_count = query.execute_count(conn)?;
    let mut records = query.execute_page(conn)?;
    if query.has_relations() {
        query.load_relations(conn, &mut records)?;
    }

    Ok(query.assemble(records, total_count))
}

/// Listing entry point used by the HTTP layer.
#[derive(Clone)]
pub struct Paginator {
    pool: DbPool,
    catalog: Catalog,
    max_limit: i64,
}

impl Paginator {
    pub fn new(pool: DbPool, catalog: Catalog, max_limit: i64) -> Self {
        Paginator {
            pool,
            catalog,
            max_limit,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Count and page run concurrently on separate connections. Dropping the
    /// returned future interrupts whatever is still running.
    pub async fn paginate(
        &self,
        table_name: &str,
        request: &PaginationRequest,
    ) -> Result<PaginationResult<Record>, SocietyError> {
        let query = Arc::new(CompiledQuery::compile(
            &self.catalog,
            table_name,
            request,
            self.max_limit,
        )?);

        let count_query = Arc::clone(&query);
        let page_query = Arc::clone(&query);
        let (total_count, records) = tokio::try_join!(
            Database::run_blocking(&self.pool, move |conn| count_query.execute_count(conn)),
            Database::run_blocking(&self.pool, move |conn| page_query.execute_page(conn)),
        )?;

        let records = match query.has_relations() && !records.is_empty() {
            true => {
                let relation_query = Arc::clone(&query);
                Database::run_blocking(&self.pool, move |conn| {
                    let mut records = records;
                    relation_query.load_relations(conn, &mut records)?;
                    Ok(records)
                })
                .await?
            }
            false => records,
        };

        Ok(query.assemble(records, total_count))
    }
}
