mod coerce;
mod columns;
mod criteria;
mod filter;
mod order;
mod paginate;
mod relations;
mod row;

#[cfg(test)]
pub(crate) mod test_support;

pub use columns::{
    Catalog, ColMap, ColSpec, ColType, ColumnRef, JoinKind, RelMap, RelSpec, RelationRef,
    TableDescriptor,
};
pub use criteria::{
    Direction, Operator, PageMeta, PaginationRequest, PaginationResult, Record, SearchCriterion,
    SortCriterion, DEFAULT_LIMIT, DEFAULT_PAGE,
};
pub use filter::{operators_for, Filter, FilterSet};
pub use order::Order;
pub use paginate::{paginate_on, CompiledQuery, Paginator, DEFAULT_MAX_LIMIT};
