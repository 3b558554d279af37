use std::cmp::Ordering;
use std::fmt::Debug;

use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use strum::IntoEnumIterator;

use crate::database::UNICODE_LOWER;
use crate::error::SocietyError;

use super::coerce::{coerce_scalar, compare_sql_values};
use super::columns::{quote_ident, Catalog, ColType, ColumnRef, JoinKind, RelationRef, TableDescriptor};
use super::criteria::{Operator, SearchCriterion};

/// Defines the behavior of a filter.
pub trait Filter: Debug + Send + Sync {
    /// return predicate text and params
    fn to_predicate_parts(&self) -> (String, Vec<SqlValue>);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Test {
    Compare(&'static str, SqlValue),
    Like(String),
    In(Vec<SqlValue>),
    Between(SqlValue, SqlValue),
    Null,
    NotNull,
}

/// A single-column predicate.
#[derive(Debug)]
pub struct ColumnFilter {
    col_sql: String,
    test: Test,
}

impl Filter for ColumnFilter {
    fn to_predicate_parts(&self) -> (String, Vec<SqlValue>) {
        let col = &self.col_sql;

        match &self.test {
            Test::Compare(op, value) => (format!("({col} {op} ?)"), vec![value.clone()]),
            Test::Like(pattern) => (
                format!("({UNICODE_LOWER}({col}) LIKE {UNICODE_LOWER}(?) ESCAPE '\\')"),
                vec![SqlValue::Text(pattern.clone())],
            ),
            Test::In(values) => {
                let placeholders = vec!["?"; values.len()].join(", ");
                (format!("({col} IN ({placeholders}))"), values.clone())
            }
            Test::Between(low, high) => (
                format!("({col} BETWEEN ? AND ?)"),
                vec![low.clone(), high.clone()],
            ),
            Test::Null => (format!("({col} IS NULL)"), Vec::new()),
            Test::NotNull => (format!("({col} IS NOT NULL)"), Vec::new()),
        }
    }
}

/// A predicate over a to-many relation, compiled to a correlated sub-select so
/// that filtering never multiplies parent rows.
#[derive(Debug)]
pub struct ExistsFilter {
    target_table_db: &'static str,
    foreign_col_sql: String,
    local_col_sql: String,
    inner: ColumnFilter,
}

impl Filter for ExistsFilter {
    fn to_predicate_parts(&self) -> (String, Vec<SqlValue>) {
        let (inner_str, inner_vec) = self.inner.to_predicate_parts();
        let pred_str = format!(
            "(EXISTS (SELECT 1 FROM {} WHERE {} = {} AND {}))",
            quote_ident(self.target_table_db),
            self.foreign_col_sql,
            self.local_col_sql,
            inner_str
        );
        (pred_str, inner_vec)
    }
}

/// The compiled conjunction of all search criteria for one request, together
/// with the to-one relations that must be joined for it to evaluate.
#[derive(Debug, Default)]
pub struct FilterSet {
    filters: Vec<Box<dyn Filter>>,
    joins: Vec<RelationRef>,
}

impl FilterSet {
    pub fn compile(
        catalog: &Catalog,
        table: &'static TableDescriptor,
        criteria: &[SearchCriterion],
    ) -> Result<Self, SocietyError> {
        let mut filter_set = FilterSet::default();

        for criterion in criteria {
            let column = catalog.resolve_field(table, &criterion.field)?;
            let test = compile_test(&column, criterion.operator, &criterion.value)?;
            filter_set.add(column, test)?;
        }

        Ok(filter_set)
    }

    fn add(&mut self, column: ColumnRef, test: Test) -> Result<(), SocietyError> {
        match column.relation {
            Some(relation) if relation.join_kind() == JoinKind::HasMany => {
                let foreign = relation.foreign_key()?;
                let local = relation.local_key()?;
                self.filters.push(Box::new(ExistsFilter {
                    target_table_db: relation.target.table_db,
                    foreign_col_sql: foreign.unaliased(),
                    local_col_sql: local.qualified(),
                    inner: ColumnFilter {
                        col_sql: column.unaliased(),
                        test,
                    },
                }));
            }
            relation => {
                if let Some(relation) = relation {
                    if !self.joins.iter().any(|j| j.name == relation.name) {
                        self.joins.push(relation);
                    }
                }
                self.filters.push(Box::new(ColumnFilter {
                    col_sql: column.qualified(),
                    test,
                }));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// To-one relations the WHERE clause refers to.
    pub fn required_joins(&self) -> &[RelationRef] {
        &self.joins
    }

    /// `\nWHERE a AND b ...` and its params, or an empty clause when there
    /// are no criteria.
    pub fn to_where_clause(&self) -> (String, Vec<SqlValue>) {
        let mut where_clause = String::new();
        let mut params_vec: Vec<SqlValue> = Vec::new();

        if self.filters.is_empty() {
            return (where_clause, params_vec);
        }

        where_clause.push_str("\nWHERE ");
        let mut first = true;
        for filter in &self.filters {
            if !first {
                where_clause.push_str(" AND ");
            }
            first = false;

            let (pred_str, pred_vec) = filter.to_predicate_parts();
            where_clause.push_str(&pred_str);
            params_vec.extend(pred_vec);
        }

        (where_clause, params_vec)
    }
}

/// Pattern operators need a string column; range operators need an ordered one.
pub fn supports(operator: Operator, col_type: ColType) -> bool {
    if operator.is_pattern() && !col_type.is_text() {
        return false;
    }
    !(operator.is_range() && !col_type.is_ordered())
}

pub fn operators_for(col_type: ColType) -> Vec<Operator> {
    Operator::iter()
        .filter(|operator| supports(*operator, col_type))
        .collect()
}

fn compile_test(column: &ColumnRef, operator: Operator, value: &Value) -> Result<Test, SocietyError> {
    let col_type = column.col_type();
    let unsupported = || SocietyError::UnsupportedOperator {
        field: column.display_name(),
        operator,
        col_type: col_type.type_name(),
    };

    if !supports(operator, col_type) {
        return Err(unsupported());
    }

    let test = match operator {
        Operator::IsNull => Test::Null,
        Operator::IsNotNull => Test::NotNull,
        Operator::Equals => Test::Compare("=", scalar(column, value)?),
        Operator::NotEquals => Test::Compare("<>", scalar(column, value)?),
        Operator::GreaterThan => Test::Compare(">", scalar(column, value)?),
        Operator::LessThan => Test::Compare("<", scalar(column, value)?),
        Operator::GreaterOrEqual => Test::Compare(">=", scalar(column, value)?),
        Operator::LessOrEqual => Test::Compare("<=", scalar(column, value)?),
        Operator::Contains => Test::Like(format!("%{}%", like_literal(column, value)?)),
        Operator::StartsWith => Test::Like(format!("{}%", like_literal(column, value)?)),
        Operator::EndsWith => Test::Like(format!("%{}", like_literal(column, value)?)),
        Operator::In => {
            let items = array(column, value, "a non-empty array")?;
            if items.is_empty() {
                return Err(SocietyError::type_mismatch(
                    &column.display_name(),
                    "a non-empty array",
                    value,
                ));
            }
            let values = items
                .iter()
                .map(|item| coerce_scalar(column, item))
                .collect::<Result<Vec<_>, _>>()?;
            Test::In(values)
        }
        Operator::Between => {
            let items = array(column, value, "an array of exactly 2 values")?;
            let [low, high] = items else {
                return Err(SocietyError::type_mismatch(
                    &column.display_name(),
                    "an array of exactly 2 values",
                    value,
                ));
            };
            let low = coerce_scalar(column, low)?;
            let high = coerce_scalar(column, high)?;
            if compare_sql_values(&low, &high) == Some(Ordering::Greater) {
                return Err(SocietyError::InvalidRequest(format!(
                    "between on '{}' has its lower bound above its upper bound",
                    column.display_name()
                )));
            }
            Test::Between(low, high)
        }
    };

    Ok(test)
}

fn scalar(column: &ColumnRef, value: &Value) -> Result<SqlValue, SocietyError> {
    if let Value::Array(_) = value {
        return Err(SocietyError::type_mismatch(
            &column.display_name(),
            "a single value",
            value,
        ));
    }
    coerce_scalar(column, value)
}

fn array<'a>(
    column: &ColumnRef,
    value: &'a Value,
    expected: &str,
) -> Result<&'a [Value], SocietyError> {
    match value {
        Value::Array(items) => Ok(items.as_slice()),
        _ => Err(SocietyError::type_mismatch(
            &column.display_name(),
            expected,
            value,
        )),
    }
}

/// Escape `\`, `%` and `_` so the user's text matches literally.
fn like_literal(column: &ColumnRef, value: &Value) -> Result<String, SocietyError> {
    let text = match scalar(column, value)? {
        SqlValue::Text(text) => text,
        _ => {
            return Err(SocietyError::type_mismatch(
                &column.display_name(),
                "string",
                value,
            ))
        }
    };

    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Ok(escaped)
}
