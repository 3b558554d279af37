use crate::error::SocietyError;

use super::columns::{Catalog, ColumnRef, JoinKind, RelationRef, TableDescriptor};
use super::criteria::{Direction, SortCriterion};

#[derive(Debug)]
struct OrderSpec {
    column: ColumnRef,
    direction: Direction,
}

/// Compiled ORDER BY. Always ends with the base table's primary key so that
/// rows sharing every sort value still have a total order.
#[derive(Debug)]
pub struct Order {
    order_specs: Vec<OrderSpec>,
    joins: Vec<RelationRef>,
}

impl Order {
    fn new() -> Self {
        Order {
            order_specs: Vec::new(),
            joins: Vec::new(),
        }
    }

    pub fn compile(
        catalog: &Catalog,
        table: &'static TableDescriptor,
        criteria: &[SortCriterion],
    ) -> Result<Self, SocietyError> {
        let mut order = Self::new();

        for criterion in criteria {
            let column = catalog.resolve_field(table, &criterion.field)?;
            order.add_order_spec(column, criterion.direction)?;
        }

        let pk = table.primary_key_column()?;
        if !order.specs_contain(&pk) {
            order.order_specs.push(OrderSpec {
                column: pk,
                direction: Direction::Asc,
            });
        }

        Ok(order)
    }

    fn add_order_spec(
        &mut self,
        column: ColumnRef,
        direction: Direction,
    ) -> Result<(), SocietyError> {
        if let Some(relation) = column.relation {
            if relation.join_kind() == JoinKind::HasMany {
                return Err(SocietyError::InvalidRequest(format!(
                    "Cannot sort by '{}': '{}' is a to-many relation",
                    column.display_name(),
                    relation.name
                )));
            }
            if !self.joins.iter().any(|j| j.name == relation.name) {
                self.joins.push(relation);
            }
        }

        if self.specs_contain(&column) {
            return Err(SocietyError::InvalidRequest(format!(
                "Field '{}' was already specified in sort criteria",
                column.display_name()
            )));
        }

        self.order_specs.push(OrderSpec { column, direction });
        Ok(())
    }

    fn specs_contain(&self, column: &ColumnRef) -> bool {
        self.order_specs
            .iter()
            .any(|spec| spec.column.qualified() == column.qualified())
    }

    /// To-one relations the ORDER BY refers to.
    pub fn required_joins(&self) -> &[RelationRef] {
        &self.joins
    }

    /// Sort keys in application order, as (field, direction).
    pub fn keys(&self) -> impl Iterator<Item = (String, Direction)> + '_ {
        self.order_specs
            .iter()
            .map(|spec| (spec.column.display_name(), spec.direction))
    }

    pub fn to_order_clause(&self) -> String {
        let mut order_clause = "\nORDER BY ".to_string();
        let mut first = true;

        for order in &self.order_specs {
            match first {
                true => first = false,
                false => order_clause.push_str(", "),
            }

            order_clause.push_str(&order.column.qualified());
            order_clause.push(' ');
            order_clause.push_str(order.direction.to_sql());
        }
        order_clause
    }
}
