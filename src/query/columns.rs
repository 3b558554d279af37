use phf::ordered_map::Entries;
use serde::Serialize;

use crate::error::SocietyError;

pub type ColMap = phf::OrderedMap<&'static str, ColSpec>;
pub type RelMap = phf::OrderedMap<&'static str, RelSpec>;

/// Semantic type of a column. Drives value coercion, the operators a column
/// accepts and how stored values are decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColType {
    Id,
    Int,
    Float,
    /// Currency, stored as integer minor units with two decimal places.
    Decimal,
    String,
    Bool,
    /// `YYYY-MM-DD` text
    Date,
    /// Unix seconds, exposed as RFC 3339 UTC
    DateTime,
    /// Text restricted to a fixed set of values
    Enum(&'static [&'static str]),
}

impl ColType {
    pub fn type_name(&self) -> &'static str {
        match self {
            ColType::Id => "Id",
            ColType::Int => "Int",
            ColType::Float => "Float",
            ColType::Decimal => "Decimal",
            ColType::String => "String",
            ColType::Bool => "Bool",
            ColType::Date => "Date",
            ColType::DateTime => "DateTime",
            ColType::Enum(_) => "Enum",
        }
    }

    /// Column types that support range comparison.
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            ColType::Id
                | ColType::Int
                | ColType::Float
                | ColType::Decimal
                | ColType::Date
                | ColType::DateTime
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ColType::String)
    }

    pub fn enum_values(&self) -> Option<&'static [&'static str]> {
        match self {
            ColType::Enum(values) => Some(values),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ColSpec {
    pub name_db: &'static str,
    pub col_type: ColType,
    pub nullable: bool,
}

impl ColSpec {
    pub const fn new(name_db: &'static str, col_type: ColType, nullable: bool) -> Self {
        ColSpec {
            name_db,
            col_type,
            nullable,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JoinKind {
    BelongsTo,
    HasMany,
}

/// A declared association. The join condition is always
/// `target.foreign_key = source.local_key`, where both keys are field names.
#[derive(Debug)]
pub struct RelSpec {
    pub target_table: &'static str,
    pub join_kind: JoinKind,
    pub local_key: &'static str,
    pub foreign_key: &'static str,
}

impl RelSpec {
    pub const fn belongs_to(
        target_table: &'static str,
        local_key: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        RelSpec {
            target_table,
            join_kind: JoinKind::BelongsTo,
            local_key,
            foreign_key,
        }
    }

    pub const fn has_many(
        target_table: &'static str,
        local_key: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        RelSpec {
            target_table,
            join_kind: JoinKind::HasMany,
            local_key,
            foreign_key,
        }
    }
}

#[derive(Debug)]
pub struct TableDescriptor {
    pub name: &'static str,
    pub table_db: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static ColMap,
    pub relations: &'static RelMap,
}

impl TableDescriptor {
    pub fn column(&'static self, field: &str) -> Option<ColumnRef> {
        self.columns
            .get_entry(field)
            .map(|(field, spec)| ColumnRef {
                table: self,
                field: *field,
                spec,
                relation: None,
            })
    }

    pub fn primary_key_column(&'static self) -> Result<ColumnRef, SocietyError> {
        self.column(self.primary_key).ok_or_else(|| {
            SocietyError::Error(format!(
                "Primary key '{}' is not a column of '{}'",
                self.primary_key, self.name
            ))
        })
    }

    pub fn entries(&self) -> Entries<'_, &'static str, ColSpec> {
        self.columns.entries()
    }

    /// `"table"."col", ...` for every column, in declaration order.
    pub fn cols_as_select_list(&'static self) -> String {
        let mut select_list = String::new();
        let mut first = true;

        for col_spec in self.columns.values() {
            match first {
                true => first = false,
                false => select_list.push_str(", "),
            }
            select_list.push_str(&qualify(self.table_db, col_spec.name_db));
        }

        select_list
    }
}

/// Quote an identifier. Identifiers only ever come from static descriptors.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn qualify(alias: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(alias), quote_ident(column))
}

/// A relation resolved against the catalog: both ends are known descriptors.
#[derive(Debug, Clone, Copy)]
pub struct RelationRef {
    pub name: &'static str,
    pub spec: &'static RelSpec,
    pub source: &'static TableDescriptor,
    pub target: &'static TableDescriptor,
}

impl RelationRef {
    pub fn join_kind(&self) -> JoinKind {
        self.spec.join_kind
    }

    /// Alias used for the target table whenever it is joined.
    pub fn alias(&self) -> &'static str {
        self.name
    }

    pub fn local_key(&self) -> Result<ColumnRef, SocietyError> {
        self.source.column(self.spec.local_key).ok_or_else(|| {
            SocietyError::Error(format!(
                "Relation '{}' refers to missing local key '{}'",
                self.name, self.spec.local_key
            ))
        })
    }

    pub fn foreign_key(&self) -> Result<ColumnRef, SocietyError> {
        self.target.column(self.spec.foreign_key).ok_or_else(|| {
            SocietyError::Error(format!(
                "Relation '{}' refers to missing foreign key '{}'",
                self.name, self.spec.foreign_key
            ))
        })
    }

    /// `LEFT JOIN "target" AS "alias" ON "alias"."fk" = "source"."lk"`
    pub fn to_join_clause(&self) -> Result<String, SocietyError> {
        let local = self.local_key()?;
        let foreign = self.foreign_key()?;
        Ok(format!(
            "\nLEFT JOIN {} AS {} ON {} = {}",
            quote_ident(self.target.table_db),
            quote_ident(self.alias()),
            qualify(self.alias(), foreign.spec.name_db),
            local.qualified()
        ))
    }
}

/// A column resolved against the catalog, possibly reached through a relation.
#[derive(Debug, Clone, Copy)]
pub struct ColumnRef {
    pub table: &'static TableDescriptor,
    pub field: &'static str,
    pub spec: &'static ColSpec,
    pub relation: Option<RelationRef>,
}

impl ColumnRef {
    pub fn col_type(&self) -> ColType {
        self.spec.col_type
    }

    /// Column reference as it appears in SQL, using the relation alias for
    /// relation-qualified fields.
    pub fn qualified(&self) -> String {
        match &self.relation {
            Some(relation) => qualify(relation.alias(), self.spec.name_db),
            None => qualify(self.table.table_db, self.spec.name_db),
        }
    }

    /// Column reference without any relation alias, for use inside a
    /// sub-select over the column's own table.
    pub fn unaliased(&self) -> String {
        qualify(self.table.table_db, self.spec.name_db)
    }

    /// Field name as the caller wrote it (`relation.field` or `field`).
    pub fn display_name(&self) -> String {
        match &self.relation {
            Some(relation) => format!("{}.{}", relation.name, self.field),
            None => self.field.to_owned(),
        }
    }
}

/// The set of tables the engine can query. Relations name their target by
/// logical table name; the catalog resolves those names.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    tables: &'static [&'static TableDescriptor],
}

impl Catalog {
    pub const fn new(tables: &'static [&'static TableDescriptor]) -> Self {
        Catalog { tables }
    }

    pub fn tables(&self) -> impl Iterator<Item = &'static TableDescriptor> + '_ {
        self.tables.iter().copied()
    }

    pub fn table(&self, name: &str) -> Result<&'static TableDescriptor, SocietyError> {
        self.tables
            .iter()
            .copied()
            .find(|table| table.name == name)
            .ok_or_else(|| SocietyError::UnknownTable(name.to_owned()))
    }

    /// Resolve a direct column (`amount`) or a relation-qualified column
    /// (`flat.number`). Only one level of relation is supported.
    pub fn resolve_field(
        &self,
        table: &'static TableDescriptor,
        field_name: &str,
    ) -> Result<ColumnRef, SocietyError> {
        let unknown = || SocietyError::UnknownField {
            table: table.name.to_owned(),
            field: field_name.to_owned(),
        };

        match field_name.split_once('.') {
            None => table.column(field_name).ok_or_else(unknown),
            Some((relation_name, column_name)) => {
                let relation = match self.resolve_relation(table, relation_name) {
                    Ok(relation) => relation,
                    Err(SocietyError::UnknownRelation { .. }) => return Err(unknown()),
                    Err(err) => return Err(err),
                };
                let mut column = relation.target.column(column_name).ok_or_else(unknown)?;
                column.relation = Some(relation);
                Ok(column)
            }
        }
    }

    pub fn resolve_relation(
        &self,
        table: &'static TableDescriptor,
        relation_name: &str,
    ) -> Result<RelationRef, SocietyError> {
        let (name, spec) = table.relations.get_entry(relation_name).ok_or_else(|| {
            SocietyError::UnknownRelation {
                table: table.name.to_owned(),
                relation: relation_name.to_owned(),
            }
        })?;

        let target = self.table(spec.target_table).map_err(|_| {
            SocietyError::Error(format!(
                "Relation '{}.{}' targets unregistered table '{}'",
                table.name, name, spec.target_table
            ))
        })?;

        Ok(RelationRef {
            name: *name,
            spec,
            source: table,
            target,
        })
    }
}
