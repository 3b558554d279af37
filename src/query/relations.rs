use std::collections::{HashMap, HashSet};

use log::debug;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::Value;

use crate::error::SocietyError;

use super::coerce::coerce_scalar;
use super::columns::{quote_ident, JoinKind, RelationRef};
use super::criteria::Record;
use super::row::select_records;

/// Attach each relation in `relations` to every record of the page.
///
/// One query per relation: all keys of the page go into a single `IN (...)`
/// and the results are joined back in memory. A belongsTo relation attaches
/// an object or `null`; a hasMany relation attaches an array ordered by the
/// related table's primary key.
pub fn load_relations(
    conn: &Connection,
    relations: &[RelationRef],
    records: &mut [Record],
) -> Result<(), SocietyError> {
    for relation in relations {
        load_relation(conn, relation, records)?;
    }
    Ok(())
}

fn load_relation(
    conn: &Connection,
    relation: &RelationRef,
    records: &mut [Record],
) -> Result<(), SocietyError> {
    let local = relation.local_key()?;
    let foreign = relation.foreign_key()?;
    let target_pk = relation.target.primary_key_column()?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut keys: Vec<SqlValue> = Vec::new();
    for record in records.iter() {
        if let Some(key) = record.get(local.field).filter(|v| !v.is_null()) {
            if seen.insert(key.to_string()) {
                keys.push(coerce_scalar(&local, key)?);
            }
        }
    }

    let mut grouped: HashMap<String, Vec<Record>> = HashMap::new();

    if !keys.is_empty() {
        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!(
            "SELECT {}\nFROM {}\nWHERE {} IN ({})\nORDER BY {} ASC, {} ASC",
            relation.target.cols_as_select_list(),
            quote_ident(relation.target.table_db),
            foreign.unaliased(),
            placeholders,
            foreign.unaliased(),
            target_pk.unaliased()
        );
        debug!("Relation query ({}): {}", relation.name, sql);

        let related = select_records(conn, &sql, &keys, relation.target).map_err(|source| {
            SocietyError::RelationLoadError {
                relation: relation.name.to_owned(),
                source,
            }
        })?;

        for row in related {
            let key = row
                .get(foreign.field)
                .map(Value::to_string)
                .unwrap_or_default();
            grouped.entry(key).or_default().push(row);
        }
    }

    for record in records.iter_mut() {
        let matches = record
            .get(local.field)
            .filter(|v| !v.is_null())
            .and_then(|key| grouped.get(&key.to_string()));

        let attached = match relation.join_kind() {
            JoinKind::BelongsTo => matches
                .and_then(|rows| rows.first())
                .map(|row| Value::Object(row.clone()))
                .unwrap_or(Value::Null),
            JoinKind::HasMany => Value::Array(
                matches
                    .map(|rows| rows.iter().cloned().map(Value::Object).collect())
                    .unwrap_or_default(),
            ),
        };

        record.insert(relation.name.to_owned(), attached);
    }

    Ok(())
}
