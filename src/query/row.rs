use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, Row};

use super::coerce::decode_value;
use super::columns::TableDescriptor;
use super::criteria::Record;

/// Build a record from a row whose select list is
/// `TableDescriptor::cols_as_select_list`.
pub fn record_from_row(row: &Row, table: &TableDescriptor) -> rusqlite::Result<Record> {
    let mut record = Record::new();

    for (idx, (field, col_spec)) in table.entries().enumerate() {
        let value_ref = row.get_ref(idx)?;
        let value = decode_value(col_spec.col_type, value_ref).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, value_ref.data_type(), Box::new(e))
        })?;
        record.insert((*field).to_owned(), value);
    }

    Ok(record)
}

pub fn select_records(
    conn: &Connection,
    sql: &str,
    params: &[SqlValue],
    table: &TableDescriptor,
) -> rusqlite::Result<Vec<Record>> {
    let mut sql_statement = conn.prepare(sql)?;
    let rows = sql_statement.query_map(params_from_iter(params.iter()), |row| {
        record_from_row(row, table)
    })?;

    let records = rows.collect::<rusqlite::Result<Vec<Record>>>()?;
    Ok(records)
}
