use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rusqlite::{params, Connection};

use crate::database::Database;

pub fn test_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    Database::register_functions(&conn).unwrap();
    Database::ensure_schema(&conn).unwrap();
    conn
}

fn minor_units(amount: &str) -> i64 {
    (Decimal::from_str(amount).unwrap() * Decimal::ONE_HUNDRED)
        .to_i64()
        .unwrap()
}

pub fn seed_flat(conn: &Connection, number: &str, floor: i64) -> i64 {
    conn.execute(
        "INSERT INTO flats (number, block, floor, area_sqft, owner_name, status, maintenance_fee, created_at)
         VALUES (?, ?, ?, ?, ?, 'occupied', ?, ?)",
        params![
            number,
            &number[..1],
            floor,
            850.0 + floor as f64,
            format!("Owner of {number}"),
            250_000,
            1_700_000_000 + floor
        ],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn seed_resident(conn: &Connection, flat_id: i64, name: &str, is_owner: bool) -> i64 {
    conn.execute(
        "INSERT INTO residents (flat_id, name, email, is_owner, move_in_date, created_at)
         VALUES (?, ?, ?, ?, '2023-04-01', 1700000000)",
        params![
            flat_id,
            name,
            format!("{}@example.org", name.to_lowercase()),
            is_owner
        ],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn seed_payment(conn: &Connection, flat_id: i64, amount: &str, date: &str, method: &str) -> i64 {
    conn.execute(
        "INSERT INTO payments (flat_id, amount, payment_date, method, created_at)
         VALUES (?, ?, ?, ?, 1700000000)",
        params![flat_id, minor_units(amount), date, method],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn seed_expense(conn: &Connection, category: &str, amount: &str, date: &str) -> i64 {
    conn.execute(
        "INSERT INTO expenses (category, description, amount, expense_date, created_at)
         VALUES (?, ?, ?, ?, 1700000000)",
        params![category, format!("{category} on {date}"), minor_units(amount), date],
    )
    .unwrap();
    conn.last_insert_rowid()
}
