pub const SCHEMA_VERSION: &str = "1";

// Currency columns hold integer minor units (paise). Timestamps are unix
// seconds. Dates are 'YYYY-MM-DD' text so they order lexically.
pub const CREATE_SCHEMA_SQL: &str = r#"
BEGIN TRANSACTION;

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', '1');

CREATE TABLE IF NOT EXISTS flats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    number TEXT NOT NULL UNIQUE,
    block TEXT,
    floor INTEGER,
    area_sqft REAL,
    owner_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'occupied' CHECK (status IN ('occupied', 'vacant', 'rented')),
    maintenance_fee INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS residents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flat_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    is_owner BOOLEAN NOT NULL DEFAULT 0,
    move_in_date TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (flat_id) REFERENCES flats(id)
);

CREATE INDEX IF NOT EXISTS idx_residents_flat ON residents (flat_id);

CREATE TABLE IF NOT EXISTS payments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flat_id INTEGER NOT NULL,
    amount INTEGER NOT NULL,
    payment_date TEXT NOT NULL,
    method TEXT NOT NULL CHECK (method IN ('cash', 'cheque', 'upi', 'bank_transfer')),
    reference TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (flat_id) REFERENCES flats(id)
);

CREATE INDEX IF NOT EXISTS idx_payments_flat ON payments (flat_id);
CREATE INDEX IF NOT EXISTS idx_payments_date ON payments (payment_date);

CREATE TABLE IF NOT EXISTS expenses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL CHECK (category IN ('maintenance', 'utilities', 'security', 'repairs', 'events', 'other')),
    description TEXT,
    amount INTEGER NOT NULL,
    expense_date TEXT NOT NULL,
    paid_to TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses (expense_date);

COMMIT;
"#;
