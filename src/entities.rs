use phf_macros::phf_ordered_map;

use crate::query::{Catalog, ColMap, ColSpec, ColType, RelMap, RelSpec, TableDescriptor};

pub const FLAT_STATUSES: &[&str] = &["occupied", "vacant", "rented"];
pub const PAYMENT_METHODS: &[&str] = &["cash", "cheque", "upi", "bank_transfer"];
pub const EXPENSE_CATEGORIES: &[&str] = &[
    "maintenance",
    "utilities",
    "security",
    "repairs",
    "events",
    "other",
];

pub static FLATS_COLS: ColMap = phf_ordered_map! {
    "id" => ColSpec::new("id", ColType::Id, false),
    "number" => ColSpec::new("number", ColType::String, false),
    "block" => ColSpec::new("block", ColType::String, true),
    "floor" => ColSpec::new("floor", ColType::Int, true),
    "areaSqft" => ColSpec::new("area_sqft", ColType::Float, true),
    "ownerName" => ColSpec::new("owner_name", ColType::String, false),
    "status" => ColSpec::new("status", ColType::Enum(FLAT_STATUSES), false),
    "maintenanceFee" => ColSpec::new("maintenance_fee", ColType::Decimal, false),
    "createdAt" => ColSpec::new("created_at", ColType::DateTime, false),
};

pub static FLATS_RELATIONS: RelMap = phf_ordered_map! {
    "residents" => RelSpec::has_many("residents", "id", "flatId"),
    "payments" => RelSpec::has_many("payments", "id", "flatId"),
};

pub static RESIDENTS_COLS: ColMap = phf_ordered_map! {
    "id" => ColSpec::new("id", ColType::Id, false),
    "flatId" => ColSpec::new("flat_id", ColType::Id, false),
    "name" => ColSpec::new("name", ColType::String, false),
    "email" => ColSpec::new("email", ColType::String, true),
    "phone" => ColSpec::new("phone", ColType::String, true),
    "isOwner" => ColSpec::new("is_owner", ColType::Bool, false),
    "moveInDate" => ColSpec::new("move_in_date", ColType::Date, true),
    "createdAt" => ColSpec::new("created_at", ColType::DateTime, false),
};

pub static RESIDENTS_RELATIONS: RelMap = phf_ordered_map! {
    "flat" => RelSpec::belongs_to("flats", "flatId", "id"),
};

pub static PAYMENTS_COLS: ColMap = phf_ordered_map! {
    "id" => ColSpec::new("id", ColType::Id, false),
    "flatId" => ColSpec::new("flat_id", ColType::Id, false),
    "amount" => ColSpec::new("amount", ColType::Decimal, false),
    "paymentDate" => ColSpec::new("payment_date", ColType::Date, false),
    "method" => ColSpec::new("method", ColType::Enum(PAYMENT_METHODS), false),
    "reference" => ColSpec::new("reference", ColType::String, true),
    "createdAt" => ColSpec::new("created_at", ColType::DateTime, false),
};

pub static PAYMENTS_RELATIONS: RelMap = phf_ordered_map! {
    "flat" => RelSpec::belongs_to("flats", "flatId", "id"),
};

pub static EXPENSES_COLS: ColMap = phf_ordered_map! {
    "id" => ColSpec::new("id", ColType::Id, false),
    "category" => ColSpec::new("category", ColType::Enum(EXPENSE_CATEGORIES), false),
    "description" => ColSpec::new("description", ColType::String, true),
    "amount" => ColSpec::new("amount", ColType::Decimal, false),
    "expenseDate" => ColSpec::new("expense_date", ColType::Date, false),
    "paidTo" => ColSpec::new("paid_to", ColType::String, true),
    "createdAt" => ColSpec::new("created_at", ColType::DateTime, false),
};

pub static EXPENSES_RELATIONS: RelMap = phf_ordered_map! {};

pub static FLATS: TableDescriptor = TableDescriptor {
    name: "flats",
    table_db: "flats",
    primary_key: "id",
    columns: &FLATS_COLS,
    relations: &FLATS_RELATIONS,
};

pub static RESIDENTS: TableDescriptor = TableDescriptor {
    name: "residents",
    table_db: "residents",
    primary_key: "id",
    columns: &RESIDENTS_COLS,
    relations: &RESIDENTS_RELATIONS,
};

pub static PAYMENTS: TableDescriptor = TableDescriptor {
    name: "payments",
    table_db: "payments",
    primary_key: "id",
    columns: &PAYMENTS_COLS,
    relations: &PAYMENTS_RELATIONS,
};

pub static EXPENSES: TableDescriptor = TableDescriptor {
    name: "expenses",
    table_db: "expenses",
    primary_key: "id",
    columns: &EXPENSES_COLS,
    relations: &EXPENSES_RELATIONS,
};

pub static PORTAL_CATALOG: Catalog = Catalog::new(&[&FLATS, &RESIDENTS, &PAYMENTS, &EXPENSES]);
