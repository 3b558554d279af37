use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;

/// A row as returned to callers: field name -> JSON value, plus any attached
/// relations under the relation name.
pub type Record = serde_json::Map<String, Value>;

#[derive(
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
    Debug,
    PartialEq,
    Eq,
    Copy,
    Clone,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    In,
    Between,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// Case-insensitive pattern operators, valid on string columns only.
    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith
        )
    }

    /// Operators that need an ordered column type.
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::LessThan
                | Operator::GreaterOrEqual
                | Operator::LessOrEqual
                | Operator::Between
        )
    }

    pub fn ignores_value(&self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

#[derive(
    AsRefStr, Display, EnumString, Serialize, Deserialize, Debug, Default, PartialEq, Eq, Copy, Clone,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn to_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriterion {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl SearchCriterion {
    pub fn new(field: &str, operator: Operator, value: Value) -> Self {
        SearchCriterion {
            field: field.to_owned(),
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortCriterion {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl SortCriterion {
    pub fn new(field: &str, direction: Direction) -> Self {
        SortCriterion {
            field: field.to_owned(),
            direction,
        }
    }
}

/// Request body accepted by every listing endpoint. All keys are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationRequest {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub search_criterias: Vec<SearchCriterion>,
    #[serde(default)]
    pub sort_criterias: Vec<SortCriterion>,
    #[serde(default)]
    pub with: BTreeMap<String, bool>,
}

fn default_page() -> i64 {
    DEFAULT_PAGE
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for PaginationRequest {
    fn default() -> Self {
        PaginationRequest {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            search_criterias: Vec::new(),
            sort_criterias: Vec::new(),
            with: BTreeMap::new(),
        }
    }
}

impl PaginationRequest {
    pub fn page(page: i64, limit: i64) -> Self {
        PaginationRequest {
            page,
            limit,
            ..Default::default()
        }
    }

    pub fn search(mut self, criterion: SearchCriterion) -> Self {
        self.search_criterias.push(criterion);
        self
    }

    pub fn sort(mut self, criterion: SortCriterion) -> Self {
        self.sort_criterias.push(criterion);
        self
    }

    pub fn with_relation(mut self, relation: &str) -> Self {
        self.with.insert(relation.to_owned(), true);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(page: i64, limit: i64, total_count: i64) -> Self {
        // limit is validated to be >= 1 before we get here
        let total_pages = (total_count + limit - 1) / limit;
        PageMeta {
            page,
            limit,
            total_count,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationResult<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}
