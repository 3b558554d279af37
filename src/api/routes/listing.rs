use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use log::debug;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::error::SocietyError;
use crate::query::{
    operators_for, JoinKind, Operator, PaginationRequest, PaginationResult, Record, TableDescriptor,
};

/// Column metadata from the entity descriptor
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    pub col_type: String,
    pub nullable: bool,
    pub operators: Vec<Operator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationMetadata {
    pub name: String,
    pub kind: JoinKind,
    pub target: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    pub entity: String,
    pub primary_key: String,
    pub columns: Vec<ColumnMetadata>,
    pub relations: Vec<RelationMetadata>,
}

/// POST /api/{entity}/list
/// Every key of the body is optional; an empty body lists page 1.
pub async fn list_entity(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    body: Bytes,
) -> Result<Json<PaginationResult<Record>>, ApiError> {
    let request = parse_request(&body)?;
    debug!("List request for '{}': {:?}", entity, request);

    let result = state.paginator.paginate(&entity, &request).await?;
    Ok(Json(result))
}

/// GET /api/{entity}/metadata
pub async fn get_metadata(
    State(state): State<AppState>,
    Path(entity): Path<String>,
) -> Result<Json<MetadataResponse>, ApiError> {
    let table = state.paginator.catalog().table(&entity)?;
    Ok(Json(map_table_to_metadata(table)))
}

fn parse_request(body: &[u8]) -> Result<PaginationRequest, SocietyError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PaginationRequest::default());
    }

    serde_json::from_slice(body)
        .map_err(|e| SocietyError::InvalidRequest(format!("Malformed request body: {}", e)))
}

fn map_table_to_metadata(table: &TableDescriptor) -> MetadataResponse {
    let columns = table
        .entries()
        .map(|(name, spec)| ColumnMetadata {
            name: name.to_string(),
            col_type: spec.col_type.type_name().to_string(),
            nullable: spec.nullable,
            operators: operators_for(spec.col_type),
            values: spec
                .col_type
                .enum_values()
                .map(|values| values.iter().map(|v| v.to_string()).collect()),
        })
        .collect();

    let relations = table
        .relations
        .entries()
        .map(|(name, spec)| RelationMetadata {
            name: name.to_string(),
            kind: spec.join_kind,
            target: spec.target_table.to_string(),
        })
        .collect();

    MetadataResponse {
        entity: table.name.to_string(),
        primary_key: table.primary_key.to_string(),
        columns,
        relations,
    }
}
