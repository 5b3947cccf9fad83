use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::agents::registry::OperationInfo;
use crate::agents::AgentVariant;
use crate::api::errors::ApiError;
use crate::api::state::AppState;
use crate::domain::capture::CaptureSchema;

/// Short persona description
#[derive(Debug, Serialize)]
pub struct AgentSummary {
    pub variant: AgentVariant,
    pub name: &'static str,
    pub description: &'static str,
}

impl From<AgentVariant> for AgentSummary {
    fn from(variant: AgentVariant) -> Self {
        Self {
            variant,
            name: variant.agent_name(),
            description: variant.description(),
        }
    }
}

/// Full persona description handed to the controlling agent
#[derive(Debug, Serialize)]
pub struct AgentResponse {
    #[serde(flatten)]
    pub summary: AgentSummary,
    pub instructions: String,
    pub schema: CaptureSchema,
    pub operations: Vec<OperationInfo>,
}

pub(crate) fn parse_variant(name: &str) -> Result<AgentVariant, ApiError> {
    name.parse()
        .map_err(|_| ApiError::not_found(format!("Agent not found: {}", name)))
}

/// List the available personas
///
/// GET /api/agents
pub async fn list_agents() -> Json<Vec<AgentSummary>> {
    Json(AgentVariant::ALL.into_iter().map(AgentSummary::from).collect())
}

/// Get a persona's prompt, schema and operations
///
/// GET /api/agents/:variant
pub async fn get_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AgentResponse>, ApiError> {
    let variant = parse_variant(&name)?;
    let runtime = state
        .agent(variant)
        .ok_or_else(|| ApiError::not_found(format!("Agent not found: {}", name)))?;

    Ok(Json(AgentResponse {
        summary: AgentSummary::from(variant),
        instructions: variant
            .prompt()
            .instructions(variant.agent_name(), &runtime.registry),
        schema: CaptureSchema::clone(runtime.registry.schema()),
        operations: runtime.registry.describe(),
    }))
}
