//! `search_observations`: the FHIR Observation search tool

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use rmcp::model::{CallToolResult, Content, ErrorData, JsonObject, Tool};
use rmcp::schemars::schema_for;
use serde_json::Value;

use super::handler::{ToolContext, ToolHandler};
use crate::fhir::FhirClient;
use crate::logging::Logger;
use crate::types::{SearchArgs, SearchQuery};

pub const SEARCH_OBSERVATIONS: &str = "search_observations";

const DESCRIPTION: &str = "Search a patient's FHIR Observations by code. Follows result pages \
until maxItems records are collected and returns simplified records (value, unit, code, \
LOINC, time, status, category) together with the raw Bundle pages.";

static INPUT_SCHEMA: Lazy<Arc<JsonObject>> = Lazy::new(|| {
    match serde_json::to_value(schema_for!(SearchArgs)) {
        Ok(Value::Object(schema)) => Arc::new(schema),
        _ => Arc::new(JsonObject::new()),
    }
});

/// Runs Observation searches against one FHIR server
pub struct SearchObservationsTool {
    client: FhirClient,
    logger: Arc<dyn Logger>,
}

impl SearchObservationsTool {
    pub fn new(client: FhirClient, logger: Arc<dyn Logger>) -> Self {
        Self { client, logger }
    }

    /// Validate raw arguments; every problem here is the caller's
    pub fn parse_arguments(arguments: Option<JsonObject>) -> Result<SearchQuery, ErrorData> {
        let args: SearchArgs =
            serde_json::from_value(Value::Object(arguments.unwrap_or_default())).map_err(|e| {
                ErrorData::invalid_params(format!("Invalid arguments: {}", e), None)
            })?;
        SearchQuery::from_args(args).map_err(|e| ErrorData::invalid_params(e.to_string(), None))
    }
}

#[async_trait]
impl ToolHandler for SearchObservationsTool {
    fn definition(&self) -> Tool {
        Tool::new(SEARCH_OBSERVATIONS, DESCRIPTION, Arc::clone(&INPUT_SCHEMA))
    }

    async fn call(
        &self,
        arguments: Option<JsonObject>,
        ctx: ToolContext,
    ) -> Result<CallToolResult, ErrorData> {
        let query = Self::parse_arguments(arguments)?;
        self.logger.info(&format!(
            "[SearchObservations] patient={} code={} maxItems={}",
            query.patient_id(),
            query.code(),
            query.max_items()
        ));

        let outcome = self
            .client
            .search_observations(&query, |p| {
                ctx.progress(
                    p.pages as u64,
                    format!("Fetched {} page(s), {} item(s)", p.pages, p.items),
                );
            })
            .await;

        match outcome {
            Ok(result) => {
                let value = serde_json::to_value(&result)
                    .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
                Ok(CallToolResult::structured(value))
            }
            Err(e) => {
                self.logger
                    .warn(&format!("[SearchObservations] Search failed: {}", e));
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Observation search failed: {}",
                    e
                ))]))
            }
        }
    }
}
