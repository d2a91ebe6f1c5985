use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::state::AppState;

/// What the provider advertises about itself at `GET /apt`.
#[derive(Debug, Serialize)]
pub struct ProviderDescription {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub description: &'static str,
    pub admin_contact: &'static str,
    pub api_version: &'static str,
    pub synchronous: bool,
    pub globus_auth_scope: String,
    pub keywords: Vec<&'static str>,
    pub visible_to: Vec<&'static str>,
    pub runnable_by: Vec<&'static str>,
    pub administered_by: Vec<&'static str>,
    pub input_schema: Value,
}

const ADMIN_CONTACT: &str = "support@whattimeisrightnow.example";

impl ProviderDescription {
    pub fn new(auth_scope: String) -> Self {
        Self {
            title: "What Time Is It Right Now?",
            subtitle: "Another exciting promotional tie-in for whattimeisitrightnow.com",
            description: "",
            admin_contact: ADMIN_CONTACT,
            api_version: "1.0",
            synchronous: true,
            globus_auth_scope: auth_scope,
            keywords: vec!["time", "whattimeisitnow", "productivity"],
            visible_to: vec!["public"],
            runnable_by: vec!["all_authenticated_users"],
            administered_by: vec![ADMIN_CONTACT],
            input_schema: input_schema(),
        }
    }
}

fn input_schema() -> Value {
    json!({
        "title": "ActionProviderInput",
        "type": "object",
        "properties": {
            "utc_offset": {
                "title": "UTC Offset",
                "description": "An input value to this ActionProvider",
                "type": "integer"
            }
        },
        "required": ["utc_offset"],
        "example": {"utc_offset": 10}
    })
}

/// GET /apt: provider description
pub async fn describe(State(app): State<AppState>) -> Json<ProviderDescription> {
    Json(ProviderDescription::new(app.config.auth_scope()))
}
