use crate::{database::entities::Plan, entitlement::PlansConfig, server::Server};
use axum::{Router, extract::State, response::Json, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

/// Public catalog entry
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlanInfo {
    pub plan: Plan,
    pub name: String,
    /// Null for unbounded plans
    pub monthly_generations: Option<u32>,
    pub price_cents: u64,
    pub features: Vec<String>,
    pub purchasable: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlansResponse {
    pub plans: Vec<PlanInfo>,
}

pub fn catalog(plans: &PlansConfig) -> Vec<PlanInfo> {
    Plan::ALL
        .into_iter()
        .filter(|plan| plans.settings(*plan).listed)
        .map(|plan| {
            let settings = plans.settings(plan);
            PlanInfo {
                plan,
                name: settings.name.clone(),
                monthly_generations: settings.monthly_generations,
                price_cents: settings.price_cents,
                features: settings.features.clone(),
                purchasable: plan.is_purchasable(),
            }
        })
        .collect()
}

pub fn create_plans_routes() -> Router<Server> {
    Router::new().route("/plans", get(list_plans))
}

#[utoipa::path(
    get,
    path = "/api/v1/plans",
    responses((status = 200, description = "Plan catalog", body = PlansResponse)),
    tag = "Plans"
)]
pub async fn list_plans(State(server): State<Server>) -> Json<PlansResponse> {
    Json(PlansResponse {
        plans: catalog(&server.config.plans),
    })
}
