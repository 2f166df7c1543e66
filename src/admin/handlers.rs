use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::load_balancer::UpstreamStatus;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub upstreams: usize,
    pub eligible: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.registry.snapshot();
    let eligible = snapshot.iter().filter(|s| s.is_eligible()).count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if eligible > 0 { "operational" } else { "degraded" },
        upstreams: snapshot.len(),
        eligible,
    })
}

pub async fn get_upstreams(State(state): State<AdminState>) -> Json<Vec<UpstreamStatus>> {
    Json(state.registry.snapshot())
}
