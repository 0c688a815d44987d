use axum::{extract::State, Json};
use serde::Serialize;

use crate::extension::HttpServerHandle;
use crate::lifecycle::ServeState;
use crate::net::BindAddress;
use crate::routing::{MountInfo, ProposalInfo};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub state: ServeState,
    pub address: BindAddress,
    /// Actual socket address while listening.
    pub listening: Option<String>,
    pub secure: bool,
}

#[derive(Serialize)]
pub struct IndexStatus {
    pub winner: Option<String>,
    pub url: Option<String>,
    pub proposals: Vec<ProposalInfo>,
}

pub async fn get_status(State(handle): State<HttpServerHandle>) -> Json<SystemStatus> {
    let bound = *handle.bound_address().borrow();
    let listening = bound.map(|addr| addr.to_string());
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        state: handle.serve_state(),
        address: handle.address().clone(),
        listening,
        secure: handle.is_secure(),
    })
}

pub async fn get_mounts(State(handle): State<HttpServerHandle>) -> Json<Vec<MountInfo>> {
    Json(handle.router().mounts().entries())
}

pub async fn get_index(State(handle): State<HttpServerHandle>) -> Json<IndexStatus> {
    let router = handle.router();
    Json(IndexStatus {
        winner: router.index().current_winner(),
        url: router.index_url(),
        proposals: router.index().proposals(),
    })
}
