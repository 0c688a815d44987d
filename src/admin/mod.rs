//! Built-in status sub-application.
//!
//! Mounted like any other extension app. Reports the serve state, the
//! mount table and the index page proposals as JSON.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::config::AdminConfig;
use crate::extension::HttpServerHandle;
use crate::routing::{Application, IndexProposalGuard, MountError, MountGuard, MountOptions};

use self::auth::require_bearer;
use self::handlers::{get_index, get_mounts, get_status};

/// Route name of the status page.
pub const STATUS_ROUTE: &str = "admin.status";

/// Index priority of the status page; any extension page outranks it.
pub const STATUS_INDEX_PRIORITY: i32 = -10;

pub fn setup_admin_router(handle: HttpServerHandle, api_key: Option<String>) -> Router {
    let router = Router::new()
        .route("/status", get(get_status))
        .route("/mounts", get(get_mounts))
        .route("/index", get(get_index));

    let router = match api_key {
        Some(key) => router.layer(middleware::from_fn_with_state(
            Arc::<str>::from(key),
            require_bearer,
        )),
        None => router,
    };
    router.with_state(handle)
}

/// Live status mount; unmounted and withdrawn from the index when dropped.
#[derive(Debug)]
#[must_use = "the status page is unmounted as soon as this is dropped"]
pub struct StatusPage {
    _mount: MountGuard,
    _index: IndexProposalGuard,
}

/// Mount the status app at `config.path` and offer it as the index page.
pub fn mount_status(handle: &HttpServerHandle, config: &AdminConfig) -> Result<StatusPage, MountError> {
    let app = Application::new("admin", setup_admin_router(handle.clone(), config.api_key.clone()));
    let mount = handle.mount_scoped(app, config.path.clone(), MountOptions::default())?;

    handle.register_route_name(
        STATUS_ROUTE,
        format!("{}/status", config.path.trim_end_matches('/')),
    );
    let index = handle.proposed_index_page(STATUS_ROUTE, STATUS_INDEX_PRIORITY);

    Ok(StatusPage {
        _mount: mount,
        _index: index,
    })
}
