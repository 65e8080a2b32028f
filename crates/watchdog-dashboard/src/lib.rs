//! watchdog-dashboard — read-only view of the latest check cycle.
//!
//! # Routes
//!
//! | Route | Handler |
//! |---|---|
//! | `/` | HTML status page, reloads itself every check interval |
//! | `/api/v1/issues` | Current issues as JSON |

pub mod pages;
pub mod views;

use axum::Router;
use axum::routing::get;
use watchdog_monitor::StatusReader;

/// Shared state for dashboard handlers.
#[derive(Clone)]
pub struct DashboardState {
    pub status: StatusReader,
}

/// Build the dashboard router.
pub fn dashboard_router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(pages::status))
        .route("/api/v1/issues", get(pages::issues_json))
        .with_state(state)
}
