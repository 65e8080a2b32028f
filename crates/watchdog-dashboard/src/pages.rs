//! Status page and JSON handlers.

use askama::Template;
use axum::Json;
use axum::extract::State;
use axum::response::Html;
use chrono::Utc;
use tracing::error;

use crate::DashboardState;
use crate::views::*;

fn render<T: Template>(tmpl: T) -> Html<String> {
    Html(tmpl.render().unwrap_or_else(|e| {
        error!(error = %e, "failed to render template");
        format!("<pre>Template error: {e}</pre>")
    }))
}

#[derive(Template)]
#[template(path = "status.html")]
struct StatusTemplate {
    issues: Vec<IssueView>,
    last_check: String,
    reload_ms: u64,
}

pub async fn status(State(state): State<DashboardState>) -> Html<String> {
    let report = state.status.current();

    render(StatusTemplate {
        issues: report.issues.iter().map(IssueView::from).collect(),
        last_check: format_relative_time(report.checked_at, Utc::now()),
        reload_ms: reload_ms(report.interval),
    })
}

pub async fn issues_json(State(state): State<DashboardState>) -> Json<IssuesResponse> {
    Json(IssuesResponse::from(state.status.current().as_ref()))
}
