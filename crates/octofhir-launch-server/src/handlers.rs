use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use octofhir_launch::{ErrorCategory, LaunchError, LaunchEvent, LaunchParams, LaunchView, SessionId};
use serde_json::json;

use crate::server::AppState;
use crate::templates::render_view;

/// `GET /` - the launch page.
///
/// Serves the EHR launch (`iss`, `launch`), the authorization callback
/// (`code`, `state`) and plain visits alike.
pub async fn launch_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<LaunchParams>,
) -> Response {
    let (session_id, jar) = resolve_session(&state, jar);

    // One render per session at a time, so the `state` committed below is
    // the one in the URL this response carries
    let _guard = state.locks.acquire(&session_id).await;

    let mut session = match state.sessions.load(&session_id).await {
        Ok(s) => s,
        Err(error) => {
            tracing::error!(error = %error, "Failed to load launch session");
            return render(jar, LaunchView::Failed { error });
        }
    };
    let before = session.clone();

    let event = LaunchEvent::from(params);
    let view = state.handler.handle(&event, &mut session).await;

    if session != before || !session.is_empty() {
        if let Err(e) = state.sessions.save(&session_id, &session).await {
            tracing::error!(error = %e, "Failed to save launch session");
            let error = LaunchError::internal(format!("could not save session: {e}"));
            return render(jar, LaunchView::Failed { error });
        }
    }

    tracing::info!(phase = view.phase(), "Launch page rendered");
    render(jar, view)
}

pub async fn healthz() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Reads the session id from the cookie jar, issuing a new cookie when absent
/// or unparsable.
fn resolve_session(state: &AppState, jar: CookieJar) -> (SessionId, CookieJar) {
    if let Some(id) = jar
        .get(&state.session.cookie_name)
        .and_then(|c| c.value().parse::<SessionId>().ok())
    {
        return (id, jar);
    }

    let id = SessionId::generate();
    let cookie = Cookie::build((state.session.cookie_name.clone(), id.to_string()))
        .http_only(true)
        .secure(state.session.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    (id, jar.add(cookie))
}

fn render(jar: CookieJar, view: LaunchView) -> Response {
    (status_for(&view), jar, Html(render_view(&view))).into_response()
}

fn status_for(view: &LaunchView) -> StatusCode {
    match view {
        LaunchView::Waiting
        | LaunchView::ReadyToAuthorize { .. }
        | LaunchView::CallbackVerified { .. } => StatusCode::OK,
        LaunchView::CallbackRejected { .. } => StatusCode::BAD_REQUEST,
        LaunchView::Failed { error } => match error.category() {
            ErrorCategory::Input | ErrorCategory::Security => StatusCode::BAD_REQUEST,
            ErrorCategory::Discovery | ErrorCategory::Protocol => StatusCode::BAD_GATEWAY,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}
