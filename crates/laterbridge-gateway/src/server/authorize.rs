//! QR authorization page
//!
//! `/authorize` starts a provider QR session and renders the code. The page
//! long-polls `/authorize/complete`, which runs the bridge's poll loop and
//! answers with the client's redirect URL once the phone has confirmed the
//! login. Nothing but the pending QR session is kept on the server.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use laterbridge_client::QrOutcome;
use laterbridge_core::branding;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use super::AppState;
use crate::oauth::{generate_session_id, CodeGrant, PendingLogin};

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub scope: Option<String>,
}

pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    info!(
        "[OAuth] Authorization request: client_id={:?}, redirect_uri={:?}",
        params.client_id, params.redirect_uri
    );

    // Without a usable redirect URI there is nowhere to send errors
    let Some(redirect_uri) = params.redirect_uri.as_deref().filter(|u| Url::parse(u).is_ok())
    else {
        warn!("[OAuth] Missing or invalid redirect_uri");
        return (
            StatusCode::BAD_REQUEST,
            Html(error_page("The authorization request has no valid redirect_uri.")),
        )
            .into_response();
    };
    let client_state = params.state.as_deref();

    if let Some(response_type) = params.response_type.as_deref() {
        if response_type != "code" {
            warn!("[OAuth] Unsupported response_type: {}", response_type);
            return oauth_error_redirect(
                redirect_uri,
                "unsupported_response_type",
                "Only 'code' response type is supported",
                client_state,
            );
        }
    }

    if let Some(method) = params.code_challenge_method.as_deref() {
        if params.code_challenge.is_some() && method != "S256" && method != "plain" {
            warn!("[OAuth] Unsupported code_challenge_method: {}", method);
            return oauth_error_redirect(
                redirect_uri,
                "invalid_request",
                "code_challenge_method must be S256 or plain",
                client_state,
            );
        }
    }

    let challenge = match state.bridge.start().await {
        Ok(challenge) => challenge,
        Err(e) => {
            warn!("[OAuth] Could not start QR login: {}", e);
            return oauth_error_redirect(
                redirect_uri,
                "temporarily_unavailable",
                "The provider did not start a QR login session",
                client_state,
            );
        }
    };

    let session_id = generate_session_id();
    state
        .sessions
        .insert(
            session_id.clone(),
            PendingLogin {
                qr: challenge.session,
                redirect_uri: redirect_uri.to_string(),
                state: params.state.clone(),
                code_challenge: params.code_challenge.clone(),
                code_challenge_method: params.code_challenge_method.clone(),
                expires_at: state.login_deadline(),
            },
        )
        .await;

    info!("[OAuth] QR login pending ({} sessions open)", state.sessions.len().await);

    Html(qr_page(&challenge.image_url, &challenge.login_url, &session_id)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CompleteParams {
    pub session: String,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub redirect_url: String,
}

/// Long-poll until the QR session resolves or expires.
///
/// The pending login is claimed before polling starts, so a session yields
/// at most one authorization code; concurrent or repeated completions see
/// `unknown_session`.
pub async fn complete(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CompleteParams>,
) -> Response {
    let Some(pending) = state.sessions.take(&params.session).await else {
        warn!("[OAuth] Completion for unknown, expired or already claimed session");
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "unknown_session",
                "error_description": "This login session does not exist or has expired"
            })),
        )
            .into_response();
    };

    let cancel = state.shutdown.child_token();
    match state.bridge.wait(&pending.qr, &cancel).await {
        QrOutcome::Resolved(pair) => {
            let mut grant = CodeGrant::new(pair);
            grant.code_challenge = pending.code_challenge.clone();
            grant.code_challenge_method = pending.code_challenge_method.clone();
            grant.redirect_uri = Some(pending.redirect_uri.clone());

            let code = match state.sealer.seal_code(&grant) {
                Ok(code) => code,
                Err(e) => {
                    warn!("[OAuth] Failed to seal authorization code: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"error": "server_error"})),
                    )
                        .into_response();
                }
            };

            match code_redirect(&pending.redirect_uri, &code, pending.state.as_deref()) {
                Some(redirect_url) => {
                    info!("[OAuth] QR login completed, redirecting to client");
                    Json(CompleteResponse { redirect_url }).into_response()
                }
                None => (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_redirect_uri"})),
                )
                    .into_response(),
            }
        }
        QrOutcome::Expired { attempts } => {
            warn!("[OAuth] QR login timed out after {} polls", attempts);
            (
                StatusCode::REQUEST_TIMEOUT,
                Json(json!({
                    "error": "timeout",
                    "error_description": "The QR code was not scanned in time. Reload to try again."
                })),
            )
                .into_response()
        }
        QrOutcome::Cancelled { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": "shutting_down",
                "error_description": "The server is shutting down"
            })),
        )
            .into_response(),
    }
}

/// `redirect_uri` with `code` and `state` appended
pub fn code_redirect(redirect_uri: &str, code: &str, state: Option<&str>) -> Option<String> {
    let mut url = Url::parse(redirect_uri).ok()?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("code", code);
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    Some(url.into())
}

fn oauth_error_redirect(
    redirect_uri: &str,
    error: &str,
    description: &str,
    state: Option<&str>,
) -> Response {
    match error_redirect(redirect_uri, error, description, state) {
        Some(url) => Redirect::to(&url).into_response(),
        None => (StatusCode::BAD_REQUEST, Html(error_page(description))).into_response(),
    }
}

/// `redirect_uri` with the OAuth error parameters in its query
fn error_redirect(
    redirect_uri: &str,
    error: &str,
    description: &str,
    state: Option<&str>,
) -> Option<String> {
    let mut url = Url::parse(redirect_uri).ok()?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("error", error);
        query.append_pair("error_description", description);
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    Some(url.into())
}

/// Minimal HTML escaping for values interpolated into the page
fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn qr_page(image_url: &str, login_url: &str, session_id: &str) -> String {
    let app_name = branding::DISPLAY_NAME;
    let image_url = escape_html(image_url);
    let login_url = escape_html(login_url);
    let complete_url = format!("/authorize/complete?session={}", urlencoding::encode(session_id));

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{app_name} - Sign in</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            min-height: 100vh;
            margin: 0;
            display: flex;
            align-items: center;
            justify-content: center;
            background: #f6f5f2;
            color: #222;
        }}
        .container {{ text-align: center; max-width: 380px; padding: 1rem; }}
        img {{ width: 300px; height: 300px; border-radius: 12px; background: #fff; }}
        .status {{ margin-top: 1.25rem; color: #666; }}
        .status.error {{ color: #b00020; }}
        a {{ color: #555; font-size: 0.875rem; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Sign in to {app_name}</h1>
        <p>Scan this code with the app on your phone.</p>
        <img src="{image_url}" alt="QR code">
        <p><a href="{login_url}">Open the login link instead</a></p>
        <p id="status" class="status">Waiting for confirmation…</p>
    </div>
    <script>
        (function() {{
            var status = document.getElementById('status');
            fetch("{complete_url}")
                .then(function(res) {{
                    return res.json().then(function(body) {{ return {{ ok: res.ok, body: body }}; }});
                }})
                .then(function(result) {{
                    if (result.ok && result.body.redirect_url) {{
                        status.textContent = 'Signed in. Returning to your application…';
                        window.location.href = result.body.redirect_url;
                    }} else {{
                        status.className = 'status error';
                        status.textContent = result.body.error_description || 'Sign-in failed.';
                    }}
                }})
                .catch(function() {{
                    status.className = 'status error';
                    status.textContent = 'Connection lost. Reload to try again.';
                }});
        }})();
    </script>
</body>
</html>"#
    )
}

fn error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{} - Authorization error</title></head>
<body><p>{}</p></body>
</html>"#,
        branding::DISPLAY_NAME,
        escape_html(message)
    )
}
