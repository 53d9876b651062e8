use crate::constants::{AUTH_LOGIN_PATH, AUTH_SIGNUP_PATH};
use crate::main_helper::AppContext;
use crate::session::{clear_session, save_session};
use crate::types::{
    failure_detail, LoginRequest, LoginResponse, RaglineError, Result, Session, SignupRequest,
};

/// Registers a new account and signs in. The signup response carries only
/// the public profile, so a login follows to obtain the token.
pub async fn signup(ctx: &AppContext, name: &str, email: &str, password: &str) -> Result<Session> {
    let response = ctx
        .client
        .post(ctx.endpoint(AUTH_SIGNUP_PATH))
        .timeout(ctx.request_timeout())
        .json(&SignupRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })
        .send()
        .await
        .map_err(RaglineError::Network)?;

    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RaglineError::Auth(failure_detail(&body, "Signup failed")).into());
    }

    login(ctx, email, password).await
}

/// Exchanges credentials for a bearer token and persists the session.
pub async fn login(ctx: &AppContext, email: &str, password: &str) -> Result<Session> {
    let response = ctx
        .client
        .post(ctx.endpoint(AUTH_LOGIN_PATH))
        .timeout(ctx.request_timeout())
        .json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })
        .send()
        .await
        .map_err(RaglineError::Network)?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(RaglineError::Auth(failure_detail(&body, "Login failed")).into());
    }

    let parsed: LoginResponse = serde_json::from_str(&body)?;
    let session = Session {
        token: parsed.access_token,
        user: parsed.user,
    };
    save_session(ctx.store.as_ref(), &session)?;
    tracing::info!("signed in as {} ({})", session.user.name, session.user.email);
    Ok(session)
}

pub fn logout(ctx: &AppContext) {
    clear_session(ctx.store.as_ref());
    tracing::info!("session cleared");
}
