use crate::ws::origin;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::header::ORIGIN;
use axum::http::HeaderMap;
use axum::response::Response;
use events::TenantType;
use log::*;
use realtime::connection::Platform;
use realtime::error::{AuthErrorKind, Error};
use realtime::lifecycle::{self, Registration};
use serde::Deserialize;
use service::AppState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConnectParams {
    token: Option<String>,
    platform: Option<String>,
}

/// Upgrades `/ws/{client_type}` and hands the socket to the connection
/// lifecycle. Every refusal still completes the upgrade so the client sees a
/// policy-violation close frame with a reason.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_type): Path<String>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(app_state): State<AppState>,
) -> Response {
    let origin = headers.get(ORIGIN).and_then(|value| value.to_str().ok());

    match admit(&app_state, &client_type, origin, &params) {
        Ok(registration) => {
            debug!(
                "Upgrading {} connection on {}",
                registration.tenant, registration.platform
            );
            let lifecycle = app_state.lifecycle.clone();
            ws.on_upgrade(move |socket| async move { lifecycle.run(socket, registration).await })
        }
        Err(err) => {
            info!("Refusing WebSocket connection to /ws/{client_type}");
            ws.on_upgrade(move |socket| async move { lifecycle::reject(socket, &err).await })
        }
    }
}

fn admit(
    app_state: &AppState,
    client_type: &str,
    origin: Option<&str>,
    params: &ConnectParams,
) -> Result<Registration, Error> {
    let config = &app_state.config;
    if !origin::is_allowed(origin, &config.allowed_origins, config.is_development()) {
        return Err(Error::auth(AuthErrorKind::OriginNotAllowed));
    }

    let requested: TenantType = client_type
        .parse()
        .map_err(|_| Error::auth(AuthErrorKind::InvalidClientType))?;

    let platform = params
        .platform
        .as_deref()
        .map(|p| p.parse::<Platform>())
        .transpose()
        .map_err(|_| Error::auth(AuthErrorKind::PlatformNotAllowed))?;

    let token = params
        .token
        .as_deref()
        .ok_or_else(|| Error::auth(AuthErrorKind::InvalidToken))?;

    app_state.lifecycle.authenticate(token, requested, platform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{app_state, SECRET};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use realtime::auth::AccessClaims;
    use realtime::connection::Tenant;
    use realtime::error::ErrorKind;

    fn token(role: &str) -> String {
        let claims = AccessClaims {
            user_id: Some(5),
            shop_id: None,
            role: Some(role.to_string()),
            platform: None,
            account_type: Some("user".to_string()),
            token_type: "access".to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as u64,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn params(token: Option<String>, platform: Option<&str>) -> ConnectParams {
        ConnectParams {
            token,
            platform: platform.map(str::to_string),
        }
    }

    fn auth_kind(result: Result<Registration, Error>) -> AuthErrorKind {
        match result.unwrap_err().error_kind {
            ErrorKind::Auth(kind) => kind,
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn test_admit_valid_user_token() {
        let state = app_state(&[]);

        let registration = admit(
            &state,
            "user",
            None,
            &params(Some(token("user")), Some("mobile")),
        )
        .unwrap();

        assert_eq!(registration.tenant, Tenant::new(TenantType::User, 5));
        assert_eq!(registration.platform, Platform::Mobile);
    }

    #[test]
    fn test_admit_rejects_unknown_client_type() {
        let state = app_state(&[]);

        let kind = auth_kind(admit(&state, "robot", None, &params(Some(token("user")), None)));

        assert_eq!(kind, AuthErrorKind::InvalidClientType);
    }

    #[test]
    fn test_admit_checks_origin_before_token() {
        let state = app_state(&["--runtime-env", "production"]);

        let kind = auth_kind(admit(
            &state,
            "user",
            Some("http://localhost:5173"),
            &params(None, None),
        ));

        assert_eq!(kind, AuthErrorKind::OriginNotAllowed);
    }

    #[test]
    fn test_admit_requires_token() {
        let state = app_state(&[]);

        let kind = auth_kind(admit(&state, "shop", None, &params(None, None)));

        assert_eq!(kind, AuthErrorKind::InvalidToken);
    }

    #[test]
    fn test_admit_rejects_unknown_platform() {
        let state = app_state(&[]);

        let kind = auth_kind(admit(
            &state,
            "user",
            None,
            &params(Some(token("user")), Some("smartwatch")),
        ));

        assert_eq!(kind, AuthErrorKind::PlatformNotAllowed);
    }

    #[test]
    fn test_admit_admin_channel_for_admin_role() {
        let state = app_state(&[]);

        let registration = admit(&state, "admin", None, &params(Some(token("admin")), None)).unwrap();

        assert_eq!(registration.tenant, Tenant::new(TenantType::Admin, 5));
        assert_eq!(registration.platform, Platform::Web);
    }
}
