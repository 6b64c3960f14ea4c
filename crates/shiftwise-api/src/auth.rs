//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware with role-based access control.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {role}:{employee_id}:{secret}   — role is `employee` or `admin`
//! Bearer {secret}                        — legacy format (admin, no binding)
//! ```
//!
//! Token issuance lives outside this service; only the shared secret is
//! configured here.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions. Handlers extract it via the `FromRequestParts` impl.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use uuid::Uuid;

use shiftwise_core::EmployeeId;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── Role ────────────────────────────────────────────────────────────────────

/// Roles, ordered by privilege level (`Employee < Admin`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Works shifts; sees and acts on their own records.
    Employee,
    /// Schedules, approves, and runs payroll. The privileged operator.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "employee" => Some(Self::Employee),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Role,
    /// The employee the token is bound to. `None` for legacy admin tokens.
    pub employee_id: Option<EmployeeId>,
}

impl CallerIdentity {
    /// An unbound administrator.
    pub fn system_admin() -> Self {
        Self {
            role: Role::Admin,
            employee_id: None,
        }
    }

    pub fn has_role(&self, minimum: Role) -> bool {
        self.role >= minimum
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The employee this caller acts as.
    ///
    /// Unbound administrators act as [`EmployeeId::SYSTEM`].
    pub fn actor(&self) -> EmployeeId {
        self.employee_id.unwrap_or(EmployeeId::SYSTEM)
    }

    /// The bound employee, or 403 if the token carries none.
    pub fn require_employee(&self) -> Result<EmployeeId, AppError> {
        self.employee_id.ok_or_else(|| {
            AppError::Forbidden("this action requires a token bound to an employee".into())
        })
    }

    /// Whether the caller may see records belonging to `owner`.
    pub fn can_access(&self, owner: EmployeeId) -> bool {
        self.is_admin() || self.employee_id == Some(owner)
    }
}

impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller has at least the required role.
pub fn require_role(caller: &CallerIdentity, minimum: Role) -> Result<(), AppError> {
    if caller.has_role(minimum) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' required, caller has '{}'",
            minimum.as_str(),
            caller.role.as_str()
        )))
    }
}

/// 403 unless the caller is an admin or `owner`; the message names `what`.
pub fn require_access(
    caller: &CallerIdentity,
    owner: EmployeeId,
    what: &str,
) -> Result<(), AppError> {
    if caller.can_access(owner) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("{what} belongs to another employee")))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer token secrets.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a bearer token in format `{role}:{employee_id}:{secret}` or `{secret}`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();

    match parts.as_slice() {
        [secret] => {
            if constant_time_token_eq(secret, expected_secret) {
                Ok(CallerIdentity::system_admin())
            } else {
                Err("invalid bearer token".into())
            }
        }
        [role_str, employee_str, secret] => {
            if !constant_time_token_eq(secret, expected_secret) {
                return Err("invalid bearer token".into());
            }

            let role = Role::parse(role_str).ok_or_else(|| format!("unknown role: {role_str}"))?;

            let employee_id = if employee_str.is_empty() {
                None
            } else {
                let uuid = employee_str
                    .parse::<Uuid>()
                    .map_err(|e| format!("invalid employee_id: {e}"))?;
                Some(EmployeeId(uuid))
            };

            if role == Role::Employee && employee_id.is_none() {
                return Err("employee tokens must carry an employee_id".into());
            }

            Ok(CallerIdentity { role, employee_id })
        }
        _ => Err(
            "invalid token format — expected {role}:{employee_id}:{secret} or {secret}".into(),
        ),
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the Bearer token and inject the resulting [`CallerIdentity`].
///
/// When `AuthConfig.token` is `None`, every request runs as an unbound admin
/// (auth disabled / development mode).
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header {
                Some(header_value) if header_value.starts_with("Bearer ") => {
                    let provided = &header_value[7..];
                    match parse_bearer_token(provided, expected) {
                        Ok(identity) => {
                            request.extensions_mut().insert(identity);
                            next.run(request).await
                        }
                        Err(msg) => {
                            tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                            unauthorized_response(&msg)
                        }
                    }
                }
                Some(_) => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    unauthorized_response("authorization header must use Bearer scheme")
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    unauthorized_response("missing authorization header")
                }
            }
        }
        _ => {
            request
                .extensions_mut()
                .insert(CallerIdentity::system_admin());
            next.run(request).await
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const EMPLOYEE: &str = "550e8400-e29b-41d4-a716-446655440000";

    /// A router that echoes the caller's role and binding.
    fn test_app(token: Option<String>) -> Router {
        async fn whoami(caller: CallerIdentity) -> String {
            format!(
                "{}:{}",
                caller.role.as_str(),
                caller
                    .employee_id
                    .map(|e| e.0.to_string())
                    .unwrap_or_default()
            )
        }

        Router::new()
            .route("/test", get(whoami))
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(AuthConfig { token }))
    }

    async fn call(app: Router, authorization: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    // ── Middleware ────────────────────────────────────────────────

    #[tokio::test]
    async fn legacy_token_is_unbound_admin() {
        let (status, body) = call(test_app(Some("s".into())), Some("Bearer s")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin:");
    }

    #[tokio::test]
    async fn employee_token_binds_identity() {
        let header = format!("Bearer employee:{EMPLOYEE}:s");
        let (status, body) = call(test_app(Some("s".into())), Some(&header)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("employee:{EMPLOYEE}"));
    }

    #[tokio::test]
    async fn missing_authorization_header_rejected() {
        let (status, body) = call(test_app(Some("s".into())), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let err: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(err["error"]["code"], "UNAUTHORIZED");
        assert!(err["error"]["message"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn wrong_secret_rejected() {
        let (status, _) = call(test_app(Some("s".into())), Some("Bearer admin::nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_bearer_scheme_rejected() {
        let (status, body) = call(test_app(Some("s".into())), Some("Basic dXNlcjpwYXNz")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Bearer scheme"));
    }

    #[tokio::test]
    async fn auth_disabled_runs_as_unbound_admin() {
        let (status, body) = call(test_app(None), Some("Bearer anything")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin:");
    }

    // ── Token parsing ────────────────────────────────────────────

    #[test]
    fn constant_time_eq_behaviour() {
        assert!(constant_time_token_eq("secret-123", "secret-123"));
        assert!(!constant_time_token_eq("secret", "secret-123"));
        assert!(!constant_time_token_eq("", "secret-123"));
    }

    #[test]
    fn parse_admin_with_binding() {
        let id = parse_bearer_token(&format!("admin:{EMPLOYEE}:s"), "s").unwrap();
        assert_eq!(id.role, Role::Admin);
        assert_eq!(id.employee_id.unwrap().0.to_string(), EMPLOYEE);
    }

    #[test]
    fn parse_employee_requires_binding() {
        let err = parse_bearer_token("employee::s", "s").unwrap_err();
        assert!(err.contains("employee_id"));
    }

    #[test]
    fn parse_unknown_role_rejected() {
        let err = parse_bearer_token("manager::s", "s").unwrap_err();
        assert!(err.contains("unknown role"));
    }

    #[test]
    fn parse_invalid_uuid_rejected() {
        let err = parse_bearer_token("employee:nope:s", "s").unwrap_err();
        assert!(err.contains("invalid employee_id"));
    }

    #[test]
    fn parse_two_parts_rejected() {
        assert!(parse_bearer_token("admin:s", "s").is_err());
    }

    // ── Roles & access ───────────────────────────────────────────

    #[test]
    fn role_ordering() {
        assert!(Role::Employee < Role::Admin);
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("supervisor"), None);
    }

    #[test]
    fn require_role_rejects_employee_for_admin_action() {
        let caller = CallerIdentity {
            role: Role::Employee,
            employee_id: Some(EmployeeId::new()),
        };
        assert!(require_role(&caller, Role::Employee).is_ok());
        assert!(matches!(
            require_role(&caller, Role::Admin),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn access_limited_to_owner_or_admin() {
        let me = EmployeeId::new();
        let caller = CallerIdentity {
            role: Role::Employee,
            employee_id: Some(me),
        };
        assert!(caller.can_access(me));
        assert!(!caller.can_access(EmployeeId::new()));
        assert!(CallerIdentity::system_admin().can_access(me));
    }

    #[test]
    fn unbound_admin_acts_as_system() {
        let admin = CallerIdentity::system_admin();
        assert_eq!(admin.actor(), EmployeeId::SYSTEM);
        assert!(admin.require_employee().is_err());
    }
}
