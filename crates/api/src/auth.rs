//! Session extraction middleware
//!
//! The gateway in front of this service authenticates users and injects
//! identity headers. This middleware turns them into the explicit
//! `Session` object every billing command takes; handlers never read
//! ambient identity state.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use tradecrm_shared::{CrmError, OrgId, Session, UserId, UserRole};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ORG_ID_HEADER: &str = "x-org-id";
pub const ROLE_HEADER: &str = "x-role";

fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Uuid, CrmError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or_else(|| CrmError::Auth(format!("missing or invalid {} header", name)))
}

/// Build the session from gateway headers, or reject with 401.
///
/// Unknown role strings degrade to member rather than failing: a member
/// can still read, and every privileged command re-checks the role.
pub fn session_from_headers(headers: &HeaderMap) -> Result<Session, CrmError> {
    let user_id = UserId::from(header_uuid(headers, USER_ID_HEADER)?);
    let org_id = OrgId::from(header_uuid(headers, ORG_ID_HEADER)?);
    let role = headers
        .get(ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(UserRole::from_str_lossy)
        .unwrap_or_default();
    Ok(Session::new(user_id, org_id, role))
}

pub async fn session_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let session = session_from_headers(request.headers())?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(user: &str, org: &str, role: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(user).unwrap());
        headers.insert(ORG_ID_HEADER, HeaderValue::from_str(org).unwrap());
        if let Some(role) = role {
            headers.insert(ROLE_HEADER, HeaderValue::from_str(role).unwrap());
        }
        headers
    }

    #[test]
    fn test_session_built_from_headers() {
        let user = Uuid::new_v4().to_string();
        let org = Uuid::new_v4().to_string();
        let session = session_from_headers(&headers(&user, &org, Some("owner"))).unwrap();
        assert_eq!(session.role, UserRole::Owner);
        assert_eq!(session.org_id.to_string(), org);
    }

    #[test]
    fn test_missing_identity_rejected() {
        let result = session_from_headers(&HeaderMap::new());
        assert!(matches!(result, Err(CrmError::Auth(_))));

        let result = session_from_headers(&headers("not-a-uuid", "also-not", Some("admin")));
        assert!(matches!(result, Err(CrmError::Auth(_))));
    }

    #[test]
    fn test_unknown_role_degrades_to_member() {
        let user = Uuid::new_v4().to_string();
        let org = Uuid::new_v4().to_string();
        let session = session_from_headers(&headers(&user, &org, Some("wizard"))).unwrap();
        assert_eq!(session.role, UserRole::Member);

        let session = session_from_headers(&headers(&user, &org, None)).unwrap();
        assert_eq!(session.role, UserRole::Member);
    }
}
