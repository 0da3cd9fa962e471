use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use shepherd_approvals::{ApprovalRequest, ApprovalRequestDraft, ApprovalType};
use shepherd_auth::{OrgScope, Role, TokenPair, UserProfile};
use shepherd_core::{AgencyId, DistrictId, DomainResult, EntityId, SubDistrictId, UserId};
use shepherd_infra::{ProvisionInput, SignupInput};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

impl From<SignupRequest> for SignupInput {
    fn from(value: SignupRequest) -> Self {
        SignupInput {
            email: value.email,
            password: value.password,
            full_name: value.full_name,
            role: value.role.unwrap_or(Role::Member),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub user_id: UserId,
    pub current_password: String,
    pub new_password: String,
}

/// Scope ids as sent by clients; blank ids are rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRequest {
    pub agency_id: Option<String>,
    pub district_id: Option<String>,
    pub sub_district_id: Option<String>,
}

impl ScopeRequest {
    pub fn into_scope(self) -> DomainResult<OrgScope> {
        Ok(OrgScope {
            agency_id: self.agency_id.map(AgencyId::new).transpose()?,
            district_id: self.district_id.map(DistrictId::new).transpose()?,
            sub_district_id: self.sub_district_id.map(SubDistrictId::new).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    #[serde(flatten)]
    pub scope: ScopeRequest,
}

impl ProvisionUserRequest {
    pub fn into_input(self) -> DomainResult<ProvisionInput> {
        Ok(ProvisionInput {
            email: self.email,
            password: self.password,
            full_name: self.full_name,
            role: self.role,
            scope: self.scope.into_scope()?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApprovalRequest {
    #[serde(rename = "type")]
    pub approval_type: ApprovalType,
    pub entity_id: EntityId,
    pub amount: u64,
    #[serde(flatten)]
    pub scope: ScopeRequest,
    pub comments: Option<String>,
}

impl SubmitApprovalRequest {
    pub fn into_draft(self, requested_by: UserId) -> DomainResult<ApprovalRequestDraft> {
        Ok(ApprovalRequestDraft {
            approval_type: self.approval_type,
            entity_id: self.entity_id,
            amount: self.amount,
            scope: self.scope.into_scope()?,
            requested_by,
            comments: self.comments,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    pub comments: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TokensResponse {
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub approval: ApprovalRequest,
}

#[derive(Debug, Serialize)]
pub struct ApprovalsResponse {
    pub approvals: Vec<ApprovalRequest>,
}

// -------------------------
// Helpers
// -------------------------

/// Parse an optional JSON body: an empty body yields `T::default()`, anything
/// else must be valid JSON for `T`.
pub fn optional_body<T>(bytes: &[u8]) -> Result<T, axum::response::Response>
where
    T: serde::de::DeserializeOwned + Default,
{
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.to_string()))
}

/// Unwrap a JSON body, mapping rejections to the standard error shape.
pub fn body<T>(payload: Result<axum::Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload
        .map(|axum::Json(value)| value)
        .map_err(|rejection| errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text()))
}
