use serde::Serialize;

/// Authenticated tenant identity, supplied by the identity collaborator.
/// Immutable for the duration of one dispatch call and never persisted
/// by the dispatch core.
#[derive(Debug, Clone, Serialize)]
pub struct TenantIdentity {
    pub user_id: String,
    pub org_id: String,
    pub email: String,
    pub display_name: String,
}

/// Identity plus the capability credential used for the optional
/// enrichment call. The access token never reaches the agent prompt.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub identity: TenantIdentity,
    pub access_token: Option<String>,
}
