use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Menu Hierarchy (Mapped to Database) ---

/// MenuNode
///
/// A single menu entry from the `menu` table. The id is supplied by the caller,
/// `label` is unique and non-empty, `path` is optional but unique when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct MenuNode {
    pub id: String,
    pub label: String,
    pub path: Option<String>,
}

/// ClosureEdge
///
/// One row of the `menu_closure` table: `ancestor` reaches `descendant` in `depth` steps.
/// Every node has its reflexive `(n, n, 0)` edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct ClosureEdge {
    pub ancestor: String,
    pub descendant: String,
    pub depth: i32,
}

impl ClosureEdge {
    pub fn new(ancestor: impl Into<String>, descendant: impl Into<String>, depth: i32) -> Self {
        Self {
            ancestor: ancestor.into(),
            descendant: descendant.into(),
            depth,
        }
    }

    /// The zero-depth edge every node holds to itself.
    pub fn reflexive(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id, 0)
    }

    pub fn is_reflexive(&self) -> bool {
        self.depth == 0 && self.ancestor == self.descendant
    }
}

/// MenuTree
///
/// Read-only projection of a `MenuNode` with its direct children, rebuilt on every list request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MenuTree {
    pub id: String,
    pub label: String,
    pub path: Option<String>,
    #[schema(no_recursion)]
    pub children: Vec<MenuTree>,
}

impl From<MenuNode> for MenuTree {
    fn from(node: MenuNode) -> Self {
        Self {
            id: node.id,
            label: node.label,
            path: node.path,
            children: Vec::new(),
        }
    }
}

/// CreateMenuRequest
///
/// Input payload for POST /menu/create. Without `parent_id` the node becomes a root.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateMenuRequest {
    #[schema(example = "A1")]
    pub id: String,
    #[schema(example = "Home")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "/home")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

// --- Credentials ---

/// User
///
/// Stored credential record from the `user_info` table. `password` holds the digest,
/// never the plain text, and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub email: String,
    pub mobile_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// NewUser
///
/// Validated registration data with the password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_digest: String,
    pub email: String,
    pub mobile_number: Option<String>,
}

/// LoginRequest
///
/// Input payload for POST /user/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    #[schema(example = "admin")]
    pub username: String,
    #[schema(example = "123456admin")]
    pub password: String,
}

/// LoginResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub username: String,
    pub token: String,
}

/// RegisterRequest
///
/// Input payload for POST /user/register. `mobile_number` is optional but must match
/// the mainland mobile pattern when present.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[schema(example = "admin")]
    pub username: String,
    #[schema(example = "123456")]
    pub password: String,
    #[schema(example = "15512341234@qq.com")]
    pub email: String,
    #[serde(default)]
    #[schema(example = "15512341234")]
    pub mobile_number: Option<String>,
}

/// RegisterResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterResponse {
    pub username: String,
}

/// SessionProfile
///
/// Payload of GET /user/me: who the presented token belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionProfile {
    pub id: Uuid,
    pub username: String,
}
