use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{ClientIdentity, DepartmentId, SubjectId, UserId};

/// Message type of the authentication handshake
pub const AUTH: &str = "auth";

/// Generic wire envelope: every message in both directions is
/// `{"type": string, "data": any}`.
///
/// Unknown `type` values are ignored by the dispatcher rather than
/// treated as errors, so the protocol can grow without breaking older
/// clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

/// Authentication handshake sent immediately after connect and after
/// every reconnect.
///
/// Unlike regular events this message is flat on the wire:
/// `{"type": "auth", "userId": …, "departmentId": …, "subjects": […]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthHandshake {
    #[serde(rename = "type")]
    kind: String,
    pub user_id: UserId,
    pub department_id: DepartmentId,
    pub subjects: Vec<SubjectId>,
}

impl AuthHandshake {
    pub fn new(identity: &ClientIdentity) -> Self {
        Self {
            kind: AUTH.to_string(),
            user_id: identity.user_id,
            department_id: identity.department_id,
            subjects: identity.subjects.clone(),
        }
    }

    /// Parse an inbound handshake, rejecting any other message type.
    ///
    /// This is the server-side entry point: the first text frame on a new
    /// socket must be an `auth` message before the connection is
    /// registered.
    pub fn parse(text: &str) -> Result<Self> {
        let handshake: AuthHandshake = serde_json::from_str(text)?;
        if handshake.kind != AUTH {
            return Err(Error::InvalidMessage(format!(
                "expected {} handshake, got {}",
                AUTH, handshake.kind
            )));
        }
        Ok(handshake)
    }

    pub fn into_identity(self) -> ClientIdentity {
        ClientIdentity::new(self.user_id, self.department_id, self.subjects)
    }
}
