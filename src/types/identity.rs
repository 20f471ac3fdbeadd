use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a platform user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a department
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentId(i64);

impl DepartmentId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for DepartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(i64);

impl SubjectId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity a live connection is keyed by: the user, their department,
/// and the set of subjects they follow.
///
/// Sent to the server in the authentication handshake and used on the
/// server side to decide which connections an event fans out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdentity {
    pub user_id: UserId,
    pub department_id: DepartmentId,
    pub subjects: Vec<SubjectId>,
}

impl ClientIdentity {
    pub fn new(user_id: UserId, department_id: DepartmentId, subjects: Vec<SubjectId>) -> Self {
        Self {
            user_id,
            department_id,
            subjects,
        }
    }

    /// Whether this identity follows the given subject
    pub fn follows(&self, subject: SubjectId) -> bool {
        self.subjects.contains(&subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ClientIdentity {
        ClientIdentity::new(
            UserId::new(7),
            DepartmentId::new(3),
            vec![SubjectId::new(11), SubjectId::new(12)],
        )
    }

    #[test]
    fn test_follows() {
        let identity = identity();
        assert!(identity.follows(SubjectId::new(11)));
        assert!(!identity.follows(SubjectId::new(99)));
    }

    #[test]
    fn test_identity_wire_format() {
        let json = serde_json::to_value(identity()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "userId": 7,
                "departmentId": 3,
                "subjects": [11, 12],
            })
        );
    }
}
