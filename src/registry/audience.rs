use crate::types::{ClientIdentity, DepartmentId, SubjectId, UserId};

/// Target audience for a fan-out.
///
/// Live connections are keyed by user, department, and subject-interest
/// set; an audience selects the matching subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every registered connection
    Everyone,
    /// All connections of one user
    User(UserId),
    /// All connections whose user belongs to a department
    Department(DepartmentId),
    /// All connections following a subject
    Subject(SubjectId),
}

impl Audience {
    /// Whether a connection with this identity receives the event
    pub fn matches(&self, identity: &ClientIdentity) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::User(user_id) => identity.user_id == *user_id,
            Audience::Department(department_id) => identity.department_id == *department_id,
            Audience::Subject(subject_id) => identity.follows(*subject_id),
        }
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
    fn test_everyone_matches() {
        assert!(Audience::Everyone.matches(&identity()));
    }

    #[test]
    fn test_user_audience() {
        assert!(Audience::User(UserId::new(7)).matches(&identity()));
        assert!(!Audience::User(UserId::new(8)).matches(&identity()));
    }

    #[test]
    fn test_department_audience() {
        assert!(Audience::Department(DepartmentId::new(3)).matches(&identity()));
        assert!(!Audience::Department(DepartmentId::new(4)).matches(&identity()));
    }

    #[test]
    fn test_subject_audience() {
        assert!(Audience::Subject(SubjectId::new(12)).matches(&identity()));
        assert!(!Audience::Subject(SubjectId::new(99)).matches(&identity()));
    }
}
