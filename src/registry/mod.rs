//! Server-side connection registry and event fan-out.
//!
//! The registry tracks which live connections belong to which
//! user/department/subject identity and distributes one event to every
//! connection matching a target [`Audience`]. It is in-memory and
//! in-process; the socket accept loop and handshake parsing belong to
//! the embedding server, which hands each authenticated connection's
//! identity to [`ConnectionRegistry::register`].

mod audience;

use std::fmt;
use std::sync::Arc;

use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{ClientIdentity, Envelope, PollResults, UserId, POLL_CLOSED, POLL_VOTE};

pub use audience::Audience;

/// Type alias for a connection's outbound queue
pub type EnvelopeSender = UnboundedSender<Envelope>;

/// Unique identifier for one registered live connection
///
/// Each connection gets its own ID when it registers, so a user with
/// several tabs open can be cleaned up one connection at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct RegisteredConnection {
    id: ConnectionId,
    identity: ClientIdentity,
    sender: EnvelopeSender,
}

/// Registry of live connections with audience-based fan-out.
///
/// Thread-safe via `Arc<RwLock<…>>`; clone handles freely. Queues whose
/// receiver has gone away are pruned during publishing.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Vec<RegisteredConnection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection for an authenticated identity.
    ///
    /// Returns the connection's ID (for [`unregister`](Self::unregister))
    /// and the receiving end of its outbound queue. Multiple concurrent
    /// connections per user are allowed.
    pub async fn register(
        &self,
        identity: ClientIdentity,
    ) -> (ConnectionId, UnboundedReceiver<Envelope>) {
        let (sender, receiver) = unbounded_channel();
        let id = ConnectionId::new();

        let mut connections = self.inner.write().await;
        connections.push(RegisteredConnection {
            id,
            identity,
            sender,
        });

        tracing::debug!(
            connection = %id,
            total = connections.len(),
            "registered live connection"
        );

        (id, receiver)
    }

    /// Remove one connection; must be called when its socket closes
    pub async fn unregister(&self, id: ConnectionId) {
        let mut connections = self.inner.write().await;
        let before = connections.len();
        connections.retain(|c| c.id != id);

        if connections.len() != before {
            tracing::debug!(
                connection = %id,
                remaining = connections.len(),
                "unregistered live connection"
            );
        }
    }

    /// Fan one envelope out to every connection the audience matches.
    ///
    /// Connections whose queue is gone are pruned as a side effect.
    /// Returns the number of connections the envelope was delivered to.
    pub async fn publish(&self, audience: &Audience, envelope: Envelope) -> usize {
        let mut connections = self.inner.write().await;
        let before = connections.len();
        let mut delivered = 0;

        connections.retain(|connection| {
            if !audience.matches(&connection.identity) {
                return true;
            }
            match connection.sender.send(envelope.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    tracing::debug!(connection = %connection.id, "pruning dead connection");
                    false
                }
            }
        });

        if connections.len() != before {
            tracing::debug!(
                pruned = before - connections.len(),
                remaining = connections.len(),
                "pruned dead connections during publish"
            );
        }

        delivered
    }

    /// Broadcast the updated result set after a vote
    pub async fn publish_poll_vote(
        &self,
        audience: &Audience,
        results: &PollResults,
    ) -> Result<usize> {
        let envelope = Envelope::new(POLL_VOTE, serde_json::to_value(results)?);
        Ok(self.publish(audience, envelope).await)
    }

    /// Broadcast the final result set when a poll closes
    pub async fn publish_poll_closed(
        &self,
        audience: &Audience,
        results: &PollResults,
    ) -> Result<usize> {
        let envelope = Envelope::new(POLL_CLOSED, serde_json::to_value(results)?);
        Ok(self.publish(audience, envelope).await)
    }

    /// Total number of registered connections
    pub async fn total_connections(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Number of connections registered for a user
    pub async fn connections_for_user(&self, user_id: UserId) -> usize {
        self.inner
            .read()
            .await
            .iter()
            .filter(|c| c.identity.user_id == user_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DepartmentId, PollOptionResult, SubjectId};
    use tokio_test::assert_ok;

    fn identity(user: i64, department: i64, subjects: &[i64]) -> ClientIdentity {
        ClientIdentity::new(
            UserId::new(user),
            DepartmentId::new(department),
            subjects.iter().copied().map(SubjectId::new).collect(),
        )
    }

    fn results(poll_id: i64) -> PollResults {
        PollResults {
            poll_id,
            options: vec![PollOptionResult {
                option_id: 1,
                text: "Rust".to_string(),
                votes: 12,
            }],
            total_votes: 12,
            closed_at: None,
        }
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let registry = ConnectionRegistry::new();

        let (id, _rx) = registry.register(identity(1, 1, &[])).await;
        assert_eq!(registry.total_connections().await, 1);

        registry.unregister(id).await;
        assert_eq!(registry.total_connections().await, 0);
    }

    #[tokio::test]
    async fn test_multiple_connections_per_user() {
        let registry = ConnectionRegistry::new();

        let (_id_a, _rx_a) = registry.register(identity(1, 1, &[])).await;
        let (_id_b, _rx_b) = registry.register(identity(1, 1, &[])).await;
        let (_id_c, _rx_c) = registry.register(identity(2, 1, &[])).await;

        assert_eq!(registry.total_connections().await, 3);
        assert_eq!(registry.connections_for_user(UserId::new(1)).await, 2);
        assert_eq!(registry.connections_for_user(UserId::new(2)).await, 1);
    }

    #[tokio::test]
    async fn test_publish_reaches_matching_audience_only() {
        let registry = ConnectionRegistry::new();

        let (_a, mut rx_cs) = registry.register(identity(1, 3, &[11])).await;
        let (_b, mut rx_math) = registry.register(identity(2, 4, &[12])).await;

        let delivered = registry
            .publish(
                &Audience::Department(DepartmentId::new(3)),
                Envelope::new(POLL_VOTE, serde_json::json!({"pollId": 5})),
            )
            .await;

        assert_eq!(delivered, 1);
        let received = rx_cs.try_recv().unwrap();
        assert_eq!(received.kind, POLL_VOTE);
        assert!(rx_math.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_by_subject() {
        let registry = ConnectionRegistry::new();

        let (_a, mut rx_follows) = registry.register(identity(1, 3, &[11, 12])).await;
        let (_b, mut rx_other) = registry.register(identity(2, 3, &[13])).await;

        let delivered = registry
            .publish(
                &Audience::Subject(SubjectId::new(12)),
                Envelope::new(POLL_VOTE, serde_json::json!({"pollId": 5})),
            )
            .await;

        assert_eq!(delivered, 1);
        assert!(rx_follows.try_recv().is_ok());
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_everyone() {
        let registry = ConnectionRegistry::new();

        let (_a, mut rx_a) = registry.register(identity(1, 3, &[])).await;
        let (_b, mut rx_b) = registry.register(identity(2, 4, &[])).await;

        let delivered = registry
            .publish(
                &Audience::Everyone,
                Envelope::new(POLL_CLOSED, serde_json::json!({"pollId": 5})),
            )
            .await;

        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_dead_connections_are_pruned_on_publish() {
        let registry = ConnectionRegistry::new();

        let (_a, rx_dead) = registry.register(identity(1, 3, &[])).await;
        let (_b, mut rx_live) = registry.register(identity(2, 3, &[])).await;
        drop(rx_dead);

        let delivered = registry
            .publish(
                &Audience::Everyone,
                Envelope::new(POLL_VOTE, serde_json::json!({"pollId": 5})),
            )
            .await;

        assert_eq!(delivered, 1);
        assert!(rx_live.try_recv().is_ok());
        assert_eq!(registry.total_connections().await, 1);
    }

    #[tokio::test]
    async fn test_typed_poll_publishers() {
        let registry = ConnectionRegistry::new();

        let (_a, mut rx) = registry.register(identity(1, 3, &[11])).await;

        let delivered = assert_ok!(
            registry
                .publish_poll_vote(&Audience::Subject(SubjectId::new(11)), &results(5))
                .await
        );
        assert_eq!(delivered, 1);

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.kind, POLL_VOTE);
        assert_eq!(envelope.data["pollId"], 5);
        assert_eq!(envelope.data["options"][0]["text"], "Rust");

        let delivered = assert_ok!(
            registry
                .publish_poll_closed(&Audience::Everyone, &results(5))
                .await
        );
        assert_eq!(delivered, 1);
        assert_eq!(rx.try_recv().unwrap().kind, POLL_CLOSED);
    }
}
