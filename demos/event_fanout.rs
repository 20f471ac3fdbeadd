use chrono::Utc;
use livepoll_rs::registry::{Audience, ConnectionRegistry};
use livepoll_rs::types::{
    ClientIdentity, DepartmentId, PollOptionResult, PollResults, SubjectId, UserId,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let registry = ConnectionRegistry::new();

    // Two students in computer science, one in mathematics
    let (_alice, mut alice_rx) = registry
        .register(ClientIdentity::new(
            UserId::new(1),
            DepartmentId::new(3),
            vec![SubjectId::new(11)],
        ))
        .await;
    let (_bob, mut bob_rx) = registry
        .register(ClientIdentity::new(
            UserId::new(2),
            DepartmentId::new(3),
            vec![SubjectId::new(12)],
        ))
        .await;
    let (_carol, mut carol_rx) = registry
        .register(ClientIdentity::new(
            UserId::new(3),
            DepartmentId::new(4),
            vec![SubjectId::new(12)],
        ))
        .await;

    println!("{} connections registered", registry.total_connections().await);

    // A vote lands in a poll for computer science
    let results = PollResults {
        poll_id: 5,
        options: vec![
            PollOptionResult {
                option_id: 1,
                text: "Rust".to_string(),
                votes: 12,
            },
            PollOptionResult {
                option_id: 2,
                text: "Go".to_string(),
                votes: 4,
            },
        ],
        total_votes: 16,
        closed_at: None,
    };

    let delivered = registry
        .publish_poll_vote(&Audience::Department(DepartmentId::new(3)), &results)
        .await
        .expect("serializable results");
    println!("poll:vote delivered to {delivered} connection(s)");

    // The poll closes for everyone following subject 12
    let final_results = PollResults {
        closed_at: Some(Utc::now()),
        ..results
    };
    let delivered = registry
        .publish_poll_closed(&Audience::Subject(SubjectId::new(12)), &final_results)
        .await
        .expect("serializable results");
    println!("poll:closed delivered to {delivered} connection(s)");

    for (name, rx) in [
        ("alice", &mut alice_rx),
        ("bob", &mut bob_rx),
        ("carol", &mut carol_rx),
    ] {
        while let Ok(envelope) = rx.try_recv() {
            println!("{name} <- {}: {}", envelope.kind, envelope.data);
        }
    }
}
