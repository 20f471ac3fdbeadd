use livepoll_rs::types::{
    ClientIdentity, DepartmentId, ServerEvent, SubjectId, UserId, POLL_CLOSED, POLL_VOTE,
};
use livepoll_rs::websocket::{LiveConnection, PollWsClient, ReconnectConfig};
use livepoll_rs::Envelope;
use serde_json::json;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let client = PollWsClient::new("ws://127.0.0.1:4000/ws/live");
    let connection = LiveConnection::new(client, ReconnectConfig::default());

    // Keep the subscriptions alive for the lifetime of the dashboard
    let _votes = connection.subscribe(POLL_VOTE, |data| {
        let envelope = Envelope::new(POLL_VOTE, data.clone());
        match ServerEvent::from_envelope(&envelope) {
            Some(Ok(event)) => {
                let results = event.results();
                println!("[poll {}] {} votes", results.poll_id, results.total_votes);
                for option in &results.options {
                    println!("  {}: {}", option.text, option.votes);
                }
            }
            Some(Err(e)) => eprintln!("bad poll:vote payload: {e}"),
            None => unreachable!("subscribed kind"),
        }
    });
    let _closed = connection.subscribe(POLL_CLOSED, |data| {
        println!("poll closed: {data}");
    });

    let identity = ClientIdentity::new(
        UserId::new(42),
        DepartmentId::new(3),
        vec![SubjectId::new(11), SubjectId::new(12)],
    );

    println!("Connecting to the live-poll feed...");
    connection.initialize(identity).await;

    // Cast a vote once the connection is up
    if connection
        .send("vote:cast", json!({"pollId": 5, "optionId": 2}))
        .await
    {
        println!("vote sent");
    } else {
        println!("not connected yet, vote skipped");
    }

    println!("Listening for poll updates. Press Ctrl-C to quit.");
    tokio::signal::ctrl_c().await.ok();

    connection.disconnect().await;
    println!("Disconnected.");
}
