//! Basic roomsync example
//!
//! Confirmed threads, an optimistic reaction that is later acknowledged,
//! and an atomic cache mutation that rolls back.
//!
//! Run with: cargo run --example basic

use chrono::{TimeZone, Utc};
use roomsync_core::{
    id, ClientStore, Comment, CommentBody, OpId, OptimisticUpdate, StoreEvent, Thread, ThreadDeltaUpdates,
    ThreadsOptions,
};
use roomsync_storage::{BoxError, LayeredCache};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("Roomsync Basic Example\n");

    println!("=== Client Store ===\n");
    store_example().await?;

    println!("\n=== Layered Cache ===\n");
    cache_example()?;

    Ok(())
}

async fn store_example() -> Result<(), Box<dyn std::error::Error>> {
    let store = ClientStore::new();
    let mut events = store.subscribe();

    // A thread arrives from the server
    let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).single().ok_or("invalid date")?;
    let thread_id = id::thread_id();
    let mut thread = Thread::new(&thread_id, "room:lobby", created_at);
    let comment_id = id::comment_id();
    thread.comments.push(Comment {
        id: comment_id.clone(),
        thread_id: thread_id.clone(),
        room_id: "room:lobby".into(),
        user_id: "alice".into(),
        created_at,
        edited_at: None,
        deleted_at: None,
        body: Some(CommentBody::plain("Welcome!")),
        reactions: Vec::new(),
    });

    let changed = store.apply_delta(&ThreadDeltaUpdates {
        new_threads: vec![thread],
        deleted_threads: Vec::new(),
    });
    println!("Changed threads: {}", changed);
    if let Ok(StoreEvent::ThreadsChanged { version }) = events.recv().await {
        println!("Store version: {}", version);
    }

    // Bob reacts before the server confirms
    let op_id = OpId::generate();
    store.push_optimistic_update(OptimisticUpdate::AddReaction {
        id: op_id.clone(),
        thread_id: thread_id.clone(),
        comment_id: comment_id.clone(),
        emoji: "👍".into(),
        created_at: Utc::now(),
        user_id: "bob".into(),
    });

    let shown = store.require_thread(&thread_id)?;
    println!("Reactions shown: {:?}", shown.comments[0].reactions);

    // The server acknowledged it
    store.remove_optimistic_update(&op_id);
    let confirmed = store.require_thread(&thread_id)?;
    println!("Reactions after ack: {:?}", confirmed.comments[0].reactions);

    println!("\nThreads in room:lobby:");
    for thread in store.threads(&ThreadsOptions::in_room("room:lobby")) {
        println!("  - {} ({} comments)", thread.id, thread.comments.len());
    }

    Ok(())
}

fn cache_example() -> Result<(), Box<dyn std::error::Error>> {
    let mut cache = LayeredCache::new();
    cache.set("visits", 1);

    cache.run_mutation("visit", |c| {
        let visits = c.get_number("visits").unwrap_or(0.0);
        c.set("visits", visits + 1.0);
        Ok::<_, BoxError>(())
    })?;
    println!("Visits: {:?}", cache.get("visits"));

    let result = cache.run_mutation("visitAndFail", |c| {
        c.set("visits", 100);
        Err::<(), BoxError>("rejected".into())
    });
    println!("Failed mutation: {}", result.map(|_| "ok".to_string()).unwrap_or_else(|e| e.to_string()));
    println!("Visits after rollback: {:?}", cache.get("visits"));
    println!("Snapshot: {} bytes", cache.encode_snapshot()?.len());

    Ok(())
}
