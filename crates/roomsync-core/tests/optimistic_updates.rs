use chrono::{DateTime, TimeZone, Utc};
use roomsync_core::{
    Comment, CommentBody, MetadataPatch, MetadataValue, OpId, OptimisticQueue, OptimisticUpdate, Reaction,
    Thread, ThreadTable,
};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

fn table() -> ThreadTable {
    let mut thread = Thread::new("th_1", "room_1", at(1));
    thread.metadata.insert("color".into(), "red".into());
    thread.comments.push(Comment {
        id: "cm_1".into(),
        thread_id: "th_1".into(),
        room_id: "room_1".into(),
        user_id: "user_1".into(),
        created_at: at(1),
        edited_at: None,
        deleted_at: None,
        body: Some(CommentBody::plain("first")),
        reactions: vec![Reaction {
            emoji: "👍".into(),
            created_at: at(1),
            users: vec!["user_2".into()],
        }],
    });

    let mut table = ThreadTable::new();
    table.upsert(thread);
    table
}

fn add_reaction(emoji: &str, user: &str) -> OptimisticUpdate {
    OptimisticUpdate::AddReaction {
        id: OpId::generate(),
        thread_id: "th_1".into(),
        comment_id: "cm_1".into(),
        emoji: emoji.into(),
        created_at: at(2),
        user_id: user.into(),
    }
}

fn remove_reaction(emoji: &str, user: &str) -> OptimisticUpdate {
    OptimisticUpdate::RemoveReaction {
        id: OpId::generate(),
        thread_id: "th_1".into(),
        comment_id: "cm_1".into(),
        emoji: emoji.into(),
        user_id: user.into(),
    }
}

fn reactions(queue: &OptimisticQueue, table: &ThreadTable) -> Vec<Reaction> {
    queue.project(table)["th_1"].comments[0].reactions.clone()
}

#[test]
fn reaction_toggle_on_new_emoji_restores_reactions() {
    let table = table();
    let before = reactions(&OptimisticQueue::new(), &table);

    let mut queue = OptimisticQueue::new();
    queue.push(add_reaction("🎉", "user_1"));
    assert_eq!(reactions(&queue, &table).len(), 2);

    queue.push(remove_reaction("🎉", "user_1"));
    assert_eq!(reactions(&queue, &table), before);
}

#[test]
fn reaction_toggle_on_existing_emoji_restores_users() {
    let table = table();
    let before = reactions(&OptimisticQueue::new(), &table);

    let mut queue = OptimisticQueue::new();
    queue.push(add_reaction("👍", "user_1"));
    assert_eq!(reactions(&queue, &table)[0].users, vec!["user_2", "user_1"]);

    queue.push(remove_reaction("👍", "user_1"));
    assert_eq!(reactions(&queue, &table), before);
}

#[test]
fn removing_last_user_drops_the_reaction() {
    let table = table();
    let mut queue = OptimisticQueue::new();
    queue.push(remove_reaction("👍", "user_2"));

    assert!(reactions(&queue, &table).is_empty());
}

#[test]
fn removing_a_non_member_changes_nothing() {
    let table = table();
    let before = reactions(&OptimisticQueue::new(), &table);
    let mut queue = OptimisticQueue::new();
    queue.push(remove_reaction("👍", "user_9"));
    queue.push(remove_reaction("🔥", "user_2"));

    assert_eq!(reactions(&queue, &table), before);
}

#[test]
fn remove_reaction_does_not_fall_through_to_other_updates() {
    let table = table();
    let mut queue = OptimisticQueue::new();
    queue.push(remove_reaction("👍", "user_2"));

    let projected = queue.project(&table);
    let thread = &projected["th_1"];
    assert!(!thread.resolved);
    assert!(thread.deleted_at.is_none());
    assert!(thread.comments[0].body.is_some());
    assert_eq!(thread.metadata.len(), 1);
}

#[test]
fn updates_replay_in_insertion_order() {
    let table = table();
    let mut queue = OptimisticQueue::new();

    let mut first = MetadataPatch::new();
    first.insert("color".into(), Some("blue".into()));
    let mut second = MetadataPatch::new();
    second.insert("color".into(), Some("green".into()));
    second.insert("pinned".into(), Some(true.into()));

    queue.push(OptimisticUpdate::EditThreadMetadata {
        id: OpId::generate(),
        thread_id: "th_1".into(),
        metadata: first,
    });
    let second_id = OpId::generate();
    queue.push(OptimisticUpdate::EditThreadMetadata {
        id: second_id.clone(),
        thread_id: "th_1".into(),
        metadata: second,
    });

    let projected = queue.project(&table);
    assert_eq!(
        projected["th_1"].metadata.get("color"),
        Some(&MetadataValue::from("green"))
    );
    assert_eq!(projected["th_1"].metadata.get("pinned"), Some(&MetadataValue::Bool(true)));

    queue.remove(&second_id);
    let projected = queue.project(&table);
    assert_eq!(projected["th_1"].metadata.get("color"), Some(&MetadataValue::from("blue")));
    assert!(projected["th_1"].metadata.get("pinned").is_none());
}

#[test]
fn comment_created_on_optimistic_thread() {
    let table = ThreadTable::new();
    let mut queue = OptimisticQueue::new();
    let thread_id = roomsync_core::id::thread_id();

    queue.push(OptimisticUpdate::CreateThread {
        id: OpId::generate(),
        thread: Thread::new(thread_id.clone(), "room_1", at(5)),
    });
    queue.push(OptimisticUpdate::CreateComment {
        id: OpId::generate(),
        comment: Comment {
            id: roomsync_core::id::comment_id(),
            thread_id: thread_id.clone(),
            room_id: "room_1".into(),
            user_id: "user_1".into(),
            created_at: at(5),
            edited_at: None,
            deleted_at: None,
            body: Some(CommentBody::plain("new thread")),
            reactions: vec![],
        },
    });

    let projected = queue.project(&table);
    assert_eq!(projected[&thread_id].comments.len(), 1);
    assert!(table.is_empty());
}

#[test]
fn optimistic_delete_hides_thread() {
    let table = table();
    let mut queue = OptimisticQueue::new();
    queue.push(OptimisticUpdate::DeleteThread {
        id: OpId::generate(),
        thread_id: "th_1".into(),
        deleted_at: at(3),
    });

    let projected = queue.project(&table);
    assert!(projected["th_1"].is_deleted());
    assert!(projected["th_1"].comments.is_empty());
    assert!(table.get("th_1").is_some());
}
