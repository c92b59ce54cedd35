//! Pipeline Integration Tests
//!
//! Drives the full list pipeline against a SQLite store:
//! - Initial load from an imported SMS packet
//! - Incremental updates after mutations published on the bus
//! - Cache freshness window with a manual clock
//! - Failure handling with the last good list kept on screen

use cosmic_messages_core::{
    render_message, CacheInvalidator, ConversationCache, ConversationList, ConversationLoader,
    DiffOp, Direction, ListStatus, ManualClock, MemoryMessageStore, Message, MessageContent,
    MessageTranslation, MessageWriter, MessagesError, MutationBus, RefreshOutcome, SmsMessage,
    SmsMessages, SqliteMessageStore, ThreadId,
};
use std::sync::Arc;
use std::time::Duration;

const PACKET: &str = r#"{
    "conversations": [
        {
            "thread_id": 1,
            "messages": [
                { "_id": 1, "thread_id": 1, "address": "+15550001", "body": "Hi",
                  "date": 1000, "type": 1, "read": 0 }
            ]
        },
        {
            "thread_id": 2,
            "messages": [
                { "_id": 2, "thread_id": 2, "address": "+15550002", "body": "Lunch?",
                  "date": 2000, "type": 2, "read": 1 }
            ]
        },
        {
            "thread_id": 3,
            "messages": [
                { "_id": 3, "thread_id": 3, "address": "+15550003", "body": "See you",
                  "date": 3000, "type": 1, "read": 1 }
            ]
        }
    ]
}"#;

struct Pipeline {
    store: SqliteMessageStore,
    writer: MessageWriter,
    clock: Arc<ManualClock>,
    invalidator: CacheInvalidator,
    list: ConversationList<String>,
}

fn row(_position: usize, conversation: &cosmic_messages_core::Conversation) -> String {
    format!(
        "{} | {} | {}",
        conversation.display_name(),
        conversation.display_snippet(),
        conversation.unread_count
    )
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn pipeline() -> Pipeline {
    init_tracing();
    let store = SqliteMessageStore::open_in_memory().unwrap();
    store
        .import_sms_packet(&SmsMessages::from_json(PACKET).unwrap())
        .unwrap();

    let clock = Arc::new(ManualClock::new());
    let cache = Arc::new(ConversationCache::with_clock(
        Duration::from_secs(30),
        clock.clone(),
    ));
    let bus = MutationBus::default();
    let invalidator = CacheInvalidator::spawn(&bus, cache.clone());
    let writer = MessageWriter::new(store.clone(), bus).with_cache(cache.clone());
    let loader = ConversationLoader::new(Arc::new(store.clone()));

    Pipeline {
        store,
        writer,
        clock,
        invalidator,
        list: ConversationList::new(loader, cache),
    }
}

async fn wait_until_invalidated(cache: &ConversationCache) {
    for _ in 0..200 {
        if cache.get().is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("cache still populated after mutation");
}

fn ids(list: &ConversationList<String>) -> Vec<ThreadId> {
    list.snapshot().iter().map(|c| c.thread_id).collect()
}

fn script_of(outcome: RefreshOutcome) -> Vec<DiffOp> {
    match outcome {
        RefreshOutcome::Applied { script, .. } => script.ops().to_vec(),
        RefreshOutcome::Superseded => panic!("refresh was superseded"),
    }
}

/// First refresh inserts every thread, newest first
#[tokio::test]
async fn test_initial_load_from_sqlite() {
    let mut p = pipeline();
    let ops = script_of(p.list.refresh(row).await.unwrap());

    assert_eq!(ops.len(), 3);
    assert!(ops.iter().all(|op| matches!(op, DiffOp::Insert { .. })));
    assert_eq!(ids(&p.list), vec![ThreadId(3), ThreadId(2), ThreadId(1)]);
    assert_eq!(p.list.presenter().row(2).map(String::as_str), Some("+15550001 | Hi | 1"));
    assert_eq!(p.list.status(), &ListStatus::Loaded);

    p.invalidator.shutdown();
}

/// A received message moves its thread to the top and re-binds only that row
#[tokio::test]
async fn test_received_message_moves_thread_to_top() {
    let mut p = pipeline();
    p.list.refresh(row).await.unwrap();

    p.writer
        .insert_message(&SmsMessage {
            id: 4,
            thread_id: 1,
            address: "+15550001".to_string(),
            body: "Hi there".to_string(),
            date: 4000,
            message_type: 1,
            read: 0,
        })
        .unwrap();

    let mut bound = Vec::new();
    let outcome = p
        .list
        .refresh(|position, c| {
            bound.push(position);
            row(position, c)
        })
        .await
        .unwrap();
    let ops = script_of(outcome);

    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0], DiffOp::Move { from: 2, to: 0 });
    assert!(matches!(ops[1], DiffOp::Update { position: 0, .. }));
    assert_eq!(bound, vec![0]);
    assert_eq!(
        p.list.presenter().row(0).map(String::as_str),
        Some("+15550001 | Hi there | 2")
    );

    p.invalidator.shutdown();
}

/// Deleting a thread removes exactly that row
#[tokio::test]
async fn test_deleted_thread_is_removed() {
    let mut p = pipeline();
    p.list.refresh(row).await.unwrap();

    assert!(p.writer.delete_thread(ThreadId(2)).unwrap());

    let ops = script_of(p.list.refresh(row).await.unwrap());
    assert_eq!(ops, vec![DiffOp::Remove { position: 1 }]);
    assert_eq!(ids(&p.list), vec![ThreadId(3), ThreadId(1)]);

    p.invalidator.shutdown();
}

/// Marking a thread read discards the fresh cache and updates its row in place
#[tokio::test]
async fn test_read_state_change_updates_row() {
    let mut p = pipeline();
    p.list.refresh(row).await.unwrap();

    p.writer.mark_thread_read(ThreadId(1)).unwrap();
    p.clock.advance(Duration::from_secs(5));

    let outcome = p.list.refresh(row).await.unwrap();
    let from_cache = matches!(outcome, RefreshOutcome::Applied { from_cache: true, .. });
    let ops = script_of(outcome);
    assert!(!from_cache);
    assert_eq!(ops.len(), 1);
    assert!(matches!(ops[0], DiffOp::Update { position: 2, .. }));

    let thread = &p.list.snapshot()[2];
    assert_eq!(thread.thread_id, ThreadId(1));
    assert_eq!(thread.unread_count, 0);

    p.invalidator.shutdown();
}

/// Contact edits reach the list without waiting for the window
#[tokio::test]
async fn test_contact_update_reloads() {
    let mut p = pipeline();
    p.list.refresh(row).await.unwrap();

    assert!(p.writer.set_contact_name(ThreadId(3), Some("Alice")).unwrap());

    let ops = script_of(p.list.refresh(row).await.unwrap());
    assert!(matches!(ops.as_slice(), [DiffOp::Update { position: 0, .. }]));
    assert_eq!(
        p.list.presenter().row(0).map(String::as_str),
        Some("Alice | See you | 0")
    );

    p.invalidator.shutdown();
}

/// A writer without a direct cache handle still invalidates through the bus
#[tokio::test]
async fn test_bus_only_writer_reaches_invalidator() {
    let mut p = pipeline();
    p.list.refresh(row).await.unwrap();

    let writer = MessageWriter::new(p.store.clone(), p.writer.bus().clone());
    writer.mark_thread_read(ThreadId(1)).unwrap();
    wait_until_invalidated(p.list.cache()).await;

    let outcome = p.list.refresh(row).await.unwrap();
    assert!(matches!(
        outcome,
        RefreshOutcome::Applied {
            from_cache: false,
            ..
        }
    ));

    p.invalidator.shutdown();
}

/// Store writes that bypass the writer stay hidden until the window expires
#[tokio::test]
async fn test_freshness_window_hides_unannounced_changes() {
    let mut p = pipeline();
    p.list.refresh(row).await.unwrap();

    p.store
        .set_contact_name(ThreadId(3), Some("Alice"))
        .unwrap();

    p.clock.advance(Duration::from_secs(29));
    let outcome = p.list.refresh(row).await.unwrap();
    assert!(matches!(
        outcome,
        RefreshOutcome::Applied {
            from_cache: true,
            ..
        }
    ));
    assert_eq!(p.list.snapshot()[0].contact_name, None);

    p.clock.advance(Duration::from_secs(2));
    let ops = script_of(p.list.refresh(row).await.unwrap());
    assert_eq!(ops.len(), 1);
    assert_eq!(
        p.list.presenter().row(0).map(String::as_str),
        Some("Alice | See you | 0")
    );

    p.invalidator.shutdown();
}

/// A failing store keeps the last good rows and reports an error status
#[tokio::test]
async fn test_failure_keeps_last_good_list() {
    let store = MemoryMessageStore::new(vec![
        cosmic_messages_core::Conversation::new(1, "+1").with_snippet("Hi"),
    ]);
    let cache = Arc::new(ConversationCache::new());
    let mut list: ConversationList<String> =
        ConversationList::new(ConversationLoader::new(Arc::new(store.clone())), cache.clone());
    list.refresh(row).await.unwrap();

    cache.invalidate();
    store.set_failing(true);
    let err = list.refresh(row).await.unwrap_err();
    assert!(matches!(err, MessagesError::DataAccess(_)));
    assert_eq!(list.presenter().len(), 1);
    match list.status() {
        ListStatus::Error { message } => {
            assert_eq!(message, "Could not load conversations. Showing last known list.")
        }
        other => panic!("unexpected status {:?}", other),
    }

    store.set_failing(false);
    list.refresh(row).await.unwrap();
    assert_eq!(list.status(), &ListStatus::Loaded);
}

/// Only the newest of several concurrent refreshes reaches the list
#[tokio::test]
async fn test_latest_spawned_refresh_wins() {
    let mut p = pipeline();
    let handles: Vec<_> = (0..3).map(|_| p.list.spawn_refresh()).collect();

    let mut applied = 0;
    let mut superseded = 0;
    for handle in handles {
        let result = handle.await.unwrap();
        match p.list.commit(result, row).unwrap() {
            RefreshOutcome::Applied { .. } => applied += 1,
            RefreshOutcome::Superseded => superseded += 1,
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(superseded, 2);
    assert_eq!(p.list.snapshot().len(), 3);

    p.invalidator.shutdown();
}

/// Translated messages render through the types exported at the crate root
#[test]
fn test_render_translated_message() {
    let message = Message {
        id: 1,
        thread_id: ThreadId(1),
        direction: Direction::Incoming,
        timestamp: 1000,
        content: MessageContent::Text {
            body: "Hello".to_string(),
        },
        translation: Some(MessageTranslation {
            text: "Hola".to_string(),
            target_language: "es".to_string(),
            shown: true,
        }),
    };

    let rendered = render_message(&message);
    assert_eq!(rendered.main_text, "Hola");
    assert_eq!(rendered.original_text.as_deref(), Some("Original: Hello"));
}
