//! COSMIC Messages Core
//!
//! This library keeps the conversation list of an SMS client up to date:
//! it loads snapshots from a message store, caches them for a short
//! freshness window, computes minimal edit scripts between snapshots and
//! applies them to whatever rows the view is showing.

pub mod cache;
pub mod conversation;
pub mod diff;
pub mod events;
pub mod list;
pub mod loader;
pub mod presenter;
pub mod render;
pub mod request;
pub mod store;
pub mod translation;

mod error;

pub use cache::{
    CacheStats, Clock, ConversationCache, ManualClock, SystemClock, DEFAULT_FRESHNESS_WINDOW,
};
pub use conversation::{sort_by_recency, Conversation, ThreadId, EMPTY_SNIPPET};
pub use diff::{ConversationDiffer, DiffOp, DiffScript, DiffSummary};
pub use error::{MessagesError, Result};
pub use events::{CacheInvalidator, MutationBus, MutationEvent, DEFAULT_BUS_CAPACITY};
pub use list::{ConversationList, ListStatus, LoadResult, RefreshOutcome};
pub use loader::{ConversationLoader, ConversationPage};
pub use presenter::{ListPresenter, PresentOutcome};
pub use render::{
    render_message, Attachment, Direction, Message, MessageContent, MessageTranslation,
    RenderedMessage,
};
pub use request::{RequestSequencer, RequestTicket};
pub use store::{
    MemoryMessageStore, MessageStore, MessageWriter, QueryCriteria, SmsConversation, SmsMessage,
    SmsMessages, SqliteMessageStore, DEFAULT_PAGE_SIZE, PACKET_TYPE_SMS_MESSAGES,
};
pub use translation::{
    LanguageDetector, Translation, TranslationEngine, TranslationMode, TranslationPreferences,
    TranslationRequest, TranslationService, TranslationTrigger, Translator,
};
