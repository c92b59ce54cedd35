//! Message Translation
//!
//! Translates message text with an offline engine first and an online engine
//! as fallback, depending on the user's [`TranslationPreferences`].
//!
//! ## Flow
//!
//! 1. Empty text is rejected
//! 2. Cached results are returned without calling any engine
//! 3. The source language is detected when the request does not name one
//! 4. Automatic requests for text already in the target language are skipped;
//!    user-requested ones are translated anyway
//! 5. The offline engine is tried when enabled and it supports the pair. In
//!    [`TranslationMode::Auto`] a failed offline attempt falls back online once
//! 6. Otherwise the online engine is used, within the daily quota. Only
//!    successful online calls count against it
//!
//! Every request carries a [`RequestTicket`]. A ticket superseded while the
//! request is waiting on an engine makes the request fail with
//! [`MessagesError::Cancelled`] and its result is not cached.

pub mod cache;

pub use cache::{TranslationCache, DEFAULT_TRANSLATION_CACHE_CAPACITY};

use crate::cache::{Clock, SystemClock};
use crate::request::{RequestSequencer, RequestTicket};
use crate::{MessagesError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default number of online translations per day
pub const DEFAULT_DAILY_ONLINE_LIMIT: u32 = 100;

const QUOTA_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Which engines may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationMode {
    /// Online engine only
    Online,
    /// Offline engine only
    Offline,
    /// Offline first, online fallback
    #[default]
    Auto,
}

/// User translation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationPreferences {
    pub mode: TranslationMode,
    pub offline_enabled: bool,
    /// Online translations allowed per day (`None` for unlimited)
    pub daily_online_limit: Option<u32>,
}

impl Default for TranslationPreferences {
    fn default() -> Self {
        Self {
            mode: TranslationMode::Auto,
            offline_enabled: true,
            daily_online_limit: Some(DEFAULT_DAILY_ONLINE_LIMIT),
        }
    }
}

/// What started a translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationTrigger {
    /// Incoming-message auto translation
    Automatic,
    /// The user pressed translate
    UserRequested,
}

/// One translation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    /// Detected when `None`
    pub source_language: Option<String>,
    pub target_language: String,
    pub trigger: TranslationTrigger,
}

impl TranslationRequest {
    /// Automatic request with language detection
    pub fn new(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_language: None,
            target_language: target_language.into(),
            trigger: TranslationTrigger::Automatic,
        }
    }

    pub fn with_source(mut self, source_language: impl Into<String>) -> Self {
        self.source_language = Some(source_language.into());
        self
    }

    pub fn user_requested(mut self) -> Self {
        self.trigger = TranslationTrigger::UserRequested;
        self
    }
}

/// Engine that produced a translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationEngine {
    Offline,
    Online,
    Cache,
}

/// Finished translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    pub source_language: String,
    pub target_language: String,
    pub engine: TranslationEngine,
}

/// Translation engine
#[async_trait]
pub trait Translator: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Check whether a language pair can be translated
    fn supports(&self, source_language: &str, target_language: &str) -> bool;

    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String>;
}

/// Language identification
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Detect the language of `text`, `None` when undetermined
    async fn detect(&self, text: &str) -> Result<Option<String>>;
}

/// Compare the base part of two language tags (`en-US` matches `en`)
pub fn same_base_language(a: &str, b: &str) -> bool {
    fn base(tag: &str) -> &str {
        tag.split(['-', '_']).next().unwrap_or(tag)
    }
    base(a).eq_ignore_ascii_case(base(b))
}

#[derive(Debug)]
struct DailyQuota {
    period_start: Instant,
    used: u32,
}

/// Offline-first translation service
pub struct TranslationService {
    offline: Option<Arc<dyn Translator>>,
    online: Option<Arc<dyn Translator>>,
    detector: Arc<dyn LanguageDetector>,
    preferences: TranslationPreferences,
    cache: TranslationCache,
    sequencer: RequestSequencer,
    clock: Arc<dyn Clock>,
    quota: Mutex<DailyQuota>,
}

impl TranslationService {
    pub fn new(detector: Arc<dyn LanguageDetector>, preferences: TranslationPreferences) -> Self {
        Self::with_clock(detector, preferences, Arc::new(SystemClock))
    }

    pub fn with_clock(
        detector: Arc<dyn LanguageDetector>,
        preferences: TranslationPreferences,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let period_start = clock.now();
        Self {
            offline: None,
            online: None,
            detector,
            preferences,
            cache: TranslationCache::default(),
            sequencer: RequestSequencer::new(),
            clock,
            quota: Mutex::new(DailyQuota {
                period_start,
                used: 0,
            }),
        }
    }

    pub fn with_offline(mut self, translator: Arc<dyn Translator>) -> Self {
        self.offline = Some(translator);
        self
    }

    pub fn with_online(mut self, translator: Arc<dyn Translator>) -> Self {
        self.online = Some(translator);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = TranslationCache::new(capacity);
        self
    }

    pub fn preferences(&self) -> &TranslationPreferences {
        &self.preferences
    }

    pub fn set_preferences(&mut self, preferences: TranslationPreferences) {
        self.preferences = preferences;
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Ticket for a new request; supersedes every outstanding one
    pub fn next_ticket(&self) -> RequestTicket {
        self.sequencer.next()
    }

    /// Cancel every outstanding request
    pub fn cancel_all(&self) {
        self.sequencer.cancel_all();
    }

    /// Translate a request
    pub async fn translate(
        &self,
        request: &TranslationRequest,
        ticket: &RequestTicket,
    ) -> Result<Translation> {
        ticket.check()?;

        let text = request.text.trim();
        if text.is_empty() {
            return Err(MessagesError::EmptyText);
        }
        let target = request.target_language.as_str();

        let key = TranslationCache::key(text, request.source_language.as_deref(), target);
        if let Some(cached) = self.cache.get(&key) {
            debug!("Translation cache hit");
            return Ok(Translation {
                engine: TranslationEngine::Cache,
                ..cached
            });
        }

        let source = match &request.source_language {
            Some(source) => source.clone(),
            None => {
                let detected = self.detector.detect(text).await;
                ticket.check()?;
                match detected {
                    Ok(Some(language)) => language,
                    Ok(None) => {
                        return Err(MessagesError::Translation(
                            "Could not detect language".to_string(),
                        ))
                    }
                    Err(e) => {
                        warn!("Language detection failed: {}", e);
                        return Err(MessagesError::Translation(
                            "Could not detect language".to_string(),
                        ));
                    }
                }
            }
        };

        if same_base_language(&source, target)
            && request.trigger == TranslationTrigger::Automatic
        {
            debug!("Skipping translation, text already in {}", target);
            return Err(MessagesError::AlreadyInTargetLanguage(target.to_string()));
        }

        let (translated, engine) = self.run_engines(text, &source, target, ticket).await?;
        let translation = Translation {
            text: translated,
            source_language: source,
            target_language: target.to_string(),
            engine,
        };
        self.cache.put(key, translation.clone());
        Ok(translation)
    }

    async fn run_engines(
        &self,
        text: &str,
        source: &str,
        target: &str,
        ticket: &RequestTicket,
    ) -> Result<(String, TranslationEngine)> {
        let mode = self.preferences.mode;

        if let Some(offline) = self.offline_for(source, target) {
            debug!("Attempting offline translation {} -> {}", source, target);
            let result = offline.translate(text, source, target).await;
            ticket.check()?;
            match result {
                Ok(translated) => {
                    info!("Offline translation with {} succeeded", offline.name());
                    return Ok((translated, TranslationEngine::Offline));
                }
                Err(e) if mode == TranslationMode::Auto && self.online.is_some() => {
                    warn!("Offline translation failed, falling back online: {}", e);
                }
                Err(e) => {
                    return Err(MessagesError::Translation(format!(
                        "Offline translation failed: {}",
                        e
                    )))
                }
            }
        } else if mode == TranslationMode::Offline {
            return Err(if self.offline.is_some() && self.preferences.offline_enabled {
                MessagesError::UnsupportedLanguagePair {
                    source_language: source.to_string(),
                    target_language: target.to_string(),
                }
            } else {
                MessagesError::NoTranslationService
            });
        }

        let online = self
            .online
            .as_ref()
            .ok_or(MessagesError::NoTranslationService)?;
        self.check_online_quota()?;

        debug!("Attempting online translation {} -> {}", source, target);
        let result = online.translate(text, source, target).await;
        let translated = result?;
        self.charge_online_quota()?;
        ticket.check()?;
        info!("Online translation with {} succeeded", online.name());
        Ok((translated, TranslationEngine::Online))
    }

    fn offline_for(&self, source: &str, target: &str) -> Option<&Arc<dyn Translator>> {
        if !self.preferences.offline_enabled || self.preferences.mode == TranslationMode::Online {
            return None;
        }
        self.offline
            .as_ref()
            .filter(|offline| offline.supports(source, target))
    }

    fn lock_quota(&self) -> Result<MutexGuard<'_, DailyQuota>> {
        let mut quota = self
            .quota
            .lock()
            .map_err(|e| MessagesError::Translation(format!("Quota lock error: {}", e)))?;

        let now = self.clock.now();
        if now.saturating_duration_since(quota.period_start) >= QUOTA_PERIOD {
            debug!("Resetting daily translation quota");
            quota.period_start = now;
            quota.used = 0;
        }
        Ok(quota)
    }

    /// Fail when the daily online limit is used up
    fn check_online_quota(&self) -> Result<()> {
        let Some(limit) = self.preferences.daily_online_limit else {
            return Ok(());
        };

        if self.lock_quota()?.used >= limit {
            warn!("Daily online translation limit of {} reached", limit);
            return Err(MessagesError::Translation(
                "Translation rate limit exceeded".to_string(),
            ));
        }
        Ok(())
    }

    /// Count one successful online translation against the daily limit
    fn charge_online_quota(&self) -> Result<()> {
        if self.preferences.daily_online_limit.is_some() {
            self.lock_quota()?.used += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDetector(Option<&'static str>);

    #[async_trait]
    impl LanguageDetector for FixedDetector {
        async fn detect(&self, _text: &str) -> Result<Option<String>> {
            Ok(self.0.map(String::from))
        }
    }

    struct FakeTranslator {
        name: &'static str,
        pairs: Vec<(&'static str, &'static str)>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeTranslator {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                pairs: Vec::new(),
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn supporting(mut self, source: &'static str, target: &'static str) -> Self {
            self.pairs.push((source, target));
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Translator for FakeTranslator {
        fn name(&self) -> &str {
            self.name
        }

        fn supports(&self, source: &str, target: &str) -> bool {
            self.pairs.is_empty() || self.pairs.iter().any(|&(s, t)| s == source && t == target)
        }

        async fn translate(&self, text: &str, _source: &str, target: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(MessagesError::Translation("model missing".to_string()))
            } else {
                Ok(format!("[{}:{}] {}", self.name, target, text))
            }
        }
    }

    fn service(preferences: TranslationPreferences) -> TranslationService {
        TranslationService::new(Arc::new(FixedDetector(Some("es"))), preferences)
    }

    #[test]
    fn test_same_base_language() {
        assert!(same_base_language("en-US", "en"));
        assert!(same_base_language("pt_BR", "PT"));
        assert!(!same_base_language("es", "en"));
    }

    #[tokio::test]
    async fn test_empty_text() {
        let service = service(TranslationPreferences::default());
        let ticket = service.next_ticket();
        let err = service
            .translate(&TranslationRequest::new("  ", "en"), &ticket)
            .await
            .unwrap_err();
        assert!(matches!(err, MessagesError::EmptyText));
    }

    #[tokio::test]
    async fn test_offline_first() {
        let offline = Arc::new(FakeTranslator::new("offline"));
        let online = Arc::new(FakeTranslator::new("online"));
        let service = service(TranslationPreferences::default())
            .with_offline(offline.clone())
            .with_online(online.clone());

        let ticket = service.next_ticket();
        let translation = service
            .translate(&TranslationRequest::new("Hola", "en"), &ticket)
            .await
            .unwrap();

        assert_eq!(translation.engine, TranslationEngine::Offline);
        assert_eq!(translation.source_language, "es");
        assert_eq!(offline.calls(), 1);
        assert_eq!(online.calls(), 0);
    }

    #[tokio::test]
    async fn test_auto_mode_falls_back_online_once() {
        let offline = Arc::new(FakeTranslator::new("offline").failing());
        let online = Arc::new(FakeTranslator::new("online"));
        let service = service(TranslationPreferences::default())
            .with_offline(offline.clone())
            .with_online(online.clone());

        let ticket = service.next_ticket();
        let translation = service
            .translate(&TranslationRequest::new("Hola", "en"), &ticket)
            .await
            .unwrap();

        assert_eq!(translation.engine, TranslationEngine::Online);
        assert_eq!(offline.calls(), 1);
        assert_eq!(online.calls(), 1);
    }

    #[tokio::test]
    async fn test_offline_mode_never_goes_online() {
        let offline = Arc::new(FakeTranslator::new("offline").failing());
        let online = Arc::new(FakeTranslator::new("online"));
        let service = service(TranslationPreferences {
            mode: TranslationMode::Offline,
            ..Default::default()
        })
        .with_offline(offline)
        .with_online(online.clone());

        let ticket = service.next_ticket();
        let err = service
            .translate(&TranslationRequest::new("Hola", "en"), &ticket)
            .await
            .unwrap_err();
        assert!(matches!(err, MessagesError::Translation(_)));
        assert_eq!(online.calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_pair_in_offline_mode() {
        let offline = Arc::new(FakeTranslator::new("offline").supporting("fr", "en"));
        let service = service(TranslationPreferences {
            mode: TranslationMode::Offline,
            ..Default::default()
        })
        .with_offline(offline);

        let ticket = service.next_ticket();
        let err = service
            .translate(&TranslationRequest::new("Hola", "en"), &ticket)
            .await
            .unwrap_err();
        assert!(matches!(err, MessagesError::UnsupportedLanguagePair { .. }));
    }

    #[tokio::test]
    async fn test_online_mode_skips_offline() {
        let offline = Arc::new(FakeTranslator::new("offline"));
        let online = Arc::new(FakeTranslator::new("online"));
        let service = service(TranslationPreferences {
            mode: TranslationMode::Online,
            ..Default::default()
        })
        .with_offline(offline.clone())
        .with_online(online);

        let ticket = service.next_ticket();
        let translation = service
            .translate(&TranslationRequest::new("Hola", "en"), &ticket)
            .await
            .unwrap();
        assert_eq!(translation.engine, TranslationEngine::Online);
        assert_eq!(offline.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_service_available() {
        let service = service(TranslationPreferences::default());
        let ticket = service.next_ticket();
        let err = service
            .translate(&TranslationRequest::new("Hola", "en"), &ticket)
            .await
            .unwrap_err();
        assert!(matches!(err, MessagesError::NoTranslationService));
    }

    #[tokio::test]
    async fn test_same_language_skipped_unless_user_requested() {
        let online = Arc::new(FakeTranslator::new("online"));
        let service = TranslationService::new(
            Arc::new(FixedDetector(Some("en-US"))),
            TranslationPreferences::default(),
        )
        .with_online(online.clone());

        let ticket = service.next_ticket();
        let err = service
            .translate(&TranslationRequest::new("Hello", "en"), &ticket)
            .await
            .unwrap_err();
        assert!(matches!(err, MessagesError::AlreadyInTargetLanguage(_)));
        assert_eq!(online.calls(), 0);

        let ticket = service.next_ticket();
        let translation = service
            .translate(
                &TranslationRequest::new("Hello", "en").user_requested(),
                &ticket,
            )
            .await
            .unwrap();
        assert_eq!(translation.engine, TranslationEngine::Online);
        assert_eq!(online.calls(), 1);
    }

    #[tokio::test]
    async fn test_detection_failure() {
        let service = TranslationService::new(
            Arc::new(FixedDetector(None)),
            TranslationPreferences::default(),
        )
        .with_online(Arc::new(FakeTranslator::new("online")));

        let ticket = service.next_ticket();
        let err = service
            .translate(&TranslationRequest::new("???", "en"), &ticket)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Translation error: Could not detect language");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_engines() {
        let online = Arc::new(FakeTranslator::new("online"));
        let service = service(TranslationPreferences::default()).with_online(online.clone());

        let request = TranslationRequest::new("Hola", "en");
        let ticket = service.next_ticket();
        service.translate(&request, &ticket).await.unwrap();

        let ticket = service.next_ticket();
        let cached = service.translate(&request, &ticket).await.unwrap();
        assert_eq!(cached.engine, TranslationEngine::Cache);
        assert_eq!(online.calls(), 1);
        assert_eq!(service.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_superseded_request_is_cancelled() {
        let online = Arc::new(FakeTranslator::new("online"));
        let service = service(TranslationPreferences::default()).with_online(online.clone());

        let stale = service.next_ticket();
        let _fresh = service.next_ticket();
        let err = service
            .translate(&TranslationRequest::new("Hola", "en"), &stale)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(online.calls(), 0);
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_daily_online_limit() {
        let clock = Arc::new(ManualClock::new());
        let online = Arc::new(FakeTranslator::new("online"));
        let service = TranslationService::with_clock(
            Arc::new(FixedDetector(Some("es"))),
            TranslationPreferences {
                daily_online_limit: Some(1),
                ..Default::default()
            },
            clock.clone(),
        )
        .with_online(online.clone());

        let ticket = service.next_ticket();
        service
            .translate(&TranslationRequest::new("uno", "en"), &ticket)
            .await
            .unwrap();

        let ticket = service.next_ticket();
        let err = service
            .translate(&TranslationRequest::new("dos", "en"), &ticket)
            .await
            .unwrap_err();
        assert!(matches!(err, MessagesError::Translation(_)));

        clock.advance(QUOTA_PERIOD);
        let ticket = service.next_ticket();
        assert!(service
            .translate(&TranslationRequest::new("dos", "en"), &ticket)
            .await
            .is_ok());
        assert_eq!(online.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_online_calls_do_not_use_quota() {
        let online = Arc::new(FakeTranslator::new("online").failing());
        let service = service(TranslationPreferences {
            daily_online_limit: Some(1),
            ..Default::default()
        })
        .with_online(online.clone());

        for text in ["uno", "dos"] {
            let ticket = service.next_ticket();
            let err = service
                .translate(&TranslationRequest::new(text, "en"), &ticket)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Translation error: model missing");
        }
        assert_eq!(online.calls(), 2);
    }
}
