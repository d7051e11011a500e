//! Per-target diagnostic level overrides
//!
//! A shared registry of `target -> LevelFilter` overrides, enforced by
//! [`LevelOverrideLayer`]. Overrides apply to the target itself and to every
//! `::`-separated child, so an override on `opentelemetry` also covers
//! `opentelemetry::context`.
//!
//! Callers never leave an override behind: [`LevelRegistry::suppress`]
//! hands out a [`SuppressionGuard`], and once every guard on a target is
//! dropped the override that was in place before the first one returns.
//! Guards may be dropped in any order and on any thread.

use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::Interest;
use tracing::{Level, Metadata, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

#[derive(Debug, Default)]
struct Overrides {
    active: HashMap<String, LevelFilter>,
    suppressed: HashMap<String, Suppression>,
}

/// Live guards on one target and the override to put back after the last
#[derive(Debug)]
struct Suppression {
    holders: usize,
    saved: Option<LevelFilter>,
}

/// Shared table of level overrides
#[derive(Debug, Default)]
pub struct LevelRegistry {
    state: RwLock<Overrides>,
}

impl LevelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry installed by [`crate::telemetry::Telemetry::init`]
    pub fn global() -> Arc<LevelRegistry> {
        static GLOBAL: OnceLock<Arc<LevelRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(LevelRegistry::new())).clone()
    }

    /// Override currently in effect directly on `target`
    pub fn level(&self, target: &str) -> Option<LevelFilter> {
        self.state.read().active.get(target).copied()
    }

    /// Whether any guard is silencing `target`
    pub fn is_suppressed(&self, target: &str) -> bool {
        self.state.read().suppressed.contains_key(target)
    }

    /// Replace the override on `target`, returning the previous one
    ///
    /// `None` removes the override. While `target` is suppressed the new
    /// override takes effect once the last guard is dropped.
    pub fn set_level(&self, target: &str, level: Option<LevelFilter>) -> Option<LevelFilter> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        if let Some(suppression) = state.suppressed.get_mut(target) {
            return std::mem::replace(&mut suppression.saved, level);
        }
        match level {
            Some(level) => state.active.insert(target.to_string(), level),
            None => state.active.remove(target),
        }
    }

    /// Whether an event at `level` from `target` passes the overrides
    ///
    /// The most specific matching override wins; no override means allowed.
    pub fn allows(&self, target: &str, level: &Level) -> bool {
        let state = self.state.read();
        if state.active.is_empty() {
            return true;
        }

        state
            .active
            .iter()
            .filter(|(key, _)| covers(key, target))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, filter)| level <= filter)
            .unwrap_or(true)
    }

    /// Silence `target` until the returned guard (and any other guard on
    /// the same target) is dropped
    pub fn suppress(self: &Arc<Self>, target: &str) -> SuppressionGuard {
        let mut guard = self.state.write();
        let state = &mut *guard;

        match state.suppressed.entry(target.to_string()) {
            Entry::Occupied(mut entry) => entry.get_mut().holders += 1,
            Entry::Vacant(entry) => {
                let saved = state.active.insert(target.to_string(), LevelFilter::OFF);
                entry.insert(Suppression { holders: 1, saved });
            }
        }

        SuppressionGuard {
            registry: Arc::clone(self),
            target: target.to_string(),
        }
    }

    fn release(&self, target: &str) {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(suppression) = state.suppressed.get_mut(target) else {
            return;
        };
        suppression.holders -= 1;
        if suppression.holders > 0 {
            return;
        }

        if let Some(Suppression { saved, .. }) = state.suppressed.remove(target) {
            match saved {
                Some(level) => state.active.insert(target.to_string(), level),
                None => state.active.remove(target),
            };
        }
    }
}

fn covers(key: &str, target: &str) -> bool {
    target == key
        || target
            .strip_prefix(key)
            .is_some_and(|rest| rest.starts_with("::"))
}

/// Keeps a target silenced while alive
#[must_use = "the target is only silenced while the guard is alive"]
pub struct SuppressionGuard {
    registry: Arc<LevelRegistry>,
    target: String,
}

impl SuppressionGuard {
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        self.registry.release(&self.target);
    }
}

/// Layer that drops events and spans rejected by a [`LevelRegistry`]
pub struct LevelOverrideLayer {
    registry: Arc<LevelRegistry>,
}

impl LevelOverrideLayer {
    pub fn new(registry: Arc<LevelRegistry>) -> Self {
        Self { registry }
    }
}

impl<S> Layer<S> for LevelOverrideLayer
where
    S: Subscriber,
{
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // Overrides change at runtime, so the answer can't be cached per callsite
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        self.registry.allows(metadata.target(), metadata.level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::SubscriberExt;

    const NOISY: &str = "opentelemetry";

    struct CountingLayer(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for CountingLayer {
        fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_override_covers_children_only() {
        let registry = LevelRegistry::new();
        registry.set_level(NOISY, Some(LevelFilter::OFF));

        assert!(!registry.allows("opentelemetry", &Level::ERROR));
        assert!(!registry.allows("opentelemetry::context", &Level::ERROR));
        assert!(registry.allows("opentelemetry_sdk", &Level::ERROR));
        assert!(registry.allows("agent_utils", &Level::TRACE));
    }

    #[test]
    fn test_most_specific_override_wins() {
        let registry = LevelRegistry::new();
        registry.set_level("opentelemetry", Some(LevelFilter::OFF));
        registry.set_level("opentelemetry::trace", Some(LevelFilter::WARN));

        assert!(registry.allows("opentelemetry::trace", &Level::WARN));
        assert!(!registry.allows("opentelemetry::trace", &Level::INFO));
        assert!(!registry.allows("opentelemetry::context", &Level::ERROR));
    }

    #[test]
    fn test_guard_restores_previous_override() {
        let registry = Arc::new(LevelRegistry::new());
        registry.set_level(NOISY, Some(LevelFilter::WARN));

        {
            let _guard = registry.suppress(NOISY);
            assert_eq!(registry.level(NOISY), Some(LevelFilter::OFF));
        }
        assert_eq!(registry.level(NOISY), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_guard_removes_override_it_introduced() {
        let registry = Arc::new(LevelRegistry::new());
        {
            let _outer = registry.suppress(NOISY);
            {
                let _inner = registry.suppress(NOISY);
            }
            assert_eq!(registry.level(NOISY), Some(LevelFilter::OFF));
        }
        assert_eq!(registry.level(NOISY), None);
    }

    #[test]
    fn test_overlapping_guards_restore_first_saved_level() {
        let registry = Arc::new(LevelRegistry::new());
        registry.set_level(NOISY, Some(LevelFilter::WARN));

        let first = registry.suppress(NOISY);
        let second = registry.suppress(NOISY);
        assert_eq!(first.target(), NOISY);

        // Dropped in acquisition order, not reverse
        drop(first);
        assert_eq!(registry.level(NOISY), Some(LevelFilter::OFF));
        assert!(registry.is_suppressed(NOISY));

        drop(second);
        assert_eq!(registry.level(NOISY), Some(LevelFilter::WARN));
        assert!(!registry.is_suppressed(NOISY));
    }

    #[test]
    fn test_set_level_while_suppressed_applies_after_release() {
        let registry = Arc::new(LevelRegistry::new());
        let guard = registry.suppress(NOISY);

        assert_eq!(registry.set_level(NOISY, Some(LevelFilter::INFO)), None);
        assert_eq!(registry.level(NOISY), Some(LevelFilter::OFF));

        drop(guard);
        assert_eq!(registry.level(NOISY), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_guard_restores_during_unwind() {
        let registry = Arc::new(LevelRegistry::new());
        let cloned = Arc::clone(&registry);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = cloned.suppress(NOISY);
            panic!("release blew up");
        }));

        assert!(result.is_err());
        assert_eq!(registry.level(NOISY), None);
    }

    #[test]
    fn test_layer_filters_suppressed_target() {
        let registry = Arc::new(LevelRegistry::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry()
            .with(LevelOverrideLayer::new(Arc::clone(&registry)))
            .with(CountingLayer(Arc::clone(&seen)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "opentelemetry::context", "Failed to detach context");
            assert_eq!(seen.load(Ordering::SeqCst), 1);

            {
                let _guard = registry.suppress(NOISY);
                tracing::error!(target: "opentelemetry::context", "Failed to detach context");
                tracing::error!(target: "agent_utils", "unrelated");
            }
            assert_eq!(seen.load(Ordering::SeqCst), 2);

            tracing::error!(target: "opentelemetry::context", "Failed to detach context");
            assert_eq!(seen.load(Ordering::SeqCst), 3);
        });
    }
}
