//! Per-conversation state.

use crate::capability::TranslatorCache;
use crate::config::PipelineConfig;
use crate::faq::CooldownTable;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic turn numbering shared between a session and its in-flight turns.
#[derive(Debug, Clone, Default)]
pub struct TurnCounter(Arc<AtomicU64>);

/// Identity of one turn. Stale once a newer turn has begun.
#[derive(Debug, Clone)]
pub struct TurnToken {
    id: u64,
    counter: TurnCounter,
}

impl TurnCounter {
    pub fn begin(&self) -> TurnToken {
        let id = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        TurnToken { id, counter: self.clone() }
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl TurnToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.counter.current() == self.id
    }
}

/// Cooldowns, translator handles and turn numbering for one conversation.
pub struct Session {
    pub cooldown: CooldownTable,
    pub translators: TranslatorCache,
    turns: TurnCounter,
}

impl Session {
    pub fn new(config: &PipelineConfig) -> Self {
        Self { cooldown: CooldownTable::new(config.faq_cooldown), translators: TranslatorCache::new(), turns: TurnCounter::default() }
    }

    /// Start a turn, superseding any turn still in flight.
    pub fn begin_turn(&self) -> TurnToken {
        self.turns.begin()
    }

    /// Handle for superseding turns from outside a borrowed session.
    pub fn turns(&self) -> TurnCounter {
        self.turns.clone()
    }
}
