//! Scroll cursor state machine.

use serde_json::Value;

/// Phase of a scrolled search.
///
/// Transitions are caller-driven; cursor expiry is enforced by the engine
/// and surfaces as a not-found error when a stale cursor is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollPhase {
    /// No scroll configured; ordinary from/size pagination applies.
    #[default]
    Idle,
    /// Scroll configured, first search not yet executed.
    FirstPage,
    /// Cursor obtained; subsequent batches are fetched with it.
    Scrolling,
    /// A batch came back empty; the caller should release the cursor.
    Exhausted,
}

/// Cursor and batch-size bookkeeping for one scrolled search.
#[derive(Debug, Clone, Default)]
pub struct ScrollState {
    phase: ScrollPhase,
    size: Option<i64>,
    expire: Option<String>,
    search_type: Option<String>,
    scroll_id: Option<String>,
}

impl ScrollState {
    /// Enter scroll mode. The engine distributes the requested total across
    /// shards, so the per-request batch size is `size / shards` (floor).
    pub fn configure(&mut self, size: i64, shards: u32, expire: &str, search_type: Option<&str>) {
        self.size = Some(size / i64::from(shards.max(1)));
        self.expire = Some(expire.to_string());
        self.search_type = search_type
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        self.scroll_id = None;
        self.phase = ScrollPhase::FirstPage;
    }

    /// True once scroll mode has been configured.
    pub fn is_active(&self) -> bool {
        self.phase != ScrollPhase::Idle
    }

    /// Current phase.
    pub fn phase(&self) -> ScrollPhase {
        self.phase
    }

    /// Per-shard batch size for the first request.
    pub fn batch_size(&self) -> Option<i64> {
        self.size
    }

    /// Configured cursor lifetime.
    pub fn expire(&self) -> Option<&str> {
        self.expire.as_deref()
    }

    /// Alternate search type, if configured.
    pub fn search_type(&self) -> Option<&str> {
        self.search_type.as_deref()
    }

    /// Last cursor returned by the engine.
    pub fn scroll_id(&self) -> Option<&str> {
        self.scroll_id.as_deref()
    }

    /// Record a search or scroll response: capture the (possibly renewed)
    /// cursor and advance the phase. A zero-hit batch exhausts the scroll.
    pub fn record_response(&mut self, raw: &Value) {
        if let Some(id) = raw.get("_scroll_id").and_then(Value::as_str) {
            self.scroll_id = Some(id.to_string());
        }
        let hits = raw
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .map(|hits| hits.len())
            .unwrap_or(0);
        self.phase = if hits == 0 {
            ScrollPhase::Exhausted
        } else {
            ScrollPhase::Scrolling
        };
    }

    /// Drop all scroll state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
