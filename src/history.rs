//! Newest-first history of generated images with a navigation cursor.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Horizontal travel, in pixels, a touch gesture needs to count as a swipe.
pub const SWIPE_THRESHOLD_PX: f32 = 50.0;

/// One completed generation or edit. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    id: Uuid,
    source: String,
    result: String,
    prompt: String,
    created_at: DateTime<Utc>,
}

impl HistoryRecord {
    fn new(source: String, result: String, prompt: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            source,
            result,
            prompt,
            created_at: Utc::now(),
        }
    }

    /// Time-ordered unique id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// `data:` URL of the input image; empty when the image was drawn from
    /// the prompt alone.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// `data:` URL of the produced image.
    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Direction of a recognized swipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    /// Finger moved left: show the newer record.
    Left,
    /// Finger moved right: show the older record.
    Right,
}

impl Swipe {
    /// Classifies a touch gesture by its start and end x coordinates.
    pub fn from_gesture(start_x: f32, end_x: f32) -> Option<Self> {
        let delta = end_x - start_x;
        if delta <= -SWIPE_THRESHOLD_PX {
            Some(Self::Left)
        } else if delta >= SWIPE_THRESHOLD_PX {
            Some(Self::Right)
        } else {
            None
        }
    }
}

/// In-memory history; index 0 is always the newest record.
#[derive(Debug, Clone, Default)]
pub struct History {
    records: VecDeque<HistoryRecord>,
    current: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends a record and makes it current.
    pub fn record_result(
        &mut self,
        source: impl Into<String>,
        result: impl Into<String>,
        prompt: impl Into<String>,
    ) -> &HistoryRecord {
        self.records
            .push_front(HistoryRecord::new(source.into(), result.into(), prompt.into()));
        self.current = 0;
        &self.records[0]
    }

    /// Moves toward the oldest record, stopping at the last one.
    pub fn step_backward(&mut self) {
        if self.records.len() > 1 {
            self.current = (self.current + 1).min(self.records.len() - 1);
        }
    }

    /// Moves toward the newest record, stopping at index 0.
    pub fn step_forward(&mut self) {
        if self.records.len() > 1 {
            self.current = self.current.saturating_sub(1);
        }
    }

    /// Moves the cursor directly. Out-of-range indices are ignored.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index >= self.records.len() {
            return false;
        }
        self.current = index;
        true
    }

    /// Applies a swipe: left steps forward, right steps backward.
    pub fn swipe(&mut self, swipe: Swipe) {
        match swipe {
            Swipe::Left => self.step_forward(),
            Swipe::Right => self.step_backward(),
        }
    }

    pub fn current(&self) -> Option<&HistoryRecord> {
        self.records.get(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn get(&self, index: usize) -> Option<&HistoryRecord> {
        self.records.get(index)
    }

    /// One-based position and total, for an "N of M" label.
    pub fn position(&self) -> Option<(usize, usize)> {
        (!self.records.is_empty()).then(|| (self.current + 1, self.records.len()))
    }

    /// Whether an older record exists.
    pub fn can_step_backward(&self) -> bool {
        self.current + 1 < self.records.len()
    }

    /// Whether a newer record exists.
    pub fn can_step_forward(&self) -> bool {
        self.current > 0
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records newest first, as shown in the thumbnail strip.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }
}
