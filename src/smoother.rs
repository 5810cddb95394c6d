//! Temporal smoothing of per-frame emotion classifications.
//!
//! The raw classifier output flickers between frames. A fixed-size sliding
//! window with majority vote plus conditional averaging turns the noisy
//! stream into a stable (label, confidence) pair for display.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

/// Window capacity used in production.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Confidence reported when nothing better is known.
pub const DEFAULT_CONFIDENCE: f64 = 5.0;

/// One raw (label, confidence) reading from the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub label: String,
    pub confidence: f64,
}

impl Observation {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Smoothed output derived from the current window contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Smoothed {
    pub emotion: String,
    pub confidence: f64,
}

/// Sliding-window smoother over recent observations.
///
/// The window is a FIFO: the newest observation is appended at the tail and
/// the oldest is evicted from the head once the capacity is exceeded. The
/// smoother is label-agnostic; validating labels against the allowed set is
/// the request handler's job.
pub struct EmotionSmoother {
    window: VecDeque<Observation>,
    capacity: usize,
}

impl EmotionSmoother {
    /// Create a smoother with the given window capacity (must be >= 1),
    /// seeded with one neutral observation so the first update already has
    /// history to vote against.
    pub fn seeded(capacity: usize) -> Self {
        assert!(capacity >= 1, "window capacity must be at least 1");
        let mut window = VecDeque::with_capacity(capacity + 1);
        window.push_back(Observation::new("neutral", DEFAULT_CONFIDENCE));
        Self { window, capacity }
    }

    /// Record one raw observation and return the new smoothed state.
    ///
    /// Appends at the tail, evicts at most one entry from the head, then
    /// recomputes majority label and mean confidence. Ties on the vote go to
    /// whichever label appeared first in the window, so the result is
    /// deterministic for a given insertion order.
    pub fn update(&mut self, label: &str, confidence: f64) -> Smoothed {
        self.window.push_back(Observation::new(label, confidence));
        if self.window.len() > self.capacity {
            self.window.pop_front();
        }

        // Count labels, remembering first-seen order for the tie-break.
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();
        for obs in &self.window {
            let entry = counts.entry(obs.label.as_str()).or_insert(0);
            if *entry == 0 {
                first_seen.push(obs.label.as_str());
            }
            *entry += 1;
        }

        let mut winner = "";
        let mut best = 0;
        for &label in &first_seen {
            let count = counts[label];
            if count > best {
                best = count;
                winner = label;
            }
        }

        let mut total = 0.0;
        let mut matched = 0usize;
        for obs in &self.window {
            if obs.label == winner {
                total += obs.confidence;
                matched += 1;
            }
        }
        let confidence = if matched > 0 {
            total / matched as f64
        } else {
            DEFAULT_CONFIDENCE
        };

        Smoothed {
            emotion: winner.to_string(),
            confidence,
        }
    }

    /// Current number of observations in the window.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Whether the given label is present anywhere in the window.
    #[cfg(test)]
    fn contains(&self, label: &str) -> bool {
        self.window.iter().any(|obs| obs.label == label)
    }
}
