//! Context snapshots: the signal map gates are evaluated against.
//!
//! Upstream analyzers produce named numeric or boolean signals; the memory
//! bridge derives more. Reads never fail: a missing key is `0` / `false`, a
//! non-finite number is `0`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single signal value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Signal {
    Flag(bool),
    Number(f64),
}

impl Signal {
    /// Numeric view: flags read as 1/0, non-finite numbers as 0.
    pub fn as_number(self) -> f64 {
        match self {
            Signal::Number(n) if n.is_finite() => n,
            Signal::Number(_) => 0.0,
            Signal::Flag(true) => 1.0,
            Signal::Flag(false) => 0.0,
        }
    }

    /// Boolean view: numbers are true when non-zero.
    pub fn as_flag(self) -> bool {
        match self {
            Signal::Flag(b) => b,
            Signal::Number(_) => self.as_number() != 0.0,
        }
    }
}

impl From<f64> for Signal {
    fn from(n: f64) -> Self {
        Signal::Number(n)
    }
}

impl From<f32> for Signal {
    fn from(n: f32) -> Self {
        Signal::Number(f64::from(n))
    }
}

impl From<u32> for Signal {
    fn from(n: u32) -> Self {
        Signal::Number(f64::from(n))
    }
}

impl From<usize> for Signal {
    fn from(n: usize) -> Self {
        Signal::Number(n as f64)
    }
}

impl From<bool> for Signal {
    fn from(b: bool) -> Self {
        Signal::Flag(b)
    }
}

/// Mapping from signal name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextSnapshot {
    signals: BTreeMap<String, Signal>,
}

impl ContextSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Signal>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace a signal.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Signal>) {
        self.signals.insert(key.into(), value.into());
    }

    /// Raw lookup.
    pub fn get(&self, key: &str) -> Option<Signal> {
        self.signals.get(key).copied()
    }

    /// Numeric value of `key`, or 0 when absent.
    pub fn number(&self, key: &str) -> f64 {
        self.get(key).map(Signal::as_number).unwrap_or(0.0)
    }

    /// Boolean value of `key`, or false when absent.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).map(Signal::as_flag).unwrap_or(false)
    }

    /// Overlay `other` onto `self`; keys in `other` win.
    pub fn merge(&mut self, other: &ContextSnapshot) {
        for (k, v) in &other.signals {
            self.signals.insert(k.clone(), *v);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.signals.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Signal)> {
        self.signals.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>, V: Into<Signal>> FromIterator<(K, V)> for ContextSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = ContextSnapshot::new();
        for (k, v) in iter {
            snapshot.set(k, v);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_read_as_zero_and_false() {
        let ctx = ContextSnapshot::new();
        assert_eq!(ctx.number("vision_clarity"), 0.0);
        assert!(!ctx.flag("symbol_evolution"));
    }

    #[test]
    fn cross_type_reads() {
        let ctx = ContextSnapshot::new()
            .with("ready", true)
            .with("count", 3u32)
            .with("broken", f64::NAN);
        assert_eq!(ctx.number("ready"), 1.0);
        assert!(ctx.flag("count"));
        assert_eq!(ctx.number("broken"), 0.0);
        assert!(!ctx.flag("broken"));
    }

    #[test]
    fn merge_prefers_overlay() {
        let mut base = ContextSnapshot::new().with("a", 1.0).with("b", 2.0);
        let overlay = ContextSnapshot::new().with("b", 5.0).with("c", true);
        base.merge(&overlay);
        assert_eq!(base.number("a"), 1.0);
        assert_eq!(base.number("b"), 5.0);
        assert!(base.flag("c"));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn deserializes_plain_json_object() {
        let ctx: ContextSnapshot =
            serde_json::from_str(r#"{"vision_clarity": 0.8, "actions_taken": 2, "ritual": true}"#)
                .unwrap();
        assert_eq!(ctx.number("vision_clarity"), 0.8);
        assert_eq!(ctx.number("actions_taken"), 2.0);
        assert!(ctx.flag("ritual"));
    }
}
