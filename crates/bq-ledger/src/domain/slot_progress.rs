//! # Slot Progress
//!
//! Typed per-slot progress and the decoder that guards the persistence
//! boundary.
//!
//! ## Encoding
//!
//! The canonical stored form is a JSON array of integers, index `i` holding
//! the progress of slot `i + 1`. Older rows may hold any of:
//!
//! ```text
//! null                       -> no progress
//! {"1": 120, "2": "40"}      -> object keyed by slot number
//! "{\"1\":120}"              -> JSON text, possibly encoded more than once
//! {"0":"{","1":"\"",...}     -> text exploded one character per key (corrupt)
//! ```
//!
//! [`validate_slot_progress`] accepts all of them and always returns the
//! canonical shape, so running it on its own output is a no-op.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::Credits;

/// Nested JSON-text layers unwrapped before giving up.
const MAX_DECODE_DEPTH: usize = 3;

// =============================================================================
// SLOT PROGRESS
// =============================================================================

/// Progress of each open slot, addressed `1..=len`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotProgress(Vec<Credits>);

impl SlotProgress {
    pub fn zeroed(slots: u32) -> Self {
        Self(vec![0; slots as usize])
    }

    pub fn from_values(values: Vec<Credits>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> u32 {
        self.0.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Progress of a 1-based slot.
    pub fn get(&self, slot: u32) -> Option<Credits> {
        index(slot).and_then(|i| self.0.get(i).copied())
    }

    /// Add to a slot and return its new progress, or `None` for a bad index.
    pub fn add(&mut self, slot: u32, amount: Credits) -> Option<Credits> {
        let cell = index(slot).and_then(|i| self.0.get_mut(i))?;
        *cell = cell.saturating_add(amount);
        Some(*cell)
    }

    /// Remove a slot; later slots shift down by one, keeping their order.
    pub fn remove(&mut self, slot: u32) -> Option<Credits> {
        let i = index(slot).filter(|&i| i < self.0.len())?;
        Some(self.0.remove(i))
    }

    pub fn extend_zeroed(&mut self, slots: u32) {
        self.0.extend(std::iter::repeat(0).take(slots as usize));
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// `(slot, progress)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Credits)> + '_ {
        self.0
            .iter()
            .enumerate()
            .map(|(i, &progress)| (i as u32 + 1, progress))
    }

    pub fn values(&self) -> &[Credits] {
        &self.0
    }

    /// Canonical stored form.
    pub fn to_value(&self) -> Value {
        Value::Array(self.0.iter().map(|&v| Value::from(v)).collect())
    }
}

fn index(slot: u32) -> Option<usize> {
    (slot as usize).checked_sub(1)
}

// =============================================================================
// REPAIR
// =============================================================================

/// What the decoder had to do to produce a trustworthy map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepairOutcome {
    /// Already canonical.
    Clean,
    /// Legacy shape, out-of-range values or missing slots were coerced.
    Normalized,
    /// Corruption detected; all progress discarded.
    Reset { reason: String },
}

impl RepairOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, RepairOutcome::Clean)
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, RepairOutcome::Reset { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            RepairOutcome::Clean => "clean",
            RepairOutcome::Normalized => "normalized",
            RepairOutcome::Reset { .. } => "reset",
        }
    }
}

/// Decode stored slot progress into exactly `slot_count` slots.
///
/// Corruption (more populated entries than `slot_count + tolerance`, or any
/// value that is not a number) discards the whole map. Otherwise each slot
/// takes its stored value floored and clamped to `[0, required]`, and missing
/// slots default to 0.
pub fn validate_slot_progress(
    raw: &Value,
    slot_count: u32,
    required: Credits,
    tolerance: usize,
) -> (SlotProgress, RepairOutcome) {
    match decode(raw, slot_count, required, tolerance) {
        Ok((progress, canonical)) => {
            let outcome = if canonical {
                RepairOutcome::Clean
            } else {
                RepairOutcome::Normalized
            };
            (progress, outcome)
        }
        Err(reason) => (SlotProgress::zeroed(slot_count), RepairOutcome::Reset { reason }),
    }
}

fn decode(
    raw: &Value,
    slot_count: u32,
    required: Credits,
    tolerance: usize,
) -> Result<(SlotProgress, bool), String> {
    let value = unwrap_text(raw)?;

    // (slot number if addressable, stored value)
    let entries: Vec<(Option<u32>, &Value)> = match &value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (u32::try_from(i + 1).ok(), v))
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.trim().parse::<u32>().ok().filter(|&s| s >= 1), v))
            .collect(),
        other => return Err(format!("expected a slot map, found {}", type_name(other))),
    };

    let allowed = slot_count as usize + tolerance;
    if entries.len() > allowed {
        return Err(format!(
            "{} populated entries for {} slots",
            entries.len(),
            slot_count
        ));
    }

    let mut progress = SlotProgress::zeroed(slot_count);
    for (slot, stored) in entries {
        let units = numeric(stored).ok_or_else(|| {
            format!(
                "non-numeric {} at slot {}",
                type_name(stored),
                slot.map_or_else(|| "?".to_string(), |s| s.to_string())
            )
        })?;
        if let Some(cell) = slot
            .filter(|&s| s <= slot_count)
            .and_then(index)
            .and_then(|i| progress.0.get_mut(i))
        {
            *cell = clamp(units, required);
        }
    }

    Ok((progress, is_canonical(raw, slot_count, required)))
}

/// Peel JSON-text layers until a structured value remains.
fn unwrap_text(raw: &Value) -> Result<Value, String> {
    let mut current = raw.clone();
    for _ in 0..MAX_DECODE_DEPTH {
        match current {
            Value::String(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(Value::Null);
                }
                current = serde_json::from_str(trimmed)
                    .map_err(|e| format!("undecodable progress text: {e}"))?;
            }
            structured => return Ok(structured),
        }
    }
    match current {
        Value::String(_) => Err(format!("progress still text after {MAX_DECODE_DEPTH} decodes")),
        structured => Ok(structured),
    }
}

/// Numeric reading of a stored value, before clamping.
///
/// Integers pass through, floats are floored, numeric strings are parsed.
/// Anything else is not a number.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn clamp(units: f64, required: Credits) -> Credits {
    if units <= 0.0 {
        0
    } else if units >= required as f64 {
        required
    } else {
        units.floor() as Credits
    }
}

fn is_canonical(raw: &Value, slot_count: u32, required: Credits) -> bool {
    match raw {
        Value::Array(items) => {
            items.len() == slot_count as usize
                && items
                    .iter()
                    .all(|v| v.as_u64().is_some_and(|units| units <= required))
        }
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
