use serde::{Deserialize, Serialize};

/// States of the itinerary synthesis state machine.
///
/// ```text
/// Received -> Validated -> Compiled -> Dispatched -> ParsedOk | ParsedFailed
/// ParsedOk -> Reconciled -> Completed
/// ParsedOk -> Rejected (constraint violation) -> Dispatched | Exhausted
/// ParsedFailed -> Dispatched | Exhausted
/// Received -> Rejected (validation failure, terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SynthesisState {
    Received,
    Validated,
    Compiled,
    Dispatched { attempt: usize },
    ParsedOk,
    ParsedFailed,
    Reconciled,
    Rejected,
    Completed,
    Exhausted,
}

impl SynthesisState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SynthesisState::Completed | SynthesisState::Exhausted
        )
    }

    /// Whether the machine may move from `self` to `next`.
    pub fn allows(self, next: SynthesisState) -> bool {
        use SynthesisState::*;

        match (self, next) {
            (Received, Validated | Rejected) => true,
            (Validated, Compiled) => true,
            (Compiled, Dispatched { .. }) => true,
            (Dispatched { .. }, ParsedOk | ParsedFailed | Exhausted) => true,
            (ParsedOk, Reconciled | Rejected) => true,
            (ParsedFailed, Dispatched { .. } | Exhausted) => true,
            (Rejected, Dispatched { .. } | Exhausted) => true,
            (Reconciled, Completed) => true,
            // The deadline can expire between any two non-terminal steps.
            (from, Exhausted) => !from.is_terminal() && from != Received,
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SynthesisState::Received => "📥 Received".to_string(),
            SynthesisState::Validated => "🧾 Validated".to_string(),
            SynthesisState::Compiled => "🧩 Compiled".to_string(),
            SynthesisState::Dispatched { attempt } => format!("🚀 Dispatched (attempt {attempt})"),
            SynthesisState::ParsedOk => "📄 Parsed".to_string(),
            SynthesisState::ParsedFailed => "⚠️ Parse failed".to_string(),
            SynthesisState::Reconciled => "⚖️ Reconciled".to_string(),
            SynthesisState::Rejected => "❌ Rejected".to_string(),
            SynthesisState::Completed => "✅ Completed".to_string(),
            SynthesisState::Exhausted => "⛔ Exhausted".to_string(),
        }
    }
}
