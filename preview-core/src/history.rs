//! Navigation history for the execution target's internal URL.
//!
//! The target owns the real browser history; this mirror only tracks enough
//! state to drive the address display and the back/forward affordances.
//! Invariant: `position` indexes a valid entry whenever the history is
//! non-empty, and `address` mirrors `entries[position]` after every
//! committed transition except POP (where the target's own history already
//! moved and only the address is updated).

use preview_types::NavigationAction;

/// In-memory mirror of the target's URL stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationHistory {
    entries: Vec<String>,
    position: usize,
    address: String,
}

impl NavigationHistory {
    /// Start a history at the given URL.
    pub fn new(initial_url: impl Into<String>) -> Self {
        let url = initial_url.into();
        Self {
            entries: vec![url.clone()],
            position: 0,
            address: url,
        }
    }

    /// Apply a navigation notification from the target.
    ///
    /// `delta` is only meaningful for [`NavigationAction::Pop`]; it is
    /// ignored for the other actions.
    pub fn navigate(&mut self, url: impl Into<String>, action: NavigationAction, delta: Option<i32>) {
        let url = url.into();
        match action {
            NavigationAction::Push => {
                self.entries.truncate(self.position + 1);
                self.entries.push(url.clone());
                self.position += 1;
                self.address = url;
            }
            NavigationAction::Replace => {
                self.entries[self.position] = url.clone();
                self.address = url;
            }
            NavigationAction::Pop => {
                // The target's history already moved; entries stay as-is.
                let delta = delta.unwrap_or(0) as i64;
                let max = self.entries.len() as i64 - 1;
                self.position = (self.position as i64 + delta).clamp(0, max) as usize;
                self.address = url;
            }
        }
    }

    /// Full reload: collapse the history to the current URL alone.
    pub fn refresh(&mut self, current_url: impl Into<String>) {
        let url = current_url.into();
        self.entries = vec![url.clone()];
        self.position = 0;
        self.address = url;
    }

    /// Whether a back navigation is possible.
    pub fn can_go_back(&self) -> bool {
        self.position > 0
    }

    /// Whether a forward navigation is possible.
    pub fn can_go_forward(&self) -> bool {
        self.position < self.entries.len() - 1
    }

    /// The URL shown in the address display.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current position in the entry stack.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The tracked entry stack.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}
