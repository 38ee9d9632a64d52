//! Operator allow-list.
//!
//! Every inbound chat event passes through [`AllowList::authorize`] before the
//! router sees it. Rejected events are logged by the caller and never
//! answered, so unknown users cannot even confirm the bot is alive.

use std::collections::HashSet;

/// Immutable set of operator identities, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    ids: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids
                .into_iter()
                .map(Into::into)
                .filter(|id: &String| !id.is_empty())
                .collect(),
        }
    }

    /// `None` or an empty identity (e.g. a sender without a username) is
    /// unauthorized, not an error.
    pub fn authorize(&self, operator: Option<&str>) -> bool {
        match operator {
            Some(id) if !id.is_empty() => self.ids.contains(id),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
