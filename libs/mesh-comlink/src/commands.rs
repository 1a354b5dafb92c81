//! Named device commands
//!
//! Command ids are positions in a fixed name list; slot 0 is reserved and never
//! sent.

use std::collections::HashMap;

use crate::error::{LinkError, Result};

/// Command names in id order
pub const COMMAND_NAMES: &[&str] = &["<reserved>", "reset", "clear", "pair", "ping", "scan"];

/// Immutable name to id lookup built once per device handle
#[derive(Debug, Clone)]
pub struct CommandTable {
    ids: HashMap<&'static str, u8>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new(COMMAND_NAMES)
    }
}

impl CommandTable {
    pub fn new(names: &[&'static str]) -> Self {
        let ids = names
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(idx, name)| u8::try_from(idx).ok().map(|id| (*name, id)))
            .collect();
        Self { ids }
    }

    /// Resolve a command name to its wire id
    pub fn resolve(&self, name: &str) -> Result<u8> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| LinkError::validation(format!("unknown command '{name}'")))
    }

    pub fn names(&self) -> impl Iterator<Item = &&'static str> {
        self.ids.keys()
    }
}
