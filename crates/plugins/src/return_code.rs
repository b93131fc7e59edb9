//! Plugin id token and the return codes minted from it.
//!
//! Relocation requests are fire-and-forget; when the server later rejects one,
//! the host reports it through a server error event carrying the return code
//! the request was sent with. Remembering the codes we minted lets the plugin
//! pick its own failures out of that stream.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};

use tracing::debug;

use crate::{
    error::{Error, Result},
    host::HostFunctions,
};

/// Outstanding return codes kept for correlation. Older codes are forgotten.
const MAX_PENDING: usize = 64;

#[derive(Debug, Default)]
struct State {
    plugin_id: Option<String>,
    pending: VecDeque<String>,
}

/// Registered plugin id plus the return codes minted with it.
#[derive(Debug, Default)]
pub struct ReturnCodes {
    state: RwLock<State>,
}

impl ReturnCodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the id the host assigned to this plugin.
    pub fn register(&self, plugin_id: &str) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = &state.plugin_id {
            return Err(Error::AlreadyRegistered {
                current: current.clone(),
            });
        }
        state.plugin_id = Some(plugin_id.to_string());
        Ok(())
    }

    /// Forget the plugin id and every pending code.
    pub fn release(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.plugin_id = None;
        state.pending.clear();
    }

    pub fn plugin_id(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .plugin_id
            .clone()
    }

    /// Ask the host for a new return code and remember it.
    pub fn mint<H: HostFunctions + ?Sized>(&self, host: &H) -> Result<String> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let plugin_id = state.plugin_id.as_deref().ok_or(Error::NotRegistered)?;
        let code = host.create_return_code(plugin_id);
        if state.pending.len() >= MAX_PENDING {
            state.pending.pop_front();
        }
        state.pending.push_back(code.clone());
        debug!(return_code = %code, "return code minted");
        Ok(code)
    }

    /// Whether `code` was minted here. A matching code is consumed.
    pub fn claim(&self, code: &str) -> bool {
        if code.is_empty() {
            return false;
        }
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.pending.iter().position(|c| c == code) {
            Some(idx) => {
                state.pending.remove(idx);
                true
            },
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .len()
    }
}
