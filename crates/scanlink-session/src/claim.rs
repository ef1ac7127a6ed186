//! Exclusive ownership of physical accessories.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use scanlink_core::{Error, Result, SessionId};

use crate::sync::lock;

/// Which session owns which accessory.
///
/// Clones share one table. [`ClaimTable::process`] is the table sessions use
/// unless they are built with their own, so every session in the process
/// competes for the same accessories; tests pass a fresh [`ClaimTable::new`]
/// to stay isolated from each other.
#[derive(Debug, Clone, Default)]
pub struct ClaimTable {
    owners: Arc<Mutex<HashMap<String, SessionId>>>,
}

impl ClaimTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table.
    pub fn process() -> Self {
        static PROCESS: OnceLock<ClaimTable> = OnceLock::new();
        PROCESS.get_or_init(ClaimTable::new).clone()
    }

    /// Take `accessory` for `session`. Claiming an accessory the session
    /// already owns succeeds.
    ///
    /// # Errors
    /// `AlreadyClaimed` when another session owns it.
    pub fn try_claim(&self, accessory: &str, session: SessionId) -> Result<()> {
        let mut owners = lock(&self.owners);
        match owners.get(accessory) {
            Some(owner) if *owner != session => Err(Error::already_claimed(accessory)),
            Some(_) => Ok(()),
            None => {
                owners.insert(accessory.to_string(), session);
                Ok(())
            }
        }
    }

    /// Release `accessory` if `session` owns it.
    pub fn release(&self, accessory: &str, session: SessionId) -> bool {
        let mut owners = lock(&self.owners);
        if owners.get(accessory) == Some(&session) {
            owners.remove(accessory);
            true
        } else {
            false
        }
    }

    pub fn owner(&self, accessory: &str) -> Option<SessionId> {
        lock(&self.owners).get(accessory).copied()
    }

    pub fn len(&self) -> usize {
        lock(&self.owners).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_session_is_refused() {
        let table = ClaimTable::new();
        let first = SessionId::new();
        let second = SessionId::new();

        table.try_claim("SP1-1", first).unwrap();
        let err = table.try_claim("SP1-1", second).unwrap_err();
        assert!(matches!(err, Error::AlreadyClaimed { ref accessory } if accessory == "SP1-1"));

        assert!(!table.release("SP1-1", second));
        assert!(table.release("SP1-1", first));
        table.try_claim("SP1-1", second).unwrap();
        assert_eq!(table.owner("SP1-1"), Some(second));
    }

    #[test]
    fn test_reclaim_by_owner() {
        let table = ClaimTable::new();
        let id = SessionId::new();
        table.try_claim("SP1-2", id).unwrap();
        table.try_claim("SP1-2", id).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let table = ClaimTable::new();
        let clone = table.clone();
        table.try_claim("SP1-3", SessionId::new()).unwrap();
        assert!(clone.owner("SP1-3").is_some());
        assert!(ClaimTable::new().is_empty());
    }
}
