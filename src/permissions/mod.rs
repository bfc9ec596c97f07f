//! Calendar capabilities and how they are granted.

pub mod request;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

pub use request::{GrantDialog, PermissionBroker, PermissionError, PermissionOutcome, PermissionRequest, RequestCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ReadCalendar,
    WriteCalendar,
}

/// Both capabilities the calendar facade needs.
pub const CALENDAR_CAPABILITIES: [Capability; 2] = [Capability::ReadCalendar, Capability::WriteCalendar];

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Capability::ReadCalendar => "read_calendar",
            Capability::WriteCalendar => "write_calendar",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Answers whether a capability is currently granted.
pub trait PermissionGate {
    fn is_granted(&self, capability: Capability) -> bool;

    fn all_granted(&self, capabilities: &[Capability]) -> bool {
        capabilities.iter().all(|c| self.is_granted(*c))
    }
}

impl<G: PermissionGate + ?Sized> PermissionGate for &G {
    fn is_granted(&self, capability: Capability) -> bool {
        (**self).is_granted(capability)
    }
}

impl<G: PermissionGate + ?Sized> PermissionGate for Arc<G> {
    fn is_granted(&self, capability: Capability) -> bool {
        (**self).is_granted(capability)
    }
}

/// Current grant state. When the host does not enforce runtime grants,
/// every capability reads as granted.
#[derive(Debug)]
pub struct GrantTable {
    enforced: bool,
    granted: Mutex<HashSet<Capability>>,
}

impl GrantTable {
    pub fn new(enforced: bool, granted: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            enforced,
            granted: Mutex::new(granted.into_iter().collect()),
        }
    }

    /// Host without runtime grants.
    pub fn unenforced() -> Self {
        Self::new(false, [])
    }

    pub fn grant(&self, capability: Capability) {
        self.lock().insert(capability);
    }

    pub fn revoke(&self, capability: Capability) {
        self.lock().remove(&capability);
    }

    pub fn granted(&self) -> Vec<Capability> {
        let granted = self.lock();
        CALENDAR_CAPABILITIES
            .into_iter()
            .filter(|c| granted.contains(c))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<Capability>> {
        // The set is always left consistent, so a poisoned lock is still usable.
        self.granted.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PermissionGate for GrantTable {
    fn is_granted(&self, capability: Capability) -> bool {
        !self.enforced || self.lock().contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unenforced_table_grants_everything() {
        let table = GrantTable::unenforced();

        assert!(table.all_granted(&CALENDAR_CAPABILITIES));
    }

    #[test]
    fn enforced_table_requires_both_capabilities() {
        let table = GrantTable::new(true, [Capability::ReadCalendar]);

        assert!(table.is_granted(Capability::ReadCalendar));
        assert!(!table.is_granted(Capability::WriteCalendar));
        assert!(!table.all_granted(&CALENDAR_CAPABILITIES));
    }

    #[test]
    fn grant_and_revoke_update_state() {
        let table = GrantTable::new(true, []);

        table.grant(Capability::WriteCalendar);
        assert_eq!(table.granted(), vec![Capability::WriteCalendar]);

        table.revoke(Capability::WriteCalendar);
        assert!(table.granted().is_empty());
    }

    #[test]
    fn capability_names_match_serde_names() {
        for capability in CALENDAR_CAPABILITIES {
            let json = serde_json::to_string(&capability).unwrap();
            assert_eq!(json, format!("\"{}\"", capability.name()));
        }
    }

    #[test]
    fn gate_is_usable_through_arc() {
        let table = Arc::new(GrantTable::new(true, CALENDAR_CAPABILITIES));

        assert!(table.all_granted(&CALENDAR_CAPABILITIES));
    }
}
