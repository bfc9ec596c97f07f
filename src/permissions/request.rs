use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::oneshot;

use super::{Capability, GrantTable, PermissionGate};

/// Caller-chosen value that ties a grant result back to its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestCode(pub i32);

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PermissionError {
    #[error("Permission request {0} is already pending")]
    CodeInUse(RequestCode),
    #[error("Permission request {0} was dropped before a result arrived")]
    Abandoned(RequestCode),
}

/// Result of one grant flow, per capability.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionOutcome {
    pub code: RequestCode,
    pub results: Vec<(Capability, bool)>,
}

impl PermissionOutcome {
    pub fn all_granted(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|(_, granted)| *granted)
    }

    pub fn is_granted(&self, capability: Capability) -> bool {
        self.results.iter().any(|(c, granted)| *c == capability && *granted)
    }
}

/// Host hook that starts the grant flow. The host later calls
/// [`PermissionBroker::deliver`] with the same code.
pub trait GrantDialog {
    fn show(&self, code: RequestCode, capabilities: &[Capability]);
}

/// Handle for one in-flight request.
#[derive(Debug)]
pub struct PermissionRequest {
    code: RequestCode,
    receiver: oneshot::Receiver<PermissionOutcome>,
}

impl PermissionRequest {
    pub fn code(&self) -> RequestCode {
        self.code
    }

    pub async fn outcome(self) -> Result<PermissionOutcome, PermissionError> {
        let code = self.code;
        self.receiver.await.map_err(|_| PermissionError::Abandoned(code))
    }

    /// Non-blocking check used by synchronous callers.
    pub fn try_outcome(&mut self) -> Option<PermissionOutcome> {
        self.receiver.try_recv().ok()
    }
}

/// Correlates grant flows with their results by request code.
pub struct PermissionBroker<D: GrantDialog> {
    grants: Arc<GrantTable>,
    dialog: D,
    pending: Mutex<HashMap<RequestCode, oneshot::Sender<PermissionOutcome>>>,
}

impl<D: GrantDialog> PermissionBroker<D> {
    pub fn new(grants: Arc<GrantTable>, dialog: D) -> Self {
        Self {
            grants,
            dialog,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a grant flow for `capabilities` under `code`. A code whose
    /// handle was dropped without a result is free to reuse.
    pub fn request(
        &self,
        code: RequestCode,
        capabilities: &[Capability],
    ) -> Result<PermissionRequest, PermissionError> {
        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.lock();
            pending.retain(|_, waiting| !waiting.is_closed());
            if pending.contains_key(&code) {
                return Err(PermissionError::CodeInUse(code));
            }
            pending.insert(code, sender);
        }

        tracing::info!("Requesting calendar permissions {:?} with code {}", capabilities, code);
        self.dialog.show(code, capabilities);

        Ok(PermissionRequest { code, receiver })
    }

    /// Routes the host's result for `code`. Returns false if nothing was waiting on it.
    pub fn deliver(&self, code: RequestCode, results: &[(Capability, bool)]) -> bool {
        let Some(sender) = self.lock().remove(&code) else {
            tracing::warn!("Ignoring permission result for unknown request code {}", code);
            return false;
        };

        for (capability, granted) in results {
            if *granted {
                self.grants.grant(*capability);
            } else {
                self.grants.revoke(*capability);
            }
        }
        tracing::info!("Permission result for code {}: {:?}", code, results);

        let outcome = PermissionOutcome {
            code,
            results: results.to_vec(),
        };
        if sender.send(outcome).is_err() {
            tracing::debug!("Permission request {} was dropped before its result arrived", code);
        }
        true
    }

    pub fn is_pending(&self, code: RequestCode) -> bool {
        self.lock().contains_key(&code)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestCode, oneshot::Sender<PermissionOutcome>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<D: GrantDialog> PermissionGate for PermissionBroker<D> {
    fn is_granted(&self, capability: Capability) -> bool {
        self.grants.is_granted(capability)
    }
}
