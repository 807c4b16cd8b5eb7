//! Plugin fault isolation

use forb_plugin::{CapabilityKind, PluginFailure};
use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// A plugin call that failed or panicked. Recorded, never propagated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultRecord {
    pub capability_id: String,
    pub kind: CapabilityKind,
    pub reason: String,
}

impl FaultRecord {
    pub fn new(kind: CapabilityKind, capability_id: &str, reason: impl Into<String>) -> Self {
        let record = Self { capability_id: capability_id.to_string(), kind, reason: reason.into() };
        warn!(kind = %record.kind, capability = %record.capability_id, reason = %record.reason, "plugin fault isolated");
        record
    }
}

impl std::fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}' failed: {}", self.kind, self.capability_id, self.reason)
    }
}

/// Run `f`, turning a panic into its message.
pub(crate) fn catch<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| format!("panicked: {}", panic_message(&*payload)))
}

/// Run one plugin call; a reported failure or a panic becomes a `FaultRecord`.
pub(crate) fn isolate<T>(
    kind: CapabilityKind,
    id: &str,
    f: impl FnOnce() -> Result<T, PluginFailure>,
) -> Result<T, FaultRecord> {
    match catch(f) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(failure)) => Err(FaultRecord::new(kind, id, failure.message())),
        Err(reason) => Err(FaultRecord::new(kind, id, reason)),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
