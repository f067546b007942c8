use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::ToolId;
use crate::error::EntitlementError;

/// Tools with a download or purchase currently awaiting a collaborator.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    tools: Arc<Mutex<HashSet<ToolId>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, tool_id: ToolId) -> Result<InFlightGuard, EntitlementError> {
        if !self.tools.lock().insert(tool_id) {
            return Err(EntitlementError::OperationInProgress(tool_id));
        }
        Ok(InFlightGuard {
            tools: self.tools.clone(),
            tool_id,
        })
    }

    pub fn contains(&self, tool_id: ToolId) -> bool {
        self.tools.lock().contains(&tool_id)
    }
}

/// Releases the tool when dropped, whichever way the operation ended.
#[derive(Debug)]
pub struct InFlightGuard {
    tools: Arc<Mutex<HashSet<ToolId>>>,
    tool_id: ToolId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tools.lock().remove(&self.tool_id);
    }
}
