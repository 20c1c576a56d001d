//! Workspace directory passthroughs.

use atrium_shared::types::WorkspaceId;
use atrium_shared::Result;
use atrium_store::models::{Workspace, WorkspaceStatus};
use atrium_store::WorkspaceFilter;

use super::Session;

impl Session {
    /// Load (or refresh) a workspace record resolved by the host from its
    /// provisioning source.
    pub fn load_workspace(&self, workspace: Workspace) {
        self.lock().workspaces.upsert(workspace);
    }

    pub fn workspace(&self, id: WorkspaceId) -> Result<Workspace> {
        self.lock().workspaces.get(id).map(Workspace::clone)
    }

    /// Non-archived workspaces matching the filter, pinned first.
    pub fn list_workspaces(&self, filter: &WorkspaceFilter) -> Vec<Workspace> {
        self.lock()
            .workspaces
            .list(filter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn pin_workspace(&self, id: WorkspaceId, pinned: bool) -> Result<()> {
        self.lock().workspaces.set_pinned(id, pinned)
    }

    /// Clear the workspace unread badge.
    pub fn mark_workspace_read(&self, id: WorkspaceId) -> Result<()> {
        self.lock().workspaces.mark_read(id)
    }

    pub fn set_workspace_status(&self, id: WorkspaceId, status: WorkspaceStatus) -> Result<()> {
        self.lock().workspaces.set_status(id, status)
    }

    pub fn set_workspace_health(&self, id: WorkspaceId, health: u8) -> Result<()> {
        self.lock().workspaces.set_health(id, health)
    }

    pub fn set_package_used(&self, id: WorkspaceId, pct: u8) -> Result<()> {
        self.lock().workspaces.set_package_used(id, pct)
    }

    pub fn archive_workspace(&self, id: WorkspaceId) -> Result<()> {
        self.lock().workspaces.archive(id)
    }
}
