//! Workspace directory: badge state and filter/sort listing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::info;

use atrium_shared::types::WorkspaceId;
use atrium_shared::{CoreError, Result};

use crate::models::{Workspace, WorkspaceStatus};

/// Sort order for [`WorkspaceDirectory::list`].  Pinned workspaces always
/// come first within any ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkspaceSort {
    /// Most recent message activity first.
    #[default]
    Recent,
    /// Alphabetical by display name.
    Name,
    /// Lowest health score first (triage view).
    Health,
    /// Highest unread count first.
    Unread,
}

/// Listing filter.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceFilter {
    pub status: Option<WorkspaceStatus>,
    /// Case-insensitive substring match on the display name.
    pub query: Option<String>,
    pub sort: WorkspaceSort,
}

/// Directory of all loaded workspaces.
#[derive(Debug, Default)]
pub struct WorkspaceDirectory {
    workspaces: HashMap<WorkspaceId, Workspace>,
}

impl WorkspaceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a workspace record (provisioning is external).
    pub fn upsert(&mut self, workspace: Workspace) {
        info!(workspace = %workspace.id, name = %workspace.name, "Workspace loaded");
        self.workspaces.insert(workspace.id, workspace);
    }

    pub fn get(&self, id: WorkspaceId) -> Result<&Workspace> {
        self.workspaces
            .get(&id)
            .ok_or_else(|| CoreError::NotFound(format!("workspace {id}")))
    }

    fn get_mut(&mut self, id: WorkspaceId) -> Result<&mut Workspace> {
        self.workspaces
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("workspace {id}")))
    }

    /// Record message activity: bump unread and refresh the preview.
    pub fn record_activity(
        &mut self,
        id: WorkspaceId,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let ws = self.get_mut(id)?;
        ws.unread += 1;
        ws.last_message = Some(preview.to_string());
        ws.last_message_at = Some(at);
        Ok(())
    }

    /// Clear the unread badge.
    pub fn mark_read(&mut self, id: WorkspaceId) -> Result<()> {
        self.get_mut(id)?.unread = 0;
        Ok(())
    }

    pub fn set_health(&mut self, id: WorkspaceId, health: u8) -> Result<()> {
        self.get_mut(id)?.health = health.min(100);
        Ok(())
    }

    pub fn set_status(&mut self, id: WorkspaceId, status: WorkspaceStatus) -> Result<()> {
        self.get_mut(id)?.status = status;
        Ok(())
    }

    pub fn set_package_used(&mut self, id: WorkspaceId, pct: u8) -> Result<()> {
        self.get_mut(id)?.package_used_pct = pct.min(100);
        Ok(())
    }

    pub fn set_pinned(&mut self, id: WorkspaceId, pinned: bool) -> Result<()> {
        self.get_mut(id)?.pinned = pinned;
        Ok(())
    }

    /// Archive a workspace.  Workspaces are never hard-deleted here.
    pub fn archive(&mut self, id: WorkspaceId) -> Result<()> {
        self.get_mut(id)?.archived = true;
        info!(workspace = %id, "Workspace archived");
        Ok(())
    }

    /// Non-archived workspaces matching the filter, pinned first.
    pub fn list(&self, filter: &WorkspaceFilter) -> Vec<&Workspace> {
        let query = filter.query.as_deref().map(str::to_lowercase);
        let mut out: Vec<&Workspace> = self
            .workspaces
            .values()
            .filter(|w| !w.archived)
            .filter(|w| filter.status.map_or(true, |s| w.status == s))
            .filter(|w| {
                query
                    .as_deref()
                    .map_or(true, |q| w.name.to_lowercase().contains(q))
            })
            .collect();

        out.sort_by(|a, b| {
            b.pinned.cmp(&a.pinned).then_with(|| match filter.sort {
                WorkspaceSort::Recent => b.last_message_at.cmp(&a.last_message_at),
                WorkspaceSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                WorkspaceSort::Health => a.health.cmp(&b.health),
                WorkspaceSort::Unread => b.unread.cmp(&a.unread),
            })
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws(name: &str) -> Workspace {
        Workspace::new(WorkspaceId::new(), name, "🏢")
    }

    #[test]
    fn activity_bumps_unread_and_preview() {
        let mut dir = WorkspaceDirectory::new();
        let w = ws("Acme");
        let id = w.id;
        dir.upsert(w);

        let at = Utc::now();
        dir.record_activity(id, "hello there", at).unwrap();
        dir.record_activity(id, "second", at).unwrap();

        let w = dir.get(id).unwrap();
        assert_eq!(w.unread, 2);
        assert_eq!(w.last_message.as_deref(), Some("second"));

        dir.mark_read(id).unwrap();
        assert_eq!(dir.get(id).unwrap().unread, 0);
    }

    #[test]
    fn list_filters_by_status_and_query() {
        let mut dir = WorkspaceDirectory::new();
        let mut a = ws("Acme Corp");
        a.status = WorkspaceStatus::AtRisk;
        let b = ws("Bolt Agency");
        dir.upsert(a);
        dir.upsert(b);

        let at_risk = dir.list(&WorkspaceFilter {
            status: Some(WorkspaceStatus::AtRisk),
            ..Default::default()
        });
        assert_eq!(at_risk.len(), 1);
        assert_eq!(at_risk[0].name, "Acme Corp");

        let hits = dir.list(&WorkspaceFilter {
            query: Some("bolt".into()),
            ..Default::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Bolt Agency");
    }

    #[test]
    fn pinned_sort_first_within_any_order() {
        let mut dir = WorkspaceDirectory::new();
        let mut a = ws("Alpha");
        a.health = 90;
        let mut b = ws("Beta");
        b.health = 10;
        let mut c = ws("Gamma");
        c.health = 50;
        c.pinned = true;
        dir.upsert(a);
        dir.upsert(b);
        dir.upsert(c);

        let names: Vec<_> = dir
            .list(&WorkspaceFilter {
                sort: WorkspaceSort::Health,
                ..Default::default()
            })
            .iter()
            .map(|w| w.name.clone())
            .collect();
        assert_eq!(names, vec!["Gamma", "Beta", "Alpha"]);
    }

    #[test]
    fn archived_workspaces_leave_the_listing() {
        let mut dir = WorkspaceDirectory::new();
        let w = ws("Old Client");
        let id = w.id;
        dir.upsert(w);
        dir.archive(id).unwrap();
        assert!(dir.list(&WorkspaceFilter::default()).is_empty());
        // The record itself survives.
        assert!(dir.get(id).is_ok());
    }
}
