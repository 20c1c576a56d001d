//! Structured tags attached to system messages.
//!
//! A tag is an immutable snapshot of the business action that produced the
//! message.  The authoritative records live in the external campaign and
//! deliverable services; tags exist for display and audit only.

use serde::{Deserialize, Serialize};

/// Tag variants a system message may carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SystemTag {
    Boost(BoostTag),
    Deliverable(DeliverableTag),
}

/// Snapshot of a paid boost (ad campaign) request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoostTag {
    /// Advertising platform, e.g. "facebook".
    pub platform: String,
    /// Budget in whole currency units.
    pub budget: u64,
    /// Requested duration, e.g. "7d".
    pub duration: String,
    /// Campaign goal, e.g. "reach".
    pub goal: String,
    pub status: BoostStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BoostStatus {
    Requested,
    Active,
    Completed,
    Rejected,
}

/// Snapshot of a billable deliverable request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliverableTag {
    pub title: String,
    /// Deliverable type label, e.g. "reel", "static-post".
    pub deliverable_kind: String,
    pub status: DeliverableStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliverableStatus {
    Pending,
    InProgress,
    Delivered,
    Approved,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_json_is_kind_discriminated() {
        let tag = SystemTag::Boost(BoostTag {
            platform: "facebook".into(),
            budget: 50,
            duration: "7d".into(),
            goal: "reach".into(),
            status: BoostStatus::Requested,
        });
        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json["kind"], "boost");
        assert_eq!(json["status"], "requested");
        assert_eq!(json["budget"], 50);

        let back: SystemTag = serde_json::from_value(json).unwrap();
        assert_eq!(back, tag);
    }

    #[test]
    fn deliverable_tag_round_trips() {
        let tag = SystemTag::Deliverable(DeliverableTag {
            title: "August promo reel".into(),
            deliverable_kind: "reel".into(),
            status: DeliverableStatus::Pending,
        });
        let json = serde_json::to_string(&tag).unwrap();
        assert!(json.contains("\"kind\":\"deliverable\""));
        let back: SystemTag = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tag);
    }
}
