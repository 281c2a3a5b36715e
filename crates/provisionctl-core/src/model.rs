//! Wire-level types shared by the transport, the waiters and the dispatcher

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cloud provider and region pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub provider: String,
    pub region: String,
}

impl Region {
    pub fn new(provider: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.region)
    }
}

/// The organization/project/region triple scoping almost every request
///
/// Immutable once resolved. Construct it through
/// [`LocationDefaults::resolve`](crate::dispatcher::LocationDefaults::resolve)
/// when part of it comes from provider-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(rename = "organizationID")]
    pub organization_id: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
    pub region: Region,
}

impl Location {
    pub fn new(
        organization_id: impl Into<String>,
        project_id: impl Into<String>,
        region: Region,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            project_id: project_id.into(),
            region,
        }
    }

    /// Unescaped URL path segments for resources scoped to this location
    pub fn segments(&self) -> [&str; 8] {
        [
            "organizations",
            &self.organization_id,
            "projects",
            &self.project_id,
            "providers",
            &self.region.provider,
            "regions",
            &self.region.region,
        ]
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.organization_id, self.project_id, self.region
        )
    }
}

/// Lifecycle state of a backend operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationState {
    Running,
    Done,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationState::Running => write!(f, "RUNNING"),
            OperationState::Done => write!(f, "DONE"),
        }
    }
}

/// Error payload attached to a finished operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    pub code: i32,
    pub message: String,
}

/// A backend-tracked handle for an in-progress asynchronous mutation
///
/// The client never creates or destroys operations; it only observes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub state: OperationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationStatus>,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.state == OperationState::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_decodes_backend_payload() {
        let raw = r#"{"id":"op-1","state":"DONE","error":{"code":9,"message":"quota exceeded"}}"#;
        let op: Operation = serde_json::from_str(raw).unwrap();

        assert!(op.is_done());
        assert_eq!(
            op.error,
            Some(OperationStatus {
                code: 9,
                message: "quota exceeded".to_string()
            })
        );
    }

    #[test]
    fn test_operation_without_error_field() {
        let op: Operation = serde_json::from_str(r#"{"id":"op-2","state":"RUNNING"}"#).unwrap();
        assert_eq!(op.state, OperationState::Running);
        assert!(op.error.is_none());
    }

    #[test]
    fn test_unknown_operation_state_is_rejected() {
        let result = serde_json::from_str::<Operation>(r#"{"id":"op-3","state":"PAUSED"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_location_segments_and_display() {
        let location = Location::new("org-1", "proj-1", Region::new("aws", "us-east-1"));
        assert_eq!(
            location.segments().join("/"),
            "organizations/org-1/projects/proj-1/providers/aws/regions/us-east-1"
        );
        assert_eq!(location.to_string(), "org-1/proj-1@aws/us-east-1");
    }
}
