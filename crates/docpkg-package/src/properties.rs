//! Package-level properties

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identity string written into every package this tool creates
#[must_use]
pub fn creator() -> String {
    format!("docpkg/{}", env!("CARGO_PKG_VERSION"))
}

/// Properties bag stored alongside the manifest
///
/// `subject` is only set on generated (snapshot/rollback) packages.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PackageProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
}

impl PackageProperties {
    /// Stamp a new generation event: fresh identifier, now, and creator
    ///
    /// The identifier is a UUID v7 and is never reused.
    pub fn stamp(&mut self) {
        self.identifier = Some(Uuid::now_v7());
        self.created = Some(Utc::now());
        self.creator = Some(creator());
    }

    /// Set version
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set subject
    #[inline]
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_assigns_fresh_identifiers() {
        let mut a = PackageProperties::default();
        let mut b = PackageProperties::default();
        a.stamp();
        b.stamp();
        assert!(a.identifier.is_some());
        assert_ne!(a.identifier, b.identifier);
        assert!(a.creator.as_deref().unwrap().starts_with("docpkg/"));
    }

    #[test]
    fn unset_fields_are_omitted() {
        let props = PackageProperties::default().with_version("1.0");
        let json = serde_json::to_value(&props).unwrap();
        assert_eq!(json, serde_json::json!({"version": "1.0"}));
    }
}
