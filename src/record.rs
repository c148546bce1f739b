//! Wire record types
//!
//! These types define the record that measurement modules fill in during an
//! emission pass and the transport ultimately receives as JSON.

use crate::timer::Millis;
use serde::{Deserialize, Serialize};

/// Dwell time reported for one page section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionReport {
    /// Section name
    pub nm: String,
    /// Time spent in milliseconds
    pub ts: Millis,
}

/// One-time environment attributes merged into the first emission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// Browser name (e.g. `chrome`, `firefox`, `bot`)
    pub browser_name: String,
    /// Operating system family, when recognised
    pub os: Option<String>,
    /// `browser` or `bot`
    pub browser_type: String,
    /// Normalised `major.minor.patch` version, when known
    pub browser_version: Option<String>,
    /// Referring page
    pub referrer: Option<String>,
}

/// The outgoing measurement record.
///
/// Modules write their contribution into the record; the scheduler then merges
/// identity and context fields and hands the result to the transport. Absent
/// optional fields are omitted from the JSON rather than sent as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingRecord {
    /// Durable visitor identifier
    pub uuid: String,
    /// Identifier of this emission
    pub request_uuid: String,
    /// Page URL at emission time
    pub url: String,
    /// Engaged time since the previous emission, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<Millis>,
    /// Per-section dwell times for this window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<SectionReport>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl OutgoingRecord {
    /// Merge the one-time environment attributes
    pub fn apply_environment(&mut self, env: EnvironmentSnapshot) {
        self.browser = Some(env.browser_name);
        self.os = env.os;
        self.browser_type = Some(env.browser_type);
        self.browser_version = env.browser_version;
        self.referrer = env.referrer;
    }

    /// Whether the record carries the first-emission enrichment
    pub fn is_enriched(&self) -> bool {
        self.browser.is_some()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_record_omits_optional_fields() {
        let record = OutgoingRecord {
            uuid: "visitor".to_string(),
            request_uuid: "req".to_string(),
            url: "https://example.com/".to_string(),
            ..Default::default()
        };

        let value: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "uuid": "visitor",
                "request_uuid": "req",
                "url": "https://example.com/"
            })
        );
    }

    #[test]
    fn test_sections_present_even_when_empty() {
        let record = OutgoingRecord {
            sections: Some(Vec::new()),
            ..Default::default()
        };

        let value: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(value["sections"], serde_json::json!([]));
        assert!(value.get("ts").is_none());
    }

    #[test]
    fn test_apply_environment() {
        let mut record = OutgoingRecord::default();
        assert!(!record.is_enriched());

        record.apply_environment(EnvironmentSnapshot {
            browser_name: "firefox".to_string(),
            os: Some("Linux".to_string()),
            browser_type: "browser".to_string(),
            browser_version: Some("121.0.0".to_string()),
            referrer: None,
        });

        assert!(record.is_enriched());
        let value: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(value["browser"], "firefox");
        assert_eq!(value["os"], "Linux");
        assert_eq!(value["browser_type"], "browser");
        assert_eq!(value["browser_version"], "121.0.0");
        assert!(value.get("referrer").is_none());
    }
}
