//! Topic grammar under the configured base topic.

use crate::status::Attribute;

const CMD: &str = "cmd";
const GET: &str = "get";

/// Inbound topic namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Cmd,
    Get,
}

impl Namespace {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Cmd => CMD,
            Namespace::Get => GET,
        }
    }
}

/// Builds and parses topics under one base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
}

impl Topics {
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn child(&self, leaf: &str) -> String {
        format!("{}/{leaf}", self.base)
    }

    /// Retained `online`/`offline` marker, also the last-will topic.
    #[must_use]
    pub fn state(&self) -> String {
        self.child("state")
    }

    #[must_use]
    pub fn version(&self) -> String {
        self.child("version")
    }

    #[must_use]
    pub fn edition(&self) -> String {
        self.child("edition")
    }

    #[must_use]
    pub fn disk_total(&self) -> String {
        self.child("disk_total")
    }

    #[must_use]
    pub fn disk_avail(&self) -> String {
        self.child("disk_avail")
    }

    #[must_use]
    pub fn attribute(&self, attribute: Attribute) -> String {
        format!("{}/attribute/{}", self.base, attribute.as_str())
    }

    #[must_use]
    pub fn available_commands(&self) -> String {
        self.child("available_commands")
    }

    #[must_use]
    pub fn available_commands_with_params(&self) -> String {
        self.child("available_commands_with_params")
    }

    #[must_use]
    pub fn available_attributes(&self) -> String {
        self.child("available_attributes")
    }

    #[must_use]
    pub fn card_swiped(&self) -> String {
        self.child("event/card_swiped")
    }

    /// Wildcard filters for both inbound namespaces.
    #[must_use]
    pub fn subscriptions(&self) -> [String; 2] {
        [
            format!("{}/{CMD}/#", self.base),
            format!("{}/{GET}/#", self.base),
        ]
    }

    /// Split `<base>/<cmd|get>/<leaf>` into namespace and lower-cased leaf.
    ///
    /// Anything else, including deeper leaves, yields `None`.
    #[must_use]
    pub fn parse(&self, topic: &str) -> Option<(Namespace, String)> {
        let rest = topic.strip_prefix(&self.base)?.strip_prefix('/')?;
        let (namespace, leaf) = rest.split_once('/')?;

        let namespace = match namespace.to_lowercase().as_str() {
            CMD => Namespace::Cmd,
            GET => Namespace::Get,
            _ => return None,
        };
        if leaf.is_empty() || leaf.contains('/') {
            return None;
        }

        Some((namespace, leaf.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> Topics {
        Topics::new("phoniebox")
    }

    #[test]
    fn test_outbound_topics() {
        let t = topics();
        assert_eq!(t.state(), "phoniebox/state");
        assert_eq!(t.disk_avail(), "phoniebox/disk_avail");
        assert_eq!(t.attribute(Attribute::LastCard), "phoniebox/attribute/last_card");
        assert_eq!(t.card_swiped(), "phoniebox/event/card_swiped");
        assert_eq!(
            t.available_commands_with_params(),
            "phoniebox/available_commands_with_params"
        );
    }

    #[test]
    fn test_trailing_slash_in_base() {
        assert_eq!(Topics::new("box/").state(), "box/state");
    }

    #[test]
    fn test_subscriptions() {
        assert_eq!(
            topics().subscriptions(),
            ["phoniebox/cmd/#".to_string(), "phoniebox/get/#".to_string()]
        );
    }

    #[test]
    fn test_parse_lowercases() {
        assert_eq!(
            topics().parse("phoniebox/CMD/VolumeUp"),
            Some((Namespace::Cmd, "volumeup".to_string()))
        );
        assert_eq!(
            topics().parse("phoniebox/get/State"),
            Some((Namespace::Get, "state".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_foreign_shapes() {
        let t = topics();
        assert_eq!(t.parse("otherbox/cmd/volumeup"), None);
        assert_eq!(t.parse("phonieboxx/cmd/volumeup"), None);
        assert_eq!(t.parse("phoniebox/set/volume"), None);
        assert_eq!(t.parse("phoniebox/cmd"), None);
        assert_eq!(t.parse("phoniebox/cmd/"), None);
        assert_eq!(t.parse("phoniebox/cmd/a/b"), None);
        assert_eq!(t.parse("phoniebox/attribute/state"), None);
    }
}
