//! Items evaluated against conditions
//!
//! Profiles, sessions and events expose their fields through a dotted-path
//! property lookup (`properties.pageInfo.pagePath`). Missing levels resolve
//! to `None`, which the property evaluator maps to `missing` semantics.

use crate::types::ParamValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Anything a condition can be evaluated against.
pub trait Item {
    fn item_type(&self) -> &str;
    fn item_id(&self) -> &str;
    /// Dotted-path property lookup.
    fn property(&self, path: &str) -> Option<ParamValue>;
}

/// Walks a dotted path through nested map values.
pub fn nested_property(properties: &HashMap<String, ParamValue>, path: &str) -> Option<ParamValue> {
    match path.split_once('.') {
        Some((head, rest)) => nested_property(properties.get(head)?.as_map()?, rest),
        None => properties.get(path).cloned(),
    }
}

/// A visitor profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub item_id: String,
    #[serde(default)]
    pub properties: HashMap<String, ParamValue>,
    #[serde(default)]
    pub system_properties: HashMap<String, ParamValue>,
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default)]
    pub scores: HashMap<String, f64>,
}

impl Profile {
    pub const ITEM_TYPE: &'static str = "profile";

    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_system_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Self {
        self.system_properties.insert(name.into(), value.into());
        self
    }

    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }
}

impl Item for Profile {
    fn item_type(&self) -> &str {
        Self::ITEM_TYPE
    }

    fn item_id(&self) -> &str {
        &self.item_id
    }

    fn property(&self, path: &str) -> Option<ParamValue> {
        if let Some(rest) = path.strip_prefix("properties.") {
            return nested_property(&self.properties, rest);
        }
        if let Some(rest) = path.strip_prefix("systemProperties.") {
            return nested_property(&self.system_properties, rest);
        }
        if let Some(score) = path.strip_prefix("scores.") {
            return self.scores.get(score).map(|s| ParamValue::Float(*s));
        }
        match path {
            "itemId" => Some(ParamValue::String(self.item_id.clone())),
            "segments" => Some(ParamValue::List(
                self.segments.iter().map(|s| ParamValue::from(s.clone())).collect(),
            )),
            _ => None,
        }
    }
}

/// A visit session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub item_id: String,
    pub profile_id: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub time_stamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub properties: HashMap<String, ParamValue>,
    #[serde(default)]
    pub system_properties: HashMap<String, ParamValue>,
}

impl Session {
    pub const ITEM_TYPE: &'static str = "session";

    pub fn new(item_id: impl Into<String>, profile_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            profile_id: profile_id.into(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

impl Item for Session {
    fn item_type(&self) -> &str {
        Self::ITEM_TYPE
    }

    fn item_id(&self) -> &str {
        &self.item_id
    }

    fn property(&self, path: &str) -> Option<ParamValue> {
        if let Some(rest) = path.strip_prefix("properties.") {
            return nested_property(&self.properties, rest);
        }
        if let Some(rest) = path.strip_prefix("systemProperties.") {
            return nested_property(&self.system_properties, rest);
        }
        match path {
            "itemId" => Some(ParamValue::String(self.item_id.clone())),
            "profileId" => Some(ParamValue::String(self.profile_id.clone())),
            "scope" => self.scope.clone().map(ParamValue::String),
            "timeStamp" => self.time_stamp.map(ParamValue::Date),
            "duration" => Some(ParamValue::Integer(self.duration)),
            _ => None,
        }
    }
}

/// The source an event originated from (page, app screen, campaign, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    pub item_id: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, ParamValue>,
}

/// A collected event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub item_id: String,
    pub event_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub profile_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub time_stamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub properties: HashMap<String, ParamValue>,
    #[serde(default)]
    pub source: Option<EventSource>,
}

impl Event {
    pub const ITEM_TYPE: &'static str = "event";

    pub fn new(
        item_id: impl Into<String>,
        event_type: impl Into<String>,
        profile_id: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            event_type: event_type.into(),
            profile_id: profile_id.into(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = Some(source);
        self
    }
}

impl Item for Event {
    fn item_type(&self) -> &str {
        Self::ITEM_TYPE
    }

    fn item_id(&self) -> &str {
        &self.item_id
    }

    fn property(&self, path: &str) -> Option<ParamValue> {
        if let Some(rest) = path.strip_prefix("properties.") {
            return nested_property(&self.properties, rest);
        }
        if let Some(rest) = path.strip_prefix("source.") {
            let source = self.source.as_ref()?;
            if let Some(nested) = rest.strip_prefix("properties.") {
                return nested_property(&source.properties, nested);
            }
            return match rest {
                "itemId" => Some(ParamValue::String(source.item_id.clone())),
                "path" => source.path.clone().map(ParamValue::String),
                "scope" => source.scope.clone().map(ParamValue::String),
                _ => None,
            };
        }
        match path {
            "itemId" => Some(ParamValue::String(self.item_id.clone())),
            "eventType" => Some(ParamValue::String(self.event_type.clone())),
            "scope" => self.scope.clone().map(ParamValue::String),
            "profileId" => Some(ParamValue::String(self.profile_id.clone())),
            "sessionId" => self.session_id.clone().map(ParamValue::String),
            "timeStamp" => self.time_stamp.map(ParamValue::Date),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_path_lookup() {
        let profile = Profile::new("p1").with_property(
            "pageInfo",
            ParamValue::Map(HashMap::from([(
                "pagePath".to_string(),
                ParamValue::from("/home"),
            )])),
        );
        assert_eq!(
            profile.property("properties.pageInfo.pagePath"),
            Some(ParamValue::from("/home"))
        );
        assert_eq!(profile.property("properties.pageInfo.missing"), None);
        assert_eq!(profile.property("properties.missing.pagePath"), None);
    }

    #[test]
    fn event_exposes_type_and_source() {
        let event = Event::new("e1", "view", "p1").with_source(EventSource {
            item_id: "site".into(),
            path: Some("/landing".into()),
            scope: Some("web".into()),
            properties: HashMap::new(),
        });
        assert_eq!(event.property("eventType"), Some(ParamValue::from("view")));
        assert_eq!(event.property("source.itemId"), Some(ParamValue::from("site")));
        assert_eq!(event.property("source.path"), Some(ParamValue::from("/landing")));
    }
}
