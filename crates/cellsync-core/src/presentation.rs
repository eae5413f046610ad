//! Link presentation.
//!
//! Turns a link's presentation fields, with theme fallbacks, into the
//! `line` and `wrapper` rendering attributes. Also owns the pattern
//! definitions that presentation fields may reference by handle.

use crate::model::{Attributes, GraphLink, MarkupNode, Marker};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use uuid::Uuid;

/// Selector of the visible link path.
pub const LINE_SELECTOR: &str = "line";

/// Selector of the wide invisible hit area around the link path.
pub const WRAPPER_SELECTOR: &str = "wrapper";

/// Fallback presentation values for links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkTheme {
    pub color: String,
    pub width: f64,
    pub source_marker: Marker,
    pub target_marker: Marker,
    pub class_name: String,
    pub pattern: String,
    pub line_cap: String,
    pub line_join: String,
    pub wrapper_color: String,
    pub wrapper_buffer: f64,
}

impl Default for LinkTheme {
    fn default() -> Self {
        Self {
            color: "#333333".to_string(),
            width: 2.0,
            source_marker: Marker::none(),
            target_marker: Marker::none(),
            class_name: String::new(),
            pattern: String::new(),
            line_cap: String::new(),
            line_join: String::new(),
            wrapper_color: "transparent".to_string(),
            wrapper_buffer: 4.0,
        }
    }
}

/// Presentation of one link with every theme fallback applied.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkStyle {
    pub color: String,
    pub width: f64,
    pub source_marker: Marker,
    pub target_marker: Marker,
    pub class_name: String,
    pub pattern: String,
    pub line_cap: String,
    pub line_join: String,
    pub wrapper_color: String,
    pub wrapper_buffer: f64,
}

impl LinkStyle {
    pub fn resolve(link: &GraphLink, theme: &LinkTheme) -> Self {
        Self {
            color: link.color.clone().unwrap_or_else(|| theme.color.clone()),
            width: link.width.unwrap_or(theme.width),
            source_marker: link
                .source_marker
                .clone()
                .unwrap_or_else(|| theme.source_marker.clone()),
            target_marker: link
                .target_marker
                .clone()
                .unwrap_or_else(|| theme.target_marker.clone()),
            class_name: link
                .class_name
                .clone()
                .unwrap_or_else(|| theme.class_name.clone()),
            pattern: link.pattern.clone().unwrap_or_else(|| theme.pattern.clone()),
            line_cap: link.line_cap.clone().unwrap_or_else(|| theme.line_cap.clone()),
            line_join: link
                .line_join
                .clone()
                .unwrap_or_else(|| theme.line_join.clone()),
            wrapper_color: link
                .wrapper_color
                .clone()
                .unwrap_or_else(|| theme.wrapper_color.clone()),
            wrapper_buffer: link.wrapper_buffer.unwrap_or(theme.wrapper_buffer),
        }
    }

    /// Rendering attributes: `{ line, wrapper }`.
    pub fn build_attrs(&self) -> Attributes {
        let mut line = Attributes::new();
        line.insert("connection".to_string(), json!(true));
        line.insert("stroke".to_string(), json!(self.color));
        line.insert("strokeWidth".to_string(), json!(self.width));
        line.insert(
            "strokeLinejoin".to_string(),
            json!(non_empty(&self.line_join).unwrap_or("round")),
        );
        if let Some(cap) = non_empty(&self.line_cap) {
            line.insert("strokeLinecap".to_string(), json!(cap));
        }
        if let Some(marker) = resolve_marker(&self.source_marker) {
            line.insert("sourceMarker".to_string(), marker);
        }
        // The standard link draws a target arrowhead unless told otherwise.
        line.insert(
            "targetMarker".to_string(),
            resolve_marker(&self.target_marker).unwrap_or(Value::Null),
        );
        if let Some(class_name) = non_empty(&self.class_name) {
            line.insert("class".to_string(), json!(class_name));
        }
        if let Some(pattern) = non_empty(&self.pattern) {
            line.insert("strokeDasharray".to_string(), json!(pattern));
        }

        let mut wrapper = Attributes::new();
        wrapper.insert("connection".to_string(), json!(true));
        wrapper.insert("stroke".to_string(), json!(self.wrapper_color));
        wrapper.insert(
            "strokeWidth".to_string(),
            json!(self.width + 2.0 * self.wrapper_buffer),
        );
        wrapper.insert("strokeLinejoin".to_string(), json!("round"));

        let mut attrs = Attributes::new();
        attrs.insert(LINE_SELECTOR.to_string(), Value::Object(line));
        attrs.insert(WRAPPER_SELECTOR.to_string(), Value::Object(wrapper));
        attrs
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

/// Marker definition for a preset or custom marker. `none` has no definition.
pub fn resolve_marker(marker: &Marker) -> Option<Value> {
    let name = match marker {
        Marker::Custom(definition) => return Some(Value::Object(definition.clone())),
        Marker::Preset(name) => name.as_str(),
    };
    match name {
        "none" => None,
        "arrow" => Some(json!({ "type": "path", "d": "M 10 -5 0 0 10 5 z" })),
        "arrow-open" => Some(json!({
            "type": "path",
            "d": "M 10 -5 0 0 10 5",
            "fill": "none",
            "strokeWidth": 2,
        })),
        "circle" => Some(json!({ "type": "circle", "r": 4 })),
        "diamond" => Some(json!({ "type": "path", "d": "M 0 0 6 -4 12 0 6 4 z" })),
        "line" => Some(json!({ "type": "path", "d": "M 0 -5 0 5", "strokeWidth": 2 })),
        other => {
            log::warn!("Unknown marker preset `{}`, drawing no marker", other);
            None
        }
    }
}

/// Handle to a defined pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternHandle(Uuid);

impl PatternHandle {
    /// Element id of the pattern definition.
    pub fn id(&self) -> String {
        format!("pattern-{}", self.0)
    }

    /// Paint server reference usable as a `color` value.
    pub fn paint(&self) -> String {
        format!("url(#{})", self.id())
    }
}

/// A pattern tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternDef {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub markup: Vec<MarkupNode>,
}

/// Pattern definitions owned by one renderer.
#[derive(Debug, Default)]
pub struct PatternDefs {
    patterns: HashMap<PatternHandle, PatternDef>,
}

impl PatternDefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_pattern(&mut self, pattern: PatternDef) -> PatternHandle {
        let handle = PatternHandle(Uuid::new_v4());
        self.patterns.insert(handle, pattern);
        handle
    }

    pub fn get(&self, handle: PatternHandle) -> Option<&PatternDef> {
        self.patterns.get(&handle)
    }

    /// Tear down a pattern. Returns its definition if it was still defined.
    pub fn remove(&mut self, handle: PatternHandle) -> Option<PatternDef> {
        self.patterns.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
