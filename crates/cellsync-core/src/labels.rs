//! Link label conversion.
//!
//! Expands the simplified [`LinkLabel`] of a link record into a full label
//! descriptor: a background rectangle sized around a text node.

use crate::model::{Attributes, LabelPadding, LinkLabel, MarkupNode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Selector of the label text node.
pub const LABEL_TEXT_SELECTOR: &str = "labelText";

/// Selector of the label background node.
pub const LABEL_BODY_SELECTOR: &str = "labelBody";

const DEFAULT_TEXT_COLOR: &str = "#333333";
const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";
const DEFAULT_FONT_SIZE: f64 = 12.0;
const DEFAULT_DISTANCE: f64 = 0.5;
const DEFAULT_PADDING: LabelPadding = LabelPadding::Axis { x: 4.0, y: 2.0 };

/// Where a label sits along its link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelPosition {
    /// Ratio of the link length within `[0, 1]`, absolute distance otherwise.
    pub distance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

/// Full label descriptor as stored on link cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub position: LabelPosition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markup: Vec<MarkupNode>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attrs: Attributes,
}

impl Label {
    /// Text shown by the label, if any.
    pub fn text(&self) -> Option<&str> {
        self.attrs
            .get(LABEL_TEXT_SELECTOR)
            .and_then(|text| text.get("text"))
            .and_then(Value::as_str)
    }
}

/// Expand one simplified label.
pub fn convert_label(label: &LinkLabel) -> Label {
    let mut text = Attributes::new();
    text.insert("text".to_string(), json!(label.text));
    text.insert(
        "fill".to_string(),
        json!(label.color.as_deref().unwrap_or(DEFAULT_TEXT_COLOR)),
    );
    text.insert(
        "fontSize".to_string(),
        json!(label.font_size.unwrap_or(DEFAULT_FONT_SIZE)),
    );
    if let Some(family) = &label.font_family {
        text.insert("fontFamily".to_string(), json!(family));
    }
    if let Some(class_name) = &label.class_name {
        text.insert("class".to_string(), json!(class_name));
    }
    text.insert("textAnchor".to_string(), json!("middle"));
    text.insert("textVerticalAnchor".to_string(), json!("middle"));

    let (px, py) = label.background_padding.unwrap_or(DEFAULT_PADDING).xy();
    let mut body = Attributes::new();
    body.insert("ref".to_string(), json!(LABEL_TEXT_SELECTOR));
    body.insert(
        "fill".to_string(),
        json!(label.background_color.as_deref().unwrap_or(DEFAULT_BACKGROUND_COLOR)),
    );
    body.insert("x".to_string(), json!(format!("calc(x - {px})")));
    body.insert("y".to_string(), json!(format!("calc(y - {py})")));
    body.insert("width".to_string(), json!(format!("calc(w + {})", px * 2.0)));
    body.insert("height".to_string(), json!(format!("calc(h + {})", py * 2.0)));
    if let Some(stroke) = &label.background_stroke {
        body.insert("stroke".to_string(), json!(stroke));
    }
    if let Some(width) = label.background_stroke_width {
        body.insert("strokeWidth".to_string(), json!(width));
    }
    if let Some(radius) = label.background_border_radius {
        body.insert("rx".to_string(), json!(radius));
        body.insert("ry".to_string(), json!(radius));
    }
    if let Some(opacity) = label.background_opacity {
        body.insert("opacity".to_string(), json!(opacity));
    }
    if let Some(class_name) = &label.background_class_name {
        body.insert("class".to_string(), json!(class_name));
    }

    let mut attrs = Attributes::new();
    attrs.insert(LABEL_TEXT_SELECTOR.to_string(), Value::Object(text));
    attrs.insert(LABEL_BODY_SELECTOR.to_string(), Value::Object(body));

    Label {
        id: label.id.clone(),
        position: LabelPosition {
            distance: label.position.unwrap_or(DEFAULT_DISTANCE),
            offset: None,
        },
        markup: vec![
            MarkupNode::new("rect", LABEL_BODY_SELECTOR),
            MarkupNode::new("text", LABEL_TEXT_SELECTOR),
        ],
        attrs,
    }
}

/// Expand every label of a link. The list is rebuilt as a whole.
pub fn convert_labels(labels: &[LinkLabel]) -> Vec<Label> {
    labels.iter().map(convert_label).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let label = convert_label(&LinkLabel::new("yes"));
        assert_eq!(label.text(), Some("yes"));
        assert_eq!(label.position.distance, 0.5);

        let text = &label.attrs[LABEL_TEXT_SELECTOR];
        assert_eq!(text["fill"], json!(DEFAULT_TEXT_COLOR));
        assert_eq!(text["fontSize"], json!(12.0));
        assert!(text.get("class").is_none());

        let body = &label.attrs[LABEL_BODY_SELECTOR];
        assert_eq!(body["fill"], json!(DEFAULT_BACKGROUND_COLOR));
        assert_eq!(body["x"], json!("calc(x - 4)"));
        assert_eq!(body["height"], json!("calc(h + 4)"));
        assert!(body.get("stroke").is_none());
    }

    #[test]
    fn test_styled_label() {
        let mut simple = LinkLabel::new("no");
        simple.position = Some(40.0);
        simple.color = Some("white".to_string());
        simple.background_color = Some("black".to_string());
        simple.background_padding = Some(LabelPadding::Uniform(6.0));
        simple.background_border_radius = Some(3.0);
        simple.background_opacity = Some(0.5);
        simple.class_name = Some("edge-label".to_string());

        let label = convert_label(&simple);
        assert_eq!(label.position.distance, 40.0);
        assert_eq!(label.attrs[LABEL_TEXT_SELECTOR]["class"], json!("edge-label"));

        let body = &label.attrs[LABEL_BODY_SELECTOR];
        assert_eq!(body["fill"], json!("black"));
        assert_eq!(body["y"], json!("calc(y - 6)"));
        assert_eq!(body["width"], json!("calc(w + 12)"));
        assert_eq!(body["rx"], json!(3.0));
        assert_eq!(body["opacity"], json!(0.5));
    }

    #[test]
    fn test_labels_keep_order() {
        let labels = convert_labels(&[LinkLabel::new("a"), LinkLabel::new("b")]);
        let texts: Vec<_> = labels.iter().filter_map(Label::text).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }
}
