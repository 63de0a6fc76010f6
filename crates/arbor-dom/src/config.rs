use std::collections::BTreeSet;

/// Style properties understood out of the box, in the camelCase form
/// components write them in.
const DEFAULT_STYLES: &[&str] = &[
    "alignItems",
    "background",
    "backgroundColor",
    "border",
    "borderRadius",
    "bottom",
    "color",
    "cursor",
    "display",
    "flex",
    "flexDirection",
    "fontSize",
    "fontWeight",
    "gap",
    "height",
    "justifyContent",
    "left",
    "margin",
    "opacity",
    "padding",
    "position",
    "right",
    "textAlign",
    "top",
    "visibility",
    "width",
    "zIndex",
];

/// Configuration for a [`Document`](crate::Document).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentConfig {
    /// Style properties `set_style` accepts. Anything else is reported as
    /// unsupported to the reconciler and never reaches the document.
    pub supported_styles: BTreeSet<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            supported_styles: DEFAULT_STYLES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DocumentConfig {
    pub fn with_style(mut self, property: impl Into<String>) -> Self {
        self.supported_styles.insert(property.into());
        self
    }

    pub fn without_style(mut self, property: &str) -> Self {
        self.supported_styles.remove(property);
        self
    }

    pub fn supports(&self, property: &str) -> bool {
        self.supported_styles.contains(property)
    }
}
