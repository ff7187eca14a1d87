use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub node_fill: String,
    pub node_text_color: String,
    pub node_border: String,
    pub line_color: String,
    pub background: String,
    pub text_fallback_fill: String,
    pub text_fallback_border: String,
    pub text_fallback_color: String,
}

impl Theme {
    pub fn mermaid_default() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 16.0,
            node_fill: "#ECECFF".to_string(),
            node_text_color: "#333333".to_string(),
            node_border: "#9370DB".to_string(),
            line_color: "#333333".to_string(),
            background: "#FFFFFF".to_string(),
            text_fallback_fill: "#FFFFDE".to_string(),
            text_fallback_border: "#AAAA33".to_string(),
            text_fallback_color: "#333333".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            node_fill: "#F8FAFF".to_string(),
            node_text_color: "#1C2430".to_string(),
            node_border: "#A78BFA".to_string(),
            line_color: "#94A3B8".to_string(),
            background: "#FFFFFF".to_string(),
            text_fallback_fill: "#FEFCE8".to_string(),
            text_fallback_border: "#FEF08A".to_string(),
            text_fallback_color: "#854D0E".to_string(),
        }
    }
}
