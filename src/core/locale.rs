//! User-facing labels that depend on the interface language

use serde::{Deserialize, Serialize};

/// Interface language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "zh-CN")]
    SimplifiedChinese,
}

impl Locale {
    /// Shown in place of a timestamp when the document was never saved
    pub fn not_saved_label(self) -> &'static str {
        match self {
            Locale::English => "Not yet saved",
            Locale::SimplifiedChinese => "尚未保存",
        }
    }

    /// Prefix for synthesized custom paper-size names
    pub fn custom_paper_label(self) -> &'static str {
        match self {
            Locale::English => "Custom",
            Locale::SimplifiedChinese => "自定义",
        }
    }

    /// Default footer template with page placeholders
    pub fn default_footer_template(self) -> String {
        let text = match self {
            Locale::English => "Page {{pageNumber}} of {{pageCount}}",
            Locale::SimplifiedChinese => "第 {{pageNumber}} 页 / 共 {{pageCount}} 页",
        };
        format!(r#"<div style="text-align: center">{text}</div>"#)
    }
}
