//! Paper size, orientation, margins and header/footer geometry

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::OnceLock;

use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::locale::Locale;

/// CSS reference resolution
pub const CSS_DPI: f64 = 96.0;
const MM_PER_INCH: f64 = 25.4;

/// Convert millimetres to pixels at `dpi`
pub fn mm_to_px(mm: f64, dpi: f64) -> f64 {
    mm / MM_PER_INCH * dpi
}

/// A named paper size in millimetres, width and height given in portrait
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperSize {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub is_portrait: bool,
}

impl PaperSize {
    pub fn new(name: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            is_portrait: true,
        }
    }
}

/// Built-in paper sizes keyed by name
pub fn builtin_paper_sizes() -> BTreeMap<String, PaperSize> {
    [
        PaperSize::new("A4", 210.0, 297.0),
        PaperSize::new("A5", 148.0, 210.0),
        PaperSize::new("B5", 176.0, 250.0),
        PaperSize::new("Letter", 215.9, 279.4),
        PaperSize::new("Legal", 215.9, 355.6),
        PaperSize::new("A3", 297.0, 420.0),
    ]
    .into_iter()
    .map(|size| (size.name.clone(), size))
    .collect()
}

/// Page orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn toggled(self) -> Self {
        match self {
            Orientation::Portrait => Orientation::Landscape,
            Orientation::Landscape => Orientation::Portrait,
        }
    }
}

/// Page margins in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub const fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub const fn uniform(value: f64) -> Self {
        Self::new(value, value, value, value)
    }

    /// Overwrite only the fields present in `update`
    pub fn merge(&mut self, update: MarginsUpdate) {
        if let Some(top) = update.top {
            self.top = top;
        }
        if let Some(right) = update.right {
            self.right = right;
        }
        if let Some(bottom) = update.bottom {
            self.bottom = bottom;
        }
        if let Some(left) = update.left {
            self.left = left;
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        MarginPreset::Normal.margins()
    }
}

/// Partial margin change; `None` keeps the current value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarginsUpdate {
    pub top: Option<f64>,
    pub right: Option<f64>,
    pub bottom: Option<f64>,
    pub left: Option<f64>,
}

/// Fixed margin sets offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginPreset {
    Normal,
    Narrow,
    Wide,
}

impl MarginPreset {
    pub fn margins(self) -> Margins {
        match self {
            MarginPreset::Normal => Margins::new(25.0, 20.0, 25.0, 20.0),
            MarginPreset::Narrow => Margins::uniform(12.7),
            MarginPreset::Wide => Margins::uniform(25.4),
        }
    }
}

impl FromStr for MarginPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(MarginPreset::Normal),
            "narrow" => Ok(MarginPreset::Narrow),
            "wide" => Ok(MarginPreset::Wide),
            other => Err(format!("unknown margin preset: {other}")),
        }
    }
}

/// Header or footer band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSettings {
    pub enabled: bool,
    /// Height in millimetres
    pub height: f64,
    /// Template; may contain `{{pageNumber}}` and `{{pageCount}}`
    pub content: String,
    pub show_on_first_page: bool,
}

impl RegionSettings {
    fn disabled(content: String) -> Self {
        Self {
            enabled: false,
            height: 15.0,
            content,
            show_on_first_page: true,
        }
    }

    /// Overwrite only the fields present in `update`
    pub fn merge(&mut self, update: RegionUpdate) {
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(height) = update.height {
            self.height = height;
        }
        if let Some(content) = update.content {
            self.content = content;
        }
        if let Some(show) = update.show_on_first_page {
            self.show_on_first_page = show;
        }
    }

    /// Height taken from the page body, zero when disabled
    pub fn reserved_height(&self) -> f64 {
        if self.enabled {
            self.height
        } else {
            0.0
        }
    }

    /// Whether the band is drawn on 1-based `page_number`
    pub fn is_shown_on(&self, page_number: usize) -> bool {
        self.enabled && (page_number > 1 || self.show_on_first_page)
    }

    /// Template with page placeholders filled in
    pub fn render(&self, page_number: usize, page_count: usize) -> String {
        render_page_template(&self.content, page_number, page_count)
    }
}

/// Partial header/footer change; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionUpdate {
    pub enabled: Option<bool>,
    pub height: Option<f64>,
    pub content: Option<String>,
    pub show_on_first_page: Option<bool>,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*(pageNumber|pageCount)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Replace `{{pageNumber}}` and `{{pageCount}}` in a header/footer template
pub fn render_page_template(template: &str, page_number: usize, page_count: usize) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures<'_>| match &caps[1] {
            "pageNumber" => page_number.to_string(),
            _ => page_count.to_string(),
        })
        .into_owned()
}

/// Printable body area in millimetres. Either side may be zero or negative
/// when margins and bands exceed the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentDimensions {
    pub width: f64,
    pub height: f64,
}

impl ContentDimensions {
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Paper configuration for the document being edited
#[derive(Debug, Clone, PartialEq)]
pub struct PaperState {
    pub current_paper_size: PaperSize,
    pub orientation: Orientation,
    pub margins: Margins,
    pub header_settings: RegionSettings,
    pub footer_settings: RegionSettings,
    pub custom_paper_sizes: BTreeMap<String, PaperSize>,
    pub is_settings_open: bool,
    locale: Locale,
}

impl Default for PaperState {
    fn default() -> Self {
        Self::new(Locale::default())
    }
}

impl PaperState {
    /// A4 portrait with normal margins and both bands disabled
    pub fn new(locale: Locale) -> Self {
        Self {
            current_paper_size: PaperSize::new("A4", 210.0, 297.0),
            orientation: Orientation::Portrait,
            margins: Margins::default(),
            header_settings: RegionSettings::disabled(String::new()),
            footer_settings: RegionSettings::disabled(locale.default_footer_template()),
            custom_paper_sizes: BTreeMap::new(),
            is_settings_open: false,
            locale,
        }
    }

    /// Page width after orientation
    pub fn effective_width(&self) -> f64 {
        match self.orientation {
            Orientation::Portrait => self.current_paper_size.width,
            Orientation::Landscape => self.current_paper_size.height,
        }
    }

    /// Page height after orientation
    pub fn effective_height(&self) -> f64 {
        match self.orientation {
            Orientation::Portrait => self.current_paper_size.height,
            Orientation::Landscape => self.current_paper_size.width,
        }
    }

    /// Page area left after margins and enabled header/footer
    pub fn content_dimensions(&self) -> ContentDimensions {
        let height = self.effective_height()
            - (self.margins.top + self.margins.bottom)
            - self.header_settings.reserved_height()
            - self.footer_settings.reserved_height();

        ContentDimensions {
            width: self.effective_width() - self.margins.left - self.margins.right,
            height,
        }
    }

    /// Built-in sizes overlaid by custom ones; custom wins on a shared name
    pub fn available_paper_sizes(&self) -> BTreeMap<String, PaperSize> {
        let mut sizes = builtin_paper_sizes();
        sizes.extend(
            self.custom_paper_sizes
                .iter()
                .map(|(name, size)| (name.clone(), size.clone())),
        );
        sizes
    }

    /// Switch to the named size; unknown names are ignored
    pub fn set_paper_size(&mut self, key: &str) {
        match self.available_paper_sizes().remove(key) {
            Some(size) => self.current_paper_size = size,
            None => tracing::debug!("Ignoring unknown paper size: {}", key),
        }
    }

    pub fn toggle_orientation(&mut self) {
        self.orientation = self.orientation.toggled();
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn set_margins(&mut self, update: MarginsUpdate) {
        self.margins.merge(update);
    }

    /// Store a custom size. A blank name becomes `"<label> N"` with N one
    /// past the current number of custom sizes; an existing entry with that
    /// name is replaced.
    pub fn add_custom_paper_size(&mut self, size: PaperSize) -> String {
        let trimmed = size.name.trim();
        let name = if trimmed.is_empty() {
            format!(
                "{} {}",
                self.locale.custom_paper_label(),
                self.custom_paper_sizes.len() + 1
            )
        } else {
            trimmed.to_string()
        };

        tracing::debug!("Adding custom paper size: {}", name);
        self.custom_paper_sizes.insert(
            name.clone(),
            PaperSize {
                name: name.clone(),
                ..size
            },
        );
        name
    }

    pub fn remove_custom_paper_size(&mut self, name: &str) {
        self.custom_paper_sizes.remove(name);
    }

    pub fn update_header_settings(&mut self, update: RegionUpdate) {
        self.header_settings.merge(update);
    }

    pub fn update_footer_settings(&mut self, update: RegionUpdate) {
        self.footer_settings.merge(update);
    }

    pub fn apply_margins_preset(&mut self, preset: MarginPreset) {
        self.margins = preset.margins();
    }

    /// Apply a preset by its tag (`normal`, `narrow`, `wide`); other tags
    /// are ignored
    pub fn apply_margins_preset_named(&mut self, tag: &str) {
        match tag.parse::<MarginPreset>() {
            Ok(preset) => self.apply_margins_preset(preset),
            Err(e) => tracing::debug!("{}", e),
        }
    }

    pub fn set_settings_open(&mut self, open: bool) {
        self.is_settings_open = open;
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }
}
