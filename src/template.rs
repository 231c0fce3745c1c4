//! Template merge engine
//!
//! A template is plain HTML containing `{{ key }}` placeholder tokens. Keys
//! come from a closed set ([`Placeholder`]); merging resolves every known key
//! against a job record and creative config in a single scan of the template.
//! Substituted values are never rescanned, so job text that happens to look
//! like a placeholder is emitted literally.
//!
//! Tokens whose key is not in the closed set are left in the output
//! untouched and reported at debug level.

use std::collections::HashMap;

use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::format::{format_flat_salary, format_location, format_salary, truncate_description};
use crate::model::{non_empty, CreativeConfig, JobRecord, NormalizedJobView, SalaryInfo};
use crate::Result;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("placeholder pattern is valid")
});

// A meta row whose label span came out empty would render as a bare icon.
static EMPTY_META_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<div class="meta-item">\s*<span class="icon">[^<]*</span>\s*<span>\s*</span>\s*</div>"#)
        .expect("meta item pattern is valid")
});

/// Every placeholder key the merge engine resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    // Job fields (from NormalizedJobView)
    Title,
    Company,
    Description,
    Salary,
    LocationFormatted,
    RemoteText,
    JobType,
    DatePosted,

    // Raw structured location
    LocationCity,
    LocationState,
    LocationCountry,

    // Creative styling
    CanvasWidth,
    CanvasHeight,
    CanvasPadding,
    BackgroundColor,
    FontHeading,
    FontBody,
    FontSizeTitle,
    FontSizeMeta,
    ColorText,
    ColorAccent,
}

impl Placeholder {
    pub const ALL: [Placeholder; 21] = [
        Placeholder::Title,
        Placeholder::Company,
        Placeholder::Description,
        Placeholder::Salary,
        Placeholder::LocationFormatted,
        Placeholder::RemoteText,
        Placeholder::JobType,
        Placeholder::DatePosted,
        Placeholder::LocationCity,
        Placeholder::LocationState,
        Placeholder::LocationCountry,
        Placeholder::CanvasWidth,
        Placeholder::CanvasHeight,
        Placeholder::CanvasPadding,
        Placeholder::BackgroundColor,
        Placeholder::FontHeading,
        Placeholder::FontBody,
        Placeholder::FontSizeTitle,
        Placeholder::FontSizeMeta,
        Placeholder::ColorText,
        Placeholder::ColorAccent,
    ];

    /// The key as written inside `{{ }}`
    pub fn key(self) -> &'static str {
        match self {
            Placeholder::Title => "title",
            Placeholder::Company => "company",
            Placeholder::Description => "description",
            Placeholder::Salary => "salary",
            Placeholder::LocationFormatted => "location_formatted",
            Placeholder::RemoteText => "remote_text",
            Placeholder::JobType => "job_type",
            Placeholder::DatePosted => "date_posted",
            Placeholder::LocationCity => "location.city",
            Placeholder::LocationState => "location.state",
            Placeholder::LocationCountry => "location.country",
            Placeholder::CanvasWidth => "canvas_width",
            Placeholder::CanvasHeight => "canvas_height",
            Placeholder::CanvasPadding => "canvas_padding",
            Placeholder::BackgroundColor => "background_color",
            Placeholder::FontHeading => "font_heading",
            Placeholder::FontBody => "font_body",
            Placeholder::FontSizeTitle => "font_size_title",
            Placeholder::FontSizeMeta => "font_size_meta",
            Placeholder::ColorText => "color_text",
            Placeholder::ColorAccent => "color_accent",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    /// Job-derived values are HTML-escaped; styling values are emitted raw
    /// since they usually land inside `<style>`.
    fn is_job_field(self) -> bool {
        !matches!(
            self,
            Placeholder::CanvasWidth
                | Placeholder::CanvasHeight
                | Placeholder::CanvasPadding
                | Placeholder::BackgroundColor
                | Placeholder::FontHeading
                | Placeholder::FontBody
                | Placeholder::FontSizeTitle
                | Placeholder::FontSizeMeta
                | Placeholder::ColorText
                | Placeholder::ColorAccent
        )
    }
}

/// Resolved values for one merge. A key missing from the table stays literal.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    values: HashMap<Placeholder, String>,
}

impl Substitutions {
    pub fn build(view: &NormalizedJobView, job: &JobRecord, creative: &CreativeConfig) -> Self {
        let mut table = Self::default();

        table.set(Placeholder::Title, &view.title);
        table.set(Placeholder::Company, &view.company);
        table.set(Placeholder::Description, &view.description);
        table.set(Placeholder::Salary, &view.salary);
        table.set(Placeholder::LocationFormatted, &view.location_formatted);
        table.set(Placeholder::RemoteText, &view.remote_text);
        table.set(Placeholder::JobType, &view.job_type);
        table.set(Placeholder::DatePosted, &view.date_posted);

        let loc = job.structured_location().cloned().unwrap_or_default();
        table.set(Placeholder::LocationCity, loc.city.as_deref().unwrap_or_default());
        table.set(Placeholder::LocationState, loc.state.as_deref().unwrap_or_default());
        table.set(Placeholder::LocationCountry, loc.country.as_deref().unwrap_or_default());

        if let Some(canvas) = &creative.canvas {
            if let Some(w) = canvas.width {
                table.set(Placeholder::CanvasWidth, &format!("{}px", w));
            }
            if let Some(h) = canvas.height {
                table.set(Placeholder::CanvasHeight, &format!("{}px", h));
            }
            table.set_or(Placeholder::CanvasPadding, canvas.padding.as_deref(), "40px");
            table.set_or(Placeholder::BackgroundColor, canvas.background_color.as_deref(), "#ffffff");
        }

        if let Some(fonts) = &creative.fonts {
            table.set_or(Placeholder::FontHeading, fonts.heading.as_deref(), "Arial");
            table.set_or(Placeholder::FontBody, fonts.body.as_deref(), "Arial");
            if let Some(size) = &fonts.size {
                table.set_or(Placeholder::FontSizeTitle, size.title.as_deref(), "48px");
                table.set_or(Placeholder::FontSizeMeta, size.meta.as_deref(), "24px");
            }
        }

        if let Some(colors) = &creative.colors {
            table.set_or(Placeholder::ColorText, colors.text.as_deref(), "#222222");
            table.set_or(Placeholder::ColorAccent, colors.accent.as_deref(), "#4f46e5");
        }

        table
    }

    fn set(&mut self, key: Placeholder, value: &str) {
        let value = if key.is_job_field() { escape_html(value) } else { value.to_string() };
        self.values.insert(key, value);
    }

    fn set_or(&mut self, key: Placeholder, value: Option<&str>, default: &str) {
        self.set(key, non_empty(value).unwrap_or(default));
    }

    pub fn get(&self, key: Placeholder) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    /// Replace every resolvable token in one pass over `template`.
    pub fn apply(&self, template: &str) -> String {
        let mut unknown: Vec<String> = Vec::new();
        let out = TOKEN.replace_all(template, |caps: &Captures| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let key = caps.get(1).map_or("", |m| m.as_str());
            match Placeholder::from_key(key).and_then(|p| self.get(p)) {
                Some(value) => value.to_string(),
                None => {
                    if Placeholder::from_key(key).is_none() {
                        unknown.push(key.to_string());
                    }
                    whole.to_string()
                }
            }
        });
        if !unknown.is_empty() {
            debug!("leaving unknown placeholders in output: {}", unknown.join(", "));
        }
        out.into_owned()
    }
}

/// Derive the display view for a job.
pub fn normalize(job: &JobRecord, creative: &CreativeConfig) -> NormalizedJobView {
    let salary = match job.salary_info() {
        SalaryInfo::Range(range) => format_salary(range).unwrap_or_default(),
        SalaryInfo::Flat { min, max } => format_flat_salary(min, max).unwrap_or_default(),
        SalaryInfo::Text(text) => text.to_string(),
        SalaryInfo::None => String::new(),
    };

    let mut description = job.description.clone().unwrap_or_default();
    if let Some(limit) = creative.description_word_limit() {
        if !description.is_empty() {
            description = truncate_description(&description, limit);
        }
    }

    let is_remote = job.is_remote.unwrap_or(false);

    NormalizedJobView {
        title: job.title_or_default().to_string(),
        company: job.company_or_default().to_string(),
        description,
        salary,
        location_formatted: format_location(job.location.as_ref(), is_remote),
        remote_text: if is_remote { "Remote".to_string() } else { String::new() },
        job_type: non_empty(job.job_type.as_deref()).unwrap_or("Not specified").to_string(),
        date_posted: job.date_posted.clone().unwrap_or_default(),
    }
}

/// Merge a job into a template.
///
/// Fails with [`crate::Error::Validation`] before touching the template if the
/// job has no title or the creative config lacks canvas dimensions.
pub fn merge(template: &str, job: &JobRecord, creative: &CreativeConfig) -> Result<String> {
    job.validate()?;
    creative.validate()?;

    let view = normalize(job, creative);
    let html = Substitutions::build(&view, job, creative).apply(template);
    Ok(strip_empty_meta_items(&html))
}

/// Remove `meta-item` rows whose label span is empty or whitespace only.
pub fn strip_empty_meta_items(html: &str) -> String {
    EMPTY_META_ITEM.replace_all(html, "").into_owned()
}

/// Keys in `template` that the merge engine will not resolve.
pub fn unknown_placeholders(template: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for caps in TOKEN.captures_iter(template) {
        let Some(key) = caps.get(1).map(|m| m.as_str()) else { continue };
        if Placeholder::from_key(key).is_none() && !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    keys
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
