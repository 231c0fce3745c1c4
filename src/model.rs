//! Job records, creative configuration and the derived per-render view

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result, Viewport};

/// A single job listing as supplied by the caller.
///
/// Every field is optional at the serde level so that a record without a
/// title still parses and can be rejected by [`JobRecord::validate`] with a
/// descriptive message instead of a JSON error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: Option<String>,
    pub company: Option<String>,
    pub description: Option<String>,
    pub location: Option<Location>,
    pub is_remote: Option<bool>,
    pub job_type: Option<String>,
    pub date_posted: Option<String>,

    /// Nested salary range (highest priority salary shape)
    pub job_function: Option<SalaryRange>,
    /// Flat salary bounds
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    /// Pre-formatted salary text (lowest priority)
    pub salary: Option<String>,
}

/// Location is either free text or a structured city/state/country record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Text(String),
    Structured(StructuredLocation),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredLocation {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// Salary range with currency and pay interval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub currency: Option<String>,
    pub interval: Option<String>,
}

/// The salary shape a job record resolves to, checked in priority order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SalaryInfo<'a> {
    /// `job_function` record
    Range(&'a SalaryRange),
    /// `salary_min` / `salary_max`
    Flat { min: Option<f64>, max: Option<f64> },
    /// Free-text `salary`
    Text(&'a str),
    None,
}

impl JobRecord {
    pub const UNTITLED: &'static str = "Untitled Position";
    pub const NO_COMPANY: &'static str = "Company Not Specified";

    /// Reject records without a usable title.
    pub fn validate(&self) -> Result<()> {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => Ok(()),
            _ => Err(Error::Validation("Job title is required".into())),
        }
    }

    pub fn title_or_default(&self) -> &str {
        non_empty(self.title.as_deref()).unwrap_or(Self::UNTITLED)
    }

    pub fn company_or_default(&self) -> &str {
        non_empty(self.company.as_deref()).unwrap_or(Self::NO_COMPANY)
    }

    /// Human readable identity used in logs and the batch ledger.
    pub fn identity(&self) -> String {
        format!("{} at {}", self.title_or_default(), self.company_or_default())
    }

    /// Resolve which salary shape this record carries.
    ///
    /// A zero amount is treated the same as an absent one.
    pub fn salary_info(&self) -> SalaryInfo<'_> {
        if let Some(range) = &self.job_function {
            return SalaryInfo::Range(range);
        }
        let min = positive(self.salary_min);
        let max = positive(self.salary_max);
        if min.is_some() || max.is_some() {
            return SalaryInfo::Flat { min, max };
        }
        match non_empty(self.salary.as_deref()) {
            Some(text) => SalaryInfo::Text(text),
            None => SalaryInfo::None,
        }
    }

    /// Structured location sub-fields, if the location is structured.
    pub fn structured_location(&self) -> Option<&StructuredLocation> {
        match &self.location {
            Some(Location::Structured(loc)) => Some(loc),
            _ => None,
        }
    }
}

/// Styling parameters controlling the visual output of a card
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreativeConfig {
    pub canvas: Option<Canvas>,
    pub fonts: Option<Fonts>,
    pub colors: Option<Colors>,
    pub elements: Option<Elements>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Canvas {
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "css_value")]
    pub padding: Option<String>,
    #[serde(rename = "backgroundColor", alias = "background_color")]
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fonts {
    pub heading: Option<String>,
    pub body: Option<String>,
    pub size: Option<FontSizes>,
    /// Any other font slots a theme declares (e.g. `accent`)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FontSizes {
    #[serde(default, deserialize_with = "css_value")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "css_value")]
    pub meta: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Colors {
    pub text: Option<String>,
    pub accent: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Elements {
    #[serde(default)]
    pub truncate_description: bool,
    pub max_description_words: Option<usize>,
}

impl CreativeConfig {
    /// Canvas width and height must both be present and positive.
    pub fn validate(&self) -> Result<()> {
        self.viewport().map(|_| ())
    }

    pub fn viewport(&self) -> Result<Viewport> {
        let canvas = self.canvas.as_ref();
        match (canvas.and_then(|c| c.width), canvas.and_then(|c| c.height)) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Ok(Viewport { width, height }),
            _ => Err(Error::Validation(
                "Creative config must include canvas width and height".into(),
            )),
        }
    }

    /// Word limit for descriptions, or `None` when truncation is off.
    pub fn description_word_limit(&self) -> Option<usize> {
        self.elements
            .as_ref()
            .filter(|e| e.truncate_description)
            .map(|e| e.max_description_words.filter(|n| *n > 0).unwrap_or(30))
    }
}

/// Resolved display values for one render. Built fresh per call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedJobView {
    pub title: String,
    pub company: String,
    pub description: String,
    pub salary: String,
    pub location_formatted: String,
    pub remote_text: String,
    pub job_type: String,
    pub date_posted: String,
}

/// One failed job in a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFailure {
    pub job: String,
    pub error: String,
}

/// Ledger accumulated across a batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderResult {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<RenderFailure>,
}

impl RenderResult {
    pub fn new(total: usize) -> Self {
        Self { total, ..Default::default() }
    }

    pub fn record_success(&mut self) {
        self.success += 1;
    }

    pub fn record_failure(&mut self, job: impl Into<String>, error: impl ToString) {
        self.failed += 1;
        self.errors.push(RenderFailure { job: job.into(), error: error.to_string() });
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

pub(crate) fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|n| *n != 0.0 && n.is_finite())
}

/// Accept CSS lengths written either as strings (`"40px"`) or bare numbers.
fn css_value<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}
