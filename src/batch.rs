//! Sequential batch driver
//!
//! Renders every job in order, writing one PNG per job into an output
//! directory. A failing job is recorded in the ledger and the run moves on.

use std::path::{Path, PathBuf};

use log::{error, info};
use serde::Deserialize;
use serde_json::Value;

use crate::format::{slugify, truncate_text};
use crate::model::{CreativeConfig, JobRecord, RenderResult};
use crate::{Error, RenderPipeline, Result};

/// Output filename for a job: `job-<slug(title)>-<slug(company)>.png`.
pub fn job_filename(job: &JobRecord) -> String {
    format!(
        "job-{}-{}.png",
        slug_or_untitled(job.title_or_default()),
        slug_or_untitled(job.company_or_default())
    )
}

fn slug_or_untitled(text: &str) -> String {
    let slug = slugify(text);
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Split a jobs document (a JSON array of records or a single record) into
/// raw entries.
///
/// Entries are only decoded by [`BatchRenderer::render_jobs`], one at a
/// time, so a record with a mistyped field fails alone.
pub fn parse_jobs(json: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(json)? {
        Value::Array(items) => Ok(items),
        record @ Value::Object(_) => Ok(vec![record]),
        _ => Err(Error::Validation(
            "Jobs file must contain a job object or an array of job objects".into(),
        )),
    }
}

/// Decode one raw jobs entry.
pub fn decode_job(entry: &Value) -> Result<JobRecord> {
    Ok(JobRecord::deserialize(entry)?)
}

pub struct BatchRenderer<'a> {
    pipeline: &'a RenderPipeline,
    out_dir: PathBuf,
}

impl<'a> BatchRenderer<'a> {
    pub fn new(pipeline: &'a RenderPipeline, out_dir: impl Into<PathBuf>) -> Self {
        Self { pipeline, out_dir: out_dir.into() }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Render `jobs` one after another.
    ///
    /// Only failing to create the output directory aborts the run; every
    /// per-job failure lands in the returned ledger.
    pub async fn render_jobs(
        &self,
        jobs: &[Value],
        creative: &CreativeConfig,
        template_path: &Path,
    ) -> Result<RenderResult> {
        tokio::fs::create_dir_all(&self.out_dir).await?;

        let mut results = RenderResult::new(jobs.len());
        info!("Starting batch render of {} jobs...", jobs.len());

        for (i, entry) in jobs.iter().enumerate() {
            let job = match decode_job(entry) {
                Ok(job) => job,
                Err(e) => {
                    let identity = format!("job #{}", i + 1);
                    error!("Error processing {}: {}", identity, e);
                    results.record_failure(identity, e);
                    continue;
                }
            };
            let identity = job.identity();
            info!(
                "Processing job {}/{}: {}",
                i + 1,
                jobs.len(),
                truncate_text(&identity, 120)
            );

            match self.render_one(&job, creative, template_path).await {
                Ok(path) => {
                    info!("Generated: {}", path.display());
                    results.record_success();
                }
                Err(e) => {
                    error!("Error processing job {}: {}", identity, e);
                    results.record_failure(identity, e);
                }
            }
        }

        Ok(results)
    }

    async fn render_one(
        &self,
        job: &JobRecord,
        creative: &CreativeConfig,
        template_path: &Path,
    ) -> Result<PathBuf> {
        let png = self.pipeline.render(template_path, job, creative).await?;
        let path = self.out_dir.join(job_filename(job));
        write_png(&path, &png).await?;
        Ok(path)
    }
}

/// Write via a `.part` file renamed into place; a failed write leaves
/// nothing at `path`.
async fn write_png(path: &Path, png: &[u8]) -> Result<()> {
    let partial = path.with_extension("png.part");
    let written = match tokio::fs::write(&partial, png).await {
        Ok(()) => tokio::fs::rename(&partial, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filenames_are_slugged() {
        let job: JobRecord =
            serde_json::from_value(json!({ "title": "Sr. Rust Dev", "company": "ACME, Inc." })).unwrap();
        assert_eq!(job_filename(&job), "job-sr-rust-dev-acme-inc.png");

        let job: JobRecord = serde_json::from_value(json!({ "title": "Dev" })).unwrap();
        assert_eq!(job_filename(&job), "job-dev-company-not-specified.png");

        let job: JobRecord = serde_json::from_value(json!({ "title": "開発者" })).unwrap();
        assert_eq!(job_filename(&job), "job-untitled-company-not-specified.png");
    }

    #[test]
    fn parses_array_or_single_object() {
        assert_eq!(parse_jobs(r#"[{"title":"a"},{"title":"b"}]"#).unwrap().len(), 2);
        let single = parse_jobs(r#"{"title":"solo"}"#).unwrap();
        assert_eq!(decode_job(&single[0]).unwrap().title.as_deref(), Some("solo"));
        assert!(parse_jobs("[]").unwrap().is_empty());
        assert!(matches!(parse_jobs("not json"), Err(Error::Json(_))));
        assert!(matches!(parse_jobs("42"), Err(Error::Validation(_))));
    }

    #[test]
    fn mistyped_entry_fails_only_its_own_decode() {
        let entries = parse_jobs(r#"[{"title":"A"},{"title":"B","salary_min":"50000"},{"title":42}]"#).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(decode_job(&entries[0]).is_ok());
        assert!(matches!(decode_job(&entries[1]), Err(Error::Json(_))));
        assert!(matches!(decode_job(&entries[2]), Err(Error::Json(_))));
    }
}
