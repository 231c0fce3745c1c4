//! End-to-end renders through headless Chrome

#![cfg(feature = "cdp")]

use jobcard::batch::{decode_job, parse_jobs, BatchRenderer};
use jobcard::{CreativeConfig, RenderConfig, RenderPipeline};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Width and height from the IHDR chunk
fn png_size(png: &[u8]) -> (u32, u32) {
    let w = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
    let h = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
    (w, h)
}

fn theme() -> CreativeConfig {
    serde_json::from_str(&std::fs::read_to_string("demos/theme.json").unwrap()).unwrap()
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn renders_demo_card_at_canvas_size() {
    let jobs = parse_jobs(&std::fs::read_to_string("demos/jobs.json").unwrap()).unwrap();
    let job = decode_job(&jobs[0]).unwrap();
    let pipeline = RenderPipeline::new(jobcard::default_backend(RenderConfig::default()));

    let png = pipeline
        .render("templates/job-card.html".as_ref(), &job, &theme())
        .await
        .expect("render failed");
    pipeline.shutdown().await.unwrap();

    assert!(png.starts_with(PNG_MAGIC));
    assert_eq!(png_size(&png), (1080, 1080));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn batch_writes_one_png_per_job() {
    let jobs = parse_jobs(&std::fs::read_to_string("demos/jobs.json").unwrap()).unwrap();
    let out = tempfile::tempdir().unwrap();
    let pipeline = RenderPipeline::new(jobcard::default_backend(RenderConfig::default()));

    let results = BatchRenderer::new(&pipeline, out.path())
        .render_jobs(&jobs, &theme(), "templates/job-card.html".as_ref())
        .await
        .unwrap();
    pipeline.shutdown().await.unwrap();

    assert_eq!(results.success, jobs.len(), "errors: {:?}", results.errors);
    assert!(out.path().join("job-senior-rust-engineer-ferrous-systems.png").exists());
}
