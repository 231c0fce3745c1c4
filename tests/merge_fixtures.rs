//! Merge the bundled template against the demo jobs and theme

use std::fs;

use jobcard::batch::{decode_job, parse_jobs};
use jobcard::pipeline::{render_html, render_template_file};
use jobcard::template::Placeholder;
use jobcard::{CreativeConfig, Error, JobRecord};
use sha2::{Digest, Sha256};

const TEMPLATE: &str = "templates/job-card.html";

fn demo_jobs() -> Vec<JobRecord> {
    parse_jobs(&fs::read_to_string("demos/jobs.json").expect("read jobs fixture"))
        .expect("parse jobs")
        .iter()
        .map(|entry| decode_job(entry).expect("decode job"))
        .collect()
}

fn demo_theme() -> CreativeConfig {
    serde_json::from_str(&fs::read_to_string("demos/theme.json").expect("read theme fixture"))
        .expect("parse theme")
}

fn digest(html: &str) -> String {
    hex::encode(Sha256::digest(html.as_bytes()))
}

#[test]
fn no_known_placeholders_survive() {
    let theme = demo_theme();
    for job in demo_jobs() {
        let html = render_template_file(TEMPLATE.as_ref(), &job, &theme).unwrap();
        for p in Placeholder::ALL {
            let compact = format!("{{{{{}}}}}", p.key());
            let spaced = format!("{{{{ {} }}}}", p.key());
            assert!(!html.contains(&compact), "{} left in output", compact);
            assert!(!html.contains(&spaced), "{} left in output", spaced);
        }
    }
}

#[test]
fn first_job_card_content() {
    let jobs = demo_jobs();
    let html = render_template_file(TEMPLATE.as_ref(), &jobs[0], &demo_theme()).unwrap();

    assert!(html.contains("<h1>Senior Rust Engineer</h1>"));
    assert!(html.contains("<span>Berlin, Germany (Remote)</span>"));
    assert!(html.contains("<span>€90,000 - €120,000 per year</span>"));
    assert!(html.contains("width: 1080px; height: 1080px;"));
    assert!(html.contains("font-family: 'Space Grotesk', sans-serif;"));
    assert!(html.contains("family=Space+Grotesk&amp;family=Inter&amp;display=swap"));
    // 25 word limit
    assert!(html.contains("across several teams working...</p>"));
}

#[test]
fn empty_rows_are_dropped() {
    let jobs = demo_jobs();
    let theme = demo_theme();

    // Backend Developer: no date posted, job type defaults
    let html = render_template_file(TEMPLATE.as_ref(), &jobs[1], &theme).unwrap();
    assert!(!html.contains("📅"));
    assert!(html.contains("<span>Not specified</span>"));
    assert!(html.contains("<span>$70,000 - $95,000</span>"));
    assert!(html.contains("<p class=\"description\"></p>"));

    // Data Analyst: remote only, free text salary
    let html = render_template_file(TEMPLATE.as_ref(), &jobs[2], &theme).unwrap();
    assert!(html.contains("<span>Remote</span>"));
    assert!(html.contains("<span>$45/hour</span>"));
    assert!(html.contains("<div class=\"company\">Company Not Specified</div>"));
}

#[test]
fn merge_is_byte_identical_across_runs() {
    let template = fs::read_to_string(TEMPLATE).unwrap();
    let theme = demo_theme();
    for job in demo_jobs() {
        let a = render_html(&template, &job, &theme).unwrap();
        let b = render_html(&template, &job, &theme).unwrap();
        assert_eq!(digest(&a), digest(&b));
    }
}

#[test]
fn invalid_inputs_produce_no_output() {
    let template = fs::read_to_string(TEMPLATE).unwrap();
    let untitled: JobRecord = serde_json::from_str(r#"{"title": "   ", "company": "Acme"}"#).unwrap();
    assert!(matches!(render_html(&template, &untitled, &demo_theme()), Err(Error::Validation(_))));

    let no_height: CreativeConfig = serde_json::from_str(r#"{"canvas": {"width": 500}}"#).unwrap();
    let job = &demo_jobs()[0];
    assert!(matches!(render_html(&template, job, &no_height), Err(Error::Validation(_))));
}
