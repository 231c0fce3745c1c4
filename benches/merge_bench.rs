use criterion::{criterion_group, criterion_main, Criterion};

// Merge engine benchmarks. Run with:
//    cargo bench --bench merge_bench

fn bench_merge(c: &mut Criterion) {
    use jobcard::pipeline::render_html;
    use jobcard::{CreativeConfig, JobRecord};

    let template = std::fs::read_to_string("templates/job-card.html").expect("template");
    let creative: CreativeConfig =
        serde_json::from_str(&std::fs::read_to_string("demos/theme.json").expect("theme")).expect("parse theme");
    let jobs: Vec<JobRecord> =
        serde_json::from_str(&std::fs::read_to_string("demos/jobs.json").expect("jobs")).expect("parse jobs");

    c.bench_function("merge_job_card", |b| {
        b.iter(|| {
            for job in &jobs {
                render_html(&template, job, &creative).unwrap();
            }
        })
    });
}

fn bench_formatters(c: &mut Criterion) {
    use jobcard::format::{format_salary, slugify, truncate_description};
    use jobcard::model::SalaryRange;

    let range = SalaryRange {
        min_amount: Some(85000.0),
        max_amount: Some(125000.0),
        currency: Some("USD".into()),
        interval: Some("yearly".into()),
    };
    let text = "lorem ipsum dolor sit amet ".repeat(40);

    c.bench_function("format_salary", |b| b.iter(|| format_salary(&range)));
    c.bench_function("truncate_description", |b| b.iter(|| truncate_description(&text, 30)));
    c.bench_function("slugify", |b| b.iter(|| slugify("Senior Staff Engineer, Platform & Infra")));
}

criterion_group!(benches, bench_merge, bench_formatters);
criterion_main!(benches);
