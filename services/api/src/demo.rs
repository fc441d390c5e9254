use std::path::PathBuf;
use std::sync::Arc;

use admit_match::config::CatalogConfig;
use admit_match::error::AppError;
use admit_match::matching::{
    build_scorer, InMemoryProgramCatalog, MatchingService, MetricKind, Preferences, Program,
    ProgramCatalog, ProgramFilters, ProgramId, RecommendationRequest, RequirementThreshold,
    ScorerBackend, ScoringConfig,
};
use clap::Args;
use serde_json::{Map, Value};

use crate::infra::{load_catalog, InMemoryAssessmentRepository};

#[derive(Args, Debug, Default)]
pub(crate) struct RecommendArgs {
    /// Program catalog CSV export. Defaults to the bundled demo catalog.
    #[arg(long)]
    pub(crate) catalog_csv: Option<PathBuf>,
    /// GPA as entered, e.g. "3.4", "3.4/4.0", or "86/100"
    #[arg(long)]
    pub(crate) gpa: Option<String>,
    /// Explicit GPA scale when the GPA is a bare number on a non-4.0 scale
    #[arg(long)]
    pub(crate) gpa_scale: Option<f64>,
    #[arg(long)]
    pub(crate) ielts: Option<f64>,
    #[arg(long)]
    pub(crate) toefl: Option<f64>,
    #[arg(long)]
    pub(crate) gre: Option<f64>,
    /// Restrict to a country (repeatable)
    #[arg(long = "country")]
    pub(crate) countries: Vec<String>,
    /// Restrict to a discipline (repeatable)
    #[arg(long = "discipline")]
    pub(crate) disciplines: Vec<String>,
    /// Restrict to a degree level (repeatable)
    #[arg(long = "degree-level")]
    pub(crate) degree_levels: Vec<String>,
    /// Preferred region, matched against city and country (repeatable)
    #[arg(long = "region")]
    pub(crate) regions: Vec<String>,
    /// Preferred school (repeatable)
    #[arg(long = "school")]
    pub(crate) schools: Vec<String>,
    /// Number of results to print (1-50)
    #[arg(long)]
    pub(crate) topk: Option<usize>,
    /// Fix the scoring noise seed for reproducible output
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Print the raw JSON payload instead of the text summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct CatalogStatsArgs {
    /// Program catalog CSV export. Defaults to the bundled demo catalog.
    #[arg(long)]
    pub(crate) catalog_csv: Option<PathBuf>,
}

pub(crate) fn run_recommend(args: RecommendArgs) -> Result<(), AppError> {
    let catalog = load_catalog(&CatalogConfig {
        csv_path: args.catalog_csv.clone(),
    })?;
    let scorer = build_scorer(&ScoringConfig {
        backend: ScorerBackend::Heuristic,
        seed: args.seed,
    });
    let service = MatchingService::new(
        Arc::new(catalog),
        Arc::new(InMemoryAssessmentRepository::default()),
        scorer,
    );

    let json = args.json;
    let recommendation = service.recommend(recommend_request(args))?;

    if json {
        match serde_json::to_string_pretty(&recommendation) {
            Ok(payload) => println!("{payload}"),
            Err(err) => println!("Recommendation payload unavailable: {}", err),
        }
        return Ok(());
    }

    let meta = &recommendation.meta;
    println!(
        "Program recommendations ({} of {} candidates)",
        meta.returned, meta.total
    );
    if !meta.relaxed.is_empty() {
        println!("- Filters relaxed to find candidates: {:?}", meta.relaxed);
    }
    if recommendation.results.is_empty() {
        println!("- No programs in the catalog");
        return Ok(());
    }

    for entry in &recommendation.results {
        let marker = if entry.featured { "*" } else { " " };
        println!(
            "{marker}{:>2}. {} - {} ({}, {}) {}% [{:.2}-{:.2}]",
            entry.rank,
            entry.program.title,
            entry.program.university,
            entry.program.city,
            entry.program.country,
            entry.percent,
            entry.explain.low,
            entry.explain.high,
        );
        for risk in &entry.explain.risks {
            println!("      risk: {risk}");
        }
        for improvement in &entry.explain.improvements {
            println!("      next: {improvement}");
        }
    }

    Ok(())
}

pub(crate) fn run_catalog_stats(args: CatalogStatsArgs) -> Result<(), AppError> {
    let catalog = load_catalog(&CatalogConfig {
        csv_path: args.catalog_csv,
    })?;
    let stats = catalog
        .stats()
        .map_err(admit_match::matching::MatchingServiceError::from)?;

    println!("Catalog: {} programs", stats.program_total);
    for (label, counts) in [
        ("Countries", &stats.by_country),
        ("Disciplines", &stats.by_discipline),
        ("Degree levels", &stats.by_degree_level),
        ("Requirement types", &stats.requirement_types),
    ] {
        println!("{label}:");
        for (value, count) in counts {
            println!("  - {value}: {count}");
        }
    }

    Ok(())
}

fn recommend_request(args: RecommendArgs) -> RecommendationRequest {
    let mut features = Map::new();
    if let Some(gpa) = args.gpa {
        features.insert("gpa".to_string(), Value::String(gpa));
    }
    for (key, value) in [
        ("gpa_scale", args.gpa_scale),
        ("ielts", args.ielts),
        ("toefl", args.toefl),
        ("gre", args.gre),
    ] {
        if let Some(number) = value.and_then(serde_json::Number::from_f64) {
            features.insert(key.to_string(), Value::Number(number));
        }
    }

    RecommendationRequest {
        features,
        preferences: Preferences {
            regions: args.regions,
            schools: args.schools,
            ..Preferences::default()
        },
        filters: ProgramFilters {
            country: args.countries,
            discipline: args.disciplines,
            degree_level: args.degree_levels,
        },
        topk: args.topk,
    }
}

fn requirement(metric: MetricKind, min_value: &str, note: Option<&str>) -> RequirementThreshold {
    RequirementThreshold {
        metric,
        min_value: min_value.to_string(),
        note: note.map(str::to_string),
    }
}

struct DemoProgram {
    slug: &'static str,
    title: &'static str,
    university: &'static str,
    country: &'static str,
    city: &'static str,
    discipline: &'static str,
    degree_level: &'static str,
    tuition: Option<&'static str>,
    requirements: Vec<RequirementThreshold>,
}

/// Small fixed catalog used when no CSV export is configured.
pub(crate) fn demo_catalog() -> InMemoryProgramCatalog {
    let programs = vec![
        DemoProgram {
            slug: "ucl-msc-computer-science",
            title: "MSc Computer Science",
            university: "University College London",
            country: "UK",
            city: "London",
            discipline: "Computer Science",
            degree_level: "Master",
            tuition: Some("£39,000"),
            requirements: vec![
                requirement(MetricKind::Gpa, "3.3/4.0", None),
                requirement(MetricKind::Ielts, "7.0", Some("6.5 in each component")),
            ],
        },
        DemoProgram {
            slug: "edinburgh-msc-data-science",
            title: "MSc Data Science",
            university: "University of Edinburgh",
            country: "UK",
            city: "Edinburgh",
            discipline: "Computer Science",
            degree_level: "Master",
            tuition: Some("£37,500"),
            requirements: vec![
                requirement(MetricKind::Gpa, "3.0", None),
                requirement(MetricKind::Ielts, "6.5", None),
            ],
        },
        DemoProgram {
            slug: "lse-msc-finance",
            title: "MSc Finance",
            university: "London School of Economics",
            country: "UK",
            city: "London",
            discipline: "Finance",
            degree_level: "Master",
            tuition: Some("£44,000"),
            requirements: vec![
                requirement(MetricKind::Gpa, "3.5", None),
                requirement(MetricKind::Ielts, "7.0", None),
                requirement(MetricKind::Gre, "320", Some("GMAT accepted")),
            ],
        },
        DemoProgram {
            slug: "tudelft-msc-civil-engineering",
            title: "MSc Civil Engineering",
            university: "Delft University of Technology",
            country: "Netherlands",
            city: "Delft",
            discipline: "Engineering",
            degree_level: "Master",
            tuition: Some("€20,500"),
            requirements: vec![
                requirement(MetricKind::Gpa, "75/100", None),
                requirement(MetricKind::Ielts, "6.5", None),
            ],
        },
        DemoProgram {
            slug: "tum-msc-informatics",
            title: "MSc Informatics",
            university: "Technical University of Munich",
            country: "Germany",
            city: "Munich",
            discipline: "Computer Science",
            degree_level: "Master",
            tuition: None,
            requirements: vec![requirement(MetricKind::Ielts, "6.5", None)],
        },
        DemoProgram {
            slug: "nus-phd-computer-science",
            title: "PhD Computer Science",
            university: "National University of Singapore",
            country: "Singapore",
            city: "Singapore",
            discipline: "Computer Science",
            degree_level: "PhD",
            tuition: None,
            requirements: vec![
                requirement(MetricKind::Gpa, "3.6", None),
                requirement(MetricKind::Gre, "322", None),
                requirement(MetricKind::Toefl, "100", None),
            ],
        },
        DemoProgram {
            slug: "toronto-meng-ece",
            title: "MEng Electrical and Computer Engineering",
            university: "University of Toronto",
            country: "Canada",
            city: "Toronto",
            discipline: "Engineering",
            degree_level: "Master",
            tuition: Some("CAD 62,000"),
            requirements: vec![
                requirement(MetricKind::Gpa, "3.0", None),
                requirement(MetricKind::Toefl, "93", None),
            ],
        },
    ];

    InMemoryProgramCatalog::new(
        programs
            .into_iter()
            .zip(1u64..)
            .map(|(program, id)| Program {
                id: ProgramId(id),
                slug: program.slug.to_string(),
                title: program.title.to_string(),
                university: program.university.to_string(),
                country: program.country.to_string(),
                city: program.city.to_string(),
                discipline: program.discipline.to_string(),
                degree_level: program.degree_level.to_string(),
                tuition: program.tuition.map(str::to_string),
                overview_brief: None,
                requirements: program.requirements,
            })
            .collect(),
    )
}
