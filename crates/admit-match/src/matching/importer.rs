use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use super::catalog::InMemoryProgramCatalog;
use super::domain::{MetricKind, Program, ProgramId, RequirementThreshold};

#[derive(Debug)]
pub enum CatalogImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for CatalogImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogImportError::Io(err) => write!(f, "failed to read program catalog: {}", err),
            CatalogImportError::Csv(err) => write!(f, "invalid program catalog CSV: {}", err),
        }
    }
}

impl std::error::Error for CatalogImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogImportError::Io(err) => Some(err),
            CatalogImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for CatalogImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for CatalogImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Loads a program catalog from a CSV export, one program per row, upserting by slug.
///
/// The `requirements` column holds a JSON array of `{req_type, min_value, note}` objects.
/// Rows without a slug are skipped. Rows without an `id` get the next free id.
pub struct ProgramCsvImporter;

impl ProgramCsvImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<InMemoryProgramCatalog, CatalogImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<InMemoryProgramCatalog, CatalogImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut programs: Vec<Program> = Vec::new();
        let mut by_slug: HashMap<String, usize> = HashMap::new();
        let mut skipped = 0usize;

        for record in csv_reader.deserialize::<ProgramRow>() {
            let row = record?;
            let Some(slug) = row.slug.clone() else {
                skipped += 1;
                continue;
            };

            let id = match (row.id, by_slug.get(&slug)) {
                (Some(id), _) => ProgramId(id),
                (None, Some(&index)) => programs[index].id,
                (None, None) => next_free_id(&programs),
            };
            let program = row.into_program(id, slug.clone());

            match by_slug.get(&slug) {
                Some(&index) => programs[index] = program,
                None => {
                    by_slug.insert(slug, programs.len());
                    programs.push(program);
                }
            }
        }

        debug!(programs = programs.len(), skipped, "program catalog imported");
        Ok(InMemoryProgramCatalog::new(programs))
    }
}

fn next_free_id(programs: &[Program]) -> ProgramId {
    ProgramId(programs.iter().map(|program| program.id.0).max().unwrap_or(0) + 1)
}

#[derive(Debug, Deserialize)]
struct ProgramRow {
    #[serde(default, deserialize_with = "empty_string_as_none_u64")]
    id: Option<u64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    slug: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    university: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    discipline: String,
    #[serde(default)]
    degree_level: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    tuition: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    overview_brief: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    requirements: Option<String>,
}

impl ProgramRow {
    fn into_program(self, id: ProgramId, slug: String) -> Program {
        let requirements = self
            .requirements
            .as_deref()
            .map(parse_requirements)
            .unwrap_or_default();

        Program {
            id,
            slug,
            title: self.title,
            university: self.university,
            country: self.country,
            city: self.city,
            discipline: self.discipline,
            degree_level: self.degree_level,
            tuition: self.tuition,
            overview_brief: self.overview_brief,
            requirements,
        }
    }
}

/// Malformed JSON yields no requirements; individual entries without a metric are dropped.
fn parse_requirements(raw: &str) -> Vec<RequirementThreshold> {
    let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(raw) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let metric = entry.get("req_type")?.as_str()?.trim();
            if metric.is_empty() {
                return None;
            }
            let min_value = match entry.get("min_value") {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Number(number)) => number.to_string(),
                _ => String::new(),
            };
            let note = entry
                .get("note")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(RequirementThreshold {
                metric: MetricKind::parse(metric),
                min_value,
                note,
            })
        })
        .collect()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn empty_string_as_none_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match empty_string_as_none(deserializer)? {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
