//! CSV ingestion adapter: Implementation of RecordSource.
//!
//! Reads the three source tables (injuries, players, appearances), maps
//! severity labels to codes, derives ages and injury durations, joins on
//! the player identifier and splits appearances around the injury date.
//! Rows with unparseable key fields are skipped with a warning, mirroring
//! lenient dataframe ingestion; a table yielding zero usable rows is an
//! error.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::domain::{AttrValue, Record};
use crate::ports::{IngestError, InjuryDataset, RecordSource};

const INJURIES_FILE: &str = "injuries.csv";
const PLAYERS_FILE: &str = "players.csv";
const APPEARANCES_FILE: &str = "appearances.csv";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Severity labels recognized in the injuries table.
const SEVERITY_CODES: [(&str, f64); 3] = [("minor", 1.0), ("moderate", 2.0), ("severe", 3.0)];

/// Age bucket for grouping, bins `[18, 25, 30, 35, 40, 50)`.
fn age_group(age: i32) -> Option<&'static str> {
    match age {
        18..=24 => Some("18-24"),
        25..=29 => Some("25-29"),
        30..=34 => Some("30-34"),
        35..=39 => Some("35-39"),
        40..=49 => Some("40+"),
        _ => None,
    }
}

fn severity_code(label: &str) -> Option<f64> {
    SEVERITY_CODES
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, code)| *code)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

#[derive(Debug, Deserialize)]
struct InjuryRow {
    player_id: String,
    injury_type: String,
    severity: String,
    #[serde(default)]
    injury_date: Option<String>,
    #[serde(default)]
    actual_recovery_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayerRow {
    player_id: String,
    #[serde(default)]
    date_of_birth: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppearanceRow {
    player_id: String,
    date: String,
    #[serde(default)]
    goals: Option<f64>,
    #[serde(default)]
    assists: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct ParticipationTally {
    appearances_before: f64,
    appearances_after: f64,
    goals_before: f64,
    goals_after: f64,
    assists_before: f64,
    assists_after: f64,
}

/// CSV-backed record source.
pub struct CsvRecordSource {
    data_dir: PathBuf,
    reference_year: i32,
}

impl CsvRecordSource {
    /// Create a source reading from `data_dir`, computing ages against the
    /// current year.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            reference_year: chrono::Utc::now().year(),
        }
    }

    /// Pin the year ages are computed against (for reproducible runs).
    #[must_use]
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    fn open(&self, file: &str) -> Result<(PathBuf, csv::Reader<File>), IngestError> {
        let path = self.data_dir.join(file);
        let handle = File::open(&path).map_err(|source| IngestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(handle);
        Ok((path, reader))
    }

    fn require_columns(
        reader: &mut csv::Reader<File>,
        path: &Path,
        required: &[&str],
    ) -> Result<(), IngestError> {
        let headers = reader.headers().map_err(|source| IngestError::Csv {
            path: path.display().to_string(),
            source,
        })?;
        for column in required {
            if !headers.iter().any(|h| h == *column) {
                return Err(IngestError::MissingColumn {
                    column: (*column).to_string(),
                    path: path.display().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Deserialize all rows of one table, skipping malformed rows.
    fn read_rows<T: for<'de> Deserialize<'de>>(
        &self,
        file: &str,
        required: &[&str],
    ) -> Result<Vec<T>, IngestError> {
        let (path, mut reader) = self.open(file)?;
        Self::require_columns(&mut reader, &path, required)?;

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for row in reader.deserialize::<T>() {
            match row {
                Ok(row) => rows.push(row),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!("{file}: skipped {skipped} malformed rows");
        }
        if rows.is_empty() {
            return Err(IngestError::EmptyTable(path.display().to_string()));
        }
        Ok(rows)
    }

    fn build_injuries(
        &self,
        rows: &[InjuryRow],
        birth_years: &HashMap<String, i32>,
    ) -> (Vec<Record>, HashMap<String, NaiveDate>) {
        let mut records = Vec::with_capacity(rows.len());
        let mut first_injury: HashMap<String, NaiveDate> = HashMap::new();
        let mut unknown_severities = 0usize;

        for row in rows {
            let mut record = Record::new();
            record
                .set("player_id", AttrValue::text(row.player_id.as_str()))
                .set("injury_type", AttrValue::text(row.injury_type.as_str()));

            let label = row.severity.to_lowercase();
            match severity_code(&label) {
                Some(code) => {
                    record.set("severity", AttrValue::number(code));
                }
                None => unknown_severities += 1,
            }
            record.set("severity_label", AttrValue::text(label));

            let injury_date = row.injury_date.as_deref().and_then(parse_date);
            let recovery_date = row.actual_recovery_date.as_deref().and_then(parse_date);
            if let (Some(injured), Some(recovered)) = (injury_date, recovery_date) {
                let days = (recovered - injured).num_days();
                record.set("days_injured", AttrValue::number(days as f64));
            }

            if let Some(birth_year) = birth_years.get(&row.player_id) {
                let age = self.reference_year - birth_year;
                record.set("age", AttrValue::number(f64::from(age)));
                if let Some(bucket) = age_group(age) {
                    record.set("age_group", AttrValue::text(bucket));
                }
            }

            if let Some(injured) = injury_date {
                first_injury
                    .entry(row.player_id.clone())
                    .and_modify(|d| {
                        if injured < *d {
                            *d = injured;
                        }
                    })
                    .or_insert(injured);
            }

            records.push(record);
        }

        if unknown_severities > 0 {
            tracing::warn!(
                "{INJURIES_FILE}: {unknown_severities} rows with unrecognized severity labels"
            );
        }
        (records, first_injury)
    }

    /// Split each player's appearances in the injury year into before/after
    /// the (first) injury date and tally goals and assists on both sides.
    fn build_participation(
        rows: &[AppearanceRow],
        first_injury: &HashMap<String, NaiveDate>,
    ) -> Vec<Record> {
        let mut tallies: BTreeMap<String, ParticipationTally> = BTreeMap::new();

        for row in rows {
            let Some(date) = parse_date(&row.date) else {
                continue;
            };
            let Some(injured) = first_injury.get(&row.player_id) else {
                continue;
            };
            if date.year() != injured.year() {
                continue;
            }

            let tally = tallies.entry(row.player_id.clone()).or_default();
            let goals = row.goals.unwrap_or(0.0);
            let assists = row.assists.unwrap_or(0.0);
            if date < *injured {
                tally.appearances_before += 1.0;
                tally.goals_before += goals;
                tally.assists_before += assists;
            } else {
                tally.appearances_after += 1.0;
                tally.goals_after += goals;
                tally.assists_after += assists;
            }
        }

        tallies
            .into_iter()
            .map(|(player_id, tally)| {
                let mut record = Record::new();
                record
                    .set("player_id", AttrValue::text(player_id))
                    .set(
                        "appearances_before",
                        AttrValue::number(tally.appearances_before),
                    )
                    .set(
                        "appearances_after",
                        AttrValue::number(tally.appearances_after),
                    )
                    .set("goals_before", AttrValue::number(tally.goals_before))
                    .set("goals_after", AttrValue::number(tally.goals_after))
                    .set("assists_before", AttrValue::number(tally.assists_before))
                    .set("assists_after", AttrValue::number(tally.assists_after));
                record
            })
            .collect()
    }
}

impl RecordSource for CsvRecordSource {
    fn load(&self) -> Result<InjuryDataset, IngestError> {
        let injury_rows: Vec<InjuryRow> = self.read_rows(
            INJURIES_FILE,
            &["player_id", "injury_type", "severity", "injury_date"],
        )?;
        let player_rows: Vec<PlayerRow> =
            self.read_rows(PLAYERS_FILE, &["player_id", "date_of_birth"])?;
        let appearance_rows: Vec<AppearanceRow> =
            self.read_rows(APPEARANCES_FILE, &["player_id", "date"])?;

        let birth_years: HashMap<String, i32> = player_rows
            .iter()
            .filter_map(|row| {
                let born = row.date_of_birth.as_deref().and_then(parse_date)?;
                Some((row.player_id.clone(), born.year()))
            })
            .collect();

        let (injuries, first_injury) = self.build_injuries(&injury_rows, &birth_years);
        let participation = Self::build_participation(&appearance_rows, &first_injury);

        tracing::info!(
            "Loaded {} injuries, {} players, {} appearance rows ({} injured players with same-year appearances)",
            injuries.len(),
            player_rows.len(),
            appearance_rows.len(),
            participation.len()
        );

        Ok(InjuryDataset {
            injuries,
            participation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GroupKey;
    use std::io::Write;

    fn write_fixture(dir: &Path, name: &str, content: &str) {
        let mut file = File::create(dir.join(name)).expect("Should create fixture");
        file.write_all(content.as_bytes()).expect("Should write");
    }

    fn fixture_source() -> (tempfile::TempDir, CsvRecordSource) {
        let dir = tempfile::tempdir().expect("Should create tempdir");
        write_fixture(
            dir.path(),
            INJURIES_FILE,
            "player_id,injury_type,severity,injury_date,actual_recovery_date\n\
             p1,hamstring,minor,2023-03-10,2023-03-24\n\
             p1,hamstring,severe,2023-08-01,2023-09-01\n\
             p2,knee,moderate,2023-05-01,2023-05-31\n\
             p3,knee,critical,2023-06-01,\n",
        );
        write_fixture(
            dir.path(),
            PLAYERS_FILE,
            "player_id,date_of_birth\n\
             p1,1995-02-14\n\
             p2,1983-07-01\n",
        );
        write_fixture(
            dir.path(),
            APPEARANCES_FILE,
            "player_id,date,goals,assists\n\
             p1,2023-03-01,1,0\n\
             p1,2023-03-20,0,1\n\
             p1,2024-01-05,2,0\n\
             p2,2023-04-20,1,2\n\
             p2,2023-06-10,0,0\n\
             p3,2023-06-15,1,1\n",
        );
        let source = CsvRecordSource::new(dir.path()).with_reference_year(2024);
        (dir, source)
    }

    #[test]
    fn test_severity_mapping_and_duration() {
        let (_dir, source) = fixture_source();
        let dataset = source.load().expect("Should load");

        assert_eq!(dataset.injuries.len(), 4);
        let first = &dataset.injuries[0];
        assert_eq!(first.number("severity"), Some(1.0));
        assert_eq!(first.label("severity_label").as_deref(), Some("minor"));
        assert_eq!(first.number("days_injured"), Some(14.0));

        // Unknown label keeps the text but gets no code.
        let unknown = &dataset.injuries[3];
        assert_eq!(unknown.number("severity"), None);
        assert_eq!(unknown.label("severity_label").as_deref(), Some("critical"));
        assert_eq!(unknown.number("days_injured"), None);
    }

    #[test]
    fn test_age_buckets_from_join() {
        let (_dir, source) = fixture_source();
        let dataset = source.load().expect("Should load");

        let by_age = dataset.by_age_group();
        assert!(by_age.contains_key(&GroupKey::new("25-29"))); // p1, born 1995
        assert!(by_age.contains_key(&GroupKey::new("40+"))); // p2, born 1983

        // p3 has no players row, so no age bucket.
        let bucketed: usize = by_age.values().map(Vec::len).sum();
        assert_eq!(bucketed, 3);
    }

    #[test]
    fn test_participation_split() {
        let (_dir, source) = fixture_source();
        let dataset = source.load().expect("Should load");

        assert_eq!(dataset.participation.len(), 3);
        let p1 = dataset
            .participation
            .iter()
            .find(|r| r.label("player_id").as_deref() == Some("p1"))
            .expect("p1 present");

        // First injury 2023-03-10; the 2024 appearance is outside the year.
        assert_eq!(p1.number("appearances_before"), Some(1.0));
        assert_eq!(p1.number("appearances_after"), Some(1.0));
        assert_eq!(p1.number("goals_before"), Some(1.0));
        assert_eq!(p1.number("assists_after"), Some(1.0));

        let p3 = dataset
            .participation
            .iter()
            .find(|r| r.label("player_id").as_deref() == Some("p3"))
            .expect("p3 present");
        assert_eq!(p3.number("appearances_before"), Some(0.0));
        assert_eq!(p3.number("appearances_after"), Some(1.0));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let dir = tempfile::tempdir().expect("Should create tempdir");
        write_fixture(
            dir.path(),
            INJURIES_FILE,
            "player_id,injury_type,injury_date\np1,knee,2023-01-01\n",
        );
        write_fixture(dir.path(), PLAYERS_FILE, "player_id,date_of_birth\np1,1990-01-01\n");
        write_fixture(dir.path(), APPEARANCES_FILE, "player_id,date\np1,2023-02-01\n");

        let source = CsvRecordSource::new(dir.path());
        match source.load() {
            Err(IngestError::MissingColumn { column, .. }) => assert_eq!(column, "severity"),
            other => panic!("Expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_table_is_reported() {
        let dir = tempfile::tempdir().expect("Should create tempdir");
        write_fixture(
            dir.path(),
            INJURIES_FILE,
            "player_id,injury_type,severity,injury_date,actual_recovery_date\n",
        );
        write_fixture(dir.path(), PLAYERS_FILE, "player_id,date_of_birth\np1,1990-01-01\n");
        write_fixture(dir.path(), APPEARANCES_FILE, "player_id,date\np1,2023-02-01\n");

        let source = CsvRecordSource::new(dir.path());
        assert!(matches!(source.load(), Err(IngestError::EmptyTable(_))));
    }
}
