//! Ingestion port: Trait for the collaborator that prepares grouped records.
//!
//! CSV parsing, table joins and bucketing live behind this boundary; the
//! aggregation core only ever sees opaque records grouped by key.

use crate::domain::{GroupKey, GroupedRecords, Record};

/// Errors that can occur while loading and joining source tables.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed CSV in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("Missing column '{column}' in {path}")]
    MissingColumn { column: String, path: String },

    #[error("No usable rows in {0}")]
    EmptyTable(String),
}

/// A prepared dataset: joined, bucketed records ready for grouping.
///
/// `injuries` carries one record per injury row (with the player join
/// applied where available); `participation` carries one record per player
/// with appearance/goal/assist tallies split around the injury date.
#[derive(Debug, Clone, Default)]
pub struct InjuryDataset {
    /// One record per injury, with derived attributes (severity code,
    /// days injured, age group) merged in.
    pub injuries: Vec<Record>,

    /// One record per injured player, with before/after participation
    /// tallies for the injury year.
    pub participation: Vec<Record>,
}

impl InjuryDataset {
    /// Partition a record set by the textual value of `attr`.
    ///
    /// Records missing the attribute are skipped with a warning; the caller
    /// decides whether an empty grouping is an error.
    #[must_use]
    pub fn group_by(records: &[Record], attr: &str) -> GroupedRecords {
        let mut grouped = GroupedRecords::new();
        let mut skipped = 0usize;

        for record in records {
            match record.label(attr) {
                Some(label) => {
                    grouped
                        .entry(GroupKey::new(label))
                        .or_default()
                        .push(record.clone());
                }
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!("group_by('{attr}'): skipped {skipped} records without the attribute");
        }
        grouped
    }

    /// Injuries partitioned by injury type.
    #[must_use]
    pub fn by_injury_type(&self) -> GroupedRecords {
        Self::group_by(&self.injuries, "injury_type")
    }

    /// Injuries partitioned by severity label.
    #[must_use]
    pub fn by_severity(&self) -> GroupedRecords {
        Self::group_by(&self.injuries, "severity_label")
    }

    /// Injuries partitioned by age group (players without a joined birth
    /// date fall out of this surface).
    #[must_use]
    pub fn by_age_group(&self) -> GroupedRecords {
        Self::group_by(&self.injuries, "age_group")
    }

    /// Participation tallies partitioned by player.
    #[must_use]
    pub fn participation_by_player(&self) -> GroupedRecords {
        Self::group_by(&self.participation, "player_id")
    }
}

/// Trait for the ingestion collaborator.
pub trait RecordSource {
    /// Load and prepare the dataset.
    ///
    /// # Errors
    /// Returns error if a source table cannot be read or is malformed.
    fn load(&self) -> Result<InjuryDataset, IngestError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AttrValue;

    fn record(pairs: &[(&str, AttrValue)]) -> Record {
        let mut r = Record::new();
        for (k, v) in pairs {
            r.set(*k, v.clone());
        }
        r
    }

    #[test]
    fn test_group_by_label() {
        let records = vec![
            record(&[("kind", AttrValue::text("muscle")), ("severity", AttrValue::number(1.0))]),
            record(&[("kind", AttrValue::text("muscle")), ("severity", AttrValue::number(2.0))]),
            record(&[("kind", AttrValue::text("ligament")), ("severity", AttrValue::number(3.0))]),
        ];

        let grouped = InjuryDataset::group_by(&records, "kind");
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&GroupKey::new("muscle")].len(), 2);
        assert_eq!(grouped[&GroupKey::new("ligament")].len(), 1);
    }

    #[test]
    fn test_group_by_skips_missing_attribute() {
        let records = vec![
            record(&[("kind", AttrValue::text("muscle"))]),
            record(&[("severity", AttrValue::number(2.0))]),
        ];

        let grouped = InjuryDataset::group_by(&records, "kind");
        assert_eq!(grouped.len(), 1);
    }
}
