// src/schema/translate.rs

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use super::types::{FieldKind, FieldValue, RawCell};
use super::RecordSchema;

/// Binds the columns of one archive's header to the coercion declared for
/// each field. Built once per run, before the first chunk is reconciled.
#[derive(Debug, Clone)]
pub struct Translator {
    columns: Arc<[String]>,
    kinds: Vec<FieldKind>,
}

/// Why a header cannot be bound to the record schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("column `{0}` has no declared type")]
    UnknownColumn(String),

    #[error("column `{0}` appears more than once")]
    DuplicateColumn(String),

    #[error("field `{0}` is missing from the header")]
    MissingField(&'static str),

    #[error("column {pos} must be a timestamp field, found {found:?}")]
    NotATimestamp { pos: usize, found: Option<String> },
}

/// A cell that could not be converted to its field's declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionFailure {
    pub field: String,
    pub value: String,
    pub kind: FieldKind,
}

impl Translator {
    /// Every header column needs a coercion entry and every declared field
    /// needs a column. Fails on the first mismatch otherwise.
    pub fn new(schema: &RecordSchema, headers: &[String]) -> Result<Self, MappingError> {
        let mut kinds = Vec::with_capacity(headers.len());
        let mut seen = HashSet::with_capacity(headers.len());

        for name in headers {
            let spec = schema
                .field(name)
                .ok_or_else(|| MappingError::UnknownColumn(name.clone()))?;
            if !seen.insert(name.as_str()) {
                return Err(MappingError::DuplicateColumn(name.clone()));
            }
            kinds.push(spec.kind);
        }

        if let Some(missing) = schema.fields.iter().find(|f| !seen.contains(f.name)) {
            return Err(MappingError::MissingField(missing.name));
        }

        for &pos in schema.timestamp_columns {
            match kinds.get(pos) {
                Some(FieldKind::Timestamp) => {}
                _ => {
                    return Err(MappingError::NotATimestamp {
                        pos,
                        found: headers.get(pos).cloned(),
                    })
                }
            }
        }

        Ok(Self {
            columns: headers.iter().cloned().collect(),
            kinds,
        })
    }

    /// Header column names, in file order.
    pub fn columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    /// Coerce one raw row, cell by cell, in column order.
    pub fn coerce_row(&self, row: &[RawCell]) -> Result<Vec<FieldValue>, CoercionFailure> {
        row.iter()
            .zip(self.columns.iter().zip(&self.kinds))
            .map(|(cell, (name, kind))| {
                kind.coerce(cell).ok_or_else(|| CoercionFailure {
                    field: name.clone(),
                    value: cell.display_value(),
                    kind: *kind,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ride::{ride_schema, RIDE_FIELDS};

    fn ride_headers() -> Vec<String> {
        RIDE_FIELDS.iter().map(|f| f.name.to_string()).collect()
    }

    #[test]
    fn accepts_the_ride_header() {
        let tr = Translator::new(&ride_schema(), &ride_headers()).unwrap();
        assert_eq!(tr.columns().len(), RIDE_FIELDS.len());
    }

    #[test]
    fn rejects_unknown_and_missing_columns() {
        let schema = ride_schema();

        let mut extra = ride_headers();
        extra.push("tip_amount".into());
        assert_eq!(
            Translator::new(&schema, &extra).unwrap_err(),
            MappingError::UnknownColumn("tip_amount".into())
        );

        let mut short = ride_headers();
        short.retain(|h| h != "trip_distance");
        assert_eq!(
            Translator::new(&schema, &short).unwrap_err(),
            MappingError::MissingField("trip_distance")
        );

        let mut doubled = ride_headers();
        doubled[1] = "medallion".into();
        assert_eq!(
            Translator::new(&schema, &doubled).unwrap_err(),
            MappingError::DuplicateColumn("medallion".into())
        );
    }

    #[test]
    fn rejects_timestamp_column_out_of_place() {
        let mut headers = ride_headers();
        headers.swap(5, 7);
        let err = Translator::new(&ride_schema(), &headers).unwrap_err();
        assert_eq!(
            err,
            MappingError::NotATimestamp {
                pos: 5,
                found: Some("passenger_count".into())
            }
        );
        assert!(err.to_string().contains("column 5"), "{err}");
    }

    #[test]
    fn coercion_failure_names_the_field() {
        let tr = Translator::new(&ride_schema(), &ride_headers()).unwrap();
        let mut row: Vec<RawCell> = [
            "M", "H", "CMT", "1", "N", "", "", "four", "382", "1.0", "-73.9", "40.7", "-73.9",
            "40.7",
        ]
        .iter()
        .map(|s| RawCell::Text(s.to_string()))
        .collect();
        let ts = chrono::NaiveDate::from_ymd_opt(2013, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        row[5] = RawCell::Timestamp(ts);
        row[6] = RawCell::Timestamp(ts);

        let failure = tr.coerce_row(&row).unwrap_err();
        assert_eq!(failure.field, "passenger_count");
        assert_eq!(failure.value, "four");
        assert_eq!(failure.kind, FieldKind::Integer);

        row[7] = RawCell::Text("4".into());
        let values = tr.coerce_row(&row).unwrap();
        assert_eq!(values[7], FieldValue::Integer(4));
        assert_eq!(values[5], FieldValue::Timestamp(ts));
    }
}
