// Fixtures shared by the unit tests.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::schema::ride::RIDE_FIELDS;
use crate::schema::FieldValue;
use crate::store::Record;

pub fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tripload=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn ride_columns() -> Vec<String> {
    RIDE_FIELDS.iter().map(|f| f.name.to_string()).collect()
}

fn pickup_at(rownum: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2013, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::seconds(rownum * 7)
}

/// A fully coerced ride record, as the reconciler would build it.
pub fn ride_record(csvnum: i64, rownum: i64) -> Record {
    let pickup = pickup_at(rownum);
    Record {
        csvnum,
        rownum,
        values: vec![
            FieldValue::Text(format!("MED{rownum:06}")),
            FieldValue::Text("BA96DE419E711691B9445D6A6307C170".into()),
            FieldValue::Text("CMT".into()),
            FieldValue::Integer(1),
            FieldValue::Null,
            FieldValue::Timestamp(pickup),
            FieldValue::Timestamp(pickup + Duration::seconds(382)),
            FieldValue::Integer(1 + rownum % 4),
            FieldValue::Float(382.0),
            FieldValue::Float(1.0),
            FieldValue::Float(-73.978165),
            FieldValue::Float(40.757977),
            FieldValue::Float(-73.989838),
            FieldValue::Float(40.751171),
        ],
    }
}

/// CSV body in the upstream layout (note the padded header names), `rows`
/// data lines. `bad_passenger_row` replaces one passenger count with text.
pub fn trip_csv(rows: usize, bad_passenger_row: Option<usize>) -> String {
    let header = RIDE_FIELDS
        .iter()
        .map(|f| f.name)
        .collect::<Vec<_>>()
        .join(", ");
    let mut out = format!("{header}\n");
    for i in 0..rows {
        let pickup = pickup_at(i as i64);
        let dropoff = pickup + Duration::seconds(382);
        let passengers = if bad_passenger_row == Some(i) {
            "four".to_string()
        } else {
            (1 + i % 4).to_string()
        };
        out.push_str(&format!(
            "MED{i:06},BA96DE419E711691B9445D6A6307C170,CMT,1,,{},{},{passengers},382,1.00,-73.978165,40.757977,-73.989838,40.751171\n",
            pickup.format("%Y-%m-%d %H:%M:%S"),
            dropoff.format("%Y-%m-%d %H:%M:%S"),
        ));
    }
    out
}

/// Write a single-entry zip named `name` into `dir` holding `body`.
pub fn write_archive(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file(name.trim_end_matches(".zip"), options)
        .unwrap();
    zip.write_all(body.as_bytes()).unwrap();
    zip.finish().unwrap();
    path
}

/// A trip archive with `rows` data lines.
pub fn write_trip_archive(
    dir: &Path,
    name: &str,
    rows: usize,
    bad_passenger_row: Option<usize>,
) -> PathBuf {
    write_archive(dir, name, &trip_csv(rows, bad_passenger_row))
}
