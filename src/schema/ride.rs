// src/schema/ride.rs

use super::types::{FieldKind, FieldSpec};
use super::RecordSchema;

pub const RIDE_TABLE: &str = "rides";

/// Columns of a `trip_data_<n>.csv`, in file order.
pub static RIDE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("medallion", FieldKind::Text),
    FieldSpec::new("hack_license", FieldKind::Text),
    FieldSpec::new("vendor_id", FieldKind::Text),
    FieldSpec::new("rate_code", FieldKind::Integer),
    FieldSpec::new("store_and_fwd_flag", FieldKind::Text),
    FieldSpec::new("pickup_datetime", FieldKind::Timestamp),
    FieldSpec::new("dropoff_datetime", FieldKind::Timestamp),
    FieldSpec::new("passenger_count", FieldKind::Integer),
    FieldSpec::new("trip_time_in_secs", FieldKind::Float),
    FieldSpec::new("trip_distance", FieldKind::Float),
    FieldSpec::new("pickup_longitude", FieldKind::Float),
    FieldSpec::new("pickup_latitude", FieldKind::Float),
    FieldSpec::new("dropoff_longitude", FieldKind::Float),
    FieldSpec::new("dropoff_latitude", FieldKind::Float),
];

/// pickup_datetime and dropoff_datetime.
pub const RIDE_TIMESTAMP_COLUMNS: &[usize] = &[5, 6];

pub const RIDE_KEY: &[&str] = &["csvnum", "rownum", "pickup_datetime"];

pub fn ride_schema() -> RecordSchema {
    RecordSchema {
        fields: RIDE_FIELDS,
        key: RIDE_KEY,
        timestamp_columns: RIDE_TIMESTAMP_COLUMNS,
    }
}
