use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::error::{IngestError, Result};

static CSVNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^trip_data_([0-9]+)\.csv\.zip$").expect("csvnum pattern"));

/// Extract the archive identifier from `trip_data_<n>.csv.zip`.
pub fn path_to_csvnum(path: &Path) -> Result<i64> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    CSVNUM_RE
        .captures(&name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .ok_or(IngestError::ArchiveIdentifier { name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_number_from_the_file_name() {
        assert_eq!(path_to_csvnum(Path::new("trip_data_7.csv.zip")).unwrap(), 7);
        assert_eq!(
            path_to_csvnum(Path::new("/data/nyc/trip_data_12.csv.zip")).unwrap(),
            12
        );
    }

    #[test]
    fn rejects_other_names() {
        for name in [
            "trip_data_.csv.zip",
            "trip_fare_7.csv.zip",
            "trip_data_7.csv",
            "trip_data_7.csv.zip.bak",
            "trip_data_7xcsv.zip",
            "",
        ] {
            let err = path_to_csvnum(Path::new(name)).unwrap_err();
            assert!(
                matches!(err, IngestError::ArchiveIdentifier { .. }),
                "{name}: {err}"
            );
            assert_eq!(err.exit_code(), 3);
        }
    }
}
