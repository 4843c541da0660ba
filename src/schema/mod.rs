pub mod ride;
pub mod translate;
pub mod types;

pub use ride::{ride_schema, RIDE_TABLE};
pub use translate::{CoercionFailure, MappingError, Translator};
pub use types::{FieldKind, FieldSpec, FieldValue, RawCell};

/// Column holding the archive identifier.
pub const CSVNUM_COLUMN: &str = "csvnum";
/// Column holding the zero-based row position within the archive.
pub const ROWNUM_COLUMN: &str = "rownum";

/// Static description of the stored record: declared fields in file order,
/// primary key and the CSV positions parsed as timestamps while chunking.
#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    pub fields: &'static [FieldSpec],
    pub key: &'static [&'static str],
    pub timestamp_columns: &'static [usize],
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every stored column: the two engine columns, then the declared fields.
    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        [CSVNUM_COLUMN, ROWNUM_COLUMN]
            .into_iter()
            .chain(self.fields.iter().map(|f| f.name))
    }
}
