use crate::error::{Error, Result};
use crate::plate::canonicalize;
use crate::types::CanonicalPlate;
use std::collections::HashSet;

/// A parsed reference list. Cells are already stringified; `None` is a
/// missing value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Canonical plates allowed for a session. Never mutated after `build`; a new
/// reference list produces a new registry.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationRegistry {
    members: HashSet<CanonicalPlate>,
}

impl AuthorizationRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the registry from the first column of `table`, skipping
    /// missing cells.
    pub fn build(table: &ReferenceTable) -> Result<Self> {
        if table.columns.is_empty() {
            return Err(Error::invalid_input("reference list has no columns"));
        }
        let members = table
            .rows
            .iter()
            .filter_map(|row| row.first().and_then(Option::as_deref))
            .map(canonicalize)
            .collect();
        Ok(AuthorizationRegistry { members })
    }

    pub fn is_authorized(&self, plate: &CanonicalPlate) -> bool {
        !plate.is_empty() && self.members.contains(plate)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Turns an uploaded document into a `ReferenceTable`.
pub trait ReferenceListLoader {
    fn load(&self, bytes: &[u8]) -> Result<ReferenceTable>;
}

/// Comma-separated values with a header row. Quoted fields may contain commas,
/// newlines and `""` escapes. Empty fields, including `""`, are missing values.
#[derive(Debug, Default)]
pub struct CsvReferenceList;

impl ReferenceListLoader for CsvReferenceList {
    fn load(&self, bytes: &[u8]) -> Result<ReferenceTable> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::invalid_input(format!("reference list is not UTF-8: {}", e)))?;
        let text = text.trim_start_matches('\u{feff}');
        let mut records = parse_records(text)?.into_iter();

        let columns: Vec<String> = match records.next() {
            Some(header) => header.into_iter().map(Option::unwrap_or_default).collect(),
            None => return Err(Error::invalid_input("reference list is empty")),
        };
        let rows = records
            .map(|mut record| {
                if record.len() < columns.len() {
                    record.resize(columns.len(), None);
                }
                record
            })
            .collect();
        Ok(ReferenceTable { columns, rows })
    }
}

fn parse_records(text: &str) -> Result<Vec<Vec<Option<String>>>> {
    let mut records = Vec::new();
    let mut record: Vec<Option<String>> = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() && !quoted => {
                quoted = true;
                in_quotes = true;
            }
            ',' => record.push(finish_field(&mut field, &mut quoted)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(finish_field(&mut field, &mut quoted));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err(Error::invalid_input("reference list has an unterminated quote"));
    }
    if !field.is_empty() || quoted || !record.is_empty() {
        record.push(finish_field(&mut field, &mut quoted));
        push_record(&mut records, record);
    }
    Ok(records)
}

// Empty fields are missing values, quoted or not.
fn finish_field(field: &mut String, quoted: &mut bool) -> Option<String> {
    *quoted = false;
    Some(std::mem::take(field)).filter(|value| !value.is_empty())
}

// Blank lines are skipped, like pandas does.
fn push_record(records: &mut Vec<Vec<Option<String>>>, record: Vec<Option<String>>) {
    if !(record.len() == 1 && record[0].is_none()) {
        records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[Option<&str>]) -> ReferenceTable {
        ReferenceTable {
            columns: vec!["plate".to_string()],
            rows: rows
                .iter()
                .map(|cell| vec![cell.map(str::to_string)])
                .collect(),
        }
    }

    fn plate(text: &str) -> CanonicalPlate {
        canonicalize(text)
    }

    #[test]
    fn build_drops_missing_and_canonicalizes() {
        let registry =
            AuthorizationRegistry::build(&table(&[Some("mh12ab1234"), Some("KA-01-XY-9999"), None]))
                .unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.is_authorized(&plate("MH12AB1234")));
        assert!(registry.is_authorized(&plate("KA01XY9999")));
    }

    #[test]
    fn build_deduplicates_regardless_of_order() {
        let a = AuthorizationRegistry::build(&table(&[Some("ab 12"), Some("AB-12"), Some("cd34")]))
            .unwrap();
        let b = AuthorizationRegistry::build(&table(&[Some("cd34"), Some("ab12")])).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a.members, b.members);
    }

    #[test]
    fn build_uses_first_column_only() {
        let reference = ReferenceTable {
            columns: vec!["plate".to_string(), "owner".to_string()],
            rows: vec![
                vec![Some("MH12AB1234".to_string()), Some("KA01XY9999".to_string())],
                vec![None, Some("DL3CAB1234".to_string())],
            ],
        };
        let registry = AuthorizationRegistry::build(&reference).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_authorized(&plate("KA01XY9999")));
    }

    #[test]
    fn zero_columns_is_invalid() {
        let result = AuthorizationRegistry::build(&ReferenceTable::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn empty_plate_is_never_authorized() {
        let registry = AuthorizationRegistry::build(&table(&[Some("--"), Some("AB12")])).unwrap();
        assert!(registry.members.contains(&CanonicalPlate::default()));
        assert!(!registry.is_authorized(&CanonicalPlate::default()));
        assert!(!AuthorizationRegistry::empty().is_authorized(&CanonicalPlate::default()));
    }

    #[test]
    fn csv_header_is_skipped() {
        let table = CsvReferenceList
            .load(b"license_plate,owner\nmh12ab1234,Asha\nKA-01-XY-9999,Ravi\n")
            .unwrap();
        assert_eq!(table.columns, vec!["license_plate", "owner"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][0].as_deref(), Some("KA-01-XY-9999"));
    }

    #[test]
    fn csv_empty_cells_are_missing() {
        let table = CsvReferenceList
            .load(b"plate,owner\r\n,Asha\r\nMH12AB1234\r\n\r\n\"\",x\r\n")
            .unwrap();
        assert_eq!(
            table.rows,
            vec![
                vec![None, Some("Asha".to_string())],
                vec![Some("MH12AB1234".to_string()), None],
                vec![None, Some("x".to_string())],
            ]
        );
        let registry = AuthorizationRegistry::build(&table).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.is_authorized(&plate("mh 12 ab 1234")));
    }

    #[test]
    fn csv_quoted_fields() {
        let table = CsvReferenceList
            .load("\u{feff}plate\n\"MH 12, AB\"\n\"KA \"\"01\"\"\nXY\"\n".as_bytes())
            .unwrap();
        assert_eq!(table.columns, vec!["plate"]);
        assert_eq!(table.rows[0][0].as_deref(), Some("MH 12, AB"));
        assert_eq!(table.rows[1][0].as_deref(), Some("KA \"01\"\nXY"));
    }

    #[test]
    fn csv_without_trailing_newline() {
        let table = CsvReferenceList.load(b"plate\nAB12").unwrap();
        assert_eq!(table.rows, vec![vec![Some("AB12".to_string())]]);
    }

    #[test]
    fn csv_malformed_input_is_invalid() {
        assert!(matches!(
            CsvReferenceList.load(b""),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            CsvReferenceList.load(b"plate\n\"AB12\n"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            CsvReferenceList.load(&[0xff, 0xfe, 0x00]),
            Err(Error::InvalidInput(_))
        ));
    }
}
