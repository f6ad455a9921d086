//! Data source – reads CSV records into a lazy sequence of [`DataRow`]s.
//!
//! The first record names the fields. In [`SchemaMode::Typed`] the second
//! record declares each field's kind; otherwise kinds come from the header
//! naming convention (`code:qr`) or the explicit QR field list.
//!
//! The sequence is single-pass: every record is read, converted and handed
//! out exactly once.

use std::io::Read;

use crate::dom::Element;
use crate::error::MergeError;
use crate::qr::{encode_qr, QrLevel};

/// How a field's value is placed into the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Text content of `<tspan>` placeholders.
    Text,
    /// QR graphic replacing `<rect>` placeholders.
    Qr,
}

impl FieldKind {
    /// Parse a kind annotation. Accepts the names used by older template
    /// data files (`tspan`, `image`) as well.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "tspan" => Some(FieldKind::Text),
            "qr" | "image" => Some(FieldKind::Qr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaMode {
    /// Field names only; kinds from naming convention or QR field list.
    #[default]
    Implicit,
    /// A second header row declares each field's kind.
    Typed,
}

#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    pub schema: SchemaMode,
    /// Fields rendered as QR codes regardless of the header.
    pub qr_fields: Vec<String>,
    pub qr_level: QrLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Graphic(Element),
}

/// One record, as ordered `(field name, value)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataRow {
    pub fields: Vec<(String, FieldValue)>,
}

impl DataRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.fields
            .push((name.to_string(), FieldValue::Text(value.to_string())));
        self
    }

    pub fn graphic(mut self, name: &str, value: Element) -> Self {
        self.fields
            .push((name.to_string(), FieldValue::Graphic(value)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// CSV-backed data source.
pub struct CsvSource<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    fields: Vec<FieldSpec>,
    qr_level: QrLevel,
}

impl<R: Read> CsvSource<R> {
    /// Read the header row(s) and prepare the record iterator.
    pub fn new(reader: R, options: &SourceOptions) -> Result<Self, MergeError> {
        let mut records = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(false)
            .from_reader(reader)
            .into_records();

        let names = records
            .next()
            .ok_or_else(|| MergeError::MalformedInput("data file has no header row".into()))??;

        let fields = match options.schema {
            SchemaMode::Typed => {
                let kinds = records.next().ok_or_else(|| {
                    MergeError::MalformedInput("data file has no field kind row".into())
                })??;
                typed_fields(&names, &kinds)?
            }
            SchemaMode::Implicit => implicit_fields(&names, &options.qr_fields),
        };

        log::info!(
            "data fields: {}",
            fields
                .iter()
                .map(|f| format!("{} ({:?})", f.name, f.kind))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            records,
            fields,
            qr_level: options.qr_level,
        })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn build_row(&self, record: &csv::StringRecord) -> Result<DataRow, MergeError> {
        let mut row = DataRow::new();
        for (field, raw) in self.fields.iter().zip(record.iter()) {
            row = match field.kind {
                FieldKind::Text => row.text(&field.name, raw),
                FieldKind::Qr => row.graphic(&field.name, encode_qr(raw, self.qr_level)?),
            };
        }
        Ok(row)
    }
}

impl<R: Read> Iterator for CsvSource<R> {
    type Item = Result<DataRow, MergeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };
        Some(self.build_row(&record))
    }
}

fn typed_fields(
    names: &csv::StringRecord,
    kinds: &csv::StringRecord,
) -> Result<Vec<FieldSpec>, MergeError> {
    names
        .iter()
        .zip(kinds.iter())
        .map(|(name, kind)| {
            let kind = FieldKind::parse(kind).ok_or_else(|| {
                MergeError::MalformedInput(format!(
                    "unknown kind '{kind}' for field '{name}' (expected text or qr)"
                ))
            })?;
            Ok(FieldSpec {
                name: name.to_string(),
                kind,
            })
        })
        .collect()
}

fn implicit_fields(names: &csv::StringRecord, qr_fields: &[String]) -> Vec<FieldSpec> {
    names
        .iter()
        .map(|cell| {
            let (name, declared) = match cell.rsplit_once(':') {
                Some((name, suffix)) => match FieldKind::parse(suffix) {
                    Some(kind) => (name, Some(kind)),
                    None => (cell, None),
                },
                None => (cell, None),
            };
            let kind = if qr_fields.iter().any(|q| q == name) {
                FieldKind::Qr
            } else {
                declared.unwrap_or(FieldKind::Text)
            };
            FieldSpec {
                name: name.to_string(),
                kind,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source<'a>(csv: &'a str, options: &SourceOptions) -> CsvSource<&'a [u8]> {
        CsvSource::new(csv.as_bytes(), options).unwrap()
    }

    #[test]
    fn implicit_header_yields_text_rows() {
        let rows: Vec<DataRow> = source(
            "name,city\nAlice,Oslo\nBob,Lima\n",
            &SourceOptions::default(),
        )
        .collect::<Result<_, _>>()
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], DataRow::new().text("name", "Alice").text("city", "Oslo"));
        assert_eq!(rows[1].get("city"), Some(&FieldValue::Text("Lima".into())));
    }

    #[test]
    fn qr_field_list_marks_graphics() {
        let options = SourceOptions {
            qr_fields: vec!["code".into()],
            ..SourceOptions::default()
        };
        let mut src = source("name,code\nAlice,1234\n", &options);
        assert_eq!(src.fields()[1].kind, FieldKind::Qr);
        let row = src.next().unwrap().unwrap();
        assert!(matches!(row.get("code"), Some(FieldValue::Graphic(svg)) if svg.is_svg("svg")));
        assert!(src.next().is_none());
    }

    #[test]
    fn header_suffix_declares_kind() {
        let src = source("name:text,code:qr,time:12\n", &SourceOptions::default());
        let fields = src.fields();
        assert_eq!(fields[0], FieldSpec { name: "name".into(), kind: FieldKind::Text });
        assert_eq!(fields[1], FieldSpec { name: "code".into(), kind: FieldKind::Qr });
        // Unknown suffixes stay part of the name.
        assert_eq!(fields[2], FieldSpec { name: "time:12".into(), kind: FieldKind::Text });
    }

    #[test]
    fn typed_header_row() {
        let options = SourceOptions {
            schema: SchemaMode::Typed,
            ..SourceOptions::default()
        };
        let mut src = source("name,code\ntspan,qr\nAlice,1234\n", &options);
        assert_eq!(src.fields()[0].kind, FieldKind::Text);
        assert_eq!(src.fields()[1].kind, FieldKind::Qr);
        let row = src.next().unwrap().unwrap();
        assert_eq!(row.get("name"), Some(&FieldValue::Text("Alice".into())));
    }

    #[test]
    fn typed_header_rejects_unknown_kind() {
        let options = SourceOptions {
            schema: SchemaMode::Typed,
            ..SourceOptions::default()
        };
        let err = CsvSource::new("name\nbarcode\n".as_bytes(), &options).err().unwrap();
        assert!(matches!(err, MergeError::MalformedInput(msg) if msg.contains("barcode")));
    }

    #[test]
    fn missing_rows_are_malformed() {
        let err = CsvSource::new("".as_bytes(), &SourceOptions::default()).err().unwrap();
        assert!(matches!(err, MergeError::MalformedInput(_)));

        let typed = SourceOptions {
            schema: SchemaMode::Typed,
            ..SourceOptions::default()
        };
        let err = CsvSource::new("name\n".as_bytes(), &typed).err().unwrap();
        assert!(matches!(err, MergeError::MalformedInput(_)));
    }

    #[test]
    fn header_only_yields_no_rows() {
        let mut src = source("name,code\n", &SourceOptions::default());
        assert!(src.next().is_none());
    }

    #[test]
    fn inconsistent_field_count_is_an_error() {
        let mut src = source("name,code\nAlice,1234\nBob\n", &SourceOptions::default());
        assert!(src.next().unwrap().is_ok());
        let err = src.next().unwrap().unwrap_err();
        assert!(matches!(err, MergeError::Csv(_)));
        assert!(err.to_string().starts_with("malformed input"));
    }

    #[test]
    fn quoted_values_are_literal() {
        let mut src = source("name\n\"Smith, Jane \"\"JJ\"\"\"\n", &SourceOptions::default());
        let row = src.next().unwrap().unwrap();
        assert_eq!(row.get("name"), Some(&FieldValue::Text("Smith, Jane \"JJ\"".into())));
    }
}
