// src/schema.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record layout shared by the generator and every reader
//!
//! Files carry no header row, so the column list is always supplied
//! explicitly as a [`Schema`] value.

use std::io::Write;

use chrono::NaiveDateTime;

use crate::catalog::Category;
use crate::constants::TIMESTAMP_FORMAT;
use crate::error::{Error, Result};

/// Identifier type; the universe is `[0, max_id)`
pub type RecordId = u32;

/// Positional column list with the roles readers need
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    id_index: usize,
    category_index: usize,
}

impl Schema {
    /// Build a schema, resolving the id and category columns by name
    pub fn new<I, S>(columns: I, id_column: &str, category_column: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(Error::InvalidConfig(format!("duplicate column name '{name}'")));
            }
        }
        let find = |name: &str| {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| Error::UnknownColumn(name.to_string()))
        };
        let id_index = find(id_column)?;
        let category_index = find(category_column)?;
        Ok(Self {
            columns,
            id_index,
            category_index,
        })
    }

    /// `id, timestamp, items, category`
    pub fn transactions() -> Self {
        Self {
            columns: ["id", "timestamp", "items", "category"]
                .into_iter()
                .map(String::from)
                .collect(),
            id_index: 0,
            category_index: 3,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn id_index(&self) -> usize {
        self.id_index
    }

    pub fn category_index(&self) -> usize {
        self.category_index
    }

    pub fn id_column(&self) -> &str {
        &self.columns[self.id_index]
    }

    pub fn category_column(&self) -> &str {
        &self.columns[self.category_index]
    }

    /// Position of `name`, if the schema has it
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Zero-padded id width for a universe: one less than the digit count of `max_id`
pub fn id_width(max_id: RecordId) -> usize {
    max_id.to_string().len().saturating_sub(1)
}

/// One generated transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub timestamp: NaiveDateTime,
    pub items: Vec<String>,
    pub category: Category,
}

impl Record {
    /// Serialize as one line: `<id>,"<ts>","<items>","<category>"\n`
    pub fn write_line<W: Write>(&self, out: &mut W, id_width: usize) -> std::io::Result<usize> {
        let line = self.to_line(id_width);
        out.write_all(line.as_bytes())?;
        Ok(line.len())
    }

    pub fn to_line(&self, id_width: usize) -> String {
        format!(
            "{:0width$},\"{}\",\"{}\",\"{}\"\n",
            self.id,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.items.join(","),
            self.category,
            width = id_width
        )
    }

    /// Decode a csv-parsed line laid out as `schema` (which must carry
    /// `timestamp` and `items` columns alongside id and category)
    pub fn from_csv(schema: &Schema, rec: &csv::StringRecord) -> Result<Self> {
        let line = rec.position().map(|p| p.line()).unwrap_or(0);
        if rec.len() != schema.len() {
            return Err(Error::MalformedRecord {
                line,
                expected: schema.len(),
                found: rec.len(),
            });
        }
        let id = parse_id(&rec[schema.id_index()], line)?;
        let ts = named_field(schema, rec, "timestamp")?;
        let timestamp = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).map_err(|_| {
            Error::InvalidTimestamp {
                line,
                value: ts.to_string(),
            }
        })?;
        let items = named_field(schema, rec, "items")?
            .split(',')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        let category = rec[schema.category_index()].parse()?;

        Ok(Self {
            id,
            timestamp,
            items,
            category,
        })
    }
}

fn named_field<'r>(schema: &Schema, rec: &'r csv::StringRecord, name: &str) -> Result<&'r str> {
    let idx = schema
        .position(name)
        .ok_or_else(|| Error::UnknownColumn(name.to_string()))?;
    Ok(&rec[idx])
}

/// Coerce an id field, reporting the offending line on failure
pub(crate) fn parse_id(value: &str, line: u64) -> Result<RecordId> {
    value.trim().parse().map_err(|_| Error::DecodeError {
        line,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_record() -> Record {
        Record {
            id: 42,
            timestamp: NaiveDate::from_ymd_opt(2015, 3, 7)
                .unwrap()
                .and_hms_opt(9, 5, 1)
                .unwrap(),
            items: vec!["doll".into(), "kite".into()],
            category: Category::Toys,
        }
    }

    #[test]
    fn test_id_width_follows_universe() {
        assert_eq!(id_width(10_000_000), 7);
        assert_eq!(id_width(1000), 3);
        assert_eq!(id_width(1), 0);
    }

    #[test]
    fn test_line_layout() {
        let line = sample_record().to_line(7);
        assert_eq!(line, "0000042,\"2015-03-07 09:05:01\",\"doll,kite\",\"Toys\"\n");
    }

    #[test]
    fn test_from_csv_reads_written_line() {
        let schema = Schema::transactions();
        let rec = sample_record();
        let line = rec.to_line(7);
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(line.as_bytes());
        let parsed = rdr.records().next().unwrap().unwrap();
        assert_eq!(Record::from_csv(&schema, &parsed).unwrap(), rec);
    }

    #[test]
    fn test_from_csv_rejects_short_line() {
        let schema = Schema::transactions();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader("0000042,\"2015-03-07 09:05:01\",\"Toys\"\n".as_bytes());
        let parsed = rdr.records().next().unwrap().unwrap();
        assert!(matches!(
            Record::from_csv(&schema, &parsed),
            Err(Error::MalformedRecord {
                expected: 4,
                found: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_schema_resolves_roles_by_name() {
        let schema = Schema::new(["category", "id", "note"], "id", "category").unwrap();
        assert_eq!(schema.id_index(), 1);
        assert_eq!(schema.category_index(), 0);
        assert!(matches!(
            Schema::new(["a", "b"], "id", "b"),
            Err(Error::UnknownColumn(c)) if c == "id"
        ));
        assert_eq!(Schema::transactions().category_column(), "category");
    }

    #[test]
    fn test_schema_rejects_duplicate_columns() {
        assert!(matches!(
            Schema::new(["id", "category", "items", "category"], "id", "category"),
            Err(Error::InvalidConfig(msg)) if msg.contains("category")
        ));
        assert!(matches!(
            Schema::new(["id", "id"], "id", "id"),
            Err(Error::InvalidConfig(_))
        ));
    }
}
