use crate::*;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Missing column {0:?} in table header")]
    MissingColumn(String),
}

/// Layout of a SMILES table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmilesTableOptions {
    pub smiles_column: String,
    /// Column copied into `_Name`. A table without it gives empty names.
    pub name_column: Option<String>,
    pub delimiter: u8,
}

impl Default for SmilesTableOptions {
    fn default() -> Self {
        Self {
            smiles_column: "smiles".to_string(),
            name_column: Some("name".to_string()),
            delimiter: b',',
        }
    }
}

fn column_index(headers: &StringRecord, column: &str) -> Option<usize> {
    headers.iter().position(|header| header.trim() == column)
}

/// Read molecules from a delimited table with a header row.
///
/// # Arguments
///
/// * `reader` - The table source.
/// * `options` - Column names and delimiter.
///
/// # Returns
///
/// * One molecule per row with a parsable SMILES. The name column, when
///   present, becomes `_Name` and every other column a string property.
///   Rows that are empty, malformed or unparsable are skipped with a
///   warning. Only a missing SMILES column is an error.
pub fn read_smiles_table<R: Read>(reader: R, options: &SmilesTableOptions) -> Result<Vec<Molecule>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers().context("Failed to read table header")?.clone();

    let smiles_column = column_index(&headers, &options.smiles_column)
        .ok_or_else(|| TableError::MissingColumn(options.smiles_column.clone()))?;
    let name_column = options.name_column.as_deref().and_then(|name| {
        let index = column_index(&headers, name);
        if index.is_none() {
            debug!("No {name:?} column, molecules are left unnamed");
        }
        index
    });

    let mut molecules = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unreadable row {row}: {e}");
                continue;
            }
        };
        let smiles = record.get(smiles_column).unwrap_or("").trim();
        if smiles.is_empty() {
            warn!("Skipping row {row} with empty SMILES: {:?}", record);
            continue;
        }
        let mut mol = match parse_smiles(smiles) {
            Ok(mol) => mol,
            Err(e) => {
                warn!("Skipping row {row}: {e:#}");
                continue;
            }
        };

        for (index, (header, value)) in headers.iter().zip(record.iter()).enumerate() {
            if index == smiles_column || Some(index) == name_column {
                continue;
            }
            mol.set_prop(header.trim(), value);
        }
        if let Some(index) = name_column {
            mol.set_name(record.get(index).unwrap_or("").trim());
        }
        molecules.push(mol);
    }
    debug!("Read {} molecules", molecules.len());
    Ok(molecules)
}
