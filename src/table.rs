//! Workbook tables
//!
//! Tables hold raw cell text exactly as it appears in the workbook. Column
//! layouts are fixed per sheet; see [`CONCEPT_COLUMNS`] and friends.

use crate::cell::CellKind;
use crate::vocab::{COLLECTION_OBSOLETION_REASONS, CONCEPT_OBSOLETION_REASONS};

pub const SCHEME_SHEET: &str = "Concept Scheme";
pub const CONCEPTS_SHEET: &str = "Concepts";
pub const COLLECTIONS_SHEET: &str = "Collections";
pub const MAPPINGS_SHEET: &str = "Mappings";
pub const ID_RANGES_SHEET: &str = "ID Ranges";
pub const PREFIXES_SHEET: &str = "Prefixes";

/// One column of a sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub header: &'static str,
    pub kind: CellKind,
    pub required: bool,
    /// Language independent; expected on the first row of an entity only
    pub structural: bool,
}

const fn col(header: &'static str, kind: CellKind, required: bool, structural: bool) -> Column {
    Column {
        header,
        kind,
        required,
        structural,
    }
}

pub const CONCEPT_COLUMNS: &[Column] = &[
    col("Concept IRI*", CellKind::Iri, true, false),
    col("Language Code*", CellKind::Language, true, false),
    col("Preferred Label*", CellKind::Text, true, false),
    col("Definition*", CellKind::Text, true, false),
    col("Alternate Labels", CellKind::TextList, false, false),
    col("Parent IRIs", CellKind::IriList, false, true),
    col("Member of collection(s)", CellKind::Memberships, false, true),
    col("Member of ordered collection # position", CellKind::Memberships, false, true),
    col("Provenance (read-only)", CellKind::Iri, false, true),
    col("Change Note", CellKind::Text, false, true),
    col("Editorial Note", CellKind::Text, false, true),
    col("Influenced by IRIs", CellKind::IriList, false, true),
    col("Source Vocab IRI or URL", CellKind::Iri, false, true),
    col("Source Vocab License", CellKind::Text, false, true),
    col("Source Vocab Rights Holder", CellKind::Text, false, true),
    col("Obsoletion reason", CellKind::Choice(CONCEPT_OBSOLETION_REASONS), false, true),
    col("dct:isReplacedBy", CellKind::Iri, false, true),
];

pub const COLLECTION_COLUMNS: &[Column] = &[
    col("Collection IRI*", CellKind::Iri, true, false),
    col("Language Code*", CellKind::Language, true, false),
    col("Preferred Label*", CellKind::Text, true, false),
    col("Definition*", CellKind::Text, true, false),
    col("Parent Collection IRIs", CellKind::Memberships, false, true),
    col("Ordered? Yes or No", CellKind::Flag, false, true),
    col("Provenance (read-only)", CellKind::Iri, false, true),
    col("Change Note", CellKind::Text, false, true),
    col("Editorial Note", CellKind::Text, false, true),
    col("Obsoletion reason", CellKind::Choice(COLLECTION_OBSOLETION_REASONS), false, true),
    col("dct:isReplacedBy", CellKind::Iri, false, true),
];

pub const MAPPING_COLUMNS: &[Column] = &[
    col("Concept IRI*", CellKind::Iri, true, true),
    col("Related Matches", CellKind::IriList, false, true),
    col("Close Matches", CellKind::IriList, false, true),
    col("Exact Matches", CellKind::IriList, false, true),
    col("Narrower Matches", CellKind::IriList, false, true),
    col("Broader Matches", CellKind::IriList, false, true),
];

pub const ID_RANGE_COLUMNS: &[Column] = &[
    col("ID range", CellKind::Text, false, false),
    col("Owner", CellKind::Text, false, false),
    col("GitHub name", CellKind::Text, false, false),
    col("ORCID", CellKind::Text, false, false),
    col("ROR ID", CellKind::Text, false, false),
    col("Unused IDs", CellKind::Text, false, false),
];

pub const PREFIX_COLUMNS: &[Column] = &[
    col("Prefix", CellKind::Text, false, false),
    col("Namespace", CellKind::Text, false, false),
];

/// Column positions within [`CONCEPT_COLUMNS`]
pub mod concept_col {
    pub const IRI: usize = 0;
    pub const LANGUAGE: usize = 1;
    pub const LABEL: usize = 2;
    pub const DEFINITION: usize = 3;
    pub const ALT_LABELS: usize = 4;
    pub const PARENTS: usize = 5;
    pub const MEMBER_OF: usize = 6;
    pub const MEMBER_OF_ORDERED: usize = 7;
    pub const PROVENANCE: usize = 8;
    pub const CHANGE_NOTE: usize = 9;
    pub const EDITORIAL_NOTE: usize = 10;
    pub const INFLUENCED_BY: usize = 11;
    pub const SOURCE: usize = 12;
    pub const SOURCE_LICENSE: usize = 13;
    pub const SOURCE_RIGHTS_HOLDER: usize = 14;
    pub const OBSOLETION_REASON: usize = 15;
    pub const REPLACED_BY: usize = 16;
}

/// Column positions within [`COLLECTION_COLUMNS`]
pub mod collection_col {
    pub const IRI: usize = 0;
    pub const LANGUAGE: usize = 1;
    pub const LABEL: usize = 2;
    pub const DEFINITION: usize = 3;
    pub const PARENTS: usize = 4;
    pub const ORDERED: usize = 5;
    pub const PROVENANCE: usize = 6;
    pub const CHANGE_NOTE: usize = 7;
    pub const EDITORIAL_NOTE: usize = 8;
    pub const OBSOLETION_REASON: usize = 9;
    pub const REPLACED_BY: usize = 10;
}

/// One data row; `number` is the 1-based row in the sheet, header included
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub number: usize,
    pub cells: Vec<String>,
}

impl Row {
    pub fn new(number: usize, cells: Vec<String>) -> Self {
        Row { number, cells }
    }

    /// Cell text, empty when the row is shorter
    pub fn get(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, index: usize, value: String) {
        if self.cells.len() <= index {
            self.cells.resize(index + 1, String::new());
        }
        self.cells[index] = value;
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// A sheet with a fixed column layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(name: &'static str, columns: &'static [Column]) -> Self {
        Table {
            name,
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row numbered after the header and existing rows
    pub fn push(&mut self, cells: Vec<String>) {
        let number = self.rows.len() + 2;
        self.rows.push(Row::new(number, cells));
    }

    pub fn headers(&self) -> impl Iterator<Item = &'static str> {
        self.columns.iter().map(|c| c.header)
    }

    /// "Concepts row 5"
    pub fn locate(&self, row: &Row) -> String {
        format!("{} row {}", self.name, row.number)
    }
}

/// All sheets of a vocabulary workbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    /// Key/value pairs of the scheme metadata
    pub scheme: Vec<(String, String)>,
    pub concepts: Table,
    pub collections: Table,
    pub mappings: Table,
    pub id_ranges: Table,
    pub prefixes: Table,
}

impl Default for Tables {
    fn default() -> Self {
        Tables {
            scheme: Vec::new(),
            concepts: Table::new(CONCEPTS_SHEET, CONCEPT_COLUMNS),
            collections: Table::new(COLLECTIONS_SHEET, COLLECTION_COLUMNS),
            mappings: Table::new(MAPPINGS_SHEET, MAPPING_COLUMNS),
            id_ranges: Table::new(ID_RANGES_SHEET, ID_RANGE_COLUMNS),
            prefixes: Table::new(PREFIXES_SHEET, PREFIX_COLUMNS),
        }
    }
}

impl Tables {
    /// Value of a key on the Concept Scheme sheet
    pub fn scheme_value(&self, key: &str) -> Option<&str> {
        self.scheme
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// The editable tables, whose IRI cells may reference entities
    pub fn editable_mut(&mut self) -> [&mut Table; 3] {
        [&mut self.concepts, &mut self.collections, &mut self.mappings]
    }
}
