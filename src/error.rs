use thiserror::Error;

/// Input-contract violations found while validating raw journal records.
#[derive(Debug, Error, PartialEq)]
pub enum EntryError {
    #[error("record {index}: date {date:?} is not a calendar date")]
    InvalidDate { index: usize, date: String },

    #[error("record {index}: date {date:?} is not in YYYY-MM-DD form")]
    NonCanonicalDate { index: usize, date: String },

    #[error("record {index}: {field} = {value} is out of range")]
    OutOfRange {
        index: usize,
        field: &'static str,
        value: f64,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum TechniqueError {
    #[error("technique name is required")]
    EmptyName,

    #[error("technique {0:?} already exists")]
    AlreadyExists(String),
}
