use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AtlasError {
    #[error("invalid assembly accession: {0}")]
    InvalidAccession(String),

    #[error("failed to read input file at {0}")]
    InputRead(PathBuf),

    #[error("failed to read resume file at {0}")]
    ResumeRead(PathBuf),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("malformed catalog report for {accession}: {message}")]
    MalformedReport { accession: String, message: String },

    #[error("entrez request failed: {0}")]
    EntrezHttp(String),

    #[error("entrez returned status {status}: {message}")]
    EntrezStatus { status: u16, message: String },

    #[error("duplicate accession in append batch: {0}")]
    DuplicateAccession(String),

    #[error("table i/o failed: {0}")]
    TableIo(String),
}
