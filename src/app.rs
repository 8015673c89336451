use camino::Utf8PathBuf;
use tracing::{info, warn};

use crate::catalog::CatalogClient;
use crate::domain::AssemblyAccession;
use crate::enrich;
use crate::entrez::EntrezClient;
use crate::error::AtlasError;
use crate::heal::{self, HealOptions, HealReport};
use crate::record::{Record, is_unset};
use crate::resolver;
use crate::table::Table;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: Utf8PathBuf,
    /// Auxiliary table whose keys count as already processed.
    pub resume: Option<Utf8PathBuf>,
    /// False asserts the input starts with data, disabling header detection.
    pub input_has_header: bool,
    /// Run a heal pass over the whole table after the first pass.
    pub heal_after: bool,
    pub heal: HealOptions,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub skipped_existing: usize,
    pub invalid_keys: usize,
    pub processed: usize,
    pub identity_failures: usize,
    pub biome_filled: usize,
    pub latlon_filled: usize,
    pub heal: Option<HealReport>,
    pub filtered_rows: usize,
}

/// The merge-and-heal engine, wired to its two external collaborators.
pub struct App<C: CatalogClient, E: EntrezClient> {
    table: Table,
    catalog: C,
    entrez: E,
}

impl<C: CatalogClient, E: EntrezClient> App<C, E> {
    pub fn new(table: Table, catalog: C, entrez: E) -> Self {
        Self {
            table,
            catalog,
            entrez,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// First pass, optional heal pass, filtered rebuild. Each assembled row
    /// is appended immediately, so an interrupted run resumes exactly after
    /// its last durable row.
    pub fn run(&self, options: &RunOptions) -> Result<RunSummary, AtlasError> {
        self.table.ensure_header()?;

        let mut processed = self.table.processed_accessions()?;
        if let Some(resume) = &options.resume {
            processed.extend(resolver::read_resume_keys(resume)?);
        }

        let resolved =
            resolver::pending_accessions(&options.input, options.input_has_header, &processed)?;
        info!(
            pending = resolved.pending.len(),
            skipped = resolved.skipped_existing,
            "resolved input keys"
        );

        let mut summary = RunSummary {
            skipped_existing: resolved.skipped_existing,
            invalid_keys: resolved.invalid,
            ..RunSummary::default()
        };

        for accession in &resolved.pending {
            let Some(record) = self.assemble_record(accession) else {
                summary.identity_failures += 1;
                continue;
            };
            if !is_unset(&record.biome_distribution) {
                summary.biome_filled += 1;
            }
            if !is_unset(&record.latitude) {
                summary.latlon_filled += 1;
            }
            self.table
                .append_records(std::slice::from_ref(&record), &processed)?;
            processed.insert(record.accession.clone());
            summary.processed += 1;
        }

        if options.heal_after {
            summary.heal = Some(heal::heal_table(&self.table, &self.entrez, &options.heal)?);
        }
        summary.filtered_rows = self.table.rebuild_filtered()?;
        Ok(summary)
    }

    /// Heal pass against the existing table, no new accessions.
    pub fn heal_only(&self, options: &HealOptions) -> Result<RunSummary, AtlasError> {
        self.table.ensure_header()?;
        let report = heal::heal_table(&self.table, &self.entrez, options)?;
        let filtered_rows = self.table.rebuild_filtered()?;
        Ok(RunSummary {
            heal: Some(report),
            filtered_rows,
            ..RunSummary::default()
        })
    }

    // A failed base lookup skips the accession for this run; it stays absent
    // from the table and is picked up again next time.
    fn assemble_record(&self, accession: &AssemblyAccession) -> Option<Record> {
        info!(%accession, "processing");
        let summary = match self.catalog.assembly_summary(accession) {
            Ok(summary) => summary,
            Err(err) => {
                warn!(%accession, error = %err, "base catalog lookup failed, skipping");
                return None;
            }
        };

        let lineage = enrich::lineage_field(&self.entrez, &summary.organism_tax_id);
        let geo = enrich::biosample_fields(&self.entrez, &summary.biosample_accession);

        Some(Record {
            accession: accession.to_string(),
            organism_name: summary.organism_name,
            organism_common_name: summary.organism_common_name,
            organism_tax_id: summary.organism_tax_id,
            lineage,
            assembly_level: summary.assembly_level,
            bioproject_accession: summary.bioproject_accession,
            biosample_accession: summary.biosample_accession,
            gc_percent: summary.gc_percent,
            total_sequence_length: summary.total_sequence_length,
            sequencing_technology: summary.sequencing_technology,
            release_date: summary.release_date,
            collection_date: summary.collection_date,
            biosample_description: summary.biosample_description,
            location: geo.location,
            biome_distribution: geo.biome,
            latitude: geo.latitude,
            longitude: geo.longitude,
        })
    }
}
