use serde::Serialize;

/// Sentinel for "looked up, unresolved"; checked by equality, never by
/// absence.
pub const UNKNOWN: &str = "Unknown";

pub const COLUMN_COUNT: usize = 18;

pub const HEADER: &str = "Assembly Accession\tOrganism Name\tOrganism Common Name\tOrganism Tax ID\tLineage\tAssembly Level\tBioProject Accession\tBioSample Accession\tGC Percent\tTotal Sequence Length\tSequencing Technology\tRelease Date\tCollection Date\tBioSample Description\tLocation\tBiomeDistribution\tLatitude\tLongitude";

// Column offsets used by the healing engine and the filtered rebuild.
pub const IDX_ACCESSION: usize = 0;
pub const IDX_TAX_ID: usize = 3;
pub const IDX_LINEAGE: usize = 4;
pub const IDX_BIOSAMPLE: usize = 7;
pub const IDX_LOCATION: usize = 14;
pub const IDX_BIOME: usize = 15;
pub const IDX_LAT: usize = 16;
pub const IDX_LON: usize = 17;

// Empty cells only occur in tables written by other tools; they count as
// unset too.
pub fn is_unset(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == UNKNOWN
}

pub fn is_header_line(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    lower.starts_with("assembly accession")
        || (lower.contains("assembly") && lower.contains("accession"))
        || (lower.contains("organism") && lower.contains("tax id"))
}

/// One canonical-table row; every field is a real value or [`UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub accession: String,
    pub organism_name: String,
    pub organism_common_name: String,
    pub organism_tax_id: String,
    pub lineage: String,
    pub assembly_level: String,
    pub bioproject_accession: String,
    pub biosample_accession: String,
    pub gc_percent: String,
    pub total_sequence_length: String,
    pub sequencing_technology: String,
    pub release_date: String,
    pub collection_date: String,
    pub biosample_description: String,
    pub location: String,
    pub biome_distribution: String,
    pub latitude: String,
    pub longitude: String,
}

impl Record {
    pub fn to_line(&self) -> String {
        let fields = [
            &self.accession,
            &self.organism_name,
            &self.organism_common_name,
            &self.organism_tax_id,
            &self.lineage,
            &self.assembly_level,
            &self.bioproject_accession,
            &self.biosample_accession,
            &self.gc_percent,
            &self.total_sequence_length,
            &self.sequencing_technology,
            &self.release_date,
            &self.collection_date,
            &self.biosample_description,
            &self.location,
            &self.biome_distribution,
            &self.latitude,
            &self.longitude,
        ];
        fields
            .iter()
            .map(|field| sanitize(field))
            .collect::<Vec<_>>()
            .join("\t")
    }
}

// An embedded separator would shift every column to its right.
fn sanitize(field: &str) -> String {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return UNKNOWN.to_string();
    }
    trimmed.replace(['\t', '\n', '\r'], " ")
}

pub fn passes_geo_filter(parts: &[&str]) -> bool {
    if parts.len() < COLUMN_COUNT {
        return false;
    }
    !is_unset(parts[IDX_BIOME]) && !is_unset(parts[IDX_LAT]) && !is_unset(parts[IDX_LON])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record {
            accession: "GCF_000005845.2".to_string(),
            organism_name: "Escherichia coli str. K-12 substr. MG1655".to_string(),
            organism_common_name: "E. coli".to_string(),
            organism_tax_id: "511145".to_string(),
            lineage: "cellular organisms; Bacteria; Pseudomonadota".to_string(),
            assembly_level: "Complete Genome".to_string(),
            bioproject_accession: "PRJNA57779".to_string(),
            biosample_accession: "SAMN02604091".to_string(),
            gc_percent: "50.5".to_string(),
            total_sequence_length: "4641652".to_string(),
            sequencing_technology: UNKNOWN.to_string(),
            release_date: "2013-09-26".to_string(),
            collection_date: UNKNOWN.to_string(),
            biosample_description: "E. coli K-12".to_string(),
            location: UNKNOWN.to_string(),
            biome_distribution: UNKNOWN.to_string(),
            latitude: UNKNOWN.to_string(),
            longitude: UNKNOWN.to_string(),
        }
    }

    #[test]
    fn header_has_fixed_width() {
        assert_eq!(HEADER.split('\t').count(), COLUMN_COUNT);
    }

    #[test]
    fn line_matches_header_width() {
        let line = sample().to_line();
        assert_eq!(line.split('\t').count(), COLUMN_COUNT);
        assert!(line.starts_with("GCF_000005845.2\t"));
    }

    #[test]
    fn sanitize_fills_and_flattens() {
        let mut record = sample();
        record.sequencing_technology = String::new();
        record.biosample_description = "line one\nline two\ttabbed".to_string();
        let line = record.to_line();
        let parts: Vec<&str> = line.split('\t').collect();
        assert_eq!(parts.len(), COLUMN_COUNT);
        assert_eq!(parts[10], UNKNOWN);
        assert_eq!(parts[13], "line one line two tabbed");
    }

    #[test]
    fn header_detection() {
        assert!(is_header_line(HEADER));
        assert!(is_header_line("Assembly Accession\tOrganism Name"));
        assert!(!is_header_line("GCF_000005845.2\tEscherichia coli"));
    }

    #[test]
    fn geo_filter_requires_all_three() {
        let line = sample().to_line();
        let parts: Vec<&str> = line.split('\t').collect();
        assert!(!passes_geo_filter(&parts));

        let mut record = sample();
        record.biome_distribution = "Marine".to_string();
        record.latitude = "12.34".to_string();
        record.longitude = "-56.78".to_string();
        let line = record.to_line();
        let parts: Vec<&str> = line.split('\t').collect();
        assert!(passes_geo_filter(&parts));

        record.latitude = UNKNOWN.to_string();
        let line = record.to_line();
        let parts: Vec<&str> = line.split('\t').collect();
        assert!(!passes_geo_filter(&parts));
    }
}
