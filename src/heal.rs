use std::collections::HashSet;

use tracing::info;

use crate::domain::FieldGroup;
use crate::enrich;
use crate::entrez::EntrezClient;
use crate::error::AtlasError;
use crate::record::{
    COLUMN_COUNT, IDX_ACCESSION, IDX_BIOME, IDX_BIOSAMPLE, IDX_LAT, IDX_LINEAGE, IDX_LOCATION,
    IDX_LON, IDX_TAX_ID, is_header_line, is_unset,
};
use crate::table::Table;

#[derive(Debug, Clone)]
pub struct HealOptions {
    /// Field groups eligible for healing. Empty means all of them.
    pub groups: Vec<FieldGroup>,
    /// Log only rows that improved, instead of every row that was checked.
    pub changed_only: bool,
}

impl Default for HealOptions {
    fn default() -> Self {
        Self {
            groups: FieldGroup::ALL.to_vec(),
            changed_only: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealChange {
    pub accession: String,
    pub improved: Vec<FieldGroup>,
}

#[derive(Debug, Default)]
pub struct HealReport {
    /// Full-width data rows inspected.
    pub checked: usize,
    /// Rows where at least one field changed.
    pub updated: usize,
    pub changes: Vec<HealChange>,
}

/// Re-attempts enrichment for every row whose requested field groups hold
/// the placeholder, using only identifiers already stored in the row. Rows
/// with nothing to heal pass through byte-identical.
pub fn heal_table<E: EntrezClient>(
    table: &Table,
    entrez: &E,
    options: &HealOptions,
) -> Result<HealReport, AtlasError> {
    let groups: HashSet<FieldGroup> = if options.groups.is_empty() {
        FieldGroup::ALL.into_iter().collect()
    } else {
        options.groups.iter().copied().collect()
    };

    let mut report = HealReport::default();
    let mut output = Vec::new();
    let mut first = true;

    for line in table.read_lines()? {
        if line.trim().is_empty() {
            continue;
        }
        if first {
            first = false;
            if is_header_line(&line) {
                output.push(line);
                continue;
            }
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < COLUMN_COUNT {
            output.push(line);
            continue;
        }
        report.checked += 1;

        let needs: Vec<FieldGroup> = groups
            .iter()
            .copied()
            .filter(|group| group_is_unset(&parts, *group))
            .collect();
        if needs.is_empty() {
            output.push(line);
            continue;
        }

        let mut fields: Vec<String> = parts.iter().map(|part| part.to_string()).collect();
        let improved = heal_row(entrez, &mut fields, &needs);

        if improved.is_empty() {
            if !options.changed_only {
                info!(accession = %fields[IDX_ACCESSION], "no improvement");
            }
            output.push(line);
            continue;
        }

        let improved_names = improved
            .iter()
            .map(|group| group.to_string())
            .collect::<Vec<_>>()
            .join(",");
        info!(accession = %fields[IDX_ACCESSION], fields = %improved_names, "healed");

        report.updated += 1;
        report.changes.push(HealChange {
            accession: fields[IDX_ACCESSION].clone(),
            improved,
        });
        output.push(fields.join("\t"));
    }

    table.replace_contents(&output)?;
    info!(
        checked = report.checked,
        updated = report.updated,
        "heal pass finished"
    );
    Ok(report)
}

fn group_is_unset(parts: &[&str], group: FieldGroup) -> bool {
    match group {
        FieldGroup::Lineage => is_unset(parts[IDX_LINEAGE]),
        FieldGroup::Location => is_unset(parts[IDX_LOCATION]),
        FieldGroup::Biome => is_unset(parts[IDX_BIOME]),
        FieldGroup::Latlon => is_unset(parts[IDX_LAT]) || is_unset(parts[IDX_LON]),
    }
}

// Overwrites a field only when the re-run produced a real value. Returns
// the groups that improved.
fn heal_row<E: EntrezClient>(
    entrez: &E,
    fields: &mut [String],
    needs: &[FieldGroup],
) -> Vec<FieldGroup> {
    let mut improved = Vec::new();

    if needs.contains(&FieldGroup::Lineage) {
        let lineage = enrich::lineage_field(entrez, &fields[IDX_TAX_ID]);
        if !is_unset(&lineage) {
            fields[IDX_LINEAGE] = lineage;
            improved.push(FieldGroup::Lineage);
        }
    }

    let wants_biosample = needs.iter().any(|group| {
        matches!(
            group,
            FieldGroup::Location | FieldGroup::Biome | FieldGroup::Latlon
        )
    });
    if wants_biosample {
        // One fetch serves all three biosample-derived groups.
        let geo = enrich::biosample_fields(entrez, &fields[IDX_BIOSAMPLE]);
        if needs.contains(&FieldGroup::Location) && !is_unset(&geo.location) {
            fields[IDX_LOCATION] = geo.location;
            improved.push(FieldGroup::Location);
        }
        if needs.contains(&FieldGroup::Biome) && !is_unset(&geo.biome) {
            fields[IDX_BIOME] = geo.biome;
            improved.push(FieldGroup::Biome);
        }
        if needs.contains(&FieldGroup::Latlon)
            && !is_unset(&geo.latitude)
            && !is_unset(&geo.longitude)
        {
            // Both or neither; a real value is never paired with a
            // placeholder.
            fields[IDX_LAT] = geo.latitude;
            fields[IDX_LON] = geo.longitude;
            improved.push(FieldGroup::Latlon);
        }
    }

    improved
}
