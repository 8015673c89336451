use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;

use assembly_atlas::domain::FieldGroup;
use assembly_atlas::entrez::{BiosampleAttributes, EntrezClient};
use assembly_atlas::error::AtlasError;
use assembly_atlas::heal::{HealOptions, heal_table};
use assembly_atlas::record::{HEADER, UNKNOWN};
use assembly_atlas::table::Table;

struct MockEntrez {
    lineages: HashMap<u32, String>,
    biosamples: HashMap<String, BiosampleAttributes>,
    biosample_calls: Arc<Mutex<usize>>,
}

impl MockEntrez {
    fn new(
        lineages: HashMap<u32, String>,
        biosamples: HashMap<String, BiosampleAttributes>,
    ) -> Self {
        Self {
            lineages,
            biosamples,
            biosample_calls: Arc::new(Mutex::new(0)),
        }
    }
}

impl EntrezClient for MockEntrez {
    fn fetch_lineage(&self, tax_id: u32) -> Result<Option<String>, AtlasError> {
        Ok(self.lineages.get(&tax_id).cloned())
    }

    fn fetch_biosample(
        &self,
        accession: &str,
    ) -> Result<Option<BiosampleAttributes>, AtlasError> {
        *self.biosample_calls.lock().unwrap() += 1;
        Ok(self.biosamples.get(accession).cloned())
    }
}

fn row(accession: &str, tax_id: &str, biosample: &str, tail: [&str; 4]) -> String {
    [
        accession,
        "Some organism",
        UNKNOWN,
        tax_id,
        UNKNOWN,
        "Contig",
        "PRJNA1",
        biosample,
        "41.2",
        "1000",
        UNKNOWN,
        "2024-01-01",
        UNKNOWN,
        "desc",
        tail[0],
        tail[1],
        tail[2],
        tail[3],
    ]
    .join("\t")
}

fn seeded_table(dir: &tempfile::TempDir, rows: &[String]) -> Table {
    let path = Utf8PathBuf::from_path_buf(dir.path().join("meta.tsv")).unwrap();
    let mut content = format!("{HEADER}\n");
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(path.as_std_path(), content).unwrap();
    Table::new(path)
}

#[test]
fn latlon_only_heal_leaves_biome_alone() {
    let dir = tempfile::tempdir().unwrap();
    let rows = vec![row(
        "GCF_000000003.1",
        "33",
        "SAMN3",
        [UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN],
    )];
    let table = seeded_table(&dir, &rows);

    // The coordinate lookup now succeeds; the attribute set would also
    // resolve biome and location, but only latlon was requested.
    let entrez = MockEntrez::new(
        HashMap::new(),
        HashMap::from([(
            "SAMN3".to_string(),
            BiosampleAttributes {
                lat_lon: Some("10.5 S 40.25 E".to_string()),
                geo_loc_name: Some("Tanzania".to_string()),
                isolation_source: Some("marine sediment".to_string()),
                environmental_sample: None,
            },
        )]),
    );

    let options = HealOptions {
        groups: vec![FieldGroup::Latlon],
        changed_only: true,
    };
    let report = heal_table(&table, &entrez, &options).unwrap();

    assert_eq!(report.checked, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].accession, "GCF_000000003.1");
    assert_eq!(report.changes[0].improved, vec![FieldGroup::Latlon]);

    let lines = table.read_lines().unwrap();
    let parts: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(parts[14], UNKNOWN); // Location untouched
    assert_eq!(parts[15], UNKNOWN); // BiomeDistribution untouched
    assert_eq!(parts[16], "-10.5");
    assert_eq!(parts[17], "40.25");
}

#[test]
fn lineage_only_heal_keeps_geo_fields_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let rows = vec![row(
        "GCF_000000005.1",
        "55",
        "SAMN5",
        ["Peru: Cusco", UNKNOWN, "12.1", "-70.2"],
    )];
    let table = seeded_table(&dir, &rows);
    let before = table.read_lines().unwrap();

    let entrez = MockEntrez::new(
        HashMap::from([(55u32, "cellular organisms; Bacteria".to_string())]),
        HashMap::from([("SAMN5".to_string(), BiosampleAttributes::default())]),
    );
    let calls = Arc::clone(&entrez.biosample_calls);

    let options = HealOptions {
        groups: vec![FieldGroup::Lineage],
        changed_only: false,
    };
    let report = heal_table(&table, &entrez, &options).unwrap();
    assert_eq!(report.updated, 1);

    // Lineage-only healing never touches the biosample service.
    assert_eq!(*calls.lock().unwrap(), 0);

    let after = table.read_lines().unwrap();
    let before_parts: Vec<&str> = before[1].split('\t').collect();
    let after_parts: Vec<&str> = after[1].split('\t').collect();
    assert_eq!(after_parts[4], "cellular organisms; Bacteria");
    assert_eq!(&after_parts[14..], &before_parts[14..]);
}

#[test]
fn rows_with_nothing_requested_pass_through_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let rows = vec![
        row(
            "GCF_000000001.1",
            "11",
            "SAMN1",
            ["Chile", "Marine", "1.5", "-2.5"],
        ),
        // Short row, as another tool might have left it.
        "GCF_000000002.1\tincomplete".to_string(),
    ];
    let table = seeded_table(&dir, &rows);
    let before = fs::read_to_string(table.path().as_std_path()).unwrap();

    let entrez = MockEntrez::new(HashMap::new(), HashMap::new());
    let report = heal_table(&table, &entrez, &HealOptions::default()).unwrap();

    assert_eq!(report.checked, 1);
    assert_eq!(report.updated, 0);
    assert!(report.changes.is_empty());

    let after = fs::read_to_string(table.path().as_std_path()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn unimproved_rows_are_rewritten_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let rows = vec![row(
        "GCF_000000007.1",
        "not-numeric",
        UNKNOWN,
        [UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN],
    )];
    let table = seeded_table(&dir, &rows);
    let before = fs::read_to_string(table.path().as_std_path()).unwrap();

    // Nothing resolvable: tax id is junk and the biosample is a placeholder.
    let entrez = MockEntrez::new(HashMap::new(), HashMap::new());
    let report = heal_table(&table, &entrez, &HealOptions::default()).unwrap();

    assert_eq!(report.checked, 1);
    assert_eq!(report.updated, 0);
    let after = fs::read_to_string(table.path().as_std_path()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn partial_coordinate_heal_never_splits_the_pair() {
    let dir = tempfile::tempdir().unwrap();
    let rows = vec![row(
        "GCF_000000008.1",
        "88",
        "SAMN8",
        [UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN],
    )];
    let table = seeded_table(&dir, &rows);

    // lat_lon present but unparseable: both columns must stay placeholders.
    let entrez = MockEntrez::new(
        HashMap::new(),
        HashMap::from([(
            "SAMN8".to_string(),
            BiosampleAttributes {
                lat_lon: Some("12.34 N".to_string()),
                ..Default::default()
            },
        )]),
    );

    let options = HealOptions {
        groups: vec![FieldGroup::Latlon],
        changed_only: false,
    };
    let report = heal_table(&table, &entrez, &options).unwrap();
    assert_eq!(report.updated, 0);

    let lines = table.read_lines().unwrap();
    let parts: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(parts[16], UNKNOWN);
    assert_eq!(parts[17], UNKNOWN);
}
