use std::collections::HashSet;
use std::fs;

use camino::Utf8Path;
use tracing::warn;

use crate::domain::AssemblyAccession;
use crate::error::AtlasError;
use crate::record::is_header_line;
use crate::table;

#[derive(Debug)]
pub struct ResolvedInput {
    /// Keys still needing a first pass, input order, deduplicated.
    pub pending: Vec<AssemblyAccession>,
    pub skipped_existing: usize,
    pub invalid: usize,
}

/// Reads the candidate key list (first column, tab or whitespace separated)
/// and drops everything already processed. With `has_header` set, a first
/// line that looks like a header is skipped.
pub fn pending_accessions(
    input: &Utf8Path,
    has_header: bool,
    processed: &HashSet<String>,
) -> Result<ResolvedInput, AtlasError> {
    let content = fs::read_to_string(input.as_std_path())
        .map_err(|_| AtlasError::InputRead(input.as_std_path().to_path_buf()))?;

    let mut pending = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped_existing = 0usize;
    let mut invalid = 0usize;
    let mut first = true;

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if first {
            first = false;
            if has_header && is_header_line(line) {
                continue;
            }
        }

        let key = match line.split_once('\t') {
            Some((first_col, _)) => first_col.trim(),
            None => line.split_whitespace().next().unwrap_or(""),
        };
        if key.is_empty() {
            continue;
        }
        if processed.contains(key) {
            skipped_existing += 1;
            continue;
        }
        if !seen.insert(key.to_string()) {
            continue;
        }
        match key.parse::<AssemblyAccession>() {
            Ok(accession) => pending.push(accession),
            Err(_) => {
                warn!(key, "skipping key that is not an assembly accession");
                invalid += 1;
            }
        }
    }

    Ok(ResolvedInput {
        pending,
        skipped_existing,
        invalid,
    })
}

// The resume file was named explicitly, so it must be readable.
pub fn read_resume_keys(path: &Utf8Path) -> Result<HashSet<String>, AtlasError> {
    if !path.as_std_path().is_file() {
        return Err(AtlasError::ResumeRead(path.as_std_path().to_path_buf()));
    }
    table::read_key_column(path)
        .map_err(|_| AtlasError::ResumeRead(path.as_std_path().to_path_buf()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;

    fn write_input(dir: &tempfile::TempDir, name: &str, content: &str) -> Utf8PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        Utf8PathBuf::from_path_buf(path).unwrap()
    }

    #[test]
    fn resolves_pending_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(
            &dir,
            "input.tsv",
            "Assembly Accession\tName\nGCF_000000001.1\tx\nGCA_000000002.1\ty\nGCF_000000001.1\tagain\n",
        );

        let processed = HashSet::from(["GCA_000000002.1".to_string()]);
        let resolved = pending_accessions(&input, true, &processed).unwrap();

        let pending: Vec<&str> = resolved.pending.iter().map(|a| a.as_str()).collect();
        assert_eq!(pending, vec!["GCF_000000001.1"]);
        assert_eq!(resolved.skipped_existing, 1);
        assert_eq!(resolved.invalid, 0);
    }

    #[test]
    fn no_header_treats_first_line_as_data() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "input.tsv", "GCF_000000001.1\nGCF_000000003.1\n");

        let resolved = pending_accessions(&input, false, &HashSet::new()).unwrap();
        assert_eq!(resolved.pending.len(), 2);

        // Auto-detection never fires on a data-shaped first line either.
        let resolved = pending_accessions(&input, true, &HashSet::new()).unwrap();
        assert_eq!(resolved.pending.len(), 2);
    }

    #[test]
    fn whitespace_separated_keys_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(
            &dir,
            "input.txt",
            "\nGCF_000000001.1 extra column\n\n   \nnot-an-accession\n",
        );

        let resolved = pending_accessions(&input, false, &HashSet::new()).unwrap();
        assert_eq!(resolved.pending.len(), 1);
        assert_eq!(resolved.pending[0].as_str(), "GCF_000000001.1");
        assert_eq!(resolved.invalid, 1);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "empty.tsv", "");
        let resolved = pending_accessions(&input, true, &HashSet::new()).unwrap();
        assert!(resolved.pending.is_empty());
        assert_eq!(resolved.skipped_existing, 0);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.tsv")).unwrap();
        let err = pending_accessions(&path, true, &HashSet::new()).unwrap_err();
        assert_matches!(err, AtlasError::InputRead(_));
    }

    #[test]
    fn missing_resume_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.tsv")).unwrap();
        let err = read_resume_keys(&path).unwrap_err();
        assert_matches!(err, AtlasError::ResumeRead(_));
    }
}
