use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const GENE_KEYS: &[&str] = &["gene", "gene_name", "gene_id"];
const VARIANT_KEYS: &[&str] = &["variant", "variant_id", "sgrna", "guide", "name"];
const MEASURED_KEYS: &[&str] = &["y_meas", "gamma", "relgamma", "measured"];
const PREDICTED_KEYS: &[&str] = &["y_pred", "prediction", "predicted", "pred"];

/// Cell contents read as "no value" rather than as a malformed number.
const MISSING_TOKENS: &[&str] = &["", "na", "nan", "null", "none"];

/// One row of a per-variant gamma table.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub gene: String,
    pub variant: String,
    pub measured: Option<f64>,
    pub predicted: Option<f64>,
}

/// Explicit header names that replace the built-in column detection.
#[derive(Debug, Clone, Default)]
pub struct ColumnOverrides {
    pub gene: Option<String>,
    pub variant: Option<String>,
    pub measured: Option<String>,
    pub predicted: Option<String>,
}

/// Header names actually used for each role after detection.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumns {
    pub gene: String,
    pub variant: String,
    pub measured: String,
    pub predicted: String,
}

#[derive(Debug, Clone)]
pub struct GammaTable {
    pub path: PathBuf,
    pub columns: ResolvedColumns,
    /// Unique (gene, variant) rows in file order.
    pub records: Vec<VariantRecord>,
    /// Rows dropped because their (gene, variant) pair was already seen.
    pub duplicates: usize,
}

impl GammaTable {
    pub fn gene_count(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.gene.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Find the column for `role`, either by an explicit header name or by the first
/// header matching one of `keys` (case-insensitive).
fn resolve_column(
    headers: &StringRecord,
    role: &str,
    explicit: Option<&str>,
    keys: &[&str],
) -> Result<usize> {
    let found = match explicit {
        Some(name) => headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name.trim())),
        None => keys.iter().find_map(|k| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(k))
        }),
    };
    found.with_context(|| {
        let wanted = match explicit {
            Some(name) => format!("'{}'", name),
            None => keys.join("/"),
        };
        format!(
            "no {} column ({}) in header [{}]",
            role,
            wanted,
            headers.iter().collect::<Vec<_>>().join(", ")
        )
    })
}

fn parse_score(cell: &str, column: &str, line: u64) -> Result<Option<f64>> {
    let t = cell.trim();
    if MISSING_TOKENS.iter().any(|m| t.eq_ignore_ascii_case(m)) {
        return Ok(None);
    }
    match t.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Ok(None),
        Err(_) => anyhow::bail!("line {}: {} value '{}' is not a number", line, column, t),
    }
}

/// Read a tab-separated per-variant table with a header row.
pub fn load_gammas<P: AsRef<Path>>(path: P, overrides: &ColumnOverrides) -> Result<GammaTable> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .comment(Some(b'#'))
        .from_path(path)
        .with_context(|| format!("Failed to open gamma file: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        anyhow::bail!("{} has no header row", path.display());
    }

    let resolve = |role: &str, explicit: &Option<String>, keys: &[&str]| {
        resolve_column(&headers, role, explicit.as_deref(), keys)
            .with_context(|| format!("Bad header in {}", path.display()))
    };
    let gene_idx = resolve("gene", &overrides.gene, GENE_KEYS)?;
    let variant_idx = resolve("variant", &overrides.variant, VARIANT_KEYS)?;
    let meas_idx = resolve("measured", &overrides.measured, MEASURED_KEYS)?;
    let pred_idx = resolve("predicted", &overrides.predicted, PREDICTED_KEYS)?;

    let columns = ResolvedColumns {
        gene: headers[gene_idx].trim().to_string(),
        variant: headers[variant_idx].trim().to_string(),
        measured: headers[meas_idx].trim().to_string(),
        predicted: headers[pred_idx].trim().to_string(),
    };

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut records: Vec<VariantRecord> = Vec::new();
    let mut duplicates = 0usize;

    for row in reader.records() {
        let row = row.with_context(|| format!("Malformed row in {}", path.display()))?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        let gene = row[gene_idx].trim();
        let variant = row[variant_idx].trim();
        if gene.is_empty() || variant.is_empty() {
            anyhow::bail!(
                "{} line {}: empty {} or {} identifier",
                path.display(),
                line,
                columns.gene,
                columns.variant
            );
        }
        let measured = parse_score(&row[meas_idx], &columns.measured, line)
            .with_context(|| format!("Bad score in {}", path.display()))?;
        let predicted = parse_score(&row[pred_idx], &columns.predicted, line)
            .with_context(|| format!("Bad score in {}", path.display()))?;

        if !seen.insert((gene.to_string(), variant.to_string())) {
            duplicates += 1;
            continue;
        }
        records.push(VariantRecord {
            gene: gene.to_string(),
            variant: variant.to_string(),
            measured,
            predicted,
        });
    }

    Ok(GammaTable {
        path: path.to_path_buf(),
        columns,
        records,
        duplicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_detects_default_columns() {
        let file = create_test_file(
            "\
variant\tgene\ty_pred\ty_meas
v1\tAARS\t-0.10\t-0.12
v2\tAARS\t-0.40\t-0.35
v3\tPSMB1\t0.01\tNA
",
        );
        let table = load_gammas(file.path(), &ColumnOverrides::default()).unwrap();

        assert_eq!(table.records.len(), 3);
        assert_eq!(table.gene_count(), 2);
        assert_eq!(table.columns.measured, "y_meas");
        assert_eq!(table.columns.predicted, "y_pred");
        assert_eq!(table.records[1].gene, "AARS");
        assert_eq!(table.records[1].variant, "v2");
        assert_eq!(table.records[1].measured, Some(-0.35));
        assert_eq!(table.records[1].predicted, Some(-0.40));
        assert_eq!(table.records[2].measured, None);
    }

    #[test]
    fn test_header_match_is_case_insensitive() {
        let file = create_test_file("Gene\tVariant\tGamma\tPrediction\nG\tv\t0.5\t0.4\n");
        let table = load_gammas(file.path(), &ColumnOverrides::default()).unwrap();
        assert_eq!(table.columns.gene, "Gene");
        assert_eq!(table.columns.measured, "Gamma");
        assert_eq!(table.records.len(), 1);
    }

    #[test]
    fn test_overrides_pick_named_columns() {
        let file = create_test_file(
            "\
target\tguide_id\tobs\tmodel
G1\tg1\t0.1\t0.2
",
        );
        let overrides = ColumnOverrides {
            gene: Some("target".to_string()),
            variant: Some("guide_id".to_string()),
            measured: Some("obs".to_string()),
            predicted: Some("model".to_string()),
        };
        let table = load_gammas(file.path(), &overrides).unwrap();
        assert_eq!(table.records[0].gene, "G1");
        assert_eq!(table.records[0].measured, Some(0.1));
        assert_eq!(table.records[0].predicted, Some(0.2));
    }

    #[test]
    fn test_duplicate_variants_keep_first() {
        let file = create_test_file(
            "\
gene\tvariant\ty_meas\ty_pred
G\tv1\t0.1\t0.2
G\tv1\t0.9\t0.9
G\tv2\t0.3\t0.4
",
        );
        let table = load_gammas(file.path(), &ColumnOverrides::default()).unwrap();
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.duplicates, 1);
        assert_eq!(table.records[0].measured, Some(0.1));
    }

    #[test]
    fn test_comment_lines_are_skipped() {
        let file = create_test_file(
            "\
gene\tvariant\ty_meas\ty_pred
# produced by a model run
G\tv1\t0.1\t0.2
",
        );
        let table = load_gammas(file.path(), &ColumnOverrides::default()).unwrap();
        assert_eq!(table.records.len(), 1);
    }

    #[test]
    fn test_header_only_file_has_no_records() {
        let file = create_test_file("gene\tvariant\ty_meas\ty_pred\n");
        let table = load_gammas(file.path(), &ColumnOverrides::default()).unwrap();
        assert!(table.records.is_empty());
    }

    #[test]
    fn test_missing_file_fails() {
        let err = load_gammas("/nonexistent/gammas.tsv", &ColumnOverrides::default()).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/gammas.tsv"));
    }

    #[test]
    fn test_missing_column_fails() {
        let file = create_test_file("gene\tvariant\ty_meas\nG\tv1\t0.1\n");
        let err = load_gammas(file.path(), &ColumnOverrides::default()).unwrap_err();
        assert!(format!("{err:#}").contains("no predicted column"));
    }

    #[test]
    fn test_non_numeric_score_fails() {
        let file = create_test_file("gene\tvariant\ty_meas\ty_pred\nG\tv1\tabc\t0.2\n");
        let err = load_gammas(file.path(), &ColumnOverrides::default()).unwrap_err();
        assert!(format!("{err:#}").contains("'abc' is not a number"));
    }

    #[test]
    fn test_ragged_row_fails() {
        let file = create_test_file("gene\tvariant\ty_meas\ty_pred\nG\tv1\t0.1\n");
        assert!(load_gammas(file.path(), &ColumnOverrides::default()).is_err());
    }

    #[test]
    fn test_empty_identifier_fails() {
        let file = create_test_file("gene\tvariant\ty_meas\ty_pred\n\tv1\t0.1\t0.2\n");
        let err = load_gammas(file.path(), &ColumnOverrides::default()).unwrap_err();
        assert!(format!("{err:#}").contains("empty gene or variant identifier"));
    }
}
