use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::gammas::{load_gammas, ColumnOverrides};
use crate::pearson::{pearsons_by_gene, GeneCorrelations};
use crate::scatter;

/// One gene with a coefficient on both axes.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub gene: String,
    pub x: f64,
    pub y: f64,
}

/// Two per-gene series joined on gene, columns named after the axis labels.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTable {
    pub x_label: String,
    pub y_label: String,
    /// Ordered by gene.
    pub rows: Vec<AlignedRow>,
    pub x_only: usize,
    pub y_only: usize,
}

impl AlignedTable {
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.rows.iter().map(|r| (r.x, r.y)).collect()
    }
}

/// Inner join of two gene -> r maps. Genes missing from either side are dropped.
pub fn align(
    x: &BTreeMap<String, f64>,
    y: &BTreeMap<String, f64>,
    x_label: &str,
    y_label: &str,
) -> AlignedTable {
    let rows: Vec<AlignedRow> = x
        .iter()
        .filter_map(|(gene, &xv)| {
            y.get(gene).map(|&yv| AlignedRow {
                gene: gene.clone(),
                x: xv,
                y: yv,
            })
        })
        .collect();
    let x_only = x.len() - rows.len();
    let y_only = y.len() - rows.len();
    AlignedTable {
        x_label: x_label.to_string(),
        y_label: y_label.to_string(),
        rows,
        x_only,
        y_only,
    }
}

#[derive(Debug, Clone)]
pub struct CompareConfig {
    pub x_gammas: PathBuf,
    pub x_name: String,
    pub y_gammas: PathBuf,
    pub y_name: String,
    pub png_file: PathBuf,
    pub width: u32,
    pub height: u32,
    pub columns: ColumnOverrides,
}

fn correlate_file(path: &Path, columns: &ColumnOverrides) -> Result<GeneCorrelations> {
    let table = load_gammas(path, columns)?;
    println!(
        "[INFO] Loaded {} variants over {} genes from {} (columns: {}/{}/{} vs {})",
        table.records.len(),
        table.gene_count(),
        table.path.display(),
        table.columns.gene,
        table.columns.variant,
        table.columns.measured,
        table.columns.predicted
    );
    if table.duplicates > 0 {
        println!(
            "[INFO] Skipped {} duplicate gene/variant rows in {}",
            table.duplicates,
            path.display()
        );
    }
    let prs = pearsons_by_gene(&table.records);
    if !prs.undefined.is_empty() {
        println!(
            "[INFO] {} gene(s) in {} have no defined Pearson r (too few variants or constant scores)",
            prs.undefined.len(),
            path.display()
        );
    }
    Ok(prs)
}

/// Load both tables, correlate per gene and align on gene.
pub fn correlate_and_align(cfg: &CompareConfig) -> Result<AlignedTable> {
    println!(
        "[INFO] Reading X: {} from {}...",
        cfg.x_name,
        cfg.x_gammas.display()
    );
    println!(
        "[INFO] Reading Y: {} from {}...",
        cfg.y_name,
        cfg.y_gammas.display()
    );
    let (x_res, y_res) = rayon::join(
        || correlate_file(&cfg.x_gammas, &cfg.columns),
        || correlate_file(&cfg.y_gammas, &cfg.columns),
    );
    let x_prs = x_res?;
    let y_prs = y_res?;
    println!(
        "[INFO] Genes with Pearson r: X={} Y={}",
        x_prs.len(),
        y_prs.len()
    );

    let table = align(
        &x_prs.coefficients,
        &y_prs.coefficients,
        &cfg.x_name,
        &cfg.y_name,
    );
    println!(
        "[INFO] Overlap genes: {} (X only: {}, Y only: {})",
        table.rows.len(),
        table.x_only,
        table.y_only
    );
    if table.rows.is_empty() {
        println!("[INFO] No shared genes; the plot will have no points");
    }
    Ok(table)
}

/// Correlate and align both tables, then write the scatter plot.
pub fn run_compare(cfg: &CompareConfig) -> Result<AlignedTable> {
    let table = correlate_and_align(cfg)?;

    if let Some(parent) = cfg.png_file.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory {}", parent.display())
            })?;
        }
    }

    scatter::render(&table, &cfg.png_file, cfg.width, cfg.height)?;
    println!(
        "[OK] Pearson comparison: wrote {} (points: {})",
        cfg.png_file.display(),
        table.rows.len()
    );
    Ok(table)
}
