use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::gammas::VariantRecord;

/// Per-gene Pearson r for one gamma table.
#[derive(Debug, Clone, Default)]
pub struct GeneCorrelations {
    /// gene -> r, always within [-1, 1]
    pub coefficients: BTreeMap<String, f64>,
    /// Genes where r is undefined (fewer than two complete variants or a constant side).
    pub undefined: Vec<String>,
}

impl GeneCorrelations {
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }
}

/// Pearson correlation of two equal-length samples.
/// Returns None when fewer than two pairs are given or either side has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    // exact test: centred sums of a constant side can be nonzero rounding noise
    if xs.iter().all(|v| *v == xs[0]) || ys.iter().all(|v| *v == ys[0]) {
        return None;
    }
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    if !r.is_finite() {
        return None;
    }
    Some(r.clamp(-1.0, 1.0))
}

/// Group records by gene and correlate measured against predicted scores within each gene.
/// Variants missing either score are left out of their gene's sample.
pub fn pearsons_by_gene(records: &[VariantRecord]) -> GeneCorrelations {
    let mut groups: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for r in records {
        let entry = groups.entry(r.gene.as_str()).or_default();
        if let (Some(m), Some(p)) = (r.measured, r.predicted) {
            entry.0.push(m);
            entry.1.push(p);
        }
    }

    let scored: Vec<(&str, Option<f64>)> = groups
        .into_par_iter()
        .map(|(gene, (meas, pred))| (gene, pearson(&meas, &pred)))
        .collect();

    let mut out = GeneCorrelations::default();
    for (gene, r) in scored {
        match r {
            Some(r) => {
                out.coefficients.insert(gene.to_string(), r);
            }
            None => out.undefined.push(gene.to_string()),
        }
    }
    out.undefined.sort();
    out
}
