use tracing::debug;

use crate::model::Raster;

/// Number of histogram bins used for percentile thresholds.
pub const HISTOGRAM_BINS: usize = 50;

/// Equal-width histogram over `[lo, hi]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` edges, ascending.
    pub edges: Vec<f64>,
    pub frequencies: Vec<u64>,
}

impl Histogram {
    /// Bins `values` into `bins` equal-width bins over the inclusive range
    /// `[lo, hi]`. Values outside the range (and NaN) are ignored; the last bin
    /// is closed on the right. A zero-width range is widened by 0.5 each way.
    pub fn new<I>(values: I, bins: usize, lo: f64, hi: f64) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
        let step = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins)
            .map(|i| if i == bins { hi } else { lo + step * i as f64 })
            .collect();

        let mut frequencies = vec![0u64; bins];
        for value in values {
            if !(lo..=hi).contains(&value) {
                continue;
            }
            let mut index = (((value - lo) / (hi - lo)) * bins as f64) as usize;
            if index >= bins {
                index = bins - 1;
            }
            // Floating point can land one bin off near an edge.
            if value < edges[index] {
                index -= 1;
            } else if index + 1 < bins && value >= edges[index + 1] {
                index += 1;
            }
            frequencies[index] += 1;
        }

        Self { edges, frequencies }
    }

    /// Histogram of every cell (no-data included) over the raster's valid range.
    pub fn of_raster(raster: &Raster) -> Self {
        Self::new(
            raster.cells.iter().map(|&v| v as f64),
            HISTOGRAM_BINS,
            raster.min_value,
            raster.max_value,
        )
    }

    pub fn total(&self) -> u64 {
        self.frequencies.iter().sum()
    }

    /// One line per bin: upper edge, count and a bar of `*` per `scale` samples.
    pub fn render(&self, scale: u64) -> String {
        let scale = scale.max(1);
        self.edges[1..]
            .iter()
            .zip(&self.frequencies)
            .map(|(edge, freq)| {
                format!(
                    "{:.3} {} {}",
                    edge,
                    freq,
                    "*".repeat((freq / scale) as usize)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Approximate percentile of the raster's land cells using a 50-bin histogram.
///
/// Counts land cells (strictly above no-data), then walks the bins starting at
/// the second one and returns the upper edge of the first bin where the running
/// total passes `floor(land * percentile / 100)`. The first bin is never
/// counted. Returns `None` when no bin qualifies, e.g. `percentile >= 100`.
pub fn percentile_threshold(raster: &Raster, percentile: f64) -> Option<f64> {
    let histogram = Histogram::of_raster(raster);
    debug!(
        "Histogram for {}:\n{}",
        raster.material_code,
        histogram.render(300)
    );

    let land = raster.land_count();
    let target = (land as f64 * percentile / 100.0).floor() as u64;

    let mut accumulated = 0u64;
    for (index, freq) in histogram.frequencies.iter().enumerate().skip(1) {
        accumulated += freq;
        if accumulated > target {
            return Some(histogram.edges[index + 1]);
        }
    }

    debug!(
        "No bin passed {} of {} land cells for {}",
        target, land, raster.material_code
    );
    None
}
