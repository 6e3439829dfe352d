//! Peak detection and Gaussian peak estimation on 1D profiles.

use ndarray::ArrayView1;

/// A detected local maximum.
#[derive(Clone, Debug, PartialEq)]
pub struct Peak {
    /// Index in the profile.
    pub index: usize,
    /// Profile value at `index`.
    pub value: f64,
    /// Height above the higher of the two bounding valleys.
    pub prominence: f64,
}

/// Gaussian parameters estimated for one peak.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussianEstimate {
    pub center: f64,
    pub sigma: f64,
    pub amplitude: f64,
    pub background: f64,
}

impl GaussianEstimate {
    /// All-NaN estimate, used when no peak is found.
    pub fn nan() -> Self {
        Self {
            center: f64::NAN,
            sigma: f64::NAN,
            amplitude: f64::NAN,
            background: f64::NAN,
        }
    }

    pub fn to_vec(self) -> Vec<f64> {
        vec![self.center, self.sigma, self.amplitude, self.background]
    }

    /// Evaluate the model (Gaussian plus constant background) at `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.background
            + self.amplitude * (-(x - self.center).powi(2) / (2.0 * self.sigma.powi(2))).exp()
    }
}

/// Find strict local maxima with at least `min_height` and `min_prominence`.
pub fn find_peaks(data: ArrayView1<f64>, min_height: f64, min_prominence: f64) -> Vec<Peak> {
    let n = data.len();
    if n < 3 {
        return Vec::new();
    }

    (1..n - 1)
        .filter(|&i| data[i] > data[i - 1] && data[i] > data[i + 1] && data[i] >= min_height)
        .filter_map(|i| {
            let prominence = prominence(data, i);
            (prominence >= min_prominence).then(|| Peak {
                index: i,
                value: data[i],
                prominence,
            })
        })
        .collect()
}

/// Prominence of the maximum at `peak_idx`.
///
/// Each side is scanned until a strictly higher sample or the profile edge;
/// the valley on that side is the minimum crossed. NaN samples are skipped.
pub fn prominence(data: ArrayView1<f64>, peak_idx: usize) -> f64 {
    let peak = data[peak_idx];

    let valley = |indices: &mut dyn Iterator<Item = usize>| {
        let mut low = peak;
        for i in indices {
            let v = data[i];
            if v > peak {
                break;
            }
            if v < low {
                low = v;
            }
        }
        low
    };

    let left = valley(&mut (0..peak_idx).rev());
    let right = valley(&mut (peak_idx + 1..data.len()));
    peak - left.max(right)
}

/// The peak with the largest value.
pub fn highest_peak(peaks: &[Peak]) -> Option<&Peak> {
    peaks
        .iter()
        .max_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(std::cmp::Ordering::Equal))
}

/// Estimate Gaussian parameters of the peak at `peak_idx`.
///
/// The background is the minimum of the window `peak_idx ± half_width`;
/// center and sigma are the first and second moments of the
/// background-corrected window, refined over `iterations` passes in which
/// the window is narrowed to `range_multiplier * sigma` around the center.
pub fn estimate_gaussian(
    x: ArrayView1<f64>,
    y: ArrayView1<f64>,
    peak_idx: usize,
    half_width: usize,
    range_multiplier: f64,
    iterations: usize,
) -> GaussianEstimate {
    let n = y.len();
    if n == 0 || peak_idx >= n || x.len() != n {
        return GaussianEstimate::nan();
    }

    let mut start = peak_idx.saturating_sub(half_width);
    let mut end = peak_idx.saturating_add(half_width).saturating_add(1).min(n);

    let background = (start..end)
        .map(|i| y[i])
        .filter(|v| v.is_finite())
        .fold(f64::INFINITY, f64::min);
    let background = if background.is_finite() { background } else { 0.0 };

    let mut center = x[peak_idx];
    let mut sigma = f64::NAN;
    let step = if n > 1 {
        ((x[n - 1] - x[0]) / (n - 1) as f64).abs()
    } else {
        1.0
    };

    for _ in 0..iterations.max(1) {
        let mut sum_w = 0.0;
        let mut sum_wx = 0.0;
        for i in start..end {
            let w = (y[i] - background).max(0.0);
            if w.is_finite() {
                sum_w += w;
                sum_wx += w * x[i];
            }
        }
        if sum_w <= f64::EPSILON {
            break;
        }
        center = sum_wx / sum_w;

        let mut sum_var = 0.0;
        for i in start..end {
            let w = (y[i] - background).max(0.0);
            if w.is_finite() {
                sum_var += w * (x[i] - center).powi(2);
            }
        }
        sigma = (sum_var / sum_w).sqrt().max(step * 0.5);

        if step > 0.0 {
            let reach = (((sigma * range_multiplier) / step).ceil() as usize).clamp(1, n);
            start = peak_idx.saturating_sub(reach);
            end = (peak_idx + reach + 1).min(n);
        }
    }

    GaussianEstimate {
        center,
        sigma,
        amplitude: y[peak_idx] - background,
        background,
    }
}
