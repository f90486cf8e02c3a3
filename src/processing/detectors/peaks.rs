use std::cmp::Ordering;

/// Indices of local maxima in `x`, in ascending order.
///
/// A flat-topped peak is reported at its middle sample (rounded down). The first
/// and last samples are never peaks.
pub fn local_maxima(x: &[f64], peaks: &mut Vec<usize>) {
    peaks.clear();
    let n = x.len();
    if n < 3 {
        return;
    }
    let last = n - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
}

/// Local maxima at least `min_height` tall and at least `min_distance` samples apart.
///
/// Spacing is enforced by keeping taller peaks first and discarding any smaller
/// neighbour closer than `min_distance`. The result is written into `peaks` in
/// ascending index order; `scratch` is reused between calls.
pub fn find_peaks(
    x: &[f64],
    min_height: f64,
    min_distance: usize,
    peaks: &mut Vec<usize>,
    scratch: &mut PeakScratch,
) {
    local_maxima(x, peaks);
    peaks.retain(|&p| x[p] >= min_height);

    if min_distance <= 1 || peaks.len() < 2 {
        return;
    }

    let PeakScratch { keep, priority } = scratch;
    keep.clear();
    keep.resize(peaks.len(), true);
    priority.clear();
    priority.extend(0..peaks.len());
    priority.sort_by(|&i, &j| x[peaks[i]].partial_cmp(&x[peaks[j]]).unwrap_or(Ordering::Equal));

    for &j in priority.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < min_distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < min_distance {
            keep[k] = false;
            k += 1;
        }
    }

    let mut index = 0;
    peaks.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
}

/// Reusable working memory for [`find_peaks`].
#[derive(Debug, Default, Clone)]
pub struct PeakScratch {
    keep: Vec<bool>,
    priority: Vec<usize>,
}

impl PeakScratch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keep: Vec::with_capacity(capacity),
            priority: Vec::with_capacity(capacity),
        }
    }
}
