use num_complex::Complex64;
use std::f64::consts::PI;

use crate::error::ConfigError;

/// Butterworth band-pass design in transfer-function form.
///
/// Returns `(b, a)` with `a[0] == 1`, both of length `2 * order + 1`, for the
/// digital filter with passband `[low, high]` Hz at sample rate `fs`.
///
/// Steps: analog prototype poles on the unit circle, pre-warping of the band
/// edges, low-pass to band-pass transform, bilinear transform, and polynomial
/// expansion of the resulting zeros and poles.
pub fn bandpass(
    order: usize,
    low: f64,
    high: f64,
    fs: f64,
) -> Result<(Vec<f64>, Vec<f64>), ConfigError> {
    validate(order, low, high, fs)?;

    // Design at a normalised rate of 2 so that the bilinear constant is 4.
    let fs_design = 2.0;
    let fs2 = 2.0 * fs_design;
    let warped_low = fs2 * (PI * low / fs).tan();
    let warped_high = fs2 * (PI * high / fs).tan();
    let bandwidth = warped_high - warped_low;
    let center = (warped_low * warped_high).sqrt();

    let prototype = prototype_poles(order);

    // Each low-pass pole splits into a conjugate-symmetric band-pass pair.
    let mut analog_poles = Vec::with_capacity(2 * order);
    let scaled: Vec<Complex64> = prototype.iter().map(|&p| p * (bandwidth / 2.0)).collect();
    for &p in &scaled {
        analog_poles.push(p + (p * p - center * center).sqrt());
    }
    for &p in &scaled {
        analog_poles.push(p - (p * p - center * center).sqrt());
    }
    let analog_gain = bandwidth.powi(order as i32);

    // Analog zeros: `order` at the origin. They map to z = 1, while the zeros
    // at infinity map to z = -1.
    let mut digital_zeros = vec![Complex64::new(1.0, 0.0); order];
    digital_zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(order));

    let digital_poles: Vec<Complex64> = analog_poles
        .iter()
        .map(|&p| (fs2 + p) / (fs2 - p))
        .collect();

    let denominator: Complex64 = analog_poles.iter().map(|&p| fs2 - p).product();
    let gain = analog_gain * (Complex64::new(fs2.powi(order as i32), 0.0) / denominator).re;

    let b = poly(&digital_zeros).into_iter().map(|c| c * gain).collect();
    let a = poly(&digital_poles);
    Ok((b, a))
}

fn validate(order: usize, low: f64, high: f64, fs: f64) -> Result<(), ConfigError> {
    if !(fs.is_finite() && fs > 0.0) {
        return Err(ConfigError::InvalidSampleRate(fs));
    }
    if order == 0 {
        return Err(ConfigError::InvalidOrder(order));
    }
    let nyquist = fs / 2.0;
    let valid = low.is_finite() && high.is_finite() && low > 0.0 && low < high && high < nyquist;
    if !valid {
        return Err(ConfigError::InvalidPassband { low, high, nyquist });
    }
    Ok(())
}

fn prototype_poles(order: usize) -> Vec<Complex64> {
    let n = order as i64;
    (0..n)
        .map(|k| {
            let m = (2 * k - n + 1) as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * order as f64))
        })
        .collect()
}

/// Monic polynomial coefficients (highest power first) with the given roots.
/// Roots come in conjugate pairs, so only the real parts are kept.
fn poly(roots: &[Complex64]) -> Vec<f64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * root;
        }
        coeffs = next;
    }
    coeffs.into_iter().map(|c| c.re).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // First-order band-pass via direct bilinear transform of bw*s / (s^2 + bw*s + w0^2).
    fn first_order_reference(low: f64, high: f64, fs: f64) -> (Vec<f64>, Vec<f64>) {
        let w1 = 4.0 * (PI * low / fs).tan();
        let w2 = 4.0 * (PI * high / fs).tan();
        let bw = w2 - w1;
        let w0_sq = w1 * w2;
        let d = 16.0 + 4.0 * bw + w0_sq;
        (
            vec![4.0 * bw / d, 0.0, -4.0 * bw / d],
            vec![1.0, (2.0 * w0_sq - 32.0) / d, (16.0 - 4.0 * bw + w0_sq) / d],
        )
    }

    #[test]
    fn first_order_matches_closed_form() {
        let (b, a) = bandpass(1, 0.1, 15.0, 100.0).unwrap();
        let (rb, ra) = first_order_reference(0.1, 15.0, 100.0);
        for (x, y) in b.iter().zip(rb.iter()).chain(a.iter().zip(ra.iter())) {
            assert!((x - y).abs() < 1e-12, "{} != {}", x, y);
        }
        assert!((b[0] - 0.3358017419484296).abs() < 1e-12);
        assert!((a[1] + 1.3241505133161076).abs() < 1e-12);
        assert!((a[2] - 0.3283965161031408).abs() < 1e-12);
    }

    #[test]
    fn coefficient_lengths_follow_order() {
        for order in 1..=4 {
            let (b, a) = bandpass(order, 0.5, 40.0, 250.0).unwrap();
            assert_eq!(b.len(), 2 * order + 1);
            assert_eq!(a.len(), 2 * order + 1);
            assert!((a[0] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn blocks_dc_and_nyquist() {
        // Zeros at z = 1 and z = -1: numerator sums vanish there.
        let (b, _) = bandpass(3, 1.0, 30.0, 200.0).unwrap();
        let dc: f64 = b.iter().sum();
        let nyquist: f64 = b
            .iter()
            .enumerate()
            .map(|(i, c)| if i % 2 == 0 { *c } else { -*c })
            .sum();
        assert!(dc.abs() < 1e-9);
        assert!(nyquist.abs() < 1e-9);
    }

    #[test]
    fn unit_gain_at_band_center() {
        // Butterworth band-pass has |H| == 1 at the geometric center of the warped band.
        let fs = 100.0;
        let (low, high) = (0.1, 15.0);
        let (b, a) = bandpass(2, low, high, fs).unwrap();
        let w1 = (PI * low / fs).tan();
        let w2 = (PI * high / fs).tan();
        let omega = 2.0 * (w1 * w2).sqrt().atan();
        let z = Complex64::from_polar(1.0, omega);
        let eval = |c: &[f64]| -> Complex64 {
            c.iter()
                .enumerate()
                .map(|(i, v)| *v * z.powi(-(i as i32)))
                .sum()
        };
        let gain = (eval(&b) / eval(&a)).norm();
        assert!((gain - 1.0).abs() < 1e-9, "gain {}", gain);
    }

    #[test]
    fn rejects_invalid_passbands() {
        assert!(matches!(
            bandpass(1, 15.0, 0.1, 100.0),
            Err(ConfigError::InvalidPassband { .. })
        ));
        assert!(matches!(
            bandpass(1, 0.1, 50.0, 100.0),
            Err(ConfigError::InvalidPassband { .. })
        ));
        assert!(matches!(
            bandpass(1, 0.1, 15.0, 0.0),
            Err(ConfigError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            bandpass(0, 0.1, 15.0, 100.0),
            Err(ConfigError::InvalidOrder(0))
        ));
    }
}
