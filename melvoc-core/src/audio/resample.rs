//! Spectral (FFT-domain) sample-rate conversion.
//!
//! ## Design
//!
//! Whole-file resampling for the training/inference frontends: the input is
//! transformed with a single real FFT, its spectrum truncated (downsampling)
//! or zero-extended (upsampling) to the target length, and transformed back.
//! This is the band-limited "periodic" resampler, so the output length can be
//! chosen exactly rather than approximated by a streaming filter.
//!
//! For even-length spectra the Nyquist bin is merged (downsampling) or split
//! in half (upsampling) so that energy at `fs/2` is preserved.
//!
//! ## Usage
//!
//! ```ignore
//! let num = resampled_len(samples.len(), 44_100, 22_050);
//! let out = resample_spectral(&samples, num); // exactly `num` samples
//! ```

use rustfft::{num_complex::Complex, FftPlanner};

/// Number of output samples when converting `len` samples from `from_rate`
/// to `to_rate`: `len * to / from`, rounded half-to-even.
pub fn resampled_len(len: usize, from_rate: u32, to_rate: u32) -> usize {
    (len as f64 * to_rate as f64 / from_rate as f64).round_ties_even() as usize
}

/// Resample `samples` to exactly `num` samples in the frequency domain.
///
/// Computation runs in f64; the result is narrowed back to f32.
pub fn resample_spectral(samples: &[f32], num: usize) -> Vec<f32> {
    let nx = samples.len();
    if num == 0 {
        return Vec::new();
    }
    if nx == 0 {
        return vec![0.0; num];
    }

    let mut planner = FftPlanner::<f64>::new();

    let mut spectrum: Vec<Complex<f64>> = samples
        .iter()
        .map(|&s| Complex::new(s as f64, 0.0))
        .collect();
    planner.plan_fft_forward(nx).process(&mut spectrum);

    // One-sided output spectrum: bins 0..=num/2.
    let half_out = num / 2 + 1;
    let mut half = vec![Complex::new(0.0f64, 0.0); half_out];

    let n = num.min(nx);
    let nyq = n / 2 + 1;
    half[..nyq].copy_from_slice(&spectrum[..nyq]);

    if n % 2 == 0 {
        if num < nx {
            half[n / 2] *= 2.0;
        } else if nx < num {
            half[n / 2] *= 0.5;
        }
    }

    // Rebuild the Hermitian full spectrum. DC and (even-length) Nyquist are
    // purely real in an inverse real transform.
    let mut full = vec![Complex::new(0.0f64, 0.0); num];
    full[0] = Complex::new(half[0].re, 0.0);
    for k in 1..half_out {
        if num % 2 == 0 && k == num / 2 {
            full[k] = Complex::new(half[k].re, 0.0);
        } else {
            full[k] = half[k];
            full[num - k] = half[k].conj();
        }
    }
    planner.plan_fft_inverse(num).process(&mut full);

    // rustfft is unnormalised: 1/num for the inverse, times num/nx for the
    // amplitude correction, leaves 1/nx.
    let scale = 1.0 / nx as f64;
    full.iter().map(|c| (c.re * scale) as f32).collect()
}
