//! Window and filterbank construction, plus reflect padding.
//!
//! The mel filterbank follows the Slaney conventions (Auditory Toolbox mel
//! scale, area-normalised triangles) and is computed in f64 before being
//! narrowed to f32, so the same basis comes out regardless of the caller's
//! sample precision.

use ndarray::Array2;

/// Periodic Hann window of `win_size` samples, centred inside `n_fft` samples
/// of zeros when `win_size < n_fft`.
pub fn build_hann_window(win_size: usize, n_fft: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    let n_fft = n_fft.max(win_size);
    let left = (n_fft - win_size) / 2;
    let mut window = vec![0f32; n_fft];
    for i in 0..win_size {
        window[left + i] = 0.5 * (1.0 - (2.0 * PI * i as f32 / win_size as f32).cos());
    }
    window
}

/// Mel projection matrix of shape `(n_mels, n_fft / 2 + 1)`.
pub fn build_mel_basis(
    sampling_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f32,
    fmax: f32,
) -> Array2<f32> {
    let n_freqs = n_fft / 2 + 1;
    let sr = sampling_rate as f64;

    let fft_freqs: Vec<f64> = (0..n_freqs).map(|k| k as f64 * sr / n_fft as f64).collect();

    let mel_min = hz_to_mel_slaney(fmin as f64);
    let mel_max = hz_to_mel_slaney(fmax as f64);
    let n_points = n_mels + 2;
    let hz_pts: Vec<f64> = (0..n_points)
        .map(|i| {
            let mel = if i + 1 == n_points {
                mel_max
            } else {
                mel_min + (mel_max - mel_min) * i as f64 / (n_points - 1) as f64
            };
            mel_to_hz_slaney(mel)
        })
        .collect();

    let mut basis = Array2::<f32>::zeros((n_mels, n_freqs));
    for m in 0..n_mels {
        let lower = hz_pts[m];
        let center = hz_pts[m + 1];
        let upper = hz_pts[m + 2];
        let enorm = 2.0 / (upper - lower);

        for (k, &freq) in fft_freqs.iter().enumerate() {
            let rising = (freq - lower) / (center - lower);
            let falling = (upper - freq) / (upper - center);
            let w = rising.min(falling).max(0.0);
            basis[[m, k]] = (w * enorm) as f32;
        }
    }
    basis
}

pub fn hz_to_mel_slaney(hz: f64) -> f64 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1_000.0;
    let min_log_mel = min_log_hz / f_sp; // 15
    let logstep = 6.4f64.ln() / 27.0;
    if hz >= min_log_hz {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    } else {
        hz / f_sp
    }
}

pub fn mel_to_hz_slaney(mel: f64) -> f64 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1_000.0;
    let min_log_mel = min_log_hz / f_sp; // 15
    let logstep = 6.4f64.ln() / 27.0;
    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        mel * f_sp
    }
}

/// Mirror `pad` samples onto each side, excluding the edge sample itself.
///
/// Inputs shorter than `pad + 1` keep bouncing between the edges rather than
/// failing, so any length can be padded.
pub fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    if pad == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return vec![0.0; pad * 2];
    }
    if samples.len() == 1 {
        return vec![samples[0]; 1 + pad * 2];
    }

    let n = samples.len() as isize;
    let mut out = Vec::with_capacity(samples.len() + 2 * pad);
    for i in -(pad as isize)..(n + pad as isize) {
        out.push(samples[reflect_index(i, samples.len())]);
    }
    out
}

fn reflect_index(mut i: isize, len: usize) -> usize {
    let max = len as isize - 1;
    while i < 0 || i > max {
        if i < 0 {
            i = -i;
        } else {
            i = 2 * max - i;
        }
    }
    i as usize
}
