use ndarray::{Array1, Array2, Axis};
use num_complex::Complex32;
use once_cell::sync::Lazy;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::{
    f32::consts::PI,
    sync::{Arc, Mutex},
};

pub const ONSET_N_FFT: usize = 2048;
pub const ONSET_HOP: usize = 512;
pub const CHROMA_N_FFT: usize = 4096;
pub const CHROMA_HOP: usize = 1024;
pub const STRETCH_N_FFT: usize = 2048;
pub const STRETCH_HOP: usize = 512;

/// Pitch-class names indexed from C.
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

static PLANNER: Lazy<Mutex<FftPlanner<f32>>> = Lazy::new(|| Mutex::new(FftPlanner::new()));

fn plan(n_fft: usize, inverse: bool) -> Arc<dyn Fft<f32>> {
    // A poisoned planner is still a valid planner.
    let mut planner = PLANNER.lock().unwrap_or_else(|p| p.into_inner());
    if inverse {
        planner.plan_fft_inverse(n_fft)
    } else {
        planner.plan_fft_forward(n_fft)
    }
}

pub fn compute_hann(n_fft: usize) -> Vec<f32> {
    if n_fft <= 1 {
        return vec![1.0];
    }
    let denom = (n_fft - 1) as f32;
    (0..n_fft)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * (i as f32) / denom).cos())
        .collect()
}

/// Number of frames produced by [`stft`] for a signal of `len` samples.
pub fn frame_count(len: usize, hop: usize) -> usize {
    1 + len / hop
}

/// Centered STFT (zero padding of `n_fft / 2` on both sides, Hann window).
/// Returns a `[frames, n_fft / 2 + 1]` matrix of complex bins.
pub fn stft(signal: &[f32], n_fft: usize, hop: usize) -> Array2<Complex32> {
    assert!(n_fft > 0 && hop > 0, "n_fft and hop must be non-zero");

    let t = signal.len();
    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; pad + t + pad];
    padded[pad..pad + t].copy_from_slice(signal);

    let frames = frame_count(t, hop);
    let bins = n_fft / 2 + 1;
    let fft = plan(n_fft, false);
    let window = compute_hann(n_fft);

    let mut out = Array2::<Complex32>::zeros((frames, bins));
    let mut buf = vec![Complex32::zero(); n_fft];

    for fr in 0..frames {
        let start = fr * hop;
        let frame = &padded[start..start + n_fft];
        for i in 0..n_fft {
            buf[i] = Complex32::new(frame[i] * window[i], 0.0);
        }
        fft.process(&mut buf);
        for (k, v) in out.row_mut(fr).iter_mut().enumerate() {
            *v = buf[k];
        }
    }

    out
}

/// Inverse of [`stft`]: windowed overlap-add normalised by the summed
/// squared window, trimmed to `length` samples.
pub fn istft(spec: &Array2<Complex32>, n_fft: usize, hop: usize, length: usize) -> Vec<f32> {
    let frames = spec.nrows();
    let bins = spec.ncols();
    let ifft = plan(n_fft, true);
    let window = compute_hann(n_fft);

    let pad = n_fft / 2;
    let padded_length = (pad + length + pad).max(frames.saturating_sub(1) * hop + n_fft);
    let mut out = vec![0.0f32; padded_length];
    let mut window_sum = vec![0.0f32; padded_length];
    let mut buf = vec![Complex32::zero(); n_fft];
    let scale = 1.0 / n_fft as f32;

    for fr in 0..frames {
        buf.fill(Complex32::zero());
        for k in 0..bins.min(n_fft) {
            buf[k] = spec[(fr, k)];
        }
        // Hermitian mirror for a real-valued output.
        for k in 1..bins.min(n_fft / 2 + 1) {
            if n_fft - k >= bins {
                buf[n_fft - k] = buf[k].conj();
            }
        }
        buf[0].im = 0.0;
        if n_fft % 2 == 0 {
            buf[n_fft / 2].im = 0.0;
        }
        ifft.process(&mut buf);

        let start = fr * hop;
        for i in 0..n_fft {
            let w = window[i];
            out[start + i] += buf[i].re * w * scale;
            window_sum[start + i] += w * w;
        }
    }

    for (s, w) in out.iter_mut().zip(&window_sum) {
        if *w > 1e-10 {
            *s /= *w;
        }
    }

    let mut y: Vec<f32> = out.into_iter().skip(pad).take(length).collect();
    y.resize(length, 0.0);
    y
}

/// Spectral-flux onset strength: per frame, the mean positive change in
/// log-compressed magnitude relative to the previous frame.
pub fn onset_strength(signal: &[f32], n_fft: usize, hop: usize) -> Vec<f32> {
    let spec = stft(signal, n_fft, hop);
    let log_mag = spec.mapv(|c| (1.0 + 100.0 * c.norm()).ln());
    let bins = log_mag.ncols().max(1) as f32;

    let mut env = vec![0.0f32; log_mag.nrows()];
    for fr in 1..log_mag.nrows() {
        let cur = log_mag.row(fr);
        let prev = log_mag.row(fr - 1);
        let flux: f32 = cur
            .iter()
            .zip(prev.iter())
            .map(|(c, p)| (c - p).max(0.0))
            .sum();
        env[fr] = flux / bins;
    }
    env
}

/// Peak picking parameters, in frames, on a max-normalised envelope.
#[derive(Clone, Copy, Debug)]
pub struct PeakPick {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub delta: f32,
    pub wait: usize,
}

impl PeakPick {
    /// Defaults expressed in seconds (30 ms max window, 100 ms mean
    /// window, 30 ms refractory period) and converted to frames.
    pub fn for_rate(sample_rate: u32, hop: usize) -> Self {
        let frames = |secs: f32| ((secs * sample_rate as f32) / hop as f32) as usize;
        Self {
            pre_max: frames(0.03).max(1),
            post_max: 1,
            pre_avg: frames(0.10).max(1),
            post_avg: frames(0.10).max(1),
            delta: 0.07,
            wait: frames(0.03).max(1),
        }
    }
}

pub fn peak_pick(env: &[f32], p: PeakPick) -> Vec<usize> {
    let peak = env.iter().copied().fold(0.0f32, f32::max);
    if env.is_empty() || peak <= 0.0 {
        return Vec::new();
    }
    let norm: Vec<f32> = env.iter().map(|v| v / peak).collect();

    let mut onsets = Vec::new();
    let mut last: Option<usize> = None;
    for n in 0..norm.len() {
        let lo = n.saturating_sub(p.pre_max);
        let hi = (n + p.post_max).min(norm.len());
        let local_max = norm[lo..hi].iter().copied().fold(f32::MIN, f32::max);
        if norm[n] < local_max {
            continue;
        }

        let lo = n.saturating_sub(p.pre_avg);
        let hi = (n + p.post_avg).min(norm.len());
        let mean = norm[lo..hi].iter().sum::<f32>() / (hi - lo) as f32;
        if norm[n] < mean + p.delta {
            continue;
        }

        if let Some(prev) = last {
            if n - prev <= p.wait {
                continue;
            }
        }
        onsets.push(n);
        last = Some(n);
    }
    onsets
}

/// Roll each onset back to the nearest preceding local minimum of
/// `energy` (frame 0 counts as a minimum).
pub fn backtrack(events: &[usize], energy: &[f32]) -> Vec<usize> {
    let mut minima = vec![0usize];
    for i in 1..energy.len().saturating_sub(1) {
        if energy[i] <= energy[i - 1] && energy[i] < energy[i + 1] {
            minima.push(i);
        }
    }
    events
        .iter()
        .map(|&e| {
            minima
                .iter()
                .copied()
                .take_while(|&m| m <= e)
                .last()
                .unwrap_or(0)
        })
        .collect()
}

pub fn frames_to_time(frames: &[usize], sample_rate: u32, hop: usize) -> Vec<f64> {
    frames
        .iter()
        .map(|&f| (f * hop) as f64 / sample_rate as f64)
        .collect()
}

/// STFT chroma: `[12, frames]`, each frame scaled so its loudest pitch
/// class is 1.0. Silent frames stay zero.
pub fn chroma(signal: &[f32], sample_rate: u32, n_fft: usize, hop: usize) -> Array2<f32> {
    let spec = stft(signal, n_fft, hop);
    let frames = spec.nrows();
    let mut out = Array2::<f32>::zeros((12, frames));

    // Bin -> pitch class, restricted to C1..~C8.
    let bin_class: Vec<Option<usize>> = (0..spec.ncols())
        .map(|k| {
            let f = k as f32 * sample_rate as f32 / n_fft as f32;
            if !(32.0..=4200.0).contains(&f) {
                return None;
            }
            let midi = 69.0 + 12.0 * (f / 440.0).log2();
            Some((midi.round() as i64).rem_euclid(12) as usize)
        })
        .collect();

    for fr in 0..frames {
        let row = spec.row(fr);
        for (k, c) in row.iter().enumerate() {
            if let Some(pc) = bin_class[k] {
                out[(pc, fr)] += c.norm_sqr();
            }
        }
        let mut col = out.column_mut(fr);
        let max = col.iter().copied().fold(0.0f32, f32::max);
        if max > 0.0 {
            col.mapv_inplace(|v| v / max);
        }
    }

    out
}

/// Time average of a chroma matrix.
pub fn mean_chroma(chroma: &Array2<f32>) -> Array1<f32> {
    chroma
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(12))
}

/// Phase-vocoder time stretch. `rate > 1` speeds up (shorter output),
/// `rate < 1` slows down. Output length is `round(len / rate)`.
pub fn phase_vocoder(signal: &[f32], rate: f64, n_fft: usize, hop: usize) -> Vec<f32> {
    let out_len = (signal.len() as f64 / rate).round() as usize;
    if signal.is_empty() || out_len == 0 {
        return Vec::new();
    }

    let spec = stft(signal, n_fft, hop);
    let (frames, bins) = spec.dim();

    let phi_advance: Vec<f32> = (0..bins)
        .map(|k| 2.0 * PI * hop as f32 * k as f32 / n_fft as f32)
        .collect();

    let col = |fr: usize, k: usize| -> Complex32 {
        if fr < frames {
            spec[(fr, k)]
        } else {
            Complex32::zero()
        }
    };

    let mut steps = Vec::new();
    let mut t = 0.0f64;
    while t < frames as f64 {
        steps.push(t);
        t += rate;
    }

    let mut stretched = Array2::<Complex32>::zeros((steps.len(), bins));
    let mut phase_acc: Vec<f32> = (0..bins).map(|k| col(0, k).arg()).collect();

    for (i, &step) in steps.iter().enumerate() {
        let fr = step.floor() as usize;
        let alpha = (step - fr as f64) as f32;
        for k in 0..bins {
            let c0 = col(fr, k);
            let c1 = col(fr + 1, k);
            let mag = (1.0 - alpha) * c0.norm() + alpha * c1.norm();
            stretched[(i, k)] = Complex32::from_polar(mag, phase_acc[k]);

            let mut dphase = c1.arg() - c0.arg() - phi_advance[k];
            dphase -= 2.0 * PI * (dphase / (2.0 * PI)).round();
            phase_acc[k] += phi_advance[k] + dphase;
        }
    }

    istft(&stretched, n_fft, hop, out_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_is_zero_at_edges() {
        let w = compute_hann(8);
        assert_eq!(w[0], 0.0);
        assert!(w[7].abs() < 1e-6);
    }

    #[test]
    fn backtrack_moves_to_preceding_minimum() {
        let energy = [0.0, 0.0, 0.2, 1.0, 0.4, 0.1, 0.3, 0.9];
        assert_eq!(backtrack(&[3, 7], &energy), vec![1, 5]);
    }

    #[test]
    fn peak_pick_ignores_flat_silence() {
        let p = PeakPick::for_rate(22_050, 512);
        assert!(peak_pick(&[0.0; 64], p).is_empty());
    }

    #[test]
    fn frames_to_time_uses_hop() {
        let t = frames_to_time(&[0, 43], 22_050, 512);
        assert_eq!(t[0], 0.0);
        assert!((t[1] - 43.0 * 512.0 / 22_050.0).abs() < 1e-12);
    }
}
