//! Synthetic recordings shared by the end-to-end tests

#![allow(dead_code)]

use std::f64::consts::PI;
use std::path::Path;

use whistlesync::Waveform;

pub const RATE: u32 = 44100;

/// `secs` of silence with a 2800 Hz tone from `onset_secs` to the end
pub fn whistle_recording(secs: f64, onset_secs: f64, amplitude: f32) -> Waveform {
    tone_recording(secs, onset_secs, None, 2800.0, amplitude)
}

/// `secs` of silence with a tone of `freq_hz` between `onset_secs` and `end_secs`
///
/// The tone's phase starts at zero at the onset.
pub fn tone_recording(
    secs: f64,
    onset_secs: f64,
    end_secs: Option<f64>,
    freq_hz: f64,
    amplitude: f32,
) -> Waveform {
    let n = (secs * RATE as f64).round() as usize;
    let start = (onset_secs * RATE as f64).round() as usize;
    let end = end_secs
        .map(|e| (e * RATE as f64).round() as usize)
        .unwrap_or(n);
    let samples = (0..n)
        .map(|i| {
            if i < start || i >= end {
                0.0
            } else {
                let t = (i - start) as f64 / RATE as f64;
                amplitude * (2.0 * PI * freq_hz * t).sin() as f32
            }
        })
        .collect();
    Waveform::new(samples, RATE).unwrap()
}

/// Deterministic white-noise burst inside silence
pub fn noise_burst(len: usize, at: usize, burst_len: usize) -> Waveform {
    let mut seed: u32 = 0x1234_5678;
    let mut samples = vec![0.0f32; len];
    for s in samples.iter_mut().skip(at).take(burst_len) {
        seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
        let bits = (seed >> 16) & 0x7FFF;
        *s = ((bits as f32 / 16384.0) - 1.0) * 0.5;
    }
    Waveform::new(samples, RATE).unwrap()
}

/// `wf` delayed by `n` samples of leading silence
pub fn delayed(wf: &Waveform, n: usize) -> Waveform {
    let mut samples = vec![0.0f32; n];
    samples.extend_from_slice(wf.samples());
    Waveform::new(samples, wf.sample_rate()).unwrap()
}

/// Write `wf` as a 16-bit mono WAV file
pub fn write_wav(path: &Path, wf: &Waveform) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: wf.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in wf.samples() {
        let v = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
        writer.write_sample(v).unwrap();
    }
    writer.finalize().unwrap();
}
