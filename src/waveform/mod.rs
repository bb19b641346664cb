pub mod decode;

use std::path::Path;

use crate::progress::ProgressHandle;
use decode::DecodedAudio;

/// Build a downsampled amplitude envelope for a track: up to `bars` values
/// in [0, 1], one RMS amplitude per window of frames. An empty result means
/// the waveform is unavailable (undecodable file) or the build was
/// cancelled — neither is an error.
pub fn build(path: &Path, bars: usize, progress: &dyn ProgressHandle) -> Vec<f32> {
    if bars == 0 {
        return Vec::new();
    }

    let Some(audio) = decode::decode_samples(path, progress) else {
        return Vec::new();
    };

    let mono = downmix(&audio);
    if mono.is_empty() {
        return Vec::new();
    }

    match envelope(&mono, bars, progress) {
        Some(env) => env,
        None => {
            log::debug!("Waveform build cancelled for {}", path.display());
            Vec::new()
        }
    }
}

/// Average interleaved channels into one value per frame.
fn downmix(audio: &DecodedAudio) -> Vec<f32> {
    if audio.channels <= 1 {
        return audio.samples.clone();
    }
    audio
        .samples
        .chunks_exact(audio.channels)
        .map(|frame| frame.iter().sum::<f32>() / audio.channels as f32)
        .collect()
}

/// Reduce a mono signal to per-window RMS bars, peak-normalized. Returns
/// `None` on cancellation; an all-silent signal stays all-zero rather than
/// being scaled up to noise.
fn envelope(mono: &[f32], bars: usize, progress: &dyn ProgressHandle) -> Option<Vec<f32>> {
    let hop = (mono.len() / bars).max(1);
    progress.set_total(bars as u64);

    let mut out = Vec::with_capacity(bars.min(mono.len()));
    for index in 0..bars {
        if progress.is_cancelled() {
            return None;
        }
        let start = index * hop;
        if start >= mono.len() {
            break;
        }
        let end = ((index + 1) * hop).min(mono.len());
        let window = &mono[start..end];
        let mean_square =
            window.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / window.len() as f64;
        out.push(mean_square.sqrt() as f32);
        progress.advance(1);
    }

    let peak = out.iter().cloned().fold(0.0f32, f32::max);
    if peak > 0.0 {
        for bar in &mut out {
            *bar /= peak;
        }
    }
    Some(out)
}
