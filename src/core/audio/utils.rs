use super::error::AudioError;
use log::{debug, error, info};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType};
use std::path::Path;

/// Read a WAV file as mono f32 at its native rate.
///
/// Integer formats are normalized to [-1.0, 1.0]; multi-channel audio is
/// averaged per frame.
pub fn load_wav_mono_f32(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    info!("📖 Reading WAV file: {:?}", path);
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    info!(
        "📊 WAV spec: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    if spec.sample_rate == 0 {
        return Err(AudioError::Wav(hound::Error::FormatError(
            "invalid sample rate",
        )));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = ((1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) - 1).max(1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    info!("✓ Loaded {} mono samples from file", samples.len());
    Ok((samples, spec.sample_rate))
}

/// Read a WAV file as mono f32 resampled to `target_rate`.
pub fn load_wav_mono_at(path: &Path, target_rate: u32) -> Result<Vec<f32>, AudioError> {
    let (samples, rate) = load_wav_mono_f32(path)?;
    resample_mono(&samples, rate, target_rate)
}

pub fn resample_mono(input: &[f32], in_rate: u32, out_rate: u32) -> Result<Vec<f32>, AudioError> {
    if in_rate == out_rate || input.is_empty() {
        return Ok(input.to_vec());
    }
    if in_rate == 0 || out_rate == 0 {
        return Err(AudioError::Resample(format!(
            "invalid rates {} Hz -> {} Hz",
            in_rate, out_rate
        )));
    }

    if in_rate > out_rate && in_rate % out_rate == 0 {
        let factor = (in_rate / out_rate) as usize;
        info!(
            "⚡ Fast downsample from {} Hz to {} Hz (factor {})",
            in_rate, out_rate, factor
        );
        return Ok(downsample_by_factor(input, factor));
    }

    info!(
        "🔧 Resampling {} samples from {} Hz to {} Hz",
        input.len(),
        in_rate,
        out_rate
    );
    let ratio = out_rate as f64 / in_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 48,
        f_cutoff: 0.90,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 4,
        window: rubato::WindowFunction::BlackmanHarris2,
    };

    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, params, input.len(), 1).map_err(|e| {
            error!("❌ Resample creation failed: {}", e);
            AudioError::Resample(e.to_string())
        })?;

    let mut output = vec![vec![0.0f32; resampler.output_frames_max()]];
    let (_, written) = resampler
        .process_into_buffer(&[input], &mut output, None)
        .map_err(|e| {
            error!("❌ Resample processing failed: {}", e);
            AudioError::Resample(e.to_string())
        })?;

    let mut result = output.swap_remove(0);
    result.truncate(written);
    info!(
        "✓ Resampling complete: {} -> {} samples",
        input.len(),
        result.len()
    );
    Ok(result)
}

/// Quickly downsample by averaging consecutive frames when the ratio is an integer
fn downsample_by_factor(input: &[f32], factor: usize) -> Vec<f32> {
    debug_assert!(factor > 0);
    let mut output = Vec::with_capacity((input.len() + factor - 1) / factor);
    let mut accumulator = 0.0_f32;
    let mut count = 0;

    for &sample in input {
        accumulator += sample;
        count += 1;
        if count == factor {
            output.push(accumulator / factor as f32);
            accumulator = 0.0;
            count = 0;
        }
    }

    if count > 0 {
        output.push(accumulator / count as f32);
    }

    debug!("Downsampled {} -> {} samples", input.len(), output.len());
    output
}
