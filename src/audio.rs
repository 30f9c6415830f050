use std::{fs::File, path::Path};

use anyhow::{anyhow, Context};
use hound::WavWriter;
use rubato::{InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction};
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::{
    error::{Result, SampleError},
    types::AudioData,
};

/// Sample rate used for onset analysis.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;

const SINC_LEN: usize = 128;
const RESAMPLE_CHUNK: usize = 1024;

pub fn read_audio<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path: &Path = path.as_ref();

    let file: File =
        File::open(path).with_context(|| format!("Failed to open audio file: {:?}", path))?;

    let mss: MediaSourceStream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint: Hint = Hint::new();

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| SampleError::decode(path, e))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| SampleError::decode(path, "no default track found"))?;
    let track_id = track.id;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SampleError::decode(path, e))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate: u32 = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels: u16 = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Corrupt frames are skipped, like most players do.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(SampleError::decode(path, e)),
        };
        if decoded.capacity() == 0 {
            continue;
        }
        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count() as u16;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);

        samples.extend_from_slice(buffer.samples());
    }

    if sample_rate == 0 || channels == 0 {
        return Err(SampleError::decode(path, "stream has no sample rate or channels"));
    }

    debug!(
        "Read audio {}: sample_rate={}, channels={}, samples={}",
        path.display(),
        sample_rate,
        channels,
        samples.len()
    );

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
    })
}

/// Decode a file and fold it down to a single channel.
pub fn read_mono<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let audio = read_audio(path)?;
    Ok(AudioData::mono(
        downmix_to_mono(&audio.samples, audio.channels),
        audio.sample_rate,
    ))
}

pub fn write_audio<P: AsRef<Path>>(path: P, audio: &AudioData) -> Result<()> {
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for sample in &audio.samples {
        let s = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(s)?;
    }

    writer.finalize()?;
    Ok(())
}

pub fn write_mono<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    write_audio(path, &AudioData::mono(samples.to_vec(), sample_rate))
}

pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels as usize)
        .map(|chunk| chunk.iter().copied().sum::<f32>() / channels as f32)
        .collect()
}

/// Band-limited resampling of a mono signal. Identity when the rates match.
///
/// The output stays aligned with the input and holds
/// `round(len * to / from)` samples.
pub fn resample_mono(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from == 0 || to == 0 {
        return Err(anyhow!("cannot resample {from} Hz -> {to} Hz").into());
    }

    let params = InterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: InterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = to as f64 / from as f64;
    let expected = (samples.len() as f64 * ratio).round() as usize;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| anyhow!("resampler setup failed: {e}"))?;

    let mut out: Vec<f32> = Vec::with_capacity(expected + RESAMPLE_CHUNK);
    let mut chunk = vec![0.0f32; RESAMPLE_CHUNK];
    let mut pos = 0;
    // The first output is centred on input frame 0, but each chunk holds
    // back its last half filter. Silent chunks past the end flush that tail.
    while out.len() < expected {
        chunk.fill(0.0);
        if pos < samples.len() {
            let end = (pos + RESAMPLE_CHUNK).min(samples.len());
            chunk[..end - pos].copy_from_slice(&samples[pos..end]);
        }
        pos += RESAMPLE_CHUNK;

        let mut block = resampler
            .process(&[chunk.as_slice()], None)
            .map_err(|e| anyhow!("resampling failed: {e}"))?;
        if let Some(mut y) = block.pop() {
            out.append(&mut y);
        }
    }

    out.truncate(expected);
    Ok(out)
}

/// Mono signal at the analysis rate, plus the rate it ended up at.
pub fn analysis_signal(audio: &AudioData) -> Result<(Vec<f32>, u32)> {
    let mono = downmix_to_mono(&audio.samples, audio.channels);
    if audio.sample_rate > ANALYSIS_SAMPLE_RATE {
        let y = resample_mono(&mono, audio.sample_rate, ANALYSIS_SAMPLE_RATE)?;
        Ok((y, ANALYSIS_SAMPLE_RATE))
    } else {
        Ok((mono, audio.sample_rate))
    }
}
