use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hound::{SampleFormat, WavSpec, WavWriter};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Parameters the WAV header is written from. Nothing is inferred from
/// the PCM payload; the header reflects exactly these three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AudioParams {
    pub channels: u16,
    pub sample_rate_hz: u32,
    pub sample_width_bytes: u16,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate_hz: 24_000,
            sample_width_bytes: 2,
        }
    }
}

impl AudioParams {
    pub fn bit_depth(&self) -> u16 {
        self.sample_width_bytes * 8
    }

    fn frame_bytes(&self) -> usize {
        self.channels as usize * self.sample_width_bytes as usize
    }
}

/// Encode raw linear PCM into a WAV container and return it base64-encoded.
///
/// Deterministic: the same PCM and params always produce byte-identical
/// output. The PCM must be a whole number of frames; a fractional frame is
/// a caller bug and is rejected up front.
pub fn encode_wav_base64(pcm: &[u8], params: &AudioParams) -> Result<String, FlowError> {
    if params.channels == 0 || params.sample_rate_hz == 0 || params.sample_width_bytes == 0 {
        return Err(FlowError::input_validation(format!(
            "audio params must be positive: {params:?}"
        )));
    }
    if !matches!(params.sample_width_bytes, 1 | 2 | 4) {
        return Err(FlowError::input_validation(format!(
            "unsupported sample width: {} bytes",
            params.sample_width_bytes
        )));
    }
    if pcm.len() % params.frame_bytes() != 0 {
        return Err(FlowError::input_validation(format!(
            "PCM length {} is not a whole number of {}-byte frames",
            pcm.len(),
            params.frame_bytes()
        )));
    }

    let spec = WavSpec {
        channels: params.channels,
        sample_rate: params.sample_rate_hz,
        bits_per_sample: params.bit_depth(),
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)
        .map_err(|e| FlowError::Generation(format!("WAV header write failed: {e}")))?;

    let result = match params.sample_width_bytes {
        1 => pcm
            .iter()
            .try_for_each(|b| writer.write_sample(*b as i8)),
        2 => pcm
            .chunks_exact(2)
            .try_for_each(|c| writer.write_sample(i16::from_le_bytes([c[0], c[1]]))),
        4 => pcm
            .chunks_exact(4)
            .try_for_each(|c| writer.write_sample(i32::from_le_bytes([c[0], c[1], c[2], c[3]]))),
        _ => unreachable!("width checked above"),
    };
    result.map_err(|e| FlowError::Generation(format!("WAV frame write failed: {e}")))?;
    writer
        .finalize()
        .map_err(|e| FlowError::Generation(format!("WAV finalize failed: {e}")))?;

    Ok(BASE64.encode(cursor.into_inner()))
}

/// Unpack the base64 payload of a `data:` URI into raw bytes.
pub fn decode_data_uri(url: &str) -> Result<Vec<u8>, FlowError> {
    let encoded = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, data)| data)
        .ok_or_else(|| {
            FlowError::Provider("media payload is not a base64 data URI".to_string())
        })?;
    BASE64
        .decode(encoded)
        .map_err(|e| FlowError::Provider(format!("media payload is not valid base64: {e}")))
}
