//! WAV export of recorded guest tracks
//!
//! Recorded chunks are raw f32 samples; the exported artifact is mono 16-bit
//! PCM little-endian with the standard 44-byte header. A guest that joined
//! late relative to session start gets leading silence so all exported
//! tracks line up.

use crate::Result;
use std::io::Cursor;

/// Convert one f32 sample to the exported 16-bit representation
pub fn sample_to_i16(sample: f32) -> i16 {
    (sample * 0x7FFF as f32).round() as i16
}

/// Number of zero samples covering `start_offset_ms` of silence
pub fn silence_len(sample_rate: u32, start_offset_ms: u64) -> usize {
    ((sample_rate as u64 * start_offset_ms) / 1000) as usize
}

/// Encode samples as a mono 16-bit PCM WAV file
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    encode_wav_with_offset(samples, sample_rate, 0)
}

/// Encode samples as WAV, preceded by `start_offset_ms` of silence
pub fn encode_wav_with_offset(
    samples: &[f32],
    sample_rate: u32,
    start_offset_ms: u64,
) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;

    for _ in 0..silence_len(sample_rate, start_offset_ms) {
        writer.write_sample(0i16)?;
    }
    for &sample in samples {
        writer.write_sample(sample_to_i16(sample))?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_conversion() {
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(1.0), 0x7FFF);
        assert_eq!(sample_to_i16(-1.0), -0x7FFF);
        // 0.5 * 32767 = 16383.5, rounds away from zero
        assert_eq!(sample_to_i16(0.5), 16384);
        assert_eq!(sample_to_i16(-0.5), -16384);
    }

    #[test]
    fn test_silence_len_floors() {
        assert_eq!(silence_len(44100, 0), 0);
        assert_eq!(silence_len(44100, 1000), 44100);
        // 44100 * 333 / 1000 = 14685.3, floored
        assert_eq!(silence_len(44100, 333), 14685);
        assert_eq!(silence_len(8000, 125), 1000);
    }

    #[test]
    fn test_wav_round_trip() {
        let samples: Vec<f32> = (0..480).map(|i| (i as f32 / 480.0) - 0.5).collect();
        let bytes = encode_wav(&samples, 48000).unwrap();

        // Standard 44-byte header before the sample data
        assert_eq!(bytes.len(), 44 + samples.len() * 2);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let reader = hound::WavReader::new(Cursor::new(&bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len() as usize, samples.len());
    }

    #[test]
    fn test_wav_data_size_matches() {
        let samples = vec![0.25f32; 1000];
        let bytes = encode_wav(&samples, 44100).unwrap();

        let reader = hound::WavReader::new(Cursor::new(&bytes)).unwrap();
        // data subchunk holds N * 2 bytes
        assert_eq!(reader.len(), 1000);
        assert_eq!(reader.spec().sample_rate, 44100);
    }

    #[test]
    fn test_late_joiner_gets_leading_silence() {
        let samples = vec![1.0f32; 10];
        let bytes = encode_wav_with_offset(&samples, 8000, 250).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(&bytes)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();

        let pad = silence_len(8000, 250);
        assert_eq!(decoded.len(), pad + 10);
        assert!(decoded[..pad].iter().all(|&s| s == 0));
        assert!(decoded[pad..].iter().all(|&s| s == 0x7FFF));
    }
}
