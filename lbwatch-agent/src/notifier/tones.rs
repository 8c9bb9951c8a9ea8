//! Cue synthesis: enveloped tones rendered to 16-bit mono PCM and WAV

use std::f32::consts::PI;
use std::time::Duration;

use super::Cue;

pub const SAMPLE_RATE: u32 = 44_100;

/// Linear fade in/out applied to every tone
const ENVELOPE_MS: u32 = 10;
const AMPLITUDE: f32 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Sine,
    Triangle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub freq_hz: f32,
    pub duration_ms: u32,
    /// Silence after the tone
    pub gap_ms: u32,
    pub waveform: Waveform,
}

const ONLINE_TONES: [Tone; 2] = [
    Tone {
        freq_hz: 660.0,
        duration_ms: 120,
        gap_ms: 40,
        waveform: Waveform::Sine,
    },
    Tone {
        freq_hz: 880.0,
        duration_ms: 160,
        gap_ms: 0,
        waveform: Waveform::Sine,
    },
];

const OFFLINE_TONES: [Tone; 1] = [Tone {
    freq_hz: 220.0,
    duration_ms: 600,
    gap_ms: 0,
    waveform: Waveform::Triangle,
}];

/// Two short ascending tones for online, one long low tone for offline
pub fn cue_tones(cue: Cue) -> &'static [Tone] {
    match cue {
        Cue::Online => &ONLINE_TONES,
        Cue::Offline => &OFFLINE_TONES,
    }
}

pub fn cue_duration(cue: Cue) -> Duration {
    let ms: u32 = cue_tones(cue).iter().map(|t| t.duration_ms + t.gap_ms).sum();
    Duration::from_millis(u64::from(ms))
}

fn samples_for(ms: u32, sample_rate: u32) -> usize {
    (u64::from(ms) * u64::from(sample_rate) / 1000) as usize
}

fn oscillator(waveform: Waveform, phase: f32) -> f32 {
    match waveform {
        Waveform::Sine => (2.0 * PI * phase).sin(),
        Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
    }
}

/// Render tones back to back, including gaps
pub fn synthesize(tones: &[Tone], sample_rate: u32) -> Vec<i16> {
    let mut samples = Vec::new();
    let ramp = samples_for(ENVELOPE_MS, sample_rate).max(1);

    for tone in tones {
        let count = samples_for(tone.duration_ms, sample_rate);
        for n in 0..count {
            let t = n as f32 / sample_rate as f32;
            let phase = (tone.freq_hz * t).fract();
            let attack = (n as f32 / ramp as f32).min(1.0);
            let release = ((count - n) as f32 / ramp as f32).min(1.0);
            let value = oscillator(tone.waveform, phase) * AMPLITUDE * attack.min(release);
            samples.push((value * f32::from(i16::MAX)) as i16);
        }
        samples.extend(std::iter::repeat(0).take(samples_for(tone.gap_ms, sample_rate)));
    }

    samples
}

/// Wrap PCM samples in a canonical 44-byte-header WAV container
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes()); // byte rate
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }

    out
}

/// Complete WAV file for a cue
pub fn render_cue(cue: Cue) -> Vec<u8> {
    encode_wav(&synthesize(cue_tones(cue), SAMPLE_RATE), SAMPLE_RATE)
}
