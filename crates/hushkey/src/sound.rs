//! Mute/unmute cues.
//!
//! Each cue is decoded once into PCM when the player is built; a toggle
//! only copies samples into the sink. With no custom WAV configured the cue
//! is a synthesized two-tone chirp, falling for mute and rising for unmute.

use std::f32::consts::TAU;
use std::io::Cursor;

use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, Sink, Source};

const SYNTH_RATE: u32 = 44_100;
/// Length of each of the two tones.
const TONE_MS: u32 = 70;
const TONE_GAP_MS: u32 = 20;
const AMPLITUDE: f32 = 0.25;

const HIGH_HZ: f32 = 880.0;
const LOW_HZ: f32 = 587.33;

/// PCM cue, decoded up front.
pub(crate) struct DecodedSound {
    channels: u16,
    sample_rate: u32,
    samples: Vec<i16>,
}

impl DecodedSound {
    fn to_source(&self) -> SamplesBuffer<i16> {
        SamplesBuffer::new(self.channels, self.sample_rate, self.samples.clone())
    }
}

fn decode_wav(bytes: &[u8]) -> Option<DecodedSound> {
    let decoder = Decoder::new(Cursor::new(bytes.to_vec())).ok()?;
    let (channels, sample_rate) = (decoder.channels(), decoder.sample_rate());
    Some(DecodedSound {
        channels,
        sample_rate,
        samples: decoder.collect(),
    })
}

/// One sine tone with a short linear fade at both ends.
fn tone(freq: f32, ms: u32, out: &mut Vec<i16>) {
    let n = SYNTH_RATE * ms / 1000;
    let fade = (SYNTH_RATE / 200).max(1); // 5 ms
    for i in 0..n {
        let t = i as f32 / SYNTH_RATE as f32;
        let edge = i.min(n - 1 - i);
        let env = if edge < fade {
            edge as f32 / fade as f32
        } else {
            1.0
        };
        let v = (TAU * freq * t).sin() * AMPLITUDE * env;
        out.push((v * i16::MAX as f32) as i16);
    }
}

/// Built-in cue: falling pair when muting, rising pair when unmuting.
pub(crate) fn builtin_cue(muted: bool) -> DecodedSound {
    let (first, second) = if muted {
        (HIGH_HZ, LOW_HZ)
    } else {
        (LOW_HZ, HIGH_HZ)
    };
    let mut samples = Vec::new();
    tone(first, TONE_MS, &mut samples);
    samples.extend(std::iter::repeat_n(0, (SYNTH_RATE * TONE_GAP_MS / 1000) as usize));
    tone(second, TONE_MS, &mut samples);
    DecodedSound {
        channels: 1,
        sample_rate: SYNTH_RATE,
        samples,
    }
}

fn read_cue(path: &str) -> Result<DecodedSound, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("could not read {path}: {e}"))?;
    decode_wav(&bytes).ok_or_else(|| format!("{path} is not a valid WAV file"))
}

/// The custom cue at `path`, or the built-in one when `path` is empty or
/// unusable.
pub(crate) fn load_sound_data(path: &str, muted: bool) -> DecodedSound {
    let path = path.trim();
    if path.is_empty() {
        return builtin_cue(muted);
    }
    read_cue(path).unwrap_or_else(|e| {
        log::warn!("[sound] {e}, using built-in");
        builtin_cue(muted)
    })
}

/// Both cues plus the output they play on. Without an output device the
/// player stays silent.
pub(crate) struct CuePlayer {
    mute: DecodedSound,
    unmute: DecodedSound,
    sink: Option<Sink>,
    _stream: Option<OutputStream>,
}

impl CuePlayer {
    pub fn new(mute_path: &str, unmute_path: &str) -> Self {
        let (stream, sink) = match OutputStream::try_default() {
            Ok((stream, handle)) => {
                let sink = Sink::try_new(&handle)
                    .map_err(|e| log::warn!("[sound] could not create sink: {e}"))
                    .ok();
                (Some(stream), sink)
            }
            Err(e) => {
                log::warn!("[sound] no audio output: {e}");
                (None, None)
            }
        };
        CuePlayer {
            mute: load_sound_data(mute_path, true),
            unmute: load_sound_data(unmute_path, false),
            sink,
            _stream: stream,
        }
    }

    /// Non-blocking. A cue still playing from a fast double toggle is cut off.
    pub fn play(&self, muted: bool) {
        let Some(sink) = &self.sink else {
            return;
        };
        sink.stop();
        let cue = if muted { &self.mute } else { &self.unmute };
        sink.append(cue.to_source());
    }
}
