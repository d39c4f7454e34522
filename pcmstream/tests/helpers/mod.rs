//! Test helper modules for pcmstream integration tests
//!
//! - audio_generator: deterministic WAV/AIFF fixtures built in memory
//! - ogg_vorbis: hand-built silent Ogg Vorbis streams with chosen comments
//! - engine helpers: engines with test-friendly configuration and a
//!   reference decode that bypasses sessions entirely

#![allow(dead_code)]

pub mod audio_generator;
pub mod ogg_vorbis;

use pcmstream::audio::{dispatch, AudioSource, NormalizedStream};
use pcmstream::{DecodeEngine, DecodeSession, EngineConfig};

/// Engine on the current tokio runtime with a modified default config
pub fn engine_with(configure: impl FnOnce(&mut EngineConfig)) -> DecodeEngine {
    let mut config = EngineConfig::default();
    configure(&mut config);
    DecodeEngine::new(config, tokio::runtime::Handle::current()).unwrap()
}

/// Decode `bytes` straight through the normalizer, no session involved
pub fn reference_decode(bytes: &[u8], hint: &str) -> Vec<f32> {
    let dispatched = dispatch(&AudioSource::from_bytes(bytes.to_vec()), Some(hint)).unwrap();
    let mut stream = NormalizedStream::new(dispatched.decoder, 44100).unwrap();

    let mut all = Vec::new();
    let mut block = vec![0.0; 8192];
    loop {
        let n = stream.read(&mut block).unwrap();
        if n == 0 {
            break;
        }
        all.extend_from_slice(&block[..n]);
    }
    all
}

/// Copy everything a session has published so far
pub fn read_all(session: &DecodeSession) -> Vec<f32> {
    let mut all = Vec::new();
    let mut block = vec![0.0; 4096];
    loop {
        let n = session.read_into(all.len(), &mut block).unwrap();
        if n == 0 {
            break;
        }
        all.extend_from_slice(&block[..n]);
    }
    all
}
