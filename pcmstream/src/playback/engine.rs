//! Decode engine entry points
//!
//! [`DecodeEngine`] holds the process-wide state (configuration, streaming
//! scheduler, content budget) and turns sources into decode sessions.
//! `try_open` reports why a sound failed; the other entry points log the
//! failure and yield `None` so a bad sound never interrupts playback.

use crate::audio::format::{dispatch, ContainerFormat};
use crate::audio::normalizer::NormalizedStream;
use crate::audio::source::{AudioSource, SourceKind};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::playback::budget::ContentBudget;
use crate::playback::scheduler::StreamingScheduler;
use crate::playback::session::{DecodeMode, DecodeSession, StreamInfo};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Caller preference for how a sound is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModePreference {
    /// Eager for in-memory WAV, streaming otherwise
    #[default]
    Auto,
    Eager,
    Streaming,
}

/// One request to decode a sound
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub source: AudioSource,
    /// Extension or format name; overrides the source's own extension
    pub hint: Option<String>,
    pub mode: ModePreference,
    /// Name used in logs; defaults to the source's display name
    pub name: Option<String>,
}

impl DecodeRequest {
    pub fn new(source: AudioSource) -> Self {
        Self {
            source,
            hint: None,
            mode: ModePreference::Auto,
            name: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_mode(mut self, mode: ModePreference) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Streaming audio decode engine
pub struct DecodeEngine {
    config: EngineConfig,
    scheduler: StreamingScheduler,
    budget: Arc<ContentBudget>,
}

impl DecodeEngine {
    /// Create an engine whose producers run on `runtime`.
    pub fn new(config: EngineConfig, runtime: Handle) -> Result<Self> {
        config.validate()?;
        let scheduler = StreamingScheduler::new(&config, runtime);
        Ok(Self {
            config,
            scheduler,
            budget: Arc::new(ContentBudget::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn budget(&self) -> &Arc<ContentBudget> {
        &self.budget
    }

    pub fn scheduler(&self) -> &StreamingScheduler {
        &self.scheduler
    }

    /// Choose eager or streaming decode for a source.
    pub fn select_mode(&self, kind: SourceKind, format: ContainerFormat, preference: ModePreference) -> DecodeMode {
        if !self.config.enable_background_streaming {
            return DecodeMode::Eager;
        }
        match preference {
            ModePreference::Eager => DecodeMode::Eager,
            ModePreference::Streaming => DecodeMode::Streaming,
            ModePreference::Auto => match (kind, format) {
                (SourceKind::Memory, ContainerFormat::Wav) => DecodeMode::Eager,
                _ => DecodeMode::Streaming,
            },
        }
    }

    /// Open a sound, reporting why it failed.
    pub fn try_open(&self, request: DecodeRequest) -> Result<DecodeSession> {
        let DecodeRequest {
            source,
            hint,
            mode,
            name,
        } = request;
        let name = name.unwrap_or_else(|| source.display_name());

        let dispatched = dispatch(&source, hint.as_deref())?;
        let stream = NormalizedStream::new(dispatched.decoder, self.config.canonical_sample_rate)?;
        let info = StreamInfo::from_stream(name, &stream, dispatched.replaygain);

        let mode = self.select_mode(source.kind(), info.format, mode);
        debug!("Opening '{}' as {} ({:?})", info.name, info.format, mode);

        Ok(match mode {
            DecodeMode::Eager => DecodeSession::preload(
                info,
                stream,
                &self.budget,
                self.config.chunk_size_samples,
                self.config.initial_buffer_samples,
            ),
            DecodeMode::Streaming => self.scheduler.begin(info, stream),
        })
    }

    /// Open a sound; failures are logged and yield `None`.
    pub fn open(&self, request: DecodeRequest) -> Option<DecodeSession> {
        let name = request
            .name
            .clone()
            .unwrap_or_else(|| request.source.display_name());
        match self.try_open(request) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Failed to open sound '{}': {}", name, e);
                None
            }
        }
    }

    /// Read a whole file into memory and open it by its extension.
    pub fn open_path(&self, path: impl AsRef<Path>) -> Option<DecodeSession> {
        let path = path.as_ref();
        let source = match AudioSource::read_file(path) {
            Ok(source) => source,
            Err(e) => {
                warn!("Invalid sound '{}': {}", path.display(), e);
                return None;
            }
        };

        let mut request = DecodeRequest::new(source).with_name(path.display().to_string());
        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            request = request.with_hint(ext);
        }
        self.open(request)
    }

    /// Stream a file from disk; `None` when it does not exist.
    pub fn open_streaming(&self, path: impl AsRef<Path>) -> Option<DecodeSession> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Streaming source not found: {}", path.display());
            return None;
        }
        self.open(
            DecodeRequest::new(AudioSource::File(path.to_path_buf())).with_mode(ModePreference::Streaming),
        )
    }

    /// Open in-memory bytes, assumed to be WAV.
    pub fn open_bytes(&self, bytes: impl Into<Arc<[u8]>>) -> Option<DecodeSession> {
        self.open(DecodeRequest::new(AudioSource::from_bytes(bytes)).with_hint("wav"))
    }
}
