use thiserror::Error;
#[derive(Debug, Error)]
pub enum SpeechError {
  #[error("No engine has been registered with the name {0}")]
  EngineNotFound(String),
  #[error("The engine {engine} is unavailable: {error}")]
  EngineUnavailable {
    engine: String,
    error: anyhow::Error,
  },
  #[error("No voice was found with the name {0}")]
  VoiceNotFound(String),
  #[error("No voices were found")]
  NoVoices,
  #[error("Speech rate ({0}) is not between 0 and 100")]
  InvalidRate(u8),
  #[error("Speech volume ({0}) is not between 0 and 100")]
  InvalidVolume(u8),
  #[error("Speech pitch ({0}) is not between 0 and 100")]
  InvalidPitch(u8),
  #[error("Failed to speak with the requested engine ({engine}) and voice {voice}: {error}")]
  SpeakFailed {
    engine: String,
    voice: String,
    error: anyhow::Error,
  },
  #[error("Failed to stop the requested engine ({engine}) from speaking: {error}")]
  StopSpeechFailed {
    engine: String,
    error: anyhow::Error,
  },
  #[error("Failed to set {parameter} on voice {voice}: {error}")]
  ParameterFailed {
    voice: String,
    parameter: String,
    error: anyhow::Error,
  },
  #[error("The task was cancelled before it completed")]
  TaskCancelled,
  #[error("The task timed out after {0} milliseconds")]
  TaskTimedOut(u128),
  #[error("The dispatch worker is not running")]
  WorkerStopped,
  #[error("Failed to read or write {path}: {error}")]
  Io {
    path: String,
    error: std::io::Error,
  },
  #[error("The configuration is corrupt: {0}")]
  ConfigCorrupt(anyhow::Error),
  #[error("Failed to initialize worldvoice-rs: {0}")]
  InitializeFailed(anyhow::Error),
  #[error("Unknown error: {0}")]
  Unknown(anyhow::Error),
}
impl SpeechError {
  pub fn into_engine_not_found(engine: &str) -> Self {
    SpeechError::EngineNotFound(engine.to_owned())
  }
  pub fn into_engine_unavailable<T>(engine: &str, error: T) -> Self
  where
    T: Into<anyhow::Error>,
  {
    SpeechError::EngineUnavailable {
      engine: engine.to_owned(),
      error: error.into(),
    }
  }
  pub fn into_voice_not_found(voice: &str) -> Self {
    SpeechError::VoiceNotFound(voice.to_owned())
  }
  pub fn into_speak_failed<T>(engine: &str, voice: &str, error: T) -> Self
  where
    T: Into<anyhow::Error>,
  {
    SpeechError::SpeakFailed {
      engine: engine.to_owned(),
      voice: voice.to_owned(),
      error: error.into(),
    }
  }
  pub fn into_stop_speech_failed<T>(engine: &str, error: T) -> Self
  where
    T: Into<anyhow::Error>,
  {
    SpeechError::StopSpeechFailed {
      engine: engine.to_owned(),
      error: error.into(),
    }
  }
  pub fn into_parameter_failed<T>(voice: &str, parameter: &str, error: T) -> Self
  where
    T: Into<anyhow::Error>,
  {
    SpeechError::ParameterFailed {
      voice: voice.to_owned(),
      parameter: parameter.to_owned(),
      error: error.into(),
    }
  }
  pub fn into_io(path: &std::path::Path, error: std::io::Error) -> Self {
    SpeechError::Io {
      path: path.display().to_string(),
      error,
    }
  }
  pub fn into_config_corrupt<T>(error: T) -> Self
  where
    T: Into<anyhow::Error>,
  {
    SpeechError::ConfigCorrupt(error.into())
  }
  pub fn into_initialize_failed<T>(error: T) -> Self
  where
    T: Into<anyhow::Error>,
  {
    SpeechError::InitializeFailed(error.into())
  }
  pub fn into_unknown<T>(error: T) -> Self
  where
    T: Into<anyhow::Error>,
  {
    SpeechError::Unknown(error.into())
  }
}
