pub mod loopback;
pub mod plain;
pub mod sapi;
pub mod vocalizer;
use crate::conversion::Curve;
use crate::error::SpeechError;
use crate::metadata::{EngineMetadata, VoiceInfo};
use crate::speech::{Prosody, SpeechCommand};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineFamily {
  Vocalizer,
  Sapi,
  Plain,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Parameter {
  Rate,
  Pitch,
  Volume,
  Variant,
  Language,
  WaitFactor,
}
impl fmt::Display for Parameter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Parameter::Rate => "rate",
      Parameter::Pitch => "pitch",
      Parameter::Volume => "volume",
      Parameter::Variant => "variant",
      Parameter::Language => "language",
      Parameter::WaitFactor => "wait factor",
    };
    write!(f, "{name}")
  }
}
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParameterValue {
  Number(i32),
  Text(String),
}
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Utterance {
  Markup(String),
  Sequence(Vec<SpeechCommand>),
}
impl Utterance {
  pub fn is_empty(&self) -> bool {
    match self {
      Utterance::Markup(markup) => markup.is_empty(),
      Utterance::Sequence(commands) => commands.is_empty(),
    }
  }
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterCurves {
  pub rate: Curve,
  pub pitch: Curve,
  pub volume: Curve,
  pub rate_boost: Option<Curve>,
  pub max_break_ms: u32,
}
impl EngineFamily {
  pub fn curves(self) -> ParameterCurves {
    match self {
      EngineFamily::Vocalizer => ParameterCurves {
        rate: Curve::VOCALIZER_RATE,
        pitch: Curve::VOCALIZER_PITCH,
        volume: Curve::PERCENT,
        rate_boost: Some(Curve::RATE_BOOST),
        max_break_ms: vocalizer::MAX_BREAK_MS,
      },
      EngineFamily::Sapi => ParameterCurves {
        rate: Curve::SAPI_SCALE,
        pitch: Curve::SAPI_SCALE,
        volume: Curve::PERCENT,
        rate_boost: None,
        max_break_ms: sapi::MAX_BREAK_MS,
      },
      EngineFamily::Plain => ParameterCurves {
        rate: Curve::PERCENT,
        pitch: Curve::PERCENT,
        volume: Curve::PERCENT,
        rate_boost: None,
        max_break_ms: plain::MAX_BREAK_MS,
      },
    }
  }
  pub fn chunk_builder(self, prosody: ProsodyBase) -> Box<dyn ChunkBuilder> {
    match self {
      EngineFamily::Vocalizer => Box::new(vocalizer::EscapeChunk::new(prosody)),
      EngineFamily::Sapi => Box::new(sapi::XmlChunk::new(prosody)),
      EngineFamily::Plain => Box::new(plain::CommandChunk::new(prosody)),
    }
  }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProsodyBase {
  pub rate: u8,
  pub pitch: u8,
  pub volume: u8,
  pub rate_boost: bool,
}
impl Default for ProsodyBase {
  fn default() -> Self {
    ProsodyBase {
      rate: 50,
      pitch: 50,
      volume: 100,
      rate_boost: false,
    }
  }
}
pub trait ChunkBuilder {
  fn append(&mut self, command: &SpeechCommand);
  fn flush(&mut self) -> Option<Utterance>;
  fn on_voice_switch(&mut self, prosody: ProsodyBase);
}
/// Prosody overrides in force for the rest of a sequence. A chunk builder
/// closes its overrides when it flushes, so the dispatcher replays these at
/// the start of every following chunk. Offsets are kept unresolved and land
/// on whatever voice speaks the next chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProsodyOverrides {
  rate: Option<Prosody>,
  pitch: Option<Prosody>,
  volume: Option<Prosody>,
}
impl ProsodyOverrides {
  pub fn record(&mut self, command: &SpeechCommand) {
    match command {
      SpeechCommand::Rate(value) => self.rate = Some(*value),
      SpeechCommand::Pitch(value) => self.pitch = Some(*value),
      SpeechCommand::Volume(value) => self.volume = Some(*value),
      _ => {}
    }
  }
  pub fn replay(&self, chunk: &mut dyn ChunkBuilder) {
    if let Some(value) = self.pitch {
      chunk.append(&SpeechCommand::Pitch(value));
    }
    if let Some(value) = self.rate {
      chunk.append(&SpeechCommand::Rate(value));
    }
    if let Some(value) = self.volume {
      chunk.append(&SpeechCommand::Volume(value));
    }
  }
}
pub(crate) fn unsupported(family: EngineFamily, command: &SpeechCommand) {
  warn!("Dropping unsupported {} command for {family:?} voices", command.kind());
}
pub trait EngineListener: Send + Sync {
  fn index_reached(&self, voice: &str, index: u32);
  fn done_speaking(&self, voice: &str);
}
pub trait Engine: Send {
  fn name(&self) -> String;
  fn metadata(&self) -> EngineMetadata;
  fn engine_on(&mut self, listener: Arc<dyn EngineListener>) -> Result<(), SpeechError>;
  fn engine_off(&mut self) -> Result<(), SpeechError>;
  fn voices(&self) -> Result<Vec<VoiceInfo>, SpeechError>;
  fn speak(&mut self, voice: &str, utterance: &Utterance) -> Result<(), SpeechError>;
  fn stop(&mut self, voice: &str) -> Result<(), SpeechError>;
  fn pause(&mut self, voice: &str, switch: bool) -> Result<(), SpeechError>;
  fn resume(&mut self, voice: &str) -> Result<(), SpeechError>;
  fn close(&mut self, voice: &str) -> Result<(), SpeechError>;
  fn get_parameter(&self, voice: &str, parameter: Parameter)
    -> Result<ParameterValue, SpeechError>;
  fn set_parameter(
    &mut self,
    voice: &str,
    parameter: Parameter,
    value: ParameterValue,
  ) -> Result<(), SpeechError>;
}
#[derive(Default)]
pub struct EngineSet {
  engines: HashMap<String, Box<dyn Engine>>,
}
impl EngineSet {
  pub fn new(engines: Vec<Box<dyn Engine>>) -> Self {
    EngineSet {
      engines: engines
        .into_iter()
        .map(|engine| (engine.name(), engine))
        .collect(),
    }
  }
  pub fn get_mut(&mut self, engine: &str) -> Result<&mut Box<dyn Engine>, SpeechError> {
    self
      .engines
      .get_mut(engine)
      .ok_or(SpeechError::into_engine_not_found(engine))
  }
  pub fn names(&self) -> Vec<String> {
    let mut names = self.engines.keys().cloned().collect::<Vec<String>>();
    names.sort_unstable();
    names
  }
  pub fn remove(&mut self, engine: &str) -> Option<Box<dyn Engine>> {
    self.engines.remove(engine)
  }
  pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Box<dyn Engine>)> {
    self.engines.iter_mut()
  }
}
