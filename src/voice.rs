//! Percent-domain view of one engine voice.
//!
//! All reads and writes happen in percent. Conversion to the engine's
//! physical units uses the curves of the voice's engine family, and every
//! engine call goes through the task manager so that a parameter change
//! lands between utterances, never in the middle of one.
use crate::backends::{EngineFamily, Parameter, ParameterValue, ProsodyBase, Utterance};
use crate::config::{SharedSettings, VoiceSettings};
use crate::error::SpeechError;
use crate::metadata::{EngineMetadata, VoiceInfo};
use crate::task_manager::{TaskHandle, TaskManager};
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
pub const UNKNOWN_LANGUAGE: &str = "unknown";
pub struct Voice {
  info: VoiceInfo,
  metadata: EngineMetadata,
  tasks: Arc<TaskManager>,
  store: Arc<SharedSettings>,
  live: Mutex<VoiceSettings>,
  committed: Mutex<VoiceSettings>,
}
fn lock(mutex: &Mutex<VoiceSettings>) -> MutexGuard<'_, VoiceSettings> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
impl Voice {
  /// Loads the voice's last committed settings, or `inherited` when the
  /// voice has none, and pushes them to the engine.
  pub fn new(
    info: VoiceInfo,
    metadata: EngineMetadata,
    tasks: Arc<TaskManager>,
    store: Arc<SharedSettings>,
    inherited: Option<VoiceSettings>,
  ) -> Self {
    let settings = store
      .voice_settings(&info.qualified_name())
      .or(inherited)
      .unwrap_or_default();
    debug!("Loaded {} with {settings:?}", info.qualified_name());
    let voice = Voice {
      info,
      metadata,
      tasks,
      store,
      live: Mutex::new(settings.clone()),
      committed: Mutex::new(settings.clone()),
    };
    voice.push(&settings);
    voice
  }
  pub fn name(&self) -> String {
    self.info.qualified_name()
  }
  pub fn info(&self) -> &VoiceInfo {
    &self.info
  }
  pub fn engine(&self) -> &str {
    &self.info.engine
  }
  pub fn family(&self) -> EngineFamily {
    self.metadata.family
  }
  pub fn language(&self) -> &str {
    if self.info.locale.is_empty() {
      UNKNOWN_LANGUAGE
    } else {
      &self.info.locale
    }
  }
  pub fn prosody(&self) -> ProsodyBase {
    let live = lock(&self.live);
    ProsodyBase {
      rate: live.rate,
      pitch: live.pitch,
      volume: live.volume,
      rate_boost: live.rate_boost && self.supports_rate_boost(),
    }
  }
  pub fn supports_rate_boost(&self) -> bool {
    self.metadata.supports_rate_boost && self.family().curves().rate_boost.is_some()
  }
  fn set_parameter(&self, parameter: Parameter, value: ParameterValue) {
    let engine = self.info.engine.clone();
    let voice = self.info.name.clone();
    let qualified = self.name();
    let _handle = self.tasks.submit(&qualified, false, move |engines| {
      engines
        .get_mut(&engine)?
        .set_parameter(&voice, parameter, value)
        .map_err(|error| {
          SpeechError::into_parameter_failed(&voice, &parameter.to_string(), error)
        })
    });
  }
  fn physical_rate(&self, settings: &VoiceSettings) -> i32 {
    let curves = self.family().curves();
    match curves.rate_boost {
      Some(boost) if settings.rate_boost && self.metadata.supports_rate_boost => {
        boost.to_physical(settings.rate)
      }
      _ => curves.rate.to_physical(settings.rate),
    }
  }
  fn push(&self, settings: &VoiceSettings) {
    let curves = self.family().curves();
    self.set_parameter(
      Parameter::Rate,
      ParameterValue::Number(self.physical_rate(settings)),
    );
    self.set_parameter(
      Parameter::Pitch,
      ParameterValue::Number(curves.pitch.to_physical(settings.pitch)),
    );
    self.set_parameter(
      Parameter::Volume,
      ParameterValue::Number(curves.volume.to_physical(settings.volume)),
    );
    let variant = settings
      .variant
      .clone()
      .filter(|_| self.metadata.supports_variants);
    if let Some(variant) = variant {
      self.set_parameter(Parameter::Variant, ParameterValue::Text(variant));
    }
  }
  /// Queues `utterance`; the worker stays on it until the engine reports
  /// the voice is done.
  pub fn speak(&self, utterance: Utterance) -> TaskHandle {
    let engine = self.info.engine.clone();
    let voice = self.info.name.clone();
    self.tasks.submit(&self.name(), true, move |engines| {
      engines
        .get_mut(&engine)?
        .speak(&voice, &utterance)
        .map_err(|error| SpeechError::into_speak_failed(&engine, &voice, error))
    })
  }
  pub fn stop(&self) -> TaskHandle {
    let engine = self.info.engine.clone();
    let voice = self.info.name.clone();
    self.tasks.interrupt(move |engines| {
      engines
        .get_mut(&engine)?
        .stop(&voice)
        .map_err(|error| SpeechError::into_stop_speech_failed(&engine, error))
    })
  }
  pub fn pause(&self, switch: bool) -> TaskHandle {
    let engine = self.info.engine.clone();
    let voice = self.info.name.clone();
    self
      .tasks
      .interrupt(move |engines| engines.get_mut(&engine)?.pause(&voice, switch))
  }
  pub fn resume(&self) -> TaskHandle {
    let engine = self.info.engine.clone();
    let voice = self.info.name.clone();
    self
      .tasks
      .interrupt(move |engines| engines.get_mut(&engine)?.resume(&voice))
  }
  pub fn close(&self) -> TaskHandle {
    let engine = self.info.engine.clone();
    let voice = self.info.name.clone();
    self
      .tasks
      .submit(&self.name(), false, move |engines| engines.get_mut(&engine)?.close(&voice))
  }
  pub fn settings(&self) -> VoiceSettings {
    lock(&self.live).clone()
  }
  pub fn rate(&self) -> u8 {
    lock(&self.live).rate
  }
  pub fn set_rate(&self, rate: u8) -> Result<(), SpeechError> {
    if rate > 100 {
      return Err(SpeechError::InvalidRate(rate));
    }
    let settings = {
      let mut live = lock(&self.live);
      live.rate = rate;
      live.clone()
    };
    self.set_parameter(
      Parameter::Rate,
      ParameterValue::Number(self.physical_rate(&settings)),
    );
    Ok(())
  }
  pub fn pitch(&self) -> u8 {
    lock(&self.live).pitch
  }
  pub fn set_pitch(&self, pitch: u8) -> Result<(), SpeechError> {
    if pitch > 100 {
      return Err(SpeechError::InvalidPitch(pitch));
    }
    lock(&self.live).pitch = pitch;
    let physical = self.family().curves().pitch.to_physical(pitch);
    self.set_parameter(Parameter::Pitch, ParameterValue::Number(physical));
    Ok(())
  }
  pub fn volume(&self) -> u8 {
    lock(&self.live).volume
  }
  pub fn set_volume(&self, volume: u8) -> Result<(), SpeechError> {
    if volume > 100 {
      return Err(SpeechError::InvalidVolume(volume));
    }
    lock(&self.live).volume = volume;
    let physical = self.family().curves().volume.to_physical(volume);
    self.set_parameter(Parameter::Volume, ParameterValue::Number(physical));
    Ok(())
  }
  pub fn variant(&self) -> Option<String> {
    lock(&self.live).variant.clone()
  }
  pub fn set_variant(&self, variant: &str) {
    if !self.metadata.supports_variants {
      warn!("{} does not support variants", self.name());
      return;
    }
    lock(&self.live).variant = Some(variant.to_owned());
    self.set_parameter(Parameter::Variant, ParameterValue::Text(variant.to_owned()));
  }
  pub fn rate_boost(&self) -> bool {
    lock(&self.live).rate_boost
  }
  /// Switches rate control between the regular curve and the boost
  /// multiplier range. The percent rate is kept and re-applied.
  pub fn set_rate_boost(&self, rate_boost: bool) {
    if rate_boost && !self.supports_rate_boost() {
      warn!("{} does not support rate boost", self.name());
      return;
    }
    let settings = {
      let mut live = lock(&self.live);
      live.rate_boost = rate_boost;
      live.clone()
    };
    self.set_parameter(
      Parameter::Rate,
      ParameterValue::Number(self.physical_rate(&settings)),
    );
  }
  /// Copies rate, pitch, volume and rate boost from `source`. Variants are
  /// engine specific and stay untouched.
  pub fn apply_prosody(&self, source: &VoiceSettings) {
    let settings = {
      let mut live = lock(&self.live);
      live.rate = source.rate;
      live.pitch = source.pitch;
      live.volume = source.volume;
      live.rate_boost = source.rate_boost && self.supports_rate_boost();
      live.clone()
    };
    self.push(&VoiceSettings {
      variant: None,
      ..settings
    });
  }
  pub fn commit(&self) {
    let settings = self.settings();
    lock(&self.committed).clone_from(&settings);
    self.store.set_voice_settings(&self.name(), settings);
  }
  /// Restores the last commit in memory, in the settings store and on the
  /// engine.
  pub fn rollback(&self) {
    let settings = lock(&self.committed).clone();
    lock(&self.live).clone_from(&settings);
    self.store.set_voice_settings(&self.name(), settings.clone());
    self.push(&settings);
  }
}
#[cfg(test)]
mod tests {
  use super::*;
  use crate::backends::loopback::{EngineCall, LoopbackEngine, LoopbackHandle};
  use crate::backends::{Engine, EngineSet};
  use crate::config::{MemoryConfigStore, Settings, TaskSettings};
  fn voice(family: EngineFamily, stored: Option<VoiceSettings>) -> (Voice, LoopbackHandle, Arc<TaskManager>) {
    let engine = LoopbackEngine::new("Engine", family, &[("Anna", "de_DE")]);
    let loopback = engine.handle();
    let metadata = engine.metadata();
    let info = engine.voices().unwrap().remove(0);
    let tasks = Arc::new(
      TaskManager::start(EngineSet::new(vec![Box::new(engine)]), TaskSettings::default(), None).unwrap(),
    );
    let mut settings = Settings::default();
    if let Some(stored) = stored {
      settings.voices.insert("Engine:Anna".to_owned(), stored);
    }
    let store = Arc::new(SharedSettings::load(Box::new(MemoryConfigStore::new(settings))).unwrap());
    (Voice::new(info, metadata, tasks.clone(), store, None), loopback, tasks)
  }
  fn parameters(loopback: &LoopbackHandle, tasks: &TaskManager) -> Vec<(Parameter, ParameterValue)> {
    tasks.perform("", |_| Ok(())).unwrap();
    loopback
      .calls()
      .into_iter()
      .filter_map(|call| match call {
        EngineCall::SetParameter {
          parameter, value, ..
        } => Some((parameter, value)),
        _ => None,
      })
      .collect()
  }
  #[test]
  fn stored_settings_are_pushed_on_creation() {
    let stored = VoiceSettings {
      rate: 75,
      pitch: 25,
      volume: 80,
      ..VoiceSettings::default()
    };
    let (voice, loopback, tasks) = voice(EngineFamily::Vocalizer, Some(stored));
    assert_eq!(voice.rate(), 75);
    assert_eq!(voice.language(), "de_DE");
    assert_eq!(
      parameters(&loopback, &tasks),
      vec![
        (Parameter::Rate, ParameterValue::Number(200)),
        (Parameter::Pitch, ParameterValue::Number(71)),
        (Parameter::Volume, ParameterValue::Number(80)),
      ]
    );
  }
  #[test]
  fn sapi_rate_uses_linear_offset() {
    let (voice, loopback, tasks) = voice(EngineFamily::Sapi, None);
    voice.set_rate(72).unwrap();
    assert!(matches!(voice.set_rate(101), Err(SpeechError::InvalidRate(101))));
    assert_eq!(
      parameters(&loopback, &tasks).last(),
      Some(&(Parameter::Rate, ParameterValue::Number(4)))
    );
  }
  #[test]
  fn rate_boost_switches_curve() {
    let (voice, loopback, tasks) = voice(EngineFamily::Vocalizer, None);
    voice.set_rate(100).unwrap();
    voice.set_rate_boost(true);
    let pushed = parameters(&loopback, &tasks);
    assert_eq!(
      &pushed[pushed.len() - 2..],
      &[
        (Parameter::Rate, ParameterValue::Number(400)),
        (Parameter::Rate, ParameterValue::Number(600)),
      ]
    );
    assert!(voice.prosody().rate_boost);
  }
  #[test]
  fn rate_boost_is_ignored_without_support() {
    let (voice, _loopback, _tasks) = voice(EngineFamily::Sapi, None);
    voice.set_rate_boost(true);
    assert!(!voice.rate_boost());
  }
  #[test]
  fn rollback_restores_last_commit() {
    let (voice, loopback, tasks) = voice(EngineFamily::Plain, None);
    voice.set_volume(40).unwrap();
    voice.commit();
    voice.set_volume(90).unwrap();
    voice.set_pitch(10).unwrap();
    voice.rollback();
    assert_eq!(voice.volume(), 40);
    assert_eq!(voice.pitch(), 50);
    assert_eq!(voice.store.voice_settings("Engine:Anna").unwrap().volume, 40);
    assert_eq!(
      parameters(&loopback, &tasks).last(),
      Some(&(Parameter::Volume, ParameterValue::Number(40)))
    );
  }
}
