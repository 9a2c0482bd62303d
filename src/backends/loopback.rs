//! An in-process engine that records every call it receives.
//!
//! Speech is acknowledged either as soon as it is issued, firing the index
//! and done callbacks from inside `speak`, or on demand through a
//! [`LoopbackHandle`] so callers can observe a voice that is still talking.
use crate::backends::{
  Engine, EngineFamily, EngineListener, Parameter, ParameterValue, Utterance,
};
use crate::error::SpeechError;
use crate::metadata::{EngineMetadata, VoiceInfo};
use crate::speech::SpeechCommand;
use anyhow::anyhow;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
lazy_static! {
  static ref MARKUP_INDEX: Regex =
    Regex::new(r#"\x1b\\mrk=(\d+)\\|<bookmark mark="(\d+)"/>"#).expect("valid regex");
}
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineCall {
  On,
  Off,
  Speak { voice: String, utterance: Utterance },
  Stop(String),
  Pause { voice: String, switch: bool },
  Resume(String),
  Close(String),
  SetParameter {
    voice: String,
    parameter: Parameter,
    value: ParameterValue,
  },
}
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Acknowledge {
  #[default]
  Immediately,
  OnDemand,
}
#[derive(Default)]
struct LoopbackState {
  calls: Mutex<Vec<EngineCall>>,
  listener: Mutex<Option<Arc<dyn EngineListener>>>,
  parameters: Mutex<HashMap<(String, Parameter), ParameterValue>>,
  pending: Mutex<Vec<(String, Vec<u32>)>>,
}
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
impl LoopbackState {
  fn record(&self, call: EngineCall) {
    lock(&self.calls).push(call);
  }
  fn listener(&self) -> Option<Arc<dyn EngineListener>> {
    lock(&self.listener).clone()
  }
  fn acknowledge(&self, voice: &str, indexes: &[u32]) {
    let Some(listener) = self.listener() else {
      debug!("Loopback engine has no listener for {voice}");
      return;
    };
    for index in indexes {
      listener.index_reached(voice, *index);
    }
    listener.done_speaking(voice);
  }
}
/// Shared view of a [`LoopbackEngine`] that stays usable after the engine
/// itself has been handed to a driver.
#[derive(Clone)]
pub struct LoopbackHandle {
  state: Arc<LoopbackState>,
}
impl LoopbackHandle {
  pub fn calls(&self) -> Vec<EngineCall> {
    lock(&self.state.calls).clone()
  }
  pub fn spoken(&self) -> Vec<(String, Utterance)> {
    self
      .calls()
      .into_iter()
      .filter_map(|call| match call {
        EngineCall::Speak { voice, utterance } => Some((voice, utterance)),
        _ => None,
      })
      .collect()
  }
  pub fn pending(&self) -> usize {
    lock(&self.state.pending).len()
  }
  /// Finishes the oldest outstanding utterance, firing its indexes and the
  /// done callback. Returns false when nothing was outstanding.
  pub fn complete_next(&self) -> bool {
    let next = {
      let mut pending = lock(&self.state.pending);
      (!pending.is_empty()).then(|| pending.remove(0))
    };
    match next {
      Some((voice, indexes)) => {
        self.state.acknowledge(&voice, &indexes);
        true
      }
      None => false,
    }
  }
  pub fn complete_all(&self) {
    while self.complete_next() {}
  }
}
pub struct LoopbackEngine {
  name: String,
  family: EngineFamily,
  voices: Vec<VoiceInfo>,
  acknowledge: Acknowledge,
  available: bool,
  state: Arc<LoopbackState>,
}
impl LoopbackEngine {
  /// `voices` are `(name, locale)` pairs.
  pub fn new(name: &str, family: EngineFamily, voices: &[(&str, &str)]) -> Self {
    LoopbackEngine {
      name: name.to_owned(),
      family,
      voices: voices
        .iter()
        .map(|(voice, locale)| VoiceInfo::new(name, voice, voice, locale))
        .collect(),
      acknowledge: Acknowledge::default(),
      available: true,
      state: Arc::new(LoopbackState::default()),
    }
  }
  #[must_use]
  pub fn with_acknowledge(mut self, acknowledge: Acknowledge) -> Self {
    self.acknowledge = acknowledge;
    self
  }
  /// Makes `engine_on` fail the way an unlicensed engine would.
  #[must_use]
  pub fn unavailable(mut self) -> Self {
    self.available = false;
    self
  }
  pub fn handle(&self) -> LoopbackHandle {
    LoopbackHandle {
      state: self.state.clone(),
    }
  }
  fn check_voice(&self, voice: &str) -> Result<(), SpeechError> {
    if self.voices.iter().any(|info| info.name == voice) {
      Ok(())
    } else {
      Err(SpeechError::into_voice_not_found(voice))
    }
  }
  fn default_parameter(&self, voice: &str, parameter: Parameter) -> ParameterValue {
    let curves = self.family.curves();
    match parameter {
      Parameter::Rate => ParameterValue::Number(curves.rate.to_physical(50)),
      Parameter::Pitch => ParameterValue::Number(curves.pitch.to_physical(50)),
      Parameter::Volume => ParameterValue::Number(curves.volume.to_physical(100)),
      Parameter::Variant => ParameterValue::Text("default".to_owned()),
      Parameter::Language => ParameterValue::Text(
        self
          .voices
          .iter()
          .find(|info| info.name == voice)
          .map(|info| info.locale.clone())
          .unwrap_or_default(),
      ),
      Parameter::WaitFactor => ParameterValue::Number(0),
    }
  }
}
fn indexes(utterance: &Utterance) -> Vec<u32> {
  match utterance {
    Utterance::Markup(markup) => MARKUP_INDEX
      .captures_iter(markup)
      .filter_map(|captures| captures.get(1).or_else(|| captures.get(2)))
      .filter_map(|index| index.as_str().parse().ok())
      .collect(),
    Utterance::Sequence(commands) => commands
      .iter()
      .filter_map(|command| match command {
        SpeechCommand::Index(index) => Some(*index),
        _ => None,
      })
      .collect(),
  }
}
impl Engine for LoopbackEngine {
  fn name(&self) -> String {
    self.name.clone()
  }
  fn metadata(&self) -> EngineMetadata {
    EngineMetadata {
      name: self.name.clone(),
      family: self.family,
      supports_rate_boost: self.family.curves().rate_boost.is_some(),
      supports_variants: true,
    }
  }
  fn engine_on(&mut self, listener: Arc<dyn EngineListener>) -> Result<(), SpeechError> {
    if !self.available {
      return Err(SpeechError::into_engine_unavailable(
        &self.name,
        anyhow!("license check failed"),
      ));
    }
    *lock(&self.state.listener) = Some(listener);
    self.state.record(EngineCall::On);
    Ok(())
  }
  fn engine_off(&mut self) -> Result<(), SpeechError> {
    *lock(&self.state.listener) = None;
    self.state.record(EngineCall::Off);
    Ok(())
  }
  fn voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
    Ok(self.voices.clone())
  }
  fn speak(&mut self, voice: &str, utterance: &Utterance) -> Result<(), SpeechError> {
    self.check_voice(voice)?;
    self.state.record(EngineCall::Speak {
      voice: voice.to_owned(),
      utterance: utterance.clone(),
    });
    let indexes = indexes(utterance);
    match self.acknowledge {
      Acknowledge::Immediately => self.state.acknowledge(voice, &indexes),
      Acknowledge::OnDemand => lock(&self.state.pending).push((voice.to_owned(), indexes)),
    }
    Ok(())
  }
  fn stop(&mut self, voice: &str) -> Result<(), SpeechError> {
    lock(&self.state.pending).retain(|(pending, _)| pending != voice);
    self.state.record(EngineCall::Stop(voice.to_owned()));
    Ok(())
  }
  fn pause(&mut self, voice: &str, switch: bool) -> Result<(), SpeechError> {
    self.state.record(EngineCall::Pause {
      voice: voice.to_owned(),
      switch,
    });
    Ok(())
  }
  fn resume(&mut self, voice: &str) -> Result<(), SpeechError> {
    self.state.record(EngineCall::Resume(voice.to_owned()));
    Ok(())
  }
  fn close(&mut self, voice: &str) -> Result<(), SpeechError> {
    self.state.record(EngineCall::Close(voice.to_owned()));
    Ok(())
  }
  fn get_parameter(
    &self,
    voice: &str,
    parameter: Parameter,
  ) -> Result<ParameterValue, SpeechError> {
    self.check_voice(voice)?;
    Ok(
      lock(&self.state.parameters)
        .get(&(voice.to_owned(), parameter))
        .cloned()
        .unwrap_or_else(|| self.default_parameter(voice, parameter)),
    )
  }
  fn set_parameter(
    &mut self,
    voice: &str,
    parameter: Parameter,
    value: ParameterValue,
  ) -> Result<(), SpeechError> {
    self.check_voice(voice)?;
    lock(&self.state.parameters).insert((voice.to_owned(), parameter), value.clone());
    self.state.record(EngineCall::SetParameter {
      voice: voice.to_owned(),
      parameter,
      value,
    });
    Ok(())
  }
}
#[cfg(test)]
mod tests {
  use super::*;
  #[derive(Default)]
  struct Recorder {
    events: Mutex<Vec<String>>,
  }
  impl EngineListener for Recorder {
    fn index_reached(&self, voice: &str, index: u32) {
      lock(&self.events).push(format!("{voice}:{index}"));
    }
    fn done_speaking(&self, voice: &str) {
      lock(&self.events).push(format!("{voice}:done"));
    }
  }
  #[test]
  fn immediate_acknowledge_reports_markup_indexes() {
    let recorder = Arc::new(Recorder::default());
    let mut engine = LoopbackEngine::new("SAPI5", EngineFamily::Sapi, &[("Zira", "en_US")]);
    engine.engine_on(recorder.clone()).unwrap();
    let markup = "a<bookmark mark=\"3\"/>b<bookmark mark=\"4\"/>".to_owned();
    engine.speak("Zira", &Utterance::Markup(markup)).unwrap();
    assert_eq!(
      *lock(&recorder.events),
      vec!["Zira:3".to_owned(), "Zira:4".to_owned(), "Zira:done".to_owned()]
    );
  }
  #[test]
  fn on_demand_acknowledge_waits_for_handle() {
    let recorder = Arc::new(Recorder::default());
    let mut engine = LoopbackEngine::new("Vocalizer", EngineFamily::Vocalizer, &[("Tian-Tian", "zh_CN")])
      .with_acknowledge(Acknowledge::OnDemand);
    let handle = engine.handle();
    engine.engine_on(recorder.clone()).unwrap();
    let markup = "\x1b\\mrk=9\\ni hao".to_owned();
    engine.speak("Tian-Tian", &Utterance::Markup(markup)).unwrap();
    assert!(lock(&recorder.events).is_empty());
    assert_eq!(handle.pending(), 1);
    assert!(handle.complete_next());
    assert!(!handle.complete_next());
    assert_eq!(
      *lock(&recorder.events),
      vec!["Tian-Tian:9".to_owned(), "Tian-Tian:done".to_owned()]
    );
  }
  #[test]
  fn unavailable_engine_refuses_to_start() {
    let mut engine = LoopbackEngine::new("ECI", EngineFamily::Plain, &[]).unavailable();
    let result = engine.engine_on(Arc::new(Recorder::default()));
    assert!(matches!(result, Err(SpeechError::EngineUnavailable { .. })));
  }
  #[test]
  fn parameters_default_to_family_midpoint() {
    let mut engine = LoopbackEngine::new("SAPI5", EngineFamily::Sapi, &[("Zira", "en_US")]);
    assert_eq!(
      engine.get_parameter("Zira", Parameter::Rate).unwrap(),
      ParameterValue::Number(0)
    );
    engine
      .set_parameter("Zira", Parameter::Rate, ParameterValue::Number(4))
      .unwrap();
    assert_eq!(
      engine.get_parameter("Zira", Parameter::Rate).unwrap(),
      ParameterValue::Number(4)
    );
    assert!(engine.get_parameter("David", Parameter::Rate).is_err());
  }
}
