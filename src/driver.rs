//! The synthesizer driver a screen reader talks to.
//!
//! A speech sequence runs through the pipeline stages and the language
//! detector, loses the language changes that would not switch voices, and
//! is then cut into chunks: one chunk per run of commands spoken by the same
//! voice, formatted for that voice's engine family. Chunks are queued on the
//! task manager and spoken strictly in order.
use crate::backends::{ChunkBuilder, Engine, EngineListener, EngineSet, ProsodyOverrides};
use crate::blocks::BlockRegistry;
use crate::config::{AutoLanguageSettings, ConfigStore, DetectionTiming, Settings, SharedSettings};
use crate::detector::LanguageDetector;
use crate::error::SpeechError;
use crate::metadata::{EngineMetadata, VoiceInfo};
use crate::pipeline::language::LangChangeDedup;
use crate::pipeline::{PipelineRegistry, Stage};
use crate::speech::{SpeechCommand, SpeechSequence};
use crate::symbols::SpeechSymbols;
use crate::task_manager::{DoneSignal, TaskManager, TaskState};
use crate::voice::{Voice, UNKNOWN_LANGUAGE};
use crate::voice_manager::VoiceManager;
use log::{debug, info, warn};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
/// Notifications for the host, sent from the dispatch worker or from
/// engine callback threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SynthEvent {
  IndexReached(u32),
  DoneSpeaking,
}
struct Notifier {
  engine: String,
  done: DoneSignal,
  events: Sender<SynthEvent>,
}
impl EngineListener for Notifier {
  fn index_reached(&self, _voice: &str, index: u32) {
    let _ = self.events.send(SynthEvent::IndexReached(index));
  }
  fn done_speaking(&self, voice: &str) {
    self.done.signal(&format!("{}:{voice}", self.engine));
  }
}
pub struct SynthDriver {
  settings: Arc<SharedSettings>,
  symbols: Arc<SpeechSymbols>,
  tasks: Arc<TaskManager>,
  voices: Arc<VoiceManager>,
  detector: RwLock<LanguageDetector>,
  pipeline: RwLock<PipelineRegistry>,
  dedup: LangChangeDedup,
  paused: Mutex<Option<Arc<Voice>>>,
  events: Sender<SynthEvent>,
}
fn start_engine(
  tasks: &TaskManager,
  name: &str,
  listener: Arc<dyn EngineListener>,
) -> Result<(EngineMetadata, Vec<VoiceInfo>), SpeechError> {
  let engine = name.to_owned();
  tasks.perform("", move |engines| {
    let engine = engines.get_mut(&engine)?;
    engine.engine_on(listener)?;
    let voices = engine.voices()?;
    Ok((engine.metadata(), voices))
  })
}
impl SynthDriver {
  /// Starts every engine, dropping the ones that fail to come up, and
  /// loads the voice configuration. Fails only when the configuration
  /// cannot be read, the worker cannot start, or no voice is left.
  pub fn new(
    engines: Vec<Box<dyn Engine>>,
    store: Box<dyn ConfigStore>,
    symbols: Arc<SpeechSymbols>,
    events: Sender<SynthEvent>,
  ) -> Result<Self, SpeechError> {
    let settings = Arc::new(SharedSettings::load(store)?);
    let snapshot = settings.snapshot();
    let idle_events = events.clone();
    let tasks = Arc::new(TaskManager::start(
      EngineSet::new(engines),
      snapshot.task,
      Some(Box::new(move || {
        let _ = idle_events.send(SynthEvent::DoneSpeaking);
      })),
    )?);
    let names = tasks.perform("", |engines| Ok(engines.names()))?;
    let mut metadata = Vec::new();
    let mut catalog = Vec::new();
    for name in names {
      let listener = Arc::new(Notifier {
        engine: name.clone(),
        done: tasks.done_signal(),
        events: events.clone(),
      });
      match start_engine(&tasks, &name, listener) {
        Ok((engine, voices)) => {
          info!("Started {name} with {} voices", voices.len());
          metadata.push(engine);
          catalog.extend(voices);
        }
        Err(error) => {
          warn!("Skipping engine {name}: {error}");
          let engine = name.clone();
          tasks.perform("", move |engines| Ok(engines.remove(&engine).is_some()))?;
        }
      }
    }
    let voices = Arc::new(VoiceManager::new(
      catalog,
      metadata,
      tasks.clone(),
      settings.clone(),
    )?);
    let detector = Self::build_detector(&voices, &symbols, snapshot.auto_language);
    let mut pipeline = PipelineRegistry::new();
    pipeline.configure(&snapshot.speech, &symbols);
    let resolver = voices.clone();
    let dedup = LangChangeDedup::new(Arc::new(move |language: Option<&str>| {
      resolver.voice_for_locale(language)
    }));
    Ok(SynthDriver {
      settings,
      symbols,
      tasks,
      voices,
      detector: RwLock::new(detector),
      pipeline: RwLock::new(pipeline),
      dedup,
      paused: Mutex::new(None),
      events,
    })
  }
  fn build_detector(
    voices: &VoiceManager,
    symbols: &Arc<SpeechSymbols>,
    settings: AutoLanguageSettings,
  ) -> LanguageDetector {
    let registry = Arc::new(BlockRegistry::new(voices.languages()));
    let mut detector = LanguageDetector::new(registry, symbols.clone(), settings);
    Self::follow_default_voice(&mut detector, voices);
    detector
  }
  /// Unmarked text is spoken by the default voice, so the detector has to
  /// judge it against that voice's language.
  fn follow_default_voice(detector: &mut LanguageDetector, voices: &VoiceManager) {
    let voice = voices.default_voice_instance();
    if voice.language() != UNKNOWN_LANGUAGE {
      detector.set_default_language(voice.language());
    }
  }
  fn detector(&self) -> RwLockReadGuard<'_, LanguageDetector> {
    self.detector.read().unwrap_or_else(PoisonError::into_inner)
  }
  fn detect(&self, sequence: SpeechSequence, timing: DetectionTiming) -> SpeechSequence {
    let detector = self.detector();
    let settings = detector.settings();
    if settings.enabled && settings.timing == timing {
      detector.detect(sequence).collect()
    } else {
      sequence
    }
  }
  /// Queues `sequence` for speaking and returns without waiting for audio.
  pub fn speak(&self, sequence: SpeechSequence) {
    let sequence = self.detect(sequence, DetectionTiming::Before);
    let sequence = self
      .pipeline
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .apply(sequence);
    let sequence = self.detect(sequence, DetectionTiming::After);
    self.dispatch(self.dedup.apply(sequence));
  }
  /// Spells `text` character by character, each run in its own language.
  pub fn speak_spelling(&self, text: &str) {
    let detector = self.detector();
    let pairs = if detector.settings().enabled {
      detector.process_for_spelling(text)
    } else {
      let voice = self.voices.default_voice_instance();
      vec![(text.to_owned(), voice.language().to_owned())]
    };
    drop(detector);
    let mut sequence = Vec::with_capacity(pairs.len() * 4);
    for (text, language) in pairs {
      sequence.push(SpeechCommand::LangChange(Some(language)));
      sequence.push(SpeechCommand::CharacterMode(true));
      sequence.push(SpeechCommand::Text(text));
      sequence.push(SpeechCommand::CharacterMode(false));
    }
    self.dispatch(self.dedup.apply(sequence));
  }
  fn flush(voice: &Voice, chunk: &mut dyn ChunkBuilder) -> bool {
    match chunk.flush() {
      Some(utterance) => {
        let _handle = voice.speak(utterance);
        true
      }
      None => false,
    }
  }
  fn dispatch(&self, sequence: SpeechSequence) {
    let mut voice = self.voices.default_voice_instance();
    let mut chunk = voice.family().chunk_builder(voice.prosody());
    let mut overrides = ProsodyOverrides::default();
    let mut queued = false;
    for command in sequence {
      match command {
        SpeechCommand::LangChange(language) => {
          let next = self.voices.instance_for_locale(language.as_deref());
          if Arc::ptr_eq(&next, &voice) {
            continue;
          }
          queued |= Self::flush(&voice, chunk.as_mut());
          debug!("Switching from {} to {}", voice.name(), next.name());
          if next.family() == voice.family() {
            chunk.on_voice_switch(next.prosody());
          } else {
            chunk = next.family().chunk_builder(next.prosody());
          }
          overrides.replay(chunk.as_mut());
          voice = next;
        }
        SpeechCommand::Split => {
          queued |= Self::flush(&voice, chunk.as_mut());
          overrides.replay(chunk.as_mut());
        }
        command => {
          overrides.record(&command);
          chunk.append(&command);
        }
      }
    }
    queued |= Self::flush(&voice, chunk.as_mut());
    if !queued {
      // Nothing reaches an engine, so the worker reports the end of speech
      // once everything queued before it has run.
      let events = self.events.clone();
      let _handle = self.tasks.submit("", false, move |_| {
        let _ = events.send(SynthEvent::DoneSpeaking);
        Ok(())
      });
    }
  }
  /// Drops everything queued and silences the voice that is talking.
  pub fn cancel(&self) {
    let dropped = self.tasks.cancel();
    debug!("Cancelled speech, dropped {dropped} chunks");
  }
  fn active_voice(&self) -> Arc<Voice> {
    match self.tasks.state() {
      TaskState::Running(_, name) | TaskState::AwaitingDone(_, name) => {
        self.voices.voice_instance(&name)
      }
      _ => self.voices.default_voice_instance(),
    }
  }
  pub fn pause(&self, switch: bool) {
    let voice = self.active_voice();
    let paused = if switch { Some(voice.clone()) } else { None };
    let _handle = voice.pause(switch);
    *self.paused.lock().unwrap_or_else(PoisonError::into_inner) = paused;
  }
  pub fn resume(&self) {
    let paused = self
      .paused
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    let voice = paused.unwrap_or_else(|| self.active_voice());
    let _handle = voice.resume();
  }
  pub fn voices(&self) -> &[VoiceInfo] {
    self.voices.voices()
  }
  pub fn languages(&self) -> Vec<String> {
    self.voices.languages()
  }
  pub fn voice_manager(&self) -> &VoiceManager {
    &self.voices
  }
  pub fn voice(&self) -> String {
    self.voices.default_voice_name()
  }
  pub fn set_voice(&self, name: &str) -> Result<(), SpeechError> {
    self.voices.set_default_voice(name)?;
    let mut detector = self.detector.write().unwrap_or_else(PoisonError::into_inner);
    Self::follow_default_voice(&mut detector, &self.voices);
    Ok(())
  }
  fn main_voice(&self) -> Arc<Voice> {
    self.voices.default_voice_instance()
  }
  pub fn rate(&self) -> u8 {
    self.main_voice().rate()
  }
  pub fn set_rate(&self, rate: u8) -> Result<(), SpeechError> {
    self.main_voice().set_rate(rate)?;
    self.voices.propagate_parameters();
    Ok(())
  }
  pub fn pitch(&self) -> u8 {
    self.main_voice().pitch()
  }
  pub fn set_pitch(&self, pitch: u8) -> Result<(), SpeechError> {
    self.main_voice().set_pitch(pitch)?;
    self.voices.propagate_parameters();
    Ok(())
  }
  pub fn volume(&self) -> u8 {
    self.main_voice().volume()
  }
  pub fn set_volume(&self, volume: u8) -> Result<(), SpeechError> {
    self.main_voice().set_volume(volume)?;
    self.voices.propagate_parameters();
    Ok(())
  }
  pub fn variant(&self) -> Option<String> {
    self.main_voice().variant()
  }
  pub fn set_variant(&self, variant: &str) {
    self.main_voice().set_variant(variant);
  }
  pub fn rate_boost(&self) -> bool {
    self.main_voice().rate_boost()
  }
  pub fn set_rate_boost(&self, rate_boost: bool) {
    self.main_voice().set_rate_boost(rate_boost);
    self.voices.propagate_parameters();
  }
  /// Changes the speech and language settings and rebuilds the stages and
  /// the detector from the result. Stages registered by the host survive.
  pub fn apply_settings<F>(&self, update: F)
  where
    F: FnOnce(&mut Settings),
  {
    let snapshot = self.settings.update(|settings| {
      update(settings);
      settings.clone()
    });
    self
      .pipeline
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .configure(&snapshot.speech, &self.symbols);
    *self.detector.write().unwrap_or_else(PoisonError::into_inner) =
      Self::build_detector(&self.voices, &self.symbols, snapshot.auto_language);
    debug!("Applied settings, stages are {:?}", self.pipeline().names());
  }
  /// The stage chain, for hosts that add stages of their own.
  pub fn pipeline(&self) -> RwLockWriteGuard<'_, PipelineRegistry> {
    self.pipeline.write().unwrap_or_else(PoisonError::into_inner)
  }
  pub fn register_stage(&self, stage: Arc<dyn Stage>) -> bool {
    self.pipeline().register(stage)
  }
  pub fn settings(&self) -> Settings {
    self.settings.snapshot()
  }
  pub fn commit(&self) -> Result<(), SpeechError> {
    self.voices.commit_all();
    self.settings.persist()
  }
  pub fn rollback(&self) -> Result<(), SpeechError> {
    self.voices.rollback_all();
    self.settings.persist()
  }
  /// Cancels speech, closes every voice and stops the worker. Engines are
  /// switched off on the way out.
  pub fn terminate(&self) {
    self.tasks.cancel();
    for handle in self.voices.close() {
      if let Err(error) = handle.wait() {
        debug!("Closing voice failed: {error}");
      }
    }
    self.tasks.shutdown();
    info!("Synth driver terminated");
  }
}
impl Drop for SynthDriver {
  fn drop(&mut self) {
    self.tasks.shutdown();
  }
}
