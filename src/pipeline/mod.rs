//! Ordered chain of sequence transforms applied to every outgoing utterance.
//!
//! Stages are identified by name. Registering a name twice is a no-op and
//! unregistering a missing name is a no-op, so callers can toggle stages from
//! settings without tracking what is already present.
pub mod language;
pub mod normalization;
pub mod numbers;
pub mod pauses;
use crate::config::SpeechSettings;
use crate::speech::{describe, SpeechSequence};
use crate::symbols::SpeechSymbols;
use log::{debug, trace};
use std::sync::Arc;
pub trait Stage: Send + Sync {
  fn name(&self) -> &str;
  fn apply(&self, sequence: SpeechSequence) -> SpeechSequence;
}
#[derive(Clone, Default)]
pub struct PipelineRegistry {
  stages: Vec<Arc<dyn Stage>>,
}
impl PipelineRegistry {
  pub fn new() -> Self {
    PipelineRegistry::default()
  }
  fn position(&self, name: &str) -> Option<usize> {
    self.stages.iter().position(|stage| stage.name() == name)
  }
  /// Appends `stage` unless a stage with the same name is registered.
  pub fn register(&mut self, stage: Arc<dyn Stage>) -> bool {
    if self.contains(stage.name()) {
      return false;
    }
    debug!("Registered pipeline stage {}", stage.name());
    self.stages.push(stage);
    true
  }
  pub fn unregister(&mut self, name: &str) -> bool {
    match self.position(name) {
      Some(position) => {
        self.stages.remove(position);
        debug!("Unregistered pipeline stage {name}");
        true
      }
      None => false,
    }
  }
  /// Swaps in a new configuration of an already registered stage, keeping
  /// its position. Unknown names are appended.
  pub fn replace(&mut self, stage: Arc<dyn Stage>) {
    match self.position(stage.name()) {
      Some(position) => self.stages[position] = stage,
      None => self.stages.push(stage),
    }
  }
  pub fn move_to_start(&mut self, name: &str) -> bool {
    let Some(position) = self.position(name) else {
      return false;
    };
    let stage = self.stages.remove(position);
    self.stages.insert(0, stage);
    true
  }
  pub fn move_to_end(&mut self, name: &str) -> bool {
    let Some(position) = self.position(name) else {
      return false;
    };
    let stage = self.stages.remove(position);
    self.stages.push(stage);
    true
  }
  pub fn register_first(&mut self, stage: Arc<dyn Stage>) {
    let name = stage.name().to_owned();
    self.register(stage);
    self.move_to_start(&name);
  }
  pub fn register_last(&mut self, stage: Arc<dyn Stage>) {
    let name = stage.name().to_owned();
    self.register(stage);
    self.move_to_end(&name);
  }
  pub fn contains(&self, name: &str) -> bool {
    self.position(name).is_some()
  }
  pub fn names(&self) -> Vec<String> {
    self
      .stages
      .iter()
      .map(|stage| stage.name().to_owned())
      .collect()
  }
  pub fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
    self.stages.iter().fold(sequence, |sequence, stage| {
      let sequence = stage.apply(sequence);
      trace!("After {}: {}", stage.name(), describe(&sequence));
      sequence
    })
  }
  /// Brings the registry in line with `settings`. Toggleable stages are
  /// layered at the front, normalization and tracing always run last.
  pub fn configure(&mut self, settings: &SpeechSettings, symbols: &Arc<SpeechSymbols>) {
    let mut toggle = |enabled: bool, stage: Arc<dyn Stage>| {
      if enabled && self.contains(stage.name()) {
        self.replace(stage);
      } else if enabled {
        self.register_first(stage);
      } else {
        self.unregister(stage.name());
      }
    };
    toggle(
      settings.number_mode == numbers::NumberMode::Number
        || settings.number_dot_replacement.is_some(),
      Arc::new(numbers::NumberModeStage::new(
        settings.number_mode,
        settings.number_dot_replacement.clone(),
        symbols.clone(),
      )),
    );
    toggle(
      settings.ignore_comma_between_number,
      Arc::new(numbers::CommaElision),
    );
    toggle(
      settings.number_language.is_some(),
      Arc::new(language::NumberLanguage::new(
        settings.number_language.as_deref().unwrap_or_default(),
      )),
    );
    toggle(
      settings.item_wait_factor > 0,
      Arc::new(pauses::ItemWaitFactor::new(settings.item_wait_factor)),
    );
    toggle(
      settings.number_wait_factor > 0,
      Arc::new(pauses::NumberWaitFactor::new(settings.number_wait_factor)),
    );
    toggle(
      settings.chinese_space_wait_factor > 0,
      Arc::new(pauses::ChineseSpacePause::new(
        settings.chinese_space_wait_factor,
      )),
    );
    match settings.normalization {
      Some(form) => {
        self.replace(Arc::new(normalization::Normalization::new(form)));
        self.move_to_end(normalization::Normalization::NAME);
      }
      None => {
        self.unregister(normalization::Normalization::NAME);
      }
    }
    self.register_last(Arc::new(Trace));
  }
}
/// Logs the fully transformed sequence. Kept at the end of the chain.
pub struct Trace;
impl Trace {
  pub const NAME: &'static str = "trace";
}
impl Stage for Trace {
  fn name(&self) -> &str {
    Trace::NAME
  }
  fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
    debug!("Speaking {}", describe(&sequence));
    sequence
  }
}
/// Break inserted for a wait factor. One unit is 50 milliseconds.
pub fn wait_break(factor: u32) -> crate::speech::SpeechCommand {
  crate::speech::SpeechCommand::Break(factor.saturating_mul(WAIT_UNIT_MS))
}
pub const WAIT_UNIT_MS: u32 = 50;
#[cfg(test)]
mod tests {
  use super::*;
  use crate::speech::SpeechCommand;
  struct Suffix(&'static str);
  impl Stage for Suffix {
    fn name(&self) -> &str {
      self.0
    }
    fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
      sequence
        .into_iter()
        .map(|command| match command {
          SpeechCommand::Text(text) => SpeechCommand::Text(text + self.0),
          command => command,
        })
        .collect()
    }
  }
  #[test]
  fn registration_is_idempotent() {
    let mut registry = PipelineRegistry::new();
    assert!(registry.register(Arc::new(Suffix("a"))));
    assert!(!registry.register(Arc::new(Suffix("a"))));
    assert!(registry.register(Arc::new(Suffix("b"))));
    assert_eq!(registry.names(), vec!["a", "b"]);
    assert!(registry.unregister("a"));
    assert!(!registry.unregister("a"));
    assert!(!registry.unregister("missing"));
    assert_eq!(registry.names(), vec!["b"]);
  }
  #[test]
  fn front_insertion_is_last_in_first_out() {
    let mut registry = PipelineRegistry::new();
    registry.register_first(Arc::new(Suffix("a")));
    registry.register_first(Arc::new(Suffix("b")));
    registry.register_last(Arc::new(Suffix("z")));
    registry.register_first(Arc::new(Suffix("c")));
    assert_eq!(registry.names(), vec!["c", "b", "a", "z"]);
    let output = registry.apply(vec![SpeechCommand::text(">")]);
    assert_eq!(output, vec![SpeechCommand::text(">cbaz")]);
  }
  #[test]
  fn moving_keeps_membership() {
    let mut registry = PipelineRegistry::new();
    for name in ["a", "b", "c"] {
      registry.register(Arc::new(Suffix(name)));
    }
    assert!(registry.move_to_end("a"));
    assert!(registry.move_to_start("c"));
    assert!(!registry.move_to_start("missing"));
    assert_eq!(registry.names(), vec!["c", "b", "a"]);
  }
  #[test]
  fn configure_follows_settings() {
    let symbols = Arc::new(SpeechSymbols::new());
    let mut registry = PipelineRegistry::new();
    let mut settings = SpeechSettings {
      item_wait_factor: 2,
      ignore_comma_between_number: true,
      normalization: Some(normalization::NormalizationForm::Nfc),
      ..SpeechSettings::default()
    };
    registry.configure(&settings, &symbols);
    assert_eq!(
      registry.names(),
      vec![
        pauses::ItemWaitFactor::NAME,
        numbers::CommaElision::NAME,
        normalization::Normalization::NAME,
        Trace::NAME
      ]
    );
    settings.item_wait_factor = 0;
    settings.chinese_space_wait_factor = 1;
    settings.normalization = None;
    registry.configure(&settings, &symbols);
    assert_eq!(
      registry.names(),
      vec![
        pauses::ChineseSpacePause::NAME,
        numbers::CommaElision::NAME,
        Trace::NAME
      ]
    );
  }
  #[test]
  fn reconfiguring_replaces_stage_in_place() {
    let symbols = Arc::new(SpeechSymbols::new());
    let mut registry = PipelineRegistry::new();
    let mut settings = SpeechSettings {
      item_wait_factor: 1,
      ..SpeechSettings::default()
    };
    registry.configure(&settings, &symbols);
    settings.item_wait_factor = 4;
    registry.configure(&settings, &symbols);
    let output = registry.apply(vec![SpeechCommand::text("a"), SpeechCommand::text("b")]);
    assert_eq!(
      output,
      vec![
        SpeechCommand::text("a"),
        SpeechCommand::Break(200),
        SpeechCommand::text("b")
      ]
    );
  }
}
