//! Inserts language changes at script boundaries.
//!
//! The detector walks every character of every text command, classifies it
//! by Unicode block and decides which installed language should speak it.
//! Runs of characters spoken by the same language are buffered and emitted
//! as one text command preceded by the language change that selects them.
use crate::blocks::{block_of, is_cjk, is_latin, BlockRegistry};
use crate::config::AutoLanguageSettings;
use crate::speech::{primary_subtag, SpeechCommand};
use crate::symbols::SpeechSymbols;
use log::trace;
use std::collections::VecDeque;
use std::sync::Arc;
pub struct LanguageDetector {
  registry: Arc<BlockRegistry>,
  symbols: Arc<SpeechSymbols>,
  settings: AutoLanguageSettings,
  default_language: String,
}
impl LanguageDetector {
  pub fn new(
    registry: Arc<BlockRegistry>,
    symbols: Arc<SpeechSymbols>,
    settings: AutoLanguageSettings,
  ) -> Self {
    let default_language = settings.default_language.clone();
    LanguageDetector {
      registry,
      symbols,
      settings,
      default_language,
    }
  }
  pub fn settings(&self) -> &AutoLanguageSettings {
    &self.settings
  }
  /// Language spoken where no language change is in force. This is the
  /// language of the default voice once one is known.
  pub fn default_language(&self) -> &str {
    &self.default_language
  }
  pub fn set_default_language(&mut self, language: &str) {
    language.clone_into(&mut self.default_language);
  }
  /// Lazily annotates `sequence`. The result is single pass; run the
  /// detector again to process the sequence again.
  pub fn detect<I>(&self, sequence: I) -> Detection<'_, I::IntoIter>
  where
    I: IntoIterator<Item = SpeechCommand>,
  {
    Detection {
      detector: self,
      input: sequence.into_iter(),
      output: VecDeque::new(),
      current: None,
      active: None,
      buffer: String::new(),
      after_ignorable: false,
      finished: false,
    }
  }
  /// Splits flat text into `(text, language)` pairs for spelling.
  pub fn process_for_spelling(&self, text: &str) -> Vec<(String, String)> {
    let mut language = self.default_language.clone();
    let mut pairs: Vec<(String, String)> = Vec::new();
    for command in self.detect(vec![SpeechCommand::text(text)]) {
      match command {
        SpeechCommand::LangChange(target) => {
          language = target.unwrap_or_else(|| self.default_language.clone());
        }
        SpeechCommand::Text(text) => match pairs.last_mut() {
          Some((previous, last)) if *last == language => previous.push_str(&text),
          _ => pairs.push((text, language.clone())),
        },
        _ => {}
      }
    }
    pairs
  }
  fn effective<'a>(&'a self, language: &'a Option<String>) -> &'a str {
    language
      .as_deref()
      .unwrap_or(&self.default_language)
  }
  fn is_ignorable(&self, character: char) -> bool {
    (self.settings.ignore_numbers && character.is_ascii_digit())
      || (self.settings.ignore_punctuation && character.is_ascii_punctuation())
  }
  fn fallback(&self, block: &str) -> Option<&str> {
    if is_latin(block) {
      self.settings.latin_fallback.as_deref()
    } else if is_cjk(block) {
      self.settings.cjk_fallback.as_deref()
    } else {
      None
    }
  }
  /// Language that should speak `block` given the language requested by the
  /// caller (`current`) and the one speaking right now (`active`).
  fn resolve(&self, block: &str, current: &Option<String>, active: &Option<String>) -> Target {
    if self.registry.supports(self.effective(active), block) {
      return Target::Stay;
    }
    let candidates = self.registry.languages_for(block);
    if candidates.is_empty() {
      return Target::Stay;
    }
    let is_candidate = |language: &str| {
      let language = primary_subtag(language);
      candidates.iter().any(|candidate| *candidate == language)
    };
    if is_candidate(self.effective(current)) {
      return Target::Switch(current.clone());
    }
    if let Some(fallback) = self.fallback(block).filter(|fallback| is_candidate(*fallback)) {
      return Target::Switch(Some(fallback.to_owned()));
    }
    Target::Switch(Some(candidates[0].clone()))
  }
}
enum Target {
  Stay,
  Switch(Option<String>),
}
pub struct Detection<'a, I> {
  detector: &'a LanguageDetector,
  input: I,
  output: VecDeque<SpeechCommand>,
  current: Option<String>,
  active: Option<String>,
  buffer: String,
  after_ignorable: bool,
  finished: bool,
}
impl<I> Detection<'_, I> {
  fn flush(&mut self) {
    if !self.buffer.is_empty() {
      self
        .output
        .push_back(SpeechCommand::Text(std::mem::take(&mut self.buffer)));
    }
  }
  fn switch(&mut self, language: Option<String>) {
    if language == self.active {
      return;
    }
    self.flush();
    trace!("Switching detected language to {language:?}");
    self.output.push_back(SpeechCommand::LangChange(language.clone()));
    self.active = language;
  }
  fn classify(&mut self, character: char) {
    let detector = self.detector;
    if character.is_whitespace() {
      self.buffer.push(character);
      return;
    }
    if let Some(symbol) = detector.symbols.forced(character) {
      self.after_ignorable = false;
      self.switch(symbol.language.clone());
      match &symbol.replacement {
        Some(replacement) => self.buffer.push_str(replacement),
        None => self.buffer.push(character),
      }
      return;
    }
    if detector.is_ignorable(character) {
      if !self.after_ignorable {
        self.after_ignorable = true;
        self.switch(self.current.clone());
      }
      self.buffer.push(character);
      return;
    }
    self.after_ignorable = false;
    match detector.resolve(block_of(character), &self.current, &self.active) {
      Target::Stay => {}
      Target::Switch(language) => self.switch(language),
    }
    self.buffer.push(character);
  }
  fn process(&mut self, command: SpeechCommand) {
    match command {
      SpeechCommand::Text(text) => {
        for character in text.chars() {
          self.classify(character);
        }
      }
      SpeechCommand::LangChange(language) => {
        self.flush();
        self.current.clone_from(&language);
        self.active.clone_from(&language);
        self.after_ignorable = false;
        self.output.push_back(SpeechCommand::LangChange(language));
      }
      command => {
        self.flush();
        self.output.push_back(command);
      }
    }
  }
}
impl<I> Iterator for Detection<'_, I>
where
  I: Iterator<Item = SpeechCommand>,
{
  type Item = SpeechCommand;
  fn next(&mut self) -> Option<SpeechCommand> {
    loop {
      if let Some(command) = self.output.pop_front() {
        return Some(command);
      }
      if self.finished {
        return None;
      }
      match self.input.next() {
        Some(command) => self.process(command),
        None => {
          self.flush();
          self.finished = true;
        }
      }
    }
  }
}
#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbols::SpeechSymbol;
  fn detector(installed: &[&str], settings: AutoLanguageSettings) -> LanguageDetector {
    let mut symbols = SpeechSymbols::new();
    symbols.insert(SpeechSymbol::forced("@", "en", Some(" at ")));
    LanguageDetector::new(
      Arc::new(BlockRegistry::new(installed)),
      Arc::new(symbols),
      settings,
    )
  }
  fn languages(output: &[SpeechCommand]) -> Vec<Option<String>> {
    output
      .iter()
      .filter_map(|command| match command {
        SpeechCommand::LangChange(language) => Some(language.clone()),
        _ => None,
      })
      .collect()
  }
  #[test]
  fn switches_at_script_boundaries() {
    let detector = detector(&["en_US", "zh_CN"], AutoLanguageSettings::default());
    let output = detector
      .detect(vec![SpeechCommand::text("hello 你好 world")])
      .collect::<Vec<SpeechCommand>>();
    assert_eq!(
      output,
      vec![
        SpeechCommand::text("hello "),
        SpeechCommand::lang("zh"),
        SpeechCommand::text("你好 "),
        SpeechCommand::LangChange(None),
        SpeechCommand::text("world"),
      ]
    );
  }
  #[test]
  fn single_block_text_never_switches() {
    let detector = detector(&["en_US", "zh_CN", "ru_RU"], AutoLanguageSettings::default());
    for text in ["plain ascii words only", "你好世界今天", "привет мир"] {
      let output = detector
        .detect(vec![SpeechCommand::text(text), SpeechCommand::Index(1)])
        .collect::<Vec<SpeechCommand>>();
      let mut seen = languages(&output);
      seen.dedup();
      assert!(seen.len() <= 1, "{text} switched between {seen:?}");
    }
  }
  #[test]
  fn first_ignorable_resets_to_current_language() {
    let detector = detector(&["en", "ja"], AutoLanguageSettings::default());
    let output = detector
      .detect(vec![SpeechCommand::lang("en"), SpeechCommand::text("カナ123, カナ")])
      .collect::<Vec<SpeechCommand>>();
    assert_eq!(
      output,
      vec![
        SpeechCommand::lang("en"),
        SpeechCommand::lang("ja"),
        SpeechCommand::text("カナ"),
        SpeechCommand::lang("en"),
        SpeechCommand::text("123, "),
        SpeechCommand::lang("ja"),
        SpeechCommand::text("カナ"),
      ]
    );
  }
  #[test]
  fn digits_are_classified_when_not_ignored() {
    let settings = AutoLanguageSettings {
      ignore_numbers: false,
      ..AutoLanguageSettings::default()
    };
    let detector = detector(&["en", "zh"], settings);
    let output = detector
      .detect(vec![SpeechCommand::lang("zh"), SpeechCommand::text("第3")])
      .collect::<Vec<SpeechCommand>>();
    assert_eq!(
      output,
      vec![
        SpeechCommand::lang("zh"),
        SpeechCommand::text("第"),
        SpeechCommand::lang("en"),
        SpeechCommand::text("3"),
      ]
    );
  }
  #[test]
  fn current_language_wins_over_other_candidates() {
    let detector = detector(&["en", "fr", "zh"], AutoLanguageSettings::default());
    let output = detector
      .detect(vec![SpeechCommand::lang("fr_FR"), SpeechCommand::text("中bonjour")])
      .collect::<Vec<SpeechCommand>>();
    assert_eq!(
      languages(&output),
      vec![Some("fr_FR".to_owned()), Some("zh".to_owned()), Some("fr_FR".to_owned())]
    );
  }
  #[test]
  fn fallback_picks_configured_language_for_shared_blocks() {
    let settings = AutoLanguageSettings {
      cjk_fallback: Some("ja".to_owned()),
      default_language: "ko".to_owned(),
      ..AutoLanguageSettings::default()
    };
    let detector = detector(&["ko", "zh", "ja"], settings);
    let output = detector
      .detect(vec![SpeechCommand::text("漢")])
      .collect::<Vec<SpeechCommand>>();
    assert_eq!(
      output,
      vec![SpeechCommand::lang("ja"), SpeechCommand::text("漢")]
    );
  }
  #[test]
  fn forced_symbols_override_script_and_text() {
    let detector = detector(&["en", "zh"], AutoLanguageSettings::default());
    let output = detector
      .detect(vec![SpeechCommand::lang("zh"), SpeechCommand::text("我@家")])
      .collect::<Vec<SpeechCommand>>();
    assert_eq!(
      output,
      vec![
        SpeechCommand::lang("zh"),
        SpeechCommand::text("我"),
        SpeechCommand::lang("en"),
        SpeechCommand::text(" at "),
        SpeechCommand::lang("zh"),
        SpeechCommand::text("家"),
      ]
    );
  }
  #[test]
  fn non_text_commands_keep_their_position() {
    let detector = detector(&["en", "zh"], AutoLanguageSettings::default());
    let output = detector
      .detect(vec![
        SpeechCommand::text("ab"),
        SpeechCommand::Index(4),
        SpeechCommand::text("cd"),
      ])
      .collect::<Vec<SpeechCommand>>();
    assert_eq!(
      output,
      vec![
        SpeechCommand::text("ab"),
        SpeechCommand::Index(4),
        SpeechCommand::text("cd"),
      ]
    );
  }
  #[test]
  fn default_language_follows_the_default_voice() {
    let mut detector = detector(&["en_US", "zh_CN"], AutoLanguageSettings::default());
    detector.set_default_language("zh_CN");
    assert_eq!(detector.default_language(), "zh_CN");
    let output = detector
      .detect(vec![SpeechCommand::text("你好 hello")])
      .collect::<Vec<SpeechCommand>>();
    assert_eq!(
      output,
      vec![
        SpeechCommand::text("你好 "),
        SpeechCommand::lang("en"),
        SpeechCommand::text("hello"),
      ]
    );
    let output = detector
      .detect(vec![SpeechCommand::text("hello")])
      .collect::<Vec<SpeechCommand>>();
    assert_eq!(output[0], SpeechCommand::lang("en"));
  }
  #[test]
  fn spelling_pairs_carry_languages() {
    let detector = detector(&["en", "zh"], AutoLanguageSettings::default());
    assert_eq!(
      detector.process_for_spelling("ab中文c"),
      vec![
        ("ab".to_owned(), "en".to_owned()),
        ("中文".to_owned(), "zh".to_owned()),
        ("c".to_owned(), "en".to_owned()),
      ]
    );
  }
}
