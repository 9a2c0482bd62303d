use crate::pipeline::Stage;
use crate::speech::{SpeechCommand, SpeechSequence};
use crate::symbols::SpeechSymbols;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
lazy_static! {
  pub(crate) static ref NUMBER: Regex = Regex::new(r"[0-9]+(?:\.[0-9]+)*").expect("valid regex");
  static ref PURE_NUMBER: Regex =
    Regex::new(r"^\s*[0-9]+(?:[.,][0-9]+)*\s*$").expect("valid regex");
}
pub(crate) fn is_pure_number(text: &str) -> bool {
  PURE_NUMBER.is_match(text)
}
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberMode {
  /// Numbers are read as values, only single character fragments are
  /// translated.
  #[default]
  Value,
  /// Numbers are read digit by digit.
  Number,
}
/// Drops commas that sit between two digits, so "1,000" is read as one
/// number.
pub struct CommaElision;
impl CommaElision {
  pub const NAME: &'static str = "comma-elision";
}
fn elide_commas(text: &str) -> String {
  let characters = text.chars().collect::<Vec<char>>();
  characters
    .iter()
    .enumerate()
    .filter(|(index, character)| {
      **character != ','
        || *index == 0
        || !characters[index - 1].is_ascii_digit()
        || !characters
          .get(index + 1)
          .is_some_and(char::is_ascii_digit)
    })
    .map(|(_, character)| *character)
    .collect()
}
impl Stage for CommaElision {
  fn name(&self) -> &str {
    CommaElision::NAME
  }
  fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
    sequence
      .into_iter()
      .map(|command| match command {
        SpeechCommand::Text(text) if text.contains(',') => SpeechCommand::Text(elide_commas(&text)),
        command => command,
      })
      .collect()
  }
}
pub struct NumberModeStage {
  mode: NumberMode,
  dot_replacement: Option<String>,
  symbols: Arc<SpeechSymbols>,
}
impl NumberModeStage {
  pub const NAME: &'static str = "number-mode";
  pub fn new(mode: NumberMode, dot_replacement: Option<String>, symbols: Arc<SpeechSymbols>) -> Self {
    NumberModeStage {
      mode,
      dot_replacement,
      symbols,
    }
  }
  /// Returns the spoken form of `character` and whether it differs from
  /// the character itself.
  fn translate_character(&self, character: char) -> (String, bool) {
    if character == '.' {
      if let Some(replacement) = &self.dot_replacement {
        return (replacement.clone(), true);
      }
    }
    match self.symbols.replacement_for(character) {
      Some(replacement) => (replacement.to_owned(), true),
      None => (character.to_string(), false),
    }
  }
  /// Splits `number` around its dots. Fragments of one character go through
  /// the symbol table; in number mode longer runs are exploded into single
  /// digits which are then translated the same way.
  fn translate(&self, number: &str) -> String {
    let mut fragments = Vec::new();
    for (index, run) in number.split('.').enumerate() {
      if index > 0 {
        fragments.push(self.translate_character('.'));
      }
      let mut characters = run.chars();
      match (characters.next(), characters.next()) {
        (Some(digit), None) => fragments.push(self.translate_character(digit)),
        _ if self.mode == NumberMode::Number => {
          fragments.extend(run.chars().map(|digit| self.translate_character(digit)));
        }
        _ => fragments.push((run.to_owned(), false)),
      }
    }
    if self.mode == NumberMode::Number {
      return fragments
        .into_iter()
        .map(|(fragment, _)| fragment)
        .collect::<Vec<String>>()
        .join(" ");
    }
    // Words stay apart from their neighbours, untouched digits stay joined.
    let mut spoken = String::new();
    let mut previous_translated = false;
    for (index, (fragment, translated)) in fragments.into_iter().enumerate() {
      if index > 0 && (translated || previous_translated) {
        spoken.push(' ');
      }
      spoken.push_str(&fragment);
      previous_translated = translated;
    }
    spoken
  }
  fn rewrite(&self, text: &str) -> String {
    NUMBER
      .replace_all(text, |captures: &regex::Captures<'_>| self.translate(&captures[0]))
      .into_owned()
  }
}
impl Stage for NumberModeStage {
  fn name(&self) -> &str {
    NumberModeStage::NAME
  }
  fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
    sequence
      .into_iter()
      .map(|command| match command {
        SpeechCommand::Text(text) => SpeechCommand::Text(self.rewrite(&text)),
        command => command,
      })
      .collect()
  }
}
