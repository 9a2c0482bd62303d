use serde::{Deserialize, Serialize};
use std::fmt;
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prosody {
  Absolute(u8),
  Offset(i32),
}
impl Prosody {
  pub fn resolve(self, base: u8) -> u8 {
    let value = match self {
      Prosody::Absolute(value) => i32::from(value),
      Prosody::Offset(offset) => i32::from(base) + offset,
    };
    u8::try_from(value.clamp(0, 100)).unwrap_or(100)
  }
}
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeechCommand {
  Text(String),
  Index(u32),
  Break(u32),
  LangChange(Option<String>),
  Pitch(Prosody),
  Rate(Prosody),
  Volume(Prosody),
  CharacterMode(bool),
  Split,
}
pub type SpeechSequence = Vec<SpeechCommand>;
impl SpeechCommand {
  pub fn text(text: &str) -> Self {
    SpeechCommand::Text(text.to_owned())
  }
  pub fn lang(language: &str) -> Self {
    SpeechCommand::LangChange(Some(language.to_owned()))
  }
  pub fn kind(&self) -> &'static str {
    match self {
      SpeechCommand::Text(_) => "text",
      SpeechCommand::Index(_) => "index",
      SpeechCommand::Break(_) => "break",
      SpeechCommand::LangChange(_) => "language change",
      SpeechCommand::Pitch(_) => "pitch",
      SpeechCommand::Rate(_) => "rate",
      SpeechCommand::Volume(_) => "volume",
      SpeechCommand::CharacterMode(_) => "character mode",
      SpeechCommand::Split => "split",
    }
  }
}
impl fmt::Display for SpeechCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SpeechCommand::Text(text) => write!(f, "{text:?}"),
      SpeechCommand::Index(index) => write!(f, "Index({index})"),
      SpeechCommand::Break(time) => write!(f, "Break({time}ms)"),
      SpeechCommand::LangChange(language) => {
        write!(f, "LangChange({})", language.as_deref().unwrap_or("default"))
      }
      SpeechCommand::Pitch(value) => write!(f, "Pitch({value:?})"),
      SpeechCommand::Rate(value) => write!(f, "Rate({value:?})"),
      SpeechCommand::Volume(value) => write!(f, "Volume({value:?})"),
      SpeechCommand::CharacterMode(state) => write!(f, "CharacterMode({state})"),
      SpeechCommand::Split => write!(f, "Split"),
    }
  }
}
pub fn describe(sequence: &[SpeechCommand]) -> String {
  sequence
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<String>>()
    .join(", ")
}
pub fn primary_subtag(locale: &str) -> String {
  locale
    .split(['_', '-'])
    .next()
    .unwrap_or(locale)
    .to_lowercase()
}
pub fn normalize_locale(locale: &str) -> String {
  let mut parts = locale.split(['_', '-']);
  let language = parts.next().unwrap_or_default().to_lowercase();
  match parts.next() {
    Some(country) if !country.is_empty() => language + "_" + &country.to_uppercase(),
    _ => language,
  }
}
#[cfg(test)]
mod tests {
  use super::*;
  #[test]
  fn offsets_clamp_to_percent_range() {
    assert_eq!(Prosody::Offset(30).resolve(80), 100);
    assert_eq!(Prosody::Offset(-70).resolve(50), 0);
    assert_eq!(Prosody::Absolute(42).resolve(90), 42);
  }
  #[test]
  fn locales_normalize_to_underscore_form() {
    assert_eq!(normalize_locale("en-gb"), "en_GB");
    assert_eq!(normalize_locale("ZH_tw"), "zh_TW");
    assert_eq!(normalize_locale("fr"), "fr");
    assert_eq!(primary_subtag("pt_BR"), "pt");
  }
}
