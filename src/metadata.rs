use crate::backends::EngineFamily;
use serde::{Deserialize, Serialize};
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMetadata {
  pub name: String,
  pub family: EngineFamily,
  pub supports_rate_boost: bool,
  pub supports_variants: bool,
}
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
  pub id: String,
  pub name: String,
  pub engine: String,
  pub locale: String,
  pub language: String,
  pub description: String,
}
impl VoiceInfo {
  pub fn new(engine: &str, id: &str, name: &str, locale: &str) -> Self {
    let locale = crate::speech::normalize_locale(locale);
    VoiceInfo {
      id: id.to_owned(),
      name: name.to_owned(),
      engine: engine.to_owned(),
      language: crate::speech::primary_subtag(&locale),
      description: format!("{name} ({engine})"),
      locale,
    }
  }
  pub fn qualified_name(&self) -> String {
    self.engine.clone() + ":" + &self.name
  }
}
/// Splits an engine-qualified voice name into `(engine, voice)`.
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
  name.split_once(':')
}
#[cfg(test)]
mod tests {
  use super::*;
  #[test]
  fn voices_are_qualified_by_engine() {
    let voice = VoiceInfo::new("SAPI5", "TTS_MS_EN-GB_HAZEL", "Hazel", "en-gb");
    assert_eq!(voice.locale, "en_GB");
    assert_eq!(voice.language, "en");
    assert_eq!(voice.qualified_name(), "SAPI5:Hazel");
    assert_eq!(split_qualified("SAPI5:Hazel"), Some(("SAPI5", "Hazel")));
    assert_eq!(split_qualified("Hazel"), None);
  }
}
