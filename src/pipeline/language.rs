use crate::pipeline::numbers::NUMBER;
use crate::pipeline::Stage;
use crate::speech::{SpeechCommand, SpeechSequence};
use std::sync::Arc;
/// Speaks every number in `language`, switching back to whatever language
/// was in effect before it.
pub struct NumberLanguage {
  language: String,
}
impl NumberLanguage {
  pub const NAME: &'static str = "number-language";
  pub fn new(language: &str) -> Self {
    NumberLanguage {
      language: language.to_owned(),
    }
  }
}
impl Stage for NumberLanguage {
  fn name(&self) -> &str {
    NumberLanguage::NAME
  }
  fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
    if self.language.is_empty() {
      return sequence;
    }
    let mut output = Vec::with_capacity(sequence.len());
    let mut restore: Option<String> = None;
    for command in sequence {
      let text = match command {
        SpeechCommand::LangChange(language) => {
          restore.clone_from(&language);
          output.push(SpeechCommand::LangChange(language));
          continue;
        }
        SpeechCommand::Text(text) => text,
        command => {
          output.push(command);
          continue;
        }
      };
      let mut last = 0;
      for number in NUMBER.find_iter(&text) {
        if number.start() > last {
          output.push(SpeechCommand::text(&text[last..number.start()]));
        }
        output.push(SpeechCommand::lang(&self.language));
        output.push(SpeechCommand::text(number.as_str()));
        output.push(SpeechCommand::LangChange(restore.clone()));
        last = number.end();
      }
      if last == 0 {
        output.push(SpeechCommand::Text(text));
      } else if last < text.len() {
        output.push(SpeechCommand::text(&text[last..]));
      }
    }
    output
  }
}
/// Maps a language change target to the voice that would speak it.
pub type VoiceResolver = Arc<dyn Fn(Option<&str>) -> String + Send + Sync>;
/// Removes language changes that would not switch voices.
///
/// A pending change is held until a command that depends on the voice
/// arrives (text, prosody or character mode). Adjacent changes collapse to
/// the last one, a change resolving to the active voice is dropped, and
/// changes that govern nothing at the end of the sequence disappear.
pub struct LangChangeDedup {
  resolver: VoiceResolver,
}
impl LangChangeDedup {
  pub const NAME: &'static str = "lang-change-dedup";
  pub fn new(resolver: VoiceResolver) -> Self {
    LangChangeDedup { resolver }
  }
}
impl Stage for LangChangeDedup {
  fn name(&self) -> &str {
    LangChangeDedup::NAME
  }
  fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
    let mut output = Vec::with_capacity(sequence.len());
    let mut active = (self.resolver)(None);
    let mut pending: Option<Option<String>> = None;
    for command in sequence {
      match command {
        SpeechCommand::LangChange(language) => pending = Some(language),
        SpeechCommand::Index(_) | SpeechCommand::Break(_) | SpeechCommand::Split => {
          output.push(command);
        }
        command => {
          if let Some(language) = pending.take() {
            let voice = (self.resolver)(language.as_deref());
            if voice != active {
              active = voice;
              output.push(SpeechCommand::LangChange(language));
            }
          }
          output.push(command);
        }
      }
    }
    output
  }
}
