use crate::backends::{unsupported, ChunkBuilder, EngineFamily, ProsodyBase, Utterance};
use crate::conversion::Curve;
use crate::speech::SpeechCommand;
pub const MAX_BREAK_MS: u32 = 65535;
const ESCAPE: char = '\x1b';
fn escape(tag: &str, value: impl std::fmt::Display) -> String {
  format!("{ESCAPE}\\{tag}={value}\\")
}
pub struct EscapeChunk {
  prosody: ProsodyBase,
  markup: String,
  has_content: bool,
  overridden: bool,
}
impl EscapeChunk {
  pub fn new(prosody: ProsodyBase) -> Self {
    EscapeChunk {
      prosody,
      markup: String::new(),
      has_content: false,
      overridden: false,
    }
  }
  fn rate_curve(&self) -> Curve {
    if self.prosody.rate_boost {
      Curve::RATE_BOOST
    } else {
      Curve::VOCALIZER_RATE
    }
  }
  fn restore(&mut self) {
    self.markup += &escape("rate", self.rate_curve().to_physical(self.prosody.rate));
    self.markup += &escape("pitch", Curve::VOCALIZER_PITCH.to_physical(self.prosody.pitch));
    self.markup += &escape("vol", Curve::PERCENT.to_physical(self.prosody.volume));
  }
}
impl ChunkBuilder for EscapeChunk {
  fn append(&mut self, command: &SpeechCommand) {
    match command {
      SpeechCommand::Text(text) => {
        self.markup.extend(text.chars().filter(|&character| character != ESCAPE));
        self.has_content = true;
      }
      SpeechCommand::Index(index) => {
        self.markup += &escape("mrk", index);
        self.has_content = true;
      }
      SpeechCommand::Break(time) => {
        self.markup += &escape("pause", (*time).clamp(1, MAX_BREAK_MS));
        self.has_content = true;
      }
      SpeechCommand::Rate(value) => {
        let percent = value.resolve(self.prosody.rate);
        self.markup += &escape("rate", self.rate_curve().to_physical(percent));
        self.overridden = true;
      }
      SpeechCommand::Pitch(value) => {
        let percent = value.resolve(self.prosody.pitch);
        self.markup += &escape("pitch", Curve::VOCALIZER_PITCH.to_physical(percent));
        self.overridden = true;
      }
      SpeechCommand::Volume(value) => {
        let percent = value.resolve(self.prosody.volume);
        self.markup += &escape("vol", Curve::PERCENT.to_physical(percent));
        self.overridden = true;
      }
      SpeechCommand::CharacterMode(state) => {
        self.markup += &escape("tn", if *state { "spell" } else { "normal" });
      }
      command => unsupported(EngineFamily::Vocalizer, command),
    }
  }
  fn flush(&mut self) -> Option<Utterance> {
    if self.overridden {
      self.restore();
      self.overridden = false;
    }
    let markup = std::mem::take(&mut self.markup);
    let has_content = std::mem::replace(&mut self.has_content, false);
    has_content.then_some(Utterance::Markup(markup))
  }
  fn on_voice_switch(&mut self, prosody: ProsodyBase) {
    self.prosody = prosody;
  }
}
