use crate::backends::{unsupported, ChunkBuilder, EngineFamily, ProsodyBase, Utterance};
use crate::speech::{Prosody, SpeechCommand};
pub const MAX_BREAK_MS: u32 = 10_000;
/// Chunk builder for engines that take one call per command instead of
/// markup. Prosody overrides are resolved to absolute percent values so the
/// engine never has to know the voice's base settings.
pub struct CommandChunk {
  prosody: ProsodyBase,
  commands: Vec<SpeechCommand>,
  has_content: bool,
}
impl CommandChunk {
  pub fn new(prosody: ProsodyBase) -> Self {
    CommandChunk {
      prosody,
      commands: Vec::new(),
      has_content: false,
    }
  }
}
impl ChunkBuilder for CommandChunk {
  fn append(&mut self, command: &SpeechCommand) {
    match command {
      SpeechCommand::Text(text) => {
        if let Some(SpeechCommand::Text(previous)) = self.commands.last_mut() {
          previous.push_str(text);
        } else {
          self.commands.push(command.clone());
        }
        self.has_content = true;
      }
      SpeechCommand::Index(_) => {
        self.commands.push(command.clone());
        self.has_content = true;
      }
      SpeechCommand::Break(time) => {
        self.commands.push(SpeechCommand::Break((*time).min(MAX_BREAK_MS)));
        self.has_content = true;
      }
      SpeechCommand::Rate(value) => {
        let percent = value.resolve(self.prosody.rate);
        self.commands.push(SpeechCommand::Rate(Prosody::Absolute(percent)));
      }
      SpeechCommand::Pitch(value) => {
        let percent = value.resolve(self.prosody.pitch);
        self.commands.push(SpeechCommand::Pitch(Prosody::Absolute(percent)));
      }
      SpeechCommand::Volume(value) => {
        let percent = value.resolve(self.prosody.volume);
        self.commands.push(SpeechCommand::Volume(Prosody::Absolute(percent)));
      }
      SpeechCommand::CharacterMode(_) => self.commands.push(command.clone()),
      command => unsupported(EngineFamily::Plain, command),
    }
  }
  fn flush(&mut self) -> Option<Utterance> {
    let commands = std::mem::take(&mut self.commands);
    let has_content = std::mem::replace(&mut self.has_content, false);
    has_content.then_some(Utterance::Sequence(commands))
  }
  fn on_voice_switch(&mut self, prosody: ProsodyBase) {
    self.prosody = prosody;
  }
}
