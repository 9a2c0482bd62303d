use crate::backends::{unsupported, ChunkBuilder, EngineFamily, ProsodyBase, Utterance};
use crate::conversion::Curve;
use crate::speech::SpeechCommand;
use log::warn;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
pub const MAX_BREAK_MS: u32 = 65535;
#[derive(Clone, Debug)]
struct OpenTag {
  name: &'static str,
  attribute: Option<(&'static str, String)>,
}
impl OpenTag {
  fn start(&self) -> BytesStart<'static> {
    let start = BytesStart::new(self.name);
    match &self.attribute {
      Some((key, value)) => start.with_attributes([(*key, value.as_str())]),
      None => start,
    }
  }
}
pub struct XmlChunk {
  prosody: ProsodyBase,
  writer: Writer<Vec<u8>>,
  stack: Vec<OpenTag>,
  has_content: bool,
}
impl XmlChunk {
  pub fn new(prosody: ProsodyBase) -> Self {
    XmlChunk {
      prosody,
      writer: Writer::new(Vec::new()),
      stack: Vec::new(),
      has_content: false,
    }
  }
  fn write(&mut self, event: Event<'_>) {
    if let Err(error) = self.writer.write_event(event) {
      warn!("Failed to write SAPI markup: {error}");
    }
  }
  fn open(&mut self, tag: OpenTag) {
    self.write(Event::Start(tag.start()));
    self.stack.push(tag);
  }
  fn close(&mut self, name: &str) {
    let Some(position) = self.stack.iter().rposition(|tag| tag.name == name) else {
      return;
    };
    let above = self.stack.split_off(position + 1);
    for tag in above.iter().rev() {
      self.write(Event::End(BytesEnd::new(tag.name)));
    }
    if let Some(tag) = self.stack.pop() {
      self.write(Event::End(BytesEnd::new(tag.name)));
    }
    for tag in above {
      self.open(tag);
    }
  }
  fn set(&mut self, name: &'static str, key: &'static str, value: i32) {
    self.close(name);
    self.open(OpenTag {
      name,
      attribute: Some((key, value.to_string())),
    });
  }
}
impl ChunkBuilder for XmlChunk {
  fn append(&mut self, command: &SpeechCommand) {
    match command {
      SpeechCommand::Text(text) => {
        let text = text
          .chars()
          .filter(|character| !character.is_control() || matches!(character, '\t' | '\n' | '\r'))
          .collect::<String>();
        self.write(Event::Text(BytesText::new(&text)));
        self.has_content = true;
      }
      SpeechCommand::Index(index) => {
        let mark = index.to_string();
        self.write(Event::Empty(
          BytesStart::new("bookmark").with_attributes([("mark", mark.as_str())]),
        ));
        self.has_content = true;
      }
      SpeechCommand::Break(time) => {
        let time = (*time).min(MAX_BREAK_MS).to_string();
        self.write(Event::Empty(
          BytesStart::new("silence").with_attributes([("msec", time.as_str())]),
        ));
        self.has_content = true;
      }
      SpeechCommand::Pitch(value) => {
        let percent = value.resolve(self.prosody.pitch);
        self.set("pitch", "absmiddle", Curve::SAPI_SCALE.to_physical(percent));
      }
      SpeechCommand::Rate(value) => {
        let percent = value.resolve(self.prosody.rate);
        self.set("rate", "absspeed", Curve::SAPI_SCALE.to_physical(percent));
      }
      SpeechCommand::Volume(value) => {
        let percent = value.resolve(self.prosody.volume);
        self.set("volume", "level", Curve::PERCENT.to_physical(percent));
      }
      SpeechCommand::CharacterMode(true) => {
        if !self.stack.iter().any(|tag| tag.name == "spell") {
          self.open(OpenTag {
            name: "spell",
            attribute: None,
          });
        }
      }
      SpeechCommand::CharacterMode(false) => self.close("spell"),
      command => unsupported(EngineFamily::Sapi, command),
    }
  }
  fn flush(&mut self) -> Option<Utterance> {
    while let Some(tag) = self.stack.pop() {
      self.write(Event::End(BytesEnd::new(tag.name)));
    }
    let markup = std::mem::replace(&mut self.writer, Writer::new(Vec::new())).into_inner();
    if !std::mem::replace(&mut self.has_content, false) {
      return None;
    }
    match String::from_utf8(markup) {
      Ok(markup) => Some(Utterance::Markup(markup)),
      Err(error) => {
        warn!("Dropping SAPI chunk with invalid UTF-8: {error}");
        None
      }
    }
  }
  fn on_voice_switch(&mut self, prosody: ProsodyBase) {
    self.prosody = prosody;
  }
}
