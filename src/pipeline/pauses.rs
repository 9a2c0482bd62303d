use crate::blocks::is_ideograph;
use crate::pipeline::numbers::is_pure_number;
use crate::pipeline::{wait_break, Stage};
use crate::speech::{SpeechCommand, SpeechSequence};
fn pause_between<F>(sequence: SpeechSequence, factor: u32, predicate: F) -> SpeechSequence
where
  F: Fn(&str, &str) -> bool,
{
  if factor == 0 {
    return sequence;
  }
  let mut output: SpeechSequence = Vec::with_capacity(sequence.len());
  for command in sequence {
    let pause = matches!(
      (output.last(), &command),
      (Some(SpeechCommand::Text(previous)), SpeechCommand::Text(next)) if predicate(previous, next)
    );
    if pause {
      output.push(wait_break(factor));
    }
    output.push(command);
  }
  output
}
/// Pause between every two adjacent text items.
pub struct ItemWaitFactor {
  factor: u32,
}
impl ItemWaitFactor {
  pub const NAME: &'static str = "item-wait-factor";
  pub fn new(factor: u32) -> Self {
    ItemWaitFactor { factor }
  }
}
impl Stage for ItemWaitFactor {
  fn name(&self) -> &str {
    ItemWaitFactor::NAME
  }
  fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
    pause_between(sequence, self.factor, |_, _| true)
  }
}
/// Pause between two adjacent text items that are both plain numbers.
pub struct NumberWaitFactor {
  factor: u32,
}
impl NumberWaitFactor {
  pub const NAME: &'static str = "number-wait-factor";
  pub fn new(factor: u32) -> Self {
    NumberWaitFactor { factor }
  }
}
impl Stage for NumberWaitFactor {
  fn name(&self) -> &str {
    NumberWaitFactor::NAME
  }
  fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
    pause_between(sequence, self.factor, |previous, next| {
      is_pure_number(previous) && is_pure_number(next)
    })
  }
}
/// Splits a text item wherever whitespace separates two ideographs and puts
/// a pause in place of the whitespace.
pub struct ChineseSpacePause {
  factor: u32,
}
impl ChineseSpacePause {
  pub const NAME: &'static str = "chinese-space-pause";
  pub fn new(factor: u32) -> Self {
    ChineseSpacePause { factor }
  }
  fn split(&self, text: String, output: &mut SpeechSequence) {
    let characters = text.chars().collect::<Vec<char>>();
    let mut current = String::new();
    let mut index = 0;
    while index < characters.len() {
      let character = characters[index];
      if character.is_whitespace() && index > 0 && is_ideograph(characters[index - 1]) {
        let end = characters[index..]
          .iter()
          .position(|character| !character.is_whitespace())
          .map_or(characters.len(), |offset| index + offset);
        if end < characters.len() && is_ideograph(characters[end]) {
          output.push(SpeechCommand::Text(std::mem::take(&mut current)));
          output.push(wait_break(self.factor));
          index = end;
          continue;
        }
      }
      current.push(character);
      index += 1;
    }
    if current.len() == text.len() {
      output.push(SpeechCommand::Text(text));
    } else if !current.is_empty() {
      output.push(SpeechCommand::Text(current));
    }
  }
}
impl Stage for ChineseSpacePause {
  fn name(&self) -> &str {
    ChineseSpacePause::NAME
  }
  fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
    if self.factor == 0 {
      return sequence;
    }
    let mut output = Vec::with_capacity(sequence.len());
    for command in sequence {
      match command {
        SpeechCommand::Text(text) => self.split(text, &mut output),
        command => output.push(command),
      }
    }
    output
  }
}
