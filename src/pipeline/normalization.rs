use crate::pipeline::Stage;
use crate::speech::{SpeechCommand, SpeechSequence};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NormalizationForm {
  Nfc,
  Nfd,
  Nfkc,
  Nfkd,
}
impl NormalizationForm {
  pub fn normalize(self, text: &str) -> String {
    match self {
      NormalizationForm::Nfc => text.nfc().collect(),
      NormalizationForm::Nfd => text.nfd().collect(),
      NormalizationForm::Nfkc => text.nfkc().collect(),
      NormalizationForm::Nfkd => text.nfkd().collect(),
    }
  }
}
pub struct Normalization {
  form: NormalizationForm,
}
impl Normalization {
  pub const NAME: &'static str = "normalization";
  pub fn new(form: NormalizationForm) -> Self {
    Normalization { form }
  }
}
impl Stage for Normalization {
  fn name(&self) -> &str {
    Normalization::NAME
  }
  fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
    sequence
      .into_iter()
      .map(|command| match command {
        SpeechCommand::Text(text) => SpeechCommand::Text(self.form.normalize(&text)),
        command => command,
      })
      .collect()
  }
}
