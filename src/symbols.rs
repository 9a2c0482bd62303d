use crate::error::SpeechError;
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
const SECTION_HEADER: &str = "symbols:";
const DEFAULT_FIELD: &str = "-";
const IDENTIFIER_ESCAPES: &[(char, char)] = &[
  ('0', '\0'),
  ('t', '\t'),
  ('n', '\n'),
  ('r', '\r'),
  ('f', '\x0c'),
  ('v', '\x0b'),
  ('#', '#'),
  ('\\', '\\'),
];
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SymbolMode {
  #[default]
  Context,
  Force,
}
impl fmt::Display for SymbolMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SymbolMode::Context => write!(f, "context"),
      SymbolMode::Force => write!(f, "force"),
    }
  }
}
impl FromStr for SymbolMode {
  type Err = anyhow::Error;
  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value.to_lowercase().as_str() {
      "context" => Ok(SymbolMode::Context),
      "force" => Ok(SymbolMode::Force),
      other => Err(anyhow::anyhow!("Unknown symbol mode {other}")),
    }
  }
}
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpeechSymbol {
  pub identifier: String,
  pub replacement: Option<String>,
  pub language: Option<String>,
  pub mode: SymbolMode,
  pub display_name: String,
}
impl SpeechSymbol {
  pub fn new(identifier: &str) -> Self {
    SpeechSymbol {
      identifier: identifier.to_owned(),
      ..SpeechSymbol::default()
    }
  }
  pub fn forced(identifier: &str, language: &str, replacement: Option<&str>) -> Self {
    SpeechSymbol {
      identifier: identifier.to_owned(),
      replacement: replacement.map(ToOwned::to_owned),
      language: Some(language.to_owned()),
      mode: SymbolMode::Force,
      display_name: String::new(),
    }
  }
  fn parse(line: &str) -> Result<Self, anyhow::Error> {
    let mut fields = line.split('\t').collect::<Vec<&str>>();
    let mut display_name = String::new();
    if fields.len() > 1 && fields.last().is_some_and(|field| field.starts_with('#')) {
      display_name = fields
        .pop()
        .map(|field| field[1..].trim_start().to_owned())
        .unwrap_or_default();
    }
    let mut fields = fields.into_iter();
    let identifier = unescape_identifier(fields.next().unwrap_or_default())?;
    let replacement = fields
      .next()
      .ok_or_else(|| anyhow::anyhow!("Missing replacement field"))?;
    let language = fields.next().unwrap_or(DEFAULT_FIELD);
    let mode = match fields.next().unwrap_or(DEFAULT_FIELD) {
      DEFAULT_FIELD => SymbolMode::default(),
      mode => mode.parse()?,
    };
    if fields.next().is_some() {
      Err(anyhow::anyhow!("Too many fields"))?;
    }
    Ok(SpeechSymbol {
      identifier,
      replacement: load_field(replacement),
      language: load_field(language),
      mode,
      display_name,
    })
  }
  fn format(&self) -> String {
    let mut fields = vec![
      escape_identifier(&self.identifier),
      save_field(self.replacement.as_deref()),
      save_field(self.language.as_deref()),
      match self.mode {
        SymbolMode::Context => DEFAULT_FIELD.to_owned(),
        mode => mode.to_string(),
      },
    ];
    while fields.len() > 2 && fields.last().is_some_and(|field| field == DEFAULT_FIELD) {
      fields.pop();
    }
    if !self.display_name.is_empty() {
      fields.push("# ".to_owned() + &self.display_name);
    }
    fields.join("\t")
  }
}
fn load_field(field: &str) -> Option<String> {
  match field {
    DEFAULT_FIELD | "" => None,
    field => Some(field.to_owned()),
  }
}
fn save_field(field: Option<&str>) -> String {
  field.unwrap_or(DEFAULT_FIELD).to_owned()
}
fn unescape_identifier(field: &str) -> Result<String, anyhow::Error> {
  let mut characters = field.chars();
  match (characters.next(), characters.next()) {
    (None, _) => Err(anyhow::anyhow!("Empty identifier")),
    (Some('\\'), Some(code)) => {
      let character = IDENTIFIER_ESCAPES
        .iter()
        .find(|(escape, _)| *escape == code)
        .map_or(code, |(_, character)| *character);
      Ok(character.to_string() + characters.as_str())
    }
    _ => Ok(field.to_owned()),
  }
}
fn escape_identifier(identifier: &str) -> String {
  let mut characters = identifier.chars();
  let Some(first) = characters.next() else {
    return String::new();
  };
  match IDENTIFIER_ESCAPES
    .iter()
    .find(|(_, character)| *character == first)
  {
    Some((code, _)) => format!("\\{code}{}", characters.as_str()),
    None => identifier.to_owned(),
  }
}
#[derive(Clone, Debug, Default)]
pub struct SpeechSymbols {
  symbols: Vec<SpeechSymbol>,
  positions: HashMap<String, usize>,
}
impl SpeechSymbols {
  pub fn new() -> Self {
    SpeechSymbols::default()
  }
  pub fn load(path: &Path) -> Result<Self, SpeechError> {
    let contents =
      std::fs::read_to_string(path).map_err(|error| SpeechError::into_io(path, error))?;
    let symbols = SpeechSymbols::parse(&contents);
    debug!("Loaded {} speech symbols from {}", symbols.len(), path.display());
    Ok(symbols)
  }
  pub fn parse(contents: &str) -> Self {
    let mut symbols = SpeechSymbols::new();
    let mut in_symbols = true;
    for (number, line) in contents.lines().enumerate() {
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      if !line.contains('\t') && line.ends_with(':') {
        in_symbols = line == SECTION_HEADER;
        continue;
      }
      if !in_symbols {
        continue;
      }
      match SpeechSymbol::parse(line) {
        Ok(symbol) => symbols.insert(symbol),
        Err(error) => warn!("Skipping invalid speech symbol on line {}: {error}", number + 1),
      }
    }
    symbols
  }
  pub fn save(&self, path: &Path) -> Result<(), SpeechError> {
    std::fs::write(path, self.to_file_string()).map_err(|error| SpeechError::into_io(path, error))
  }
  pub fn to_file_string(&self) -> String {
    let mut contents = SECTION_HEADER.to_owned() + "\n";
    for symbol in &self.symbols {
      contents += &symbol.format();
      contents.push('\n');
    }
    contents
  }
  pub fn insert(&mut self, symbol: SpeechSymbol) {
    match self.positions.get(&symbol.identifier) {
      Some(&position) => self.symbols[position] = symbol,
      None => {
        self
          .positions
          .insert(symbol.identifier.clone(), self.symbols.len());
        self.symbols.push(symbol);
      }
    }
  }
  pub fn remove(&mut self, identifier: &str) -> Option<SpeechSymbol> {
    let position = self.positions.remove(identifier)?;
    let symbol = self.symbols.remove(position);
    for index in self.positions.values_mut() {
      if *index > position {
        *index -= 1;
      }
    }
    Some(symbol)
  }
  pub fn get(&self, identifier: &str) -> Option<&SpeechSymbol> {
    self
      .positions
      .get(identifier)
      .map(|&position| &self.symbols[position])
  }
  pub fn get_char(&self, character: char) -> Option<&SpeechSymbol> {
    let mut buffer = [0u8; 4];
    self.get(character.encode_utf8(&mut buffer))
  }
  pub fn forced(&self, character: char) -> Option<&SpeechSymbol> {
    self
      .get_char(character)
      .filter(|symbol| symbol.mode == SymbolMode::Force && symbol.language.is_some())
  }
  pub fn replacement_for(&self, character: char) -> Option<&str> {
    self
      .get_char(character)
      .and_then(|symbol| symbol.replacement.as_deref())
  }
  pub fn iter(&self) -> impl Iterator<Item = &SpeechSymbol> {
    self.symbols.iter()
  }
  pub fn len(&self) -> usize {
    self.symbols.len()
  }
  pub fn is_empty(&self) -> bool {
    self.symbols.is_empty()
  }
}
