use crate::error::SpeechError;
use crate::pipeline::normalization::NormalizationForm;
use crate::pipeline::numbers::NumberMode;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard};
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionTiming {
  Before,
  #[default]
  After,
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
  pub item_wait_factor: u32,
  pub number_wait_factor: u32,
  pub chinese_space_wait_factor: u32,
  pub ignore_comma_between_number: bool,
  pub number_mode: NumberMode,
  pub number_dot_replacement: Option<String>,
  pub number_language: Option<String>,
  pub normalization: Option<NormalizationForm>,
}
impl Default for SpeechSettings {
  fn default() -> Self {
    SpeechSettings {
      item_wait_factor: 0,
      number_wait_factor: 0,
      chinese_space_wait_factor: 0,
      ignore_comma_between_number: false,
      number_mode: NumberMode::Value,
      number_dot_replacement: None,
      number_language: None,
      normalization: None,
    }
  }
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoLanguageSettings {
  pub enabled: bool,
  pub ignore_numbers: bool,
  pub ignore_punctuation: bool,
  pub latin_fallback: Option<String>,
  pub cjk_fallback: Option<String>,
  pub timing: DetectionTiming,
  pub default_language: String,
}
impl Default for AutoLanguageSettings {
  fn default() -> Self {
    AutoLanguageSettings {
      enabled: true,
      ignore_numbers: true,
      ignore_punctuation: true,
      latin_fallback: None,
      cjk_fallback: None,
      timing: DetectionTiming::After,
      default_language: "en".to_owned(),
    }
  }
}
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencySettings {
  pub keep_main_locale_voice: bool,
  pub keep_main_locale_engine: bool,
  pub keep_main_locale_parameter: bool,
}
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
  pub rate: u8,
  pub pitch: u8,
  pub volume: u8,
  pub variant: Option<String>,
  pub rate_boost: bool,
}
impl Default for VoiceSettings {
  fn default() -> Self {
    VoiceSettings {
      rate: 50,
      pitch: 50,
      volume: 100,
      variant: None,
      rate_boost: false,
    }
  }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
  pub speak_timeout_ms: Option<u64>,
  pub poll_interval_ms: u64,
}
impl Default for TaskSettings {
  fn default() -> Self {
    TaskSettings {
      speak_timeout_ms: Some(30_000),
      poll_interval_ms: 20,
    }
  }
}
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub speech: SpeechSettings,
  pub auto_language: AutoLanguageSettings,
  pub consistency: ConsistencySettings,
  pub task: TaskSettings,
  pub default_voice: Option<String>,
  pub locale_voices: BTreeMap<String, String>,
  pub voices: BTreeMap<String, VoiceSettings>,
}
pub trait ConfigStore: Send + Sync {
  fn load(&self) -> Result<Settings, SpeechError>;
  fn save(&self, settings: &Settings) -> Result<(), SpeechError>;
}
#[derive(Debug)]
pub struct JsonConfigStore {
  path: PathBuf,
}
impl JsonConfigStore {
  pub fn new(path: &Path) -> Self {
    JsonConfigStore {
      path: path.to_owned(),
    }
  }
}
impl ConfigStore for JsonConfigStore {
  fn load(&self) -> Result<Settings, SpeechError> {
    if !self.path.exists() {
      info!(
        "No configuration at {}, using defaults",
        self.path.display()
      );
      return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&self.path)
      .map_err(|error| SpeechError::into_io(&self.path, error))?;
    serde_json::from_str(&contents).map_err(SpeechError::into_config_corrupt)
  }
  fn save(&self, settings: &Settings) -> Result<(), SpeechError> {
    let contents = serde_json::to_string_pretty(settings).map_err(SpeechError::into_unknown)?;
    std::fs::write(&self.path, contents).map_err(|error| SpeechError::into_io(&self.path, error))?;
    debug!("Saved configuration to {}", self.path.display());
    Ok(())
  }
}
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
  settings: Mutex<Settings>,
}
impl MemoryConfigStore {
  pub fn new(settings: Settings) -> Self {
    MemoryConfigStore {
      settings: Mutex::new(settings),
    }
  }
  pub fn snapshot(&self) -> Settings {
    self
      .settings
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}
impl ConfigStore for MemoryConfigStore {
  fn load(&self) -> Result<Settings, SpeechError> {
    Ok(self.snapshot())
  }
  fn save(&self, settings: &Settings) -> Result<(), SpeechError> {
    *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();
    Ok(())
  }
}
pub struct SharedSettings {
  settings: RwLock<Settings>,
  store: Box<dyn ConfigStore>,
}
impl SharedSettings {
  pub fn load(store: Box<dyn ConfigStore>) -> Result<Self, SpeechError> {
    let settings = store.load()?;
    Ok(SharedSettings {
      settings: RwLock::new(settings),
      store,
    })
  }
  pub fn read(&self) -> RwLockReadGuard<'_, Settings> {
    self.settings.read().unwrap_or_else(PoisonError::into_inner)
  }
  pub fn snapshot(&self) -> Settings {
    self.read().clone()
  }
  pub fn update<F, T>(&self, closure: F) -> T
  where
    F: FnOnce(&mut Settings) -> T,
  {
    let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
    closure(&mut settings)
  }
  pub fn voice_settings(&self, voice: &str) -> Option<VoiceSettings> {
    self.read().voices.get(voice).cloned()
  }
  pub fn set_voice_settings(&self, voice: &str, settings: VoiceSettings) {
    self.update(|config| {
      config.voices.insert(voice.to_owned(), settings);
    });
  }
  pub fn persist(&self) -> Result<(), SpeechError> {
    let settings = self.snapshot();
    self.store.save(&settings)
  }
}
