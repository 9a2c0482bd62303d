//! Resolves languages to voices and owns every live [`Voice`].
//!
//! Resolution order for a locale is the configured voice for that locale
//! (when it is available), then any voice with exactly that locale, then
//! for `xx_YY` locales any voice of the base language `xx`. Within a tier
//! the default voice wins if it qualifies, otherwise the first voice in
//! `(engine, locale, name)` order.
use crate::config::SharedSettings;
use crate::error::SpeechError;
use crate::metadata::{EngineMetadata, VoiceInfo};
use crate::speech::{normalize_locale, primary_subtag};
use crate::task_manager::{TaskHandle, TaskManager};
use crate::voice::Voice;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
#[derive(Debug, Default)]
struct LocaleIndex {
  locales: BTreeMap<String, Vec<String>>,
}
impl LocaleIndex {
  fn build<'a>(catalog: impl Iterator<Item = &'a VoiceInfo>) -> Self {
    let mut locales: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for info in catalog {
      let name = info.qualified_name();
      locales
        .entry(info.locale.clone())
        .or_default()
        .push(name.clone());
      if info.language != info.locale {
        locales.entry(info.language.clone()).or_default().push(name);
      }
    }
    LocaleIndex { locales }
  }
  fn candidates(&self, locale: &str) -> Option<&[String]> {
    self
      .locales
      .get(locale)
      .map(Vec::as_slice)
      .filter(|names| !names.is_empty())
  }
}
pub struct VoiceManager {
  catalog: Vec<VoiceInfo>,
  engines: HashMap<String, EngineMetadata>,
  tasks: Arc<TaskManager>,
  store: Arc<SharedSettings>,
  cache: Mutex<HashMap<String, Arc<Voice>>>,
  index: RwLock<LocaleIndex>,
  default: RwLock<String>,
}
impl VoiceManager {
  pub fn new(
    mut catalog: Vec<VoiceInfo>,
    engines: Vec<EngineMetadata>,
    tasks: Arc<TaskManager>,
    store: Arc<SharedSettings>,
  ) -> Result<Self, SpeechError> {
    catalog.retain(|info| engines.iter().any(|metadata| metadata.name == info.engine));
    if catalog.is_empty() {
      return Err(SpeechError::NoVoices);
    }
    catalog.sort_by(|a, b| {
      (&a.engine, &a.locale, &a.name).cmp(&(&b.engine, &b.locale, &b.name))
    });
    let (configured, language) = {
      let settings = store.read();
      (
        settings.default_voice.clone(),
        settings.auto_language.default_language.clone(),
      )
    };
    let configured = configured.filter(|name| {
      let available = catalog.iter().any(|info| info.qualified_name() == *name);
      if !available {
        warn!("Configured default voice {name} is not available");
      }
      available
    });
    let default = configured.unwrap_or_else(|| {
      let language = primary_subtag(&language);
      catalog
        .iter()
        .find(|info| info.language == language)
        .unwrap_or(&catalog[0])
        .qualified_name()
    });
    info!("Default voice is {default}");
    let manager = VoiceManager {
      catalog,
      engines: engines
        .into_iter()
        .map(|metadata| (metadata.name.clone(), metadata))
        .collect(),
      tasks,
      store,
      cache: Mutex::new(HashMap::new()),
      index: RwLock::new(LocaleIndex::default()),
      default: RwLock::new(default.clone()),
    };
    manager.rebuild_index();
    manager.voice_instance(&default);
    Ok(manager)
  }
  fn cache(&self) -> MutexGuard<'_, HashMap<String, Arc<Voice>>> {
    self.cache.lock().unwrap_or_else(PoisonError::into_inner)
  }
  fn find(&self, name: &str) -> Option<&VoiceInfo> {
    self.catalog.iter().find(|info| info.qualified_name() == name)
  }
  pub fn voices(&self) -> &[VoiceInfo] {
    &self.catalog
  }
  /// Every installed locale, normalized and deduplicated.
  pub fn languages(&self) -> Vec<String> {
    let mut languages = self
      .catalog
      .iter()
      .map(|info| info.locale.clone())
      .filter(|locale| !locale.is_empty())
      .collect::<Vec<String>>();
    languages.sort_unstable();
    languages.dedup();
    languages
  }
  pub fn default_voice_name(&self) -> String {
    self
      .default
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
  pub fn default_voice_instance(&self) -> Arc<Voice> {
    self.voice_instance(&self.default_voice_name())
  }
  /// Rebuilds the locale index from scratch. Readers see either the old or
  /// the new index, never a partial one.
  fn rebuild_index(&self) {
    let keep_engine = self.store.read().consistency.keep_main_locale_engine;
    let default = self.default_voice_name();
    let engine = self.find(&default).map(|info| info.engine.clone());
    let index = LocaleIndex::build(self.catalog.iter().filter(|info| {
      !keep_engine || engine.as_ref().map_or(true, |engine| info.engine == *engine)
    }));
    debug!("Indexed {} locales", index.locales.len());
    *self.index.write().unwrap_or_else(PoisonError::into_inner) = index;
  }
  fn pick(&self, candidates: &[String], default: &str) -> String {
    if candidates.iter().any(|name| name == default) {
      default.to_owned()
    } else {
      candidates[0].clone()
    }
  }
  /// Name of the voice that should speak `locale`. `None` and unknown
  /// locales resolve to the default voice.
  pub fn voice_for_locale(&self, locale: Option<&str>) -> String {
    let default = self.default_voice_name();
    let Some(locale) = locale.filter(|locale| !locale.is_empty()) else {
      return default;
    };
    let locale = normalize_locale(locale);
    let configured = self.store.read().locale_voices.get(&locale).cloned();
    if let Some(name) = configured {
      if self.find(&name).is_some() {
        return name;
      }
      debug!("Voice {name} configured for {locale} is not available");
    }
    let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
    if let Some(candidates) = index.candidates(&locale) {
      return self.pick(candidates, &default);
    }
    let language = primary_subtag(&locale);
    if language != locale {
      if let Some(candidates) = index.candidates(&language) {
        return self.pick(candidates, &default);
      }
    }
    debug!("No voice speaks {locale}, using {default}");
    default
  }
  /// The cached instance for `name`, created on first use. Unknown names
  /// resolve to the default voice.
  pub fn voice_instance(&self, name: &str) -> Arc<Voice> {
    let mut cache = self.cache();
    if let Some(voice) = cache.get(name) {
      return voice.clone();
    }
    let default = self.default_voice_name();
    let Some(info) = self.find(name).cloned() else {
      warn!("Voice {name} is not available, using {default}");
      drop(cache);
      return self.voice_instance(&default);
    };
    let Some(metadata) = self.engines.get(&info.engine).cloned() else {
      warn!("Engine {} of voice {name} is not running, using {default}", info.engine);
      drop(cache);
      return self.voice_instance(&default);
    };
    let inherited = if self.store.read().consistency.keep_main_locale_parameter {
      cache.get(&default).map(|voice| voice.settings())
    } else {
      None
    };
    debug!("Creating voice {name}");
    let voice = Arc::new(Voice::new(
      info,
      metadata,
      self.tasks.clone(),
      self.store.clone(),
      inherited,
    ));
    cache.insert(name.to_owned(), voice.clone());
    voice
  }
  pub fn instance_for_locale(&self, locale: Option<&str>) -> Arc<Voice> {
    self.voice_instance(&self.voice_for_locale(locale))
  }
  pub fn set_default_voice(&self, name: &str) -> Result<(), SpeechError> {
    let info = self
      .find(name)
      .cloned()
      .ok_or_else(|| SpeechError::into_voice_not_found(name))?;
    if !self.engines.contains_key(&info.engine) {
      return Err(SpeechError::into_engine_not_found(&info.engine));
    }
    *self.default.write().unwrap_or_else(PoisonError::into_inner) = name.to_owned();
    self.voice_instance(name);
    let consistency = self.store.update(|settings| {
      settings.default_voice = Some(name.to_owned());
      if settings.consistency.keep_main_locale_voice && !info.locale.is_empty() {
        settings
          .locale_voices
          .insert(info.locale.clone(), name.to_owned());
      }
      settings.consistency
    });
    info!("Default voice is now {name}");
    if consistency.keep_main_locale_engine {
      self.rebuild_index();
    }
    self.propagate_parameters();
    Ok(())
  }
  pub fn set_voice_for_locale(&self, locale: &str, name: &str) -> Result<(), SpeechError> {
    if self.find(name).is_none() {
      return Err(SpeechError::into_voice_not_found(name));
    }
    let locale = normalize_locale(locale);
    debug!("Voice for {locale} is now {name}");
    self.store.update(|settings| {
      settings.locale_voices.insert(locale, name.to_owned());
    });
    Ok(())
  }
  pub fn set_keep_engine_consistent(&self, enabled: bool) {
    self.store.update(|settings| {
      settings.consistency.keep_main_locale_engine = enabled;
    });
    self.rebuild_index();
  }
  pub fn set_keep_main_locale_voice_consistent(&self, enabled: bool) {
    let default = self.default_voice_name();
    let locale = self.find(&default).map(|info| info.locale.clone());
    self.store.update(|settings| {
      settings.consistency.keep_main_locale_voice = enabled;
      if let Some(locale) = locale.filter(|locale| enabled && !locale.is_empty()) {
        settings.locale_voices.insert(locale, default);
      }
    });
  }
  pub fn set_keep_parameter_consistent(&self, enabled: bool) {
    self.store.update(|settings| {
      settings.consistency.keep_main_locale_parameter = enabled;
    });
    self.propagate_parameters();
  }
  /// Copies the default voice's prosody to every other cached voice when
  /// parameter consistency is on. Returns how many voices were updated.
  pub fn propagate_parameters(&self) -> usize {
    if !self.store.read().consistency.keep_main_locale_parameter {
      return 0;
    }
    let default = self.default_voice_name();
    let voices = self.cache().values().cloned().collect::<Vec<Arc<Voice>>>();
    let Some(source) = voices.iter().find(|voice| voice.name() == default) else {
      return 0;
    };
    let settings = source.settings();
    let mut updated = 0;
    for voice in voices.iter().filter(|voice| voice.name() != default) {
      voice.apply_prosody(&settings);
      updated += 1;
    }
    debug!("Propagated parameters of {default} to {updated} voices");
    updated
  }
  fn instances(&self) -> Vec<Arc<Voice>> {
    self.cache().values().cloned().collect()
  }
  pub fn commit_all(&self) {
    for voice in self.instances() {
      voice.commit();
    }
  }
  pub fn rollback_all(&self) {
    for voice in self.instances() {
      voice.rollback();
    }
  }
  /// Closes every cached voice. The returned handles complete once the
  /// engines have processed the close.
  pub fn close(&self) -> Vec<TaskHandle> {
    self.instances().iter().map(|voice| voice.close()).collect()
  }
}
