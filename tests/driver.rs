use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use worldvoice_rs::backends::loopback::{Acknowledge, EngineCall, LoopbackEngine, LoopbackHandle};
use worldvoice_rs::backends::{Engine, EngineFamily, Utterance};
use worldvoice_rs::config::{ConfigStore, DetectionTiming, JsonConfigStore, MemoryConfigStore, Settings};
use worldvoice_rs::pipeline::Stage;
use worldvoice_rs::symbols::SpeechSymbols;
use worldvoice_rs::speech::Prosody;
use worldvoice_rs::{SpeechCommand, SpeechError, SpeechSequence, SynthDriver, SynthEvent};
fn init_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}
fn start(engines: Vec<Box<dyn Engine>>, store: Box<dyn ConfigStore>) -> (SynthDriver, Receiver<SynthEvent>) {
  init_logger();
  let (events_tx, events_rx) = mpsc::channel();
  let driver = SynthDriver::new(engines, store, Arc::new(SpeechSymbols::new()), events_tx).unwrap();
  (driver, events_rx)
}
fn memory() -> Box<dyn ConfigStore> {
  Box::new(MemoryConfigStore::new(Settings::default()))
}
fn eventually(condition: impl Fn() -> bool) {
  let deadline = Instant::now() + Duration::from_secs(5);
  while !condition() {
    assert!(Instant::now() < deadline, "condition never became true");
    thread::sleep(Duration::from_millis(2));
  }
}
fn single(name: &str, family: EngineFamily, voice: &str, locale: &str, acknowledge: Acknowledge) -> (LoopbackEngine, LoopbackHandle) {
  let engine = LoopbackEngine::new(name, family, &[(voice, locale)]).with_acknowledge(acknowledge);
  let handle = engine.handle();
  (engine, handle)
}
#[test]
fn mixed_language_text_is_routed_per_voice() {
  let (english, sapi) = single("SAPI5", EngineFamily::Sapi, "Zira", "en_US", Acknowledge::Immediately);
  let (chinese, vocalizer) = single(
    "Vocalizer",
    EngineFamily::Vocalizer,
    "Tian-Tian",
    "zh_CN",
    Acknowledge::Immediately,
  );
  let (driver, events) = start(vec![Box::new(english), Box::new(chinese)], memory());
  assert_eq!(driver.voice(), "SAPI5:Zira");
  driver.speak(vec![SpeechCommand::text("hello 你好"), SpeechCommand::Index(1)]);
  let mut received = Vec::new();
  while !(received.contains(&SynthEvent::IndexReached(1))
    && received.last() == Some(&SynthEvent::DoneSpeaking))
  {
    received.push(events.recv_timeout(Duration::from_secs(5)).unwrap());
  }
  assert_eq!(
    sapi.spoken(),
    vec![("Zira".to_owned(), Utterance::Markup("hello ".to_owned()))]
  );
  assert_eq!(
    vocalizer.spoken(),
    vec![(
      "Tian-Tian".to_owned(),
      Utterance::Markup("你好\x1b\\mrk=1\\".to_owned())
    )]
  );
}
#[test]
fn cancel_silences_voice_and_drops_queue() {
  let (engine, loopback) = single("Loop", EngineFamily::Plain, "Anna", "en_US", Acknowledge::OnDemand);
  let (driver, _events) = start(vec![Box::new(engine)], memory());
  driver.speak(vec![
    SpeechCommand::text("one"),
    SpeechCommand::Split,
    SpeechCommand::text("two"),
    SpeechCommand::Split,
    SpeechCommand::text("three"),
  ]);
  eventually(|| loopback.pending() == 1);
  driver.cancel();
  eventually(|| loopback.calls().contains(&EngineCall::Stop("Anna".to_owned())));
  thread::sleep(Duration::from_millis(50));
  assert_eq!(loopback.spoken().len(), 1);
  driver.speak(vec![SpeechCommand::text("four")]);
  eventually(|| loopback.spoken().len() == 2);
  assert_eq!(
    loopback.spoken()[1],
    (
      "Anna".to_owned(),
      Utterance::Sequence(vec![SpeechCommand::text("four")])
    )
  );
  loopback.complete_all();
}
#[test]
fn spelling_switches_voice_per_language_run() {
  let (english, first) = single("Plain", EngineFamily::Plain, "Anna", "en_US", Acknowledge::Immediately);
  let (chinese, second) = single("Other", EngineFamily::Plain, "Li", "zh_CN", Acknowledge::Immediately);
  let (driver, _events) = start(vec![Box::new(english), Box::new(chinese)], memory());
  assert_eq!(driver.voice(), "Plain:Anna");
  driver.speak_spelling("a中");
  eventually(|| second.spoken().len() == 1);
  let spelled = |text: &str| {
    Utterance::Sequence(vec![
      SpeechCommand::CharacterMode(true),
      SpeechCommand::text(text),
      SpeechCommand::CharacterMode(false),
    ])
  };
  assert_eq!(first.spoken(), vec![("Anna".to_owned(), spelled("a"))]);
  assert_eq!(second.spoken(), vec![("Li".to_owned(), spelled("中"))]);
}
#[test]
fn unavailable_engines_are_skipped() {
  let (working, _loopback) = single("Loop", EngineFamily::Plain, "Anna", "en_US", Acknowledge::Immediately);
  let broken = LoopbackEngine::new("ECI", EngineFamily::Plain, &[("Reed", "en_US")]).unavailable();
  let (driver, _events) = start(vec![Box::new(working), Box::new(broken)], memory());
  let names = driver
    .voices()
    .iter()
    .map(|info| info.qualified_name())
    .collect::<Vec<String>>();
  assert_eq!(names, vec!["Loop:Anna".to_owned()]);
  init_logger();
  let (events_tx, _events_rx) = mpsc::channel();
  let only_broken = LoopbackEngine::new("ECI", EngineFamily::Plain, &[("Reed", "en_US")]).unavailable();
  let result = SynthDriver::new(
    vec![Box::new(only_broken)],
    memory(),
    Arc::new(SpeechSymbols::new()),
    events_tx,
  );
  assert!(matches!(result, Err(SpeechError::NoVoices)));
}
#[test]
fn commit_persists_and_rollback_restores() {
  let directory = tempfile::tempdir().unwrap();
  let path = directory.path().join("worldvoice.json");
  let (engine, _loopback) = single("Loop", EngineFamily::Plain, "Anna", "en_US", Acknowledge::Immediately);
  let (driver, _events) = start(vec![Box::new(engine)], Box::new(JsonConfigStore::new(&path)));
  driver.set_rate(80).unwrap();
  driver.commit().unwrap();
  let saved = JsonConfigStore::new(&path).load().unwrap();
  assert_eq!(saved.voices["Loop:Anna"].rate, 80);
  driver.set_rate(20).unwrap();
  assert_eq!(driver.rate(), 20);
  driver.rollback().unwrap();
  assert_eq!(driver.rate(), 80);
  assert!(matches!(driver.set_volume(120), Err(SpeechError::InvalidVolume(120))));
}
#[test]
fn applied_settings_rebuild_stages() {
  let (engine, loopback) = single("Loop", EngineFamily::Plain, "Li", "zh_CN", Acknowledge::Immediately);
  let (driver, _events) = start(vec![Box::new(engine)], memory());
  driver.apply_settings(|settings| {
    settings.speech.chinese_space_wait_factor = 2;
    settings.auto_language.default_language = "zh".to_owned();
  });
  let names = driver.pipeline().names();
  assert!(names.contains(&"chinese-space-pause".to_owned()));
  assert_eq!(names.last().map(String::as_str), Some("trace"));
  driver.speak(vec![SpeechCommand::text("你好 世界")]);
  eventually(|| loopback.spoken().len() == 1);
  let (_, utterance) = loopback.spoken().remove(0);
  let Utterance::Sequence(commands) = utterance else {
    panic!("expected a command sequence");
  };
  assert!(commands.contains(&SpeechCommand::Break(100)));
}
struct Shout;
impl Stage for Shout {
  fn name(&self) -> &str {
    "shout"
  }
  fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
    sequence
      .into_iter()
      .map(|command| match command {
        SpeechCommand::Text(text) => SpeechCommand::Text(text.to_uppercase()),
        command => command,
      })
      .collect()
  }
}
#[test]
fn host_stages_run_and_survive_reconfiguration() {
  let (engine, loopback) = single("Loop", EngineFamily::Plain, "Anna", "en_US", Acknowledge::Immediately);
  let (driver, _events) = start(vec![Box::new(engine)], memory());
  assert!(driver.register_stage(Arc::new(Shout)));
  driver.apply_settings(|settings| settings.speech.item_wait_factor = 1);
  driver.speak(vec![SpeechCommand::text("quiet")]);
  eventually(|| loopback.spoken().len() == 1);
  assert_eq!(
    loopback.spoken()[0].1,
    Utterance::Sequence(vec![SpeechCommand::text("QUIET")])
  );
}
#[test]
fn pause_and_resume_reach_the_speaking_voice() {
  let (engine, loopback) = single("Loop", EngineFamily::Plain, "Anna", "en_US", Acknowledge::OnDemand);
  let (driver, _events) = start(vec![Box::new(engine)], memory());
  driver.speak(vec![SpeechCommand::text("long sentence")]);
  eventually(|| loopback.pending() == 1);
  driver.pause(true);
  eventually(|| {
    loopback.calls().contains(&EngineCall::Pause {
      voice: "Anna".to_owned(),
      switch: true,
    })
  });
  driver.resume();
  eventually(|| loopback.calls().contains(&EngineCall::Resume("Anna".to_owned())));
  loopback.complete_all();
}
#[test]
fn terminate_closes_voices_and_switches_engines_off() {
  let (engine, loopback) = single("Loop", EngineFamily::Plain, "Anna", "en_US", Acknowledge::Immediately);
  let (driver, _events) = start(vec![Box::new(engine)], memory());
  driver.terminate();
  let calls = loopback.calls();
  assert!(calls.contains(&EngineCall::Close("Anna".to_owned())));
  assert_eq!(calls.last(), Some(&EngineCall::Off));
}
#[test]
fn default_voice_language_drives_detection() {
  let (english, sapi) = single("SAPI5", EngineFamily::Sapi, "Zira", "en_US", Acknowledge::Immediately);
  let (chinese, vocalizer) = single(
    "Vocalizer",
    EngineFamily::Vocalizer,
    "Tian-Tian",
    "zh_CN",
    Acknowledge::Immediately,
  );
  let (driver, _events) = start(vec![Box::new(english), Box::new(chinese)], memory());
  driver.set_voice("Vocalizer:Tian-Tian").unwrap();
  assert_eq!(driver.voice(), "Vocalizer:Tian-Tian");
  driver.speak(vec![SpeechCommand::text("hello 你好"), SpeechCommand::Index(1)]);
  eventually(|| sapi.spoken().len() == 1 && vocalizer.spoken().len() == 1);
  assert_eq!(
    sapi.spoken(),
    vec![("Zira".to_owned(), Utterance::Markup("hello ".to_owned()))]
  );
  assert_eq!(
    vocalizer.spoken(),
    vec![(
      "Tian-Tian".to_owned(),
      Utterance::Markup("你好\x1b\\mrk=1\\".to_owned())
    )]
  );
}
#[test]
fn prosody_overrides_carry_across_splits() {
  let (engine, sapi) = single("SAPI5", EngineFamily::Sapi, "Zira", "en_US", Acknowledge::Immediately);
  let (driver, _events) = start(vec![Box::new(engine)], memory());
  driver.speak(vec![
    SpeechCommand::Pitch(Prosody::Absolute(100)),
    SpeechCommand::text("one"),
    SpeechCommand::Split,
    SpeechCommand::text("two"),
  ]);
  eventually(|| sapi.spoken().len() == 2);
  let chunks = sapi
    .spoken()
    .into_iter()
    .map(|(_, utterance)| utterance)
    .collect::<Vec<Utterance>>();
  assert_eq!(
    chunks,
    vec![
      Utterance::Markup("<pitch absmiddle=\"10\">one</pitch>".to_owned()),
      Utterance::Markup("<pitch absmiddle=\"10\">two</pitch>".to_owned()),
    ]
  );
}
#[test]
fn prosody_offsets_follow_the_next_voice() {
  let (english, first) = single("Plain", EngineFamily::Plain, "Anna", "en_US", Acknowledge::Immediately);
  let (chinese, second) = single("Other", EngineFamily::Plain, "Li", "zh_CN", Acknowledge::Immediately);
  let (driver, _events) = start(vec![Box::new(english), Box::new(chinese)], memory());
  driver.voice_manager().voice_instance("Other:Li").set_rate(70).unwrap();
  driver.speak(vec![
    SpeechCommand::Rate(Prosody::Offset(10)),
    SpeechCommand::text("hello 你好"),
  ]);
  eventually(|| second.spoken().len() == 1);
  assert_eq!(
    first.spoken(),
    vec![(
      "Anna".to_owned(),
      Utterance::Sequence(vec![
        SpeechCommand::Rate(Prosody::Absolute(60)),
        SpeechCommand::text("hello "),
      ])
    )]
  );
  assert_eq!(
    second.spoken(),
    vec![(
      "Li".to_owned(),
      Utterance::Sequence(vec![
        SpeechCommand::Rate(Prosody::Absolute(80)),
        SpeechCommand::text("你好"),
      ])
    )]
  );
}
#[test]
fn default_language_is_restored_without_chinese_pause() {
  let (english, first) = single("Plain", EngineFamily::Plain, "Anna", "en_US", Acknowledge::Immediately);
  let (chinese, second) = single("Other", EngineFamily::Plain, "Li", "zh_CN", Acknowledge::Immediately);
  let (driver, _events) = start(vec![Box::new(english), Box::new(chinese)], memory());
  driver.apply_settings(|settings| settings.speech.chinese_space_wait_factor = 2);
  driver.speak(vec![
    SpeechCommand::text("hello "),
    SpeechCommand::LangChange(None),
    SpeechCommand::text("北京 "),
    SpeechCommand::text("world"),
  ]);
  eventually(|| first.spoken().len() == 2);
  let plain = |text: &str| Utterance::Sequence(vec![SpeechCommand::text(text)]);
  assert_eq!(
    first.spoken(),
    vec![
      ("Anna".to_owned(), plain("hello ")),
      ("Anna".to_owned(), plain("world")),
    ]
  );
  assert_eq!(second.spoken(), vec![("Li".to_owned(), plain("北京 "))]);
}
struct Recorder {
  seen: Arc<Mutex<Vec<SpeechSequence>>>,
}
impl Stage for Recorder {
  fn name(&self) -> &str {
    "recorder"
  }
  fn apply(&self, sequence: SpeechSequence) -> SpeechSequence {
    self.seen.lock().unwrap().push(sequence.clone());
    sequence
  }
}
#[test]
fn detection_before_stages_shows_them_language_changes() {
  let (english, _first) = single("Plain", EngineFamily::Plain, "Anna", "en_US", Acknowledge::Immediately);
  let (chinese, second) = single("Other", EngineFamily::Plain, "Li", "zh_CN", Acknowledge::Immediately);
  let (driver, _events) = start(vec![Box::new(english), Box::new(chinese)], memory());
  let seen = Arc::new(Mutex::new(Vec::new()));
  assert!(driver.register_stage(Arc::new(Recorder { seen: seen.clone() })));
  let has_change = |sequence: &SpeechSequence| sequence.contains(&SpeechCommand::lang("zh"));
  driver.speak(vec![SpeechCommand::text("hello 你好")]);
  eventually(|| second.spoken().len() == 1);
  assert!(!has_change(&seen.lock().unwrap()[0]));
  driver.apply_settings(|settings| settings.auto_language.timing = DetectionTiming::Before);
  driver.speak(vec![SpeechCommand::text("hello 你好")]);
  eventually(|| second.spoken().len() == 2);
  assert!(has_change(&seen.lock().unwrap()[1]));
  assert_eq!(
    second.spoken()[1],
    (
      "Li".to_owned(),
      Utterance::Sequence(vec![SpeechCommand::text("你好")])
    )
  );
}
#[test]
fn speech_without_content_still_reports_done() {
  let (engine, loopback) = single("Loop", EngineFamily::Plain, "Anna", "en_US", Acknowledge::Immediately);
  let (driver, events) = start(vec![Box::new(engine)], memory());
  driver.speak(Vec::new());
  assert_eq!(
    events.recv_timeout(Duration::from_secs(5)).unwrap(),
    SynthEvent::DoneSpeaking
  );
  driver.speak(vec![SpeechCommand::Volume(Prosody::Absolute(20))]);
  assert_eq!(
    events.recv_timeout(Duration::from_secs(5)).unwrap(),
    SynthEvent::DoneSpeaking
  );
  assert!(loopback.spoken().is_empty());
}
