use log::info;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use worldvoice_rs::backends::loopback::LoopbackEngine;
use worldvoice_rs::backends::{Engine, EngineFamily};
use worldvoice_rs::config::{ConfigStore, JsonConfigStore, MemoryConfigStore};
use worldvoice_rs::symbols::SpeechSymbols;
use worldvoice_rs::{SpeechCommand, SynthDriver, SynthEvent};
fn main() -> anyhow::Result<()> {
  env_logger::init();
  let store: Box<dyn ConfigStore> = match std::env::args().nth(1) {
    Some(path) => Box::new(JsonConfigStore::new(Path::new(&path))),
    None => Box::new(MemoryConfigStore::default()),
  };
  let english = LoopbackEngine::new("SAPI5", EngineFamily::Sapi, &[("Zira", "en_US")]);
  let chinese = LoopbackEngine::new("Vocalizer", EngineFamily::Vocalizer, &[("Tian-Tian", "zh_CN")]);
  let handles = [english.handle(), chinese.handle()];
  let engines: Vec<Box<dyn Engine>> = vec![Box::new(english), Box::new(chinese)];
  let symbols = match std::env::args().nth(2) {
    Some(path) => SpeechSymbols::load(Path::new(&path))?,
    None => SpeechSymbols::new(),
  };
  let (events_tx, events_rx) = mpsc::channel();
  let driver = SynthDriver::new(engines, store, Arc::new(symbols), events_tx)?;
  driver.speak(vec![
    SpeechCommand::text("The word for hello is 你好, said twice: 你好 你好."),
    SpeechCommand::Index(1),
  ]);
  while let Ok(event) = events_rx.recv_timeout(Duration::from_secs(1)) {
    info!("{event:?}");
    if event == SynthEvent::DoneSpeaking {
      break;
    }
  }
  for handle in &handles {
    for (voice, utterance) in handle.spoken() {
      println!("{voice}: {utterance:?}");
    }
  }
  driver.terminate();
  Ok(())
}
