use crate::speech::primary_subtag;
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
pub const UNKNOWN_BLOCK: &str = "Unknown";
const BUCKET_SHIFT: u32 = 4;
const BLOCKS: &[(u32, u32, &str)] = &[
  (0x0000, 0x007F, "Basic Latin"),
  (0x0080, 0x00FF, "Latin-1 Supplement"),
  (0x0100, 0x017F, "Latin Extended-A"),
  (0x0180, 0x024F, "Latin Extended-B"),
  (0x0250, 0x02AF, "IPA Extensions"),
  (0x02B0, 0x02FF, "Spacing Modifier Letters"),
  (0x0300, 0x036F, "Combining Diacritical Marks"),
  (0x0370, 0x03FF, "Greek and Coptic"),
  (0x0400, 0x04FF, "Cyrillic"),
  (0x0500, 0x052F, "Cyrillic Supplement"),
  (0x0530, 0x058F, "Armenian"),
  (0x0590, 0x05FF, "Hebrew"),
  (0x0600, 0x06FF, "Arabic"),
  (0x0700, 0x074F, "Syriac"),
  (0x0750, 0x077F, "Arabic Supplement"),
  (0x0780, 0x07BF, "Thaana"),
  (0x0900, 0x097F, "Devanagari"),
  (0x0980, 0x09FF, "Bengali"),
  (0x0A00, 0x0A7F, "Gurmukhi"),
  (0x0A80, 0x0AFF, "Gujarati"),
  (0x0B00, 0x0B7F, "Oriya"),
  (0x0B80, 0x0BFF, "Tamil"),
  (0x0C00, 0x0C7F, "Telugu"),
  (0x0C80, 0x0CFF, "Kannada"),
  (0x0D00, 0x0D7F, "Malayalam"),
  (0x0D80, 0x0DFF, "Sinhala"),
  (0x0E00, 0x0E7F, "Thai"),
  (0x0E80, 0x0EFF, "Lao"),
  (0x0F00, 0x0FFF, "Tibetan"),
  (0x1000, 0x109F, "Myanmar"),
  (0x10A0, 0x10FF, "Georgian"),
  (0x1100, 0x11FF, "Hangul Jamo"),
  (0x1200, 0x137F, "Ethiopic"),
  (0x13A0, 0x13FF, "Cherokee"),
  (0x1780, 0x17FF, "Khmer"),
  (0x1800, 0x18AF, "Mongolian"),
  (0x1E00, 0x1EFF, "Latin Extended Additional"),
  (0x1F00, 0x1FFF, "Greek Extended"),
  (0x2000, 0x206F, "General Punctuation"),
  (0x2070, 0x209F, "Superscripts and Subscripts"),
  (0x20A0, 0x20CF, "Currency Symbols"),
  (0x2100, 0x214F, "Letterlike Symbols"),
  (0x2150, 0x218F, "Number Forms"),
  (0x2190, 0x21FF, "Arrows"),
  (0x2200, 0x22FF, "Mathematical Operators"),
  (0x2460, 0x24FF, "Enclosed Alphanumerics"),
  (0x2500, 0x257F, "Box Drawing"),
  (0x25A0, 0x25FF, "Geometric Shapes"),
  (0x2600, 0x26FF, "Miscellaneous Symbols"),
  (0x2E80, 0x2EFF, "CJK Radicals Supplement"),
  (0x2F00, 0x2FDF, "Kangxi Radicals"),
  (0x3000, 0x303F, "CJK Symbols and Punctuation"),
  (0x3040, 0x309F, "Hiragana"),
  (0x30A0, 0x30FF, "Katakana"),
  (0x3100, 0x312F, "Bopomofo"),
  (0x3130, 0x318F, "Hangul Compatibility Jamo"),
  (0x31A0, 0x31BF, "Bopomofo Extended"),
  (0x31F0, 0x31FF, "Katakana Phonetic Extensions"),
  (0x3400, 0x4DBF, "CJK Unified Ideographs Extension A"),
  (0x4E00, 0x9FFF, "CJK Unified Ideographs"),
  (0xA000, 0xA48F, "Yi Syllables"),
  (0xAC00, 0xD7AF, "Hangul Syllables"),
  (0xF900, 0xFAFF, "CJK Compatibility Ideographs"),
  (0xFB50, 0xFDFF, "Arabic Presentation Forms-A"),
  (0xFE30, 0xFE4F, "CJK Compatibility Forms"),
  (0xFE70, 0xFEFF, "Arabic Presentation Forms-B"),
  (0xFF00, 0xFFEF, "Halfwidth and Fullwidth Forms"),
  (0x1F300, 0x1F5FF, "Miscellaneous Symbols and Pictographs"),
  (0x1F600, 0x1F64F, "Emoticons"),
  (0x20000, 0x2A6DF, "CJK Unified Ideographs Extension B"),
];
const LATIN: &[&str] = &["Basic Latin", "Latin-1 Supplement"];
const EXTENDED_LATIN: &[&str] = &[
  "Latin Extended-A",
  "Latin Extended-B",
  "Latin Extended Additional",
  "IPA Extensions",
];
const CYRILLIC: &[&str] = &["Cyrillic", "Cyrillic Supplement"];
const ARABIC: &[&str] = &[
  "Arabic",
  "Arabic Supplement",
  "Arabic Presentation Forms-A",
  "Arabic Presentation Forms-B",
];
const HAN: &[&str] = &[
  "CJK Unified Ideographs",
  "CJK Unified Ideographs Extension A",
  "CJK Unified Ideographs Extension B",
  "CJK Compatibility Ideographs",
  "CJK Radicals Supplement",
  "Kangxi Radicals",
];
const CJK_SHARED: &[&str] = &[
  "CJK Symbols and Punctuation",
  "CJK Compatibility Forms",
  "Halfwidth and Fullwidth Forms",
];
const CHINESE: &[&str] = &["Bopomofo", "Bopomofo Extended"];
const JAPANESE: &[&str] = &["Hiragana", "Katakana", "Katakana Phonetic Extensions"];
const KOREAN: &[&str] = &["Hangul Syllables", "Hangul Jamo", "Hangul Compatibility Jamo"];
const LATIN_LANGUAGES: &[&str] = &[
  "en", "fr", "de", "es", "it", "pt", "nl", "sv", "da", "nb", "no", "fi", "pl", "cs", "sk", "hu",
  "ro", "tr", "vi", "id", "ms", "ca", "hr", "sl", "et", "lv", "lt", "is", "ga", "cy", "eu", "gl",
  "af", "sw", "sq", "tl",
];
const CYRILLIC_LANGUAGES: &[&str] = &["ru", "uk", "bg", "sr", "be", "mk", "kk", "ky"];
const ARABIC_LANGUAGES: &[&str] = &["ar", "fa", "ur", "ps"];
const SINGLETON_LANGUAGES: &[(&str, &[&str])] = &[
  ("el", &["Greek and Coptic", "Greek Extended"]),
  ("he", &["Hebrew"]),
  ("hy", &["Armenian"]),
  ("ka", &["Georgian"]),
  ("th", &["Thai"]),
  ("lo", &["Lao"]),
  ("bo", &["Tibetan"]),
  ("my", &["Myanmar"]),
  ("km", &["Khmer"]),
  ("hi", &["Devanagari"]),
  ("mr", &["Devanagari"]),
  ("ne", &["Devanagari"]),
  ("bn", &["Bengali"]),
  ("pa", &["Gurmukhi"]),
  ("gu", &["Gujarati"]),
  ("or", &["Oriya"]),
  ("ta", &["Tamil"]),
  ("te", &["Telugu"]),
  ("kn", &["Kannada"]),
  ("ml", &["Malayalam"]),
  ("si", &["Sinhala"]),
  ("am", &["Ethiopic"]),
  ("chr", &["Cherokee"]),
  ("mn", &["Mongolian", "Cyrillic"]),
  ("syr", &["Syriac"]),
  ("dv", &["Thaana"]),
  ("ii", &["Yi Syllables"]),
];
lazy_static! {
  static ref BUCKETS: Vec<u8> = {
    let last = BLOCKS.last().map_or(0, |block| block.1);
    let mut buckets = vec![0u8; ((last >> BUCKET_SHIFT) + 1) as usize];
    for (index, (start, end, _)) in BLOCKS.iter().enumerate() {
      for bucket in (start >> BUCKET_SHIFT)..=(end >> BUCKET_SHIFT) {
        buckets[bucket as usize] = u8::try_from(index + 1).unwrap_or(0);
      }
    }
    buckets
  };
  static ref LANGUAGE_BLOCKS: Vec<(&'static str, Vec<&'static str>)> = {
    let mut table: Vec<(&'static str, Vec<&'static str>)> = Vec::new();
    for language in LATIN_LANGUAGES {
      table.push((*language, LATIN.iter().chain(EXTENDED_LATIN).copied().collect()));
    }
    for language in CYRILLIC_LANGUAGES {
      table.push((*language, CYRILLIC.to_vec()));
    }
    for language in ARABIC_LANGUAGES {
      table.push((*language, ARABIC.to_vec()));
    }
    table.push(("zh", HAN.iter().chain(CJK_SHARED).chain(CHINESE).copied().collect()));
    table.push(("ja", JAPANESE.iter().chain(HAN).chain(CJK_SHARED).copied().collect()));
    table.push(("ko", KOREAN.iter().chain(CJK_SHARED).copied().collect()));
    for (language, blocks) in SINGLETON_LANGUAGES {
      table.push((*language, blocks.to_vec()));
    }
    table
  };
}
pub fn block_of(character: char) -> &'static str {
  let bucket = (character as u32 >> BUCKET_SHIFT) as usize;
  match BUCKETS.get(bucket) {
    Some(&index) if index > 0 => BLOCKS[usize::from(index) - 1].2,
    _ => UNKNOWN_BLOCK,
  }
}
pub fn is_latin(block: &str) -> bool {
  LATIN.contains(&block) || EXTENDED_LATIN.contains(&block)
}
pub fn is_cjk(block: &str) -> bool {
  HAN.contains(&block) || CJK_SHARED.contains(&block)
}
pub fn is_ideograph(character: char) -> bool {
  HAN.contains(&block_of(character))
}
#[derive(Debug, Default)]
pub struct BlockRegistry {
  languages_by_block: HashMap<&'static str, Vec<String>>,
  blocks_by_language: HashMap<String, HashSet<&'static str>>,
}
impl BlockRegistry {
  pub fn new<I, S>(installed: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let installed = installed
      .into_iter()
      .map(|locale| primary_subtag(locale.as_ref()))
      .collect::<HashSet<String>>();
    let mut registry = BlockRegistry::default();
    for (language, blocks) in LANGUAGE_BLOCKS.iter() {
      if !installed.contains(*language) {
        continue;
      }
      for block in blocks {
        registry
          .languages_by_block
          .entry(*block)
          .or_default()
          .push((*language).to_owned());
      }
      registry
        .blocks_by_language
        .insert((*language).to_owned(), blocks.iter().copied().collect());
    }
    log::debug!(
      "Block registry built for {} of {} installed languages",
      registry.blocks_by_language.len(),
      installed.len()
    );
    registry
  }
  pub fn languages_for(&self, block: &str) -> &[String] {
    self
      .languages_by_block
      .get(block)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }
  pub fn supports(&self, language: &str, block: &str) -> bool {
    self
      .blocks_by_language
      .get(&primary_subtag(language))
      .is_some_and(|blocks| blocks.contains(block))
  }
  pub fn contains_language(&self, language: &str) -> bool {
    self.blocks_by_language.contains_key(&primary_subtag(language))
  }
  pub fn languages(&self) -> Vec<&str> {
    let mut languages = self
      .blocks_by_language
      .keys()
      .map(String::as_str)
      .collect::<Vec<&str>>();
    languages.sort_unstable();
    languages
  }
}
#[cfg(test)]
mod tests {
  use super::*;
  #[test]
  fn classifies_common_scripts() {
    assert_eq!(block_of('a'), "Basic Latin");
    assert_eq!(block_of('é'), "Latin-1 Supplement");
    assert_eq!(block_of('ł'), "Latin Extended-A");
    assert_eq!(block_of('Ж'), "Cyrillic");
    assert_eq!(block_of('北'), "CJK Unified Ideographs");
    assert_eq!(block_of('か'), "Hiragana");
    assert_eq!(block_of('한'), "Hangul Syllables");
    assert_eq!(block_of('ع'), "Arabic");
    assert_eq!(block_of('，'), "Halfwidth and Fullwidth Forms");
  }
  #[test]
  fn unmapped_code_points_are_unknown() {
    assert_eq!(block_of('\u{0800}'), UNKNOWN_BLOCK);
    assert_eq!(block_of('\u{E000}'), UNKNOWN_BLOCK);
    assert_eq!(block_of('\u{10FFFD}'), UNKNOWN_BLOCK);
  }
  #[test]
  fn block_table_is_sorted_and_aligned() {
    for window in BLOCKS.windows(2) {
      assert!(window[0].1 < window[1].0);
    }
    for (start, end, name) in BLOCKS {
      assert_eq!(start % 16, 0, "{name}");
      assert_eq!((end + 1) % 16, 0, "{name}");
    }
  }
  #[test]
  fn registry_only_contains_installed_languages() {
    let registry = BlockRegistry::new(["en_US", "zh_TW", "xx_YY"]);
    assert_eq!(registry.languages(), vec!["en", "zh"]);
    assert_eq!(registry.languages_for("CJK Unified Ideographs"), ["zh"]);
    assert_eq!(registry.languages_for("Basic Latin"), ["en"]);
    assert!(registry.languages_for("Cyrillic").is_empty());
    assert!(registry.supports("en_GB", "Latin Extended-A"));
    assert!(!registry.supports("zh", "Basic Latin"));
    assert!(!registry.contains_language("xx"));
  }
  #[test]
  fn shared_blocks_list_candidates_in_table_order() {
    let registry = BlockRegistry::new(["ko", "ja", "zh"]);
    assert_eq!(
      registry.languages_for("CJK Symbols and Punctuation"),
      ["zh", "ja", "ko"]
    );
    assert_eq!(registry.languages_for("CJK Unified Ideographs"), ["zh", "ja"]);
  }
}
