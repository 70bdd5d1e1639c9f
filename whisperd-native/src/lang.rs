//! Language map
//!
//! The native side identifies languages by their ISO code packed into a
//! signed 32-bit integer, one ASCII byte per octet starting from the lowest
//! ("en" becomes 0x6E65). The name-to-code table ships as an embedded JSON
//! document; unknown names fall back to English rather than failing, so a
//! bad `language` request degrades instead of erroring.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use tracing::warn;

/// Packed code for English, the documented fallback.
pub const ENGLISH: i32 = 0x6E65;

static LANGUAGES: OnceCell<HashMap<String, i32>> = OnceCell::new();

fn map() -> &'static HashMap<String, i32> {
    LANGUAGES.get_or_init(|| {
        let raw: HashMap<String, String> = serde_json::from_str(include_str!("languages.json"))
            .expect("embedded language map is valid JSON");
        raw.into_iter()
            .filter_map(|(name, hex)| {
                let code = i64::from_str_radix(hex.trim_start_matches("0x"), 16).ok()?;
                Some((name, code as i32))
            })
            .collect()
    })
}

/// Resolve a language name (case-insensitive) to its packed code.
///
/// Unmapped names resolve to [`ENGLISH`]; this never fails.
pub fn resolve(name: &str) -> i32 {
    let key = name.trim().to_lowercase();
    match map().get(&key) {
        Some(code) => *code,
        None => {
            warn!(language = %name, "unknown language, defaulting to english");
            ENGLISH
        }
    }
}

/// Whether a language name is present in the map.
pub fn is_supported(name: &str) -> bool {
    map().contains_key(&name.trim().to_lowercase())
}
