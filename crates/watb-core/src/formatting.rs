//! User-visible chat replies.

use crate::langs::{self, LangCode};
use crate::translate::Translation;

pub const USAGE_TRANSLATE: &str = "Usage: !translate <text> [target-lang]";
pub const USAGE_SETLANG: &str = "Usage: !setlang <lang-code>";
pub const EMPTY_QUOTE: &str = "The quoted message has no text to translate.";

/// Registry display name, falling back to the raw code for values that are
/// not registered (a provider-detected source can be any language).
pub fn display_name(code: &LangCode) -> String {
    match langs::resolve(code) {
        Some(name) => name.to_string(),
        None => code.as_str().to_string(),
    }
}

/// Chat reply for a translation outcome.
pub fn translation_reply(original: &str, outcome: &Translation, show_original: bool) -> String {
    if let Some(err) = &outcome.error {
        return format!("❌ Translation error: {err}");
    }

    let target_name = display_name(&outcome.target);
    if !outcome.translated {
        return format!("ℹ️ Message is already in {target_name}");
    }

    let source_name = match &outcome.source {
        Some(code) => display_name(code),
        None => "unknown".to_string(),
    };

    if show_original {
        format!(
            "🔄 *{source_name} → {target_name}*\n\n*Original:* {original}\n\n*Translation:* {}",
            outcome.text
        )
    } else {
        format!("🔄 *{source_name} → {target_name}*\n\n{}", outcome.text)
    }
}

pub fn setlang_confirmation(name: &str, code: &LangCode) -> String {
    format!("Your preferred language has been set to {name} ({code}).")
}

pub fn invalid_code() -> String {
    format!(
        "❌ Invalid language code. Supported codes: {}",
        langs::supported_codes().join(", ")
    )
}

/// Help text, generated from the registry so new languages show up without
/// touching this module.
pub fn help_text(default_lang: &LangCode) -> String {
    let mut help = String::from("*WhatsApp Auto Translator Bot Commands:*\n\n");
    help.push_str("!translate <text> [target-lang] - Translate text to target language\n");
    help.push_str("!t <text> [target-lang] - Short form of translate command\n");
    help.push_str("!setlang <lang-code> - Set your preferred target language\n");
    help.push_str("!help - Show this help message\n\n");

    help.push_str("*Reply Translation:*\n");
    help.push_str("Reply to any message with !<lang-code> to translate it\n");
    help.push_str("Example: Reply with !id to translate to Indonesian\n\n");

    help.push_str("*Multi-Directional Translation:*\n");
    help.push_str("The bot translates between any supported language pair\n");
    help.push_str("Add a language code after !translate to pick the target\n\n");

    help.push_str("*Supported Languages:*\n");
    for (code, name) in langs::primary_languages() {
        if *code == default_lang.as_str() {
            help.push_str(&format!("!{code} = {name} (Default)\n"));
        } else {
            help.push_str(&format!("!{code} = {name}\n"));
        }
    }

    help.push_str("\n*Chinese Variants:*\n");
    for (code, name) in langs::regional_variants() {
        help.push_str(&format!("!{code} = {name}\n"));
    }

    help
}
