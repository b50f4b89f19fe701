//! Per-sender target-language preferences, kept in memory for the lifetime
//! of the process.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::domain::ChatId;
use crate::langs::LangCode;

pub struct PreferenceStore {
    default_lang: LangCode,
    prefs: Mutex<HashMap<ChatId, LangCode>>,
}

impl PreferenceStore {
    pub fn new(default_lang: LangCode) -> Self {
        Self {
            default_lang,
            prefs: Mutex::new(HashMap::new()),
        }
    }

    /// Preferred target language for a sender, falling back to the
    /// process-wide default.
    pub async fn get(&self, chat: &ChatId) -> LangCode {
        self.prefs
            .lock()
            .await
            .get(chat)
            .cloned()
            .unwrap_or_else(|| self.default_lang.clone())
    }

    /// Stored preference without the default fallback.
    pub async fn stored(&self, chat: &ChatId) -> Option<LangCode> {
        self.prefs.lock().await.get(chat).cloned()
    }

    pub async fn set(&self, chat: ChatId, lang: LangCode) {
        self.prefs.lock().await.insert(chat, lang);
    }

    pub fn default_lang(&self) -> &LangCode {
        &self.default_lang
    }
}
