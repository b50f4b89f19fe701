use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Serialize;

use crate::errors::Error;
use crate::langs::{self, LangCode};
use crate::retry::RetryPolicy;
use crate::Result;

/// Typed configuration for the bot, sourced from the environment with an
/// optional `.env` file.
#[derive(Clone, Debug)]
pub struct Config {
    // Messaging gateway (spawned wa-automate EASY API)
    pub gateway_path: PathBuf,
    pub gateway_port: u16,
    pub gateway_api_key: Option<String>,
    pub webhook_bind: SocketAddr,
    pub session: SessionOptions,

    // Translation behavior
    pub default_target_lang: LangCode,
    pub show_original: bool,

    // Retry tuning
    pub translate_retry: RetryPolicy,
    pub block_recovery: RetryPolicy,
}

/// Session options forwarded to the messaging gateway at launch. Deployment
/// differences (headless servers, local debugging, multi-device accounts)
/// are all expressed here instead of in code.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    pub session_id: String,
    pub multi_device: bool,
    /// Seconds to wait for an authenticated session.
    pub auth_timeout: u32,
    /// Seconds to wait for a QR scan.
    pub qr_timeout: u32,
    pub throw_error_on_tos_block: bool,
    pub skip_update_check: bool,
    pub headless: bool,
    pub use_chrome: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chromium_args: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let gateway_path = env_path("WA_GATEWAY_PATH")
            .or_else(|| which_in_path("wa-automate"))
            .unwrap_or_else(|| PathBuf::from("wa-automate"));
        let gateway_port = env_u16("WA_GATEWAY_PORT").unwrap_or(8002);
        let gateway_api_key = env_str("WA_GATEWAY_API_KEY").and_then(non_empty);

        let webhook_bind = env_str("WA_WEBHOOK_BIND")
            .and_then(non_empty)
            .unwrap_or_else(|| "127.0.0.1:8811".to_string());
        let webhook_bind: SocketAddr = webhook_bind.parse().map_err(|_| {
            Error::Config(format!("WA_WEBHOOK_BIND is not an address: {webhook_bind}"))
        })?;

        let default_target_lang = LangCode::new(
            &env_str("DEFAULT_TARGET_LANG").unwrap_or_else(|| "id".to_string()),
        );
        if !langs::is_supported(&default_target_lang) {
            return Err(Error::Config(format!(
                "DEFAULT_TARGET_LANG must be one of: {}",
                langs::supported_codes().join(", ")
            )));
        }
        let show_original = env_bool("SHOW_ORIGINAL").unwrap_or(true);

        let translate_retry = RetryPolicy::exponential(
            env_u32("TRANSLATE_RETRY_ATTEMPTS").unwrap_or(3).max(1),
            Duration::from_millis(env_u64("TRANSLATE_RETRY_DELAY_MS").unwrap_or(1_000)),
            Duration::from_millis(env_u64("TRANSLATE_RETRY_CAP_MS").unwrap_or(30_000)),
        );

        let block_wait_min = Duration::from_millis(env_u64("BLOCK_WAIT_MIN_MS").unwrap_or(5_000));
        let block_wait_max = Duration::from_millis(env_u64("BLOCK_WAIT_MAX_MS").unwrap_or(15_000));
        if block_wait_max < block_wait_min {
            return Err(Error::Config(
                "BLOCK_WAIT_MAX_MS must not be below BLOCK_WAIT_MIN_MS".to_string(),
            ));
        }
        let block_recovery = RetryPolicy::uniform(
            env_u32("BLOCK_RETRY_ATTEMPTS").unwrap_or(3),
            block_wait_min,
            block_wait_max,
        );

        let session = SessionOptions {
            session_id: env_str("WA_SESSION_ID")
                .and_then(non_empty)
                .unwrap_or_else(|| "wa-translator-bot".to_string()),
            multi_device: env_bool("WA_MULTI_DEVICE").unwrap_or(true),
            auth_timeout: env_u32("WA_AUTH_TIMEOUT").unwrap_or(60),
            qr_timeout: env_u32("WA_QR_TIMEOUT").unwrap_or(30),
            throw_error_on_tos_block: env_bool("WA_THROW_ON_TOS_BLOCK").unwrap_or(false),
            skip_update_check: env_bool("WA_SKIP_UPDATE_CHECK").unwrap_or(true),
            headless: env_bool("WA_HEADLESS").unwrap_or(true),
            use_chrome: env_bool("WA_USE_CHROME").unwrap_or(false),
            chromium_args: parse_csv(env_str("WA_CHROMIUM_ARGS")),
        };

        Ok(Self {
            gateway_path,
            gateway_port,
            gateway_api_key,
            webhook_bind,
            session,
            default_target_lang,
            show_original,
            translate_retry,
            block_recovery,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    env_str(key).and_then(|s| s.trim().parse::<u16>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn which_in_path(binary: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let candidate = dir.join(binary);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable_file(p: &Path) -> bool {
    if !p.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(md) = fs::metadata(p) {
            return (md.permissions().mode() & 0o111) != 0;
        }
    }
    true
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_options_serialize_with_gateway_field_names() {
        let opts = SessionOptions {
            session_id: "wa-translator-bot".to_string(),
            multi_device: true,
            auth_timeout: 60,
            qr_timeout: 30,
            throw_error_on_tos_block: false,
            skip_update_check: true,
            headless: true,
            use_chrome: false,
            chromium_args: Vec::new(),
        };

        let v = serde_json::to_value(&opts).unwrap();
        assert_eq!(v["sessionId"], "wa-translator-bot");
        assert_eq!(v["multiDevice"], true);
        assert_eq!(v["authTimeout"], 60);
        assert_eq!(v["throwErrorOnTosBlock"], false);
        assert!(v.get("chromiumArgs").is_none(), "empty args are omitted");
    }

    #[test]
    fn parse_csv_trims_and_drops_empty_entries() {
        let args = parse_csv(Some(" --no-sandbox , ,--disable-gpu".to_string()));
        assert_eq!(args, vec!["--no-sandbox", "--disable-gpu"]);
        assert!(parse_csv(None).is_empty());
    }

    #[test]
    fn env_bool_accepts_common_truthy_spellings() {
        env::set_var("WATB_TEST_BOOL_A", "TRUE");
        env::set_var("WATB_TEST_BOOL_B", "0");
        assert_eq!(env_bool("WATB_TEST_BOOL_A"), Some(true));
        assert_eq!(env_bool("WATB_TEST_BOOL_B"), Some(false));
        assert_eq!(env_bool("WATB_TEST_BOOL_MISSING"), None);
    }

    #[test]
    fn dotenv_loads_without_overriding_existing_env() {
        let path = env::temp_dir().join(format!("watb-dotenv-{}", std::process::id()));
        fs::write(
            &path,
            "# comment\nWATB_TEST_DOTENV_NEW=\"quoted value\"\nWATB_TEST_DOTENV_SET=from-file\n",
        )
        .unwrap();
        env::set_var("WATB_TEST_DOTENV_SET", "from-env");

        load_dotenv_if_present(&path);

        assert_eq!(
            env::var("WATB_TEST_DOTENV_NEW").as_deref(),
            Ok("quoted value")
        );
        assert_eq!(
            env::var("WATB_TEST_DOTENV_SET").as_deref(),
            Ok("from-env")
        );
        let _ = fs::remove_file(&path);
    }
}
