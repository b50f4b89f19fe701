use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use watb_core::{
    config::Config, dispatch::Dispatcher, langs, prefs::PreferenceStore, session::Supervisor,
    translate::TranslationGateway,
};
use watb_gtranslate::GoogleTranslate;
use watb_whatsapp::WaGateway;

#[tokio::main]
async fn main() -> Result<(), watb_core::Error> {
    watb_core::logging::init("watb")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!("WhatsApp auto translator bot");
    tracing::info!(
        default_target = %cfg.default_target_lang,
        "supported languages: {}",
        langs::supported_codes().join(", ")
    );

    let gateway = Arc::new(TranslationGateway::new(
        Arc::new(GoogleTranslate::new()),
        cfg.translate_retry,
    ));
    let prefs = Arc::new(PreferenceStore::new(cfg.default_target_lang.clone()));

    let whatsapp = Arc::new(WaGateway::new(&cfg));
    let dispatcher = Arc::new(Dispatcher::new(
        gateway,
        prefs,
        whatsapp.clone(),
        cfg.show_original,
    ));
    let supervisor = Supervisor::new(whatsapp, dispatcher, cfg.block_recovery);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                shutdown.cancel();
            }
        });
    }

    supervisor.run(shutdown).await
}
