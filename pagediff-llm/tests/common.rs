use std::sync::OnceLock;

use pagediff_common::observability::{LogConfig, LogFormat};

static INIT: OnceLock<Option<std::path::PathBuf>> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT.get_or_init(|| {
        let config = LogConfig {
            app_name: "pagediff-tests",
            emit_stderr: true,
            format: if std::env::var("PAGEDIFF_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug".to_string(),
            ..LogConfig::default()
        };

        pagediff_common::observability::init_logging(config).unwrap_or_default()
    });
}
