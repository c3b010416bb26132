//! Fetch capability probes.

use ytscribe_core::{AppConfig, FetchClassification, Probes};

/// Run every probe against the current environment.
pub fn probe(config: &AppConfig) -> Probes {
    Probes {
        data_api: config.api_key().is_some(),
        transcript_api: cfg!(feature = "innertube"),
        ytdlp: ytdlp_available(&config.ytdlp_path),
    }
}

/// Classify the process's fetch capability. Call once at startup.
pub fn detect(config: &AppConfig) -> FetchClassification {
    let classification = FetchClassification::from_probes(probe(config));

    tracing::info!(
        method = %classification.fetch_method,
        auth_required = classification.auth_required,
        capabilities = ?classification.capabilities_detected,
        "fetch capability detected"
    );

    classification
}

/// Whether `program` resolves to an executable, either as a path or on PATH.
pub fn ytdlp_available(program: &str) -> bool {
    which::which(program).is_ok()
}
