use serde::Serialize;

use tokenprobe_lib::config::SHUTDOWN_GRACE;
use tokenprobe_lib::{
    block_on_with_grace, init_logging, platform, remediation, CredentialResolver,
    DiagnosticsReport, Remediation, ResolverConfig,
};

#[derive(Serialize)]
struct Report {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<tokenprobe_lib::SourceKind>,
    remediation: Remediation,
    diagnostics: DiagnosticsReport,
}

async fn resolve_report(resolver: &CredentialResolver, config: &ResolverConfig) -> Report {
    let outcome = resolver.resolve().await;
    Report {
        found: outcome.is_found(),
        source: outcome.credential().map(|c| c.source()),
        remediation: remediation(&outcome, &config.env_var),
        diagnostics: resolver.diagnostics(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let platform = platform::detect();
    let config = ResolverConfig::from_env(platform)?;
    let resolver = CredentialResolver::for_platform(platform, &config);

    let report = block_on_with_grace(resolve_report(&resolver, &config), SHUTDOWN_GRACE)?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.found {
        std::process::exit(1);
    }
    Ok(())
}
