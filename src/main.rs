use futures::future::join_all;
use growth_engines::analyzer::{CohortEngine, CompetitiveEngine, FunnelEngine, SeoAuditEngine};
use growth_engines::config::{AppConfig, load_config};
use growth_engines::source::{HttpFetcher, SimulatedSource, WebSiteSource};
use serde::Serialize;
use std::fmt::Display;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config: AppConfig = match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error ({}): {}", path, e);
            return;
        }
    };

    let requests = &config.requests;
    info!(
        "Running {} cohort, {} funnel, {} competitive and {} SEO analyses",
        requests.cohorts.len(),
        requests.funnels.len(),
        requests.competitive.len(),
        requests.seo.len()
    );

    let thresholds = &config.thresholds;
    let simulated = SimulatedSource::new(config.seed);
    let cohorts = CohortEngine::new(simulated.clone(), thresholds.cohort.clone());
    let funnels = FunnelEngine::new(simulated.clone(), thresholds.funnel.clone());
    let competitive = CompetitiveEngine::new(simulated.clone(), thresholds.competitive.clone());

    let timeout = Duration::from_secs(config.fetch_timeout_secs);
    let seo = match HttpFetcher::new(&config.user_agent, timeout) {
        Ok(fetcher) => Some(SeoAuditEngine::new(
            WebSiteSource::new(fetcher, simulated.clone()),
            thresholds.seo.clone(),
            timeout,
        )),
        Err(e) => {
            error!("HTTP client init failed, skipping SEO audits: {}", e);
            None
        }
    };

    let cohort_tasks = requests.cohorts.iter().map(|r| async {
        report(
            &format!("cohorts:{}", r.client_id),
            cohorts.analyze_cohorts(&r.client_id, r.timeframe).await,
        )
    });
    let funnel_tasks = requests.funnels.iter().map(|r| async {
        report(&format!("funnel:{}", r.client_id), funnels.analyze_funnel(r).await)
    });
    let competitive_tasks = requests.competitive.iter().map(|r| async {
        report(
            &format!("competitive:{}", r.client_domain),
            competitive.analyze_competitors(&r.client_domain, &r.industry).await,
        )
    });
    let seo_tasks = requests.seo.iter().filter(|_| seo.is_some()).map(|r| async {
        if let Some(engine) = &seo {
            report(&format!("seo:{}", r.url), engine.audit(r).await);
        }
    });

    tokio::join!(
        join_all(cohort_tasks),
        join_all(funnel_tasks),
        join_all(competitive_tasks),
        join_all(seo_tasks),
    );
    info!("All analyses finished.");
}

/// Prints a result as pretty JSON on stdout; rejected requests are logged and skipped.
fn report<T: Serialize, E: Display>(label: &str, result: Result<T, E>) {
    match result {
        Ok(analysis) => match serde_json::to_string_pretty(&analysis) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!("Serializing {} failed: {}", label, e),
        },
        Err(e) => warn!("Skipping {}: {}", label, e),
    }
}
