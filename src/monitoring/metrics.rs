use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

// Global Prometheus registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

fn service_and_env() -> (String, String) {
    let service = std::env::var("APP_SERVICE").unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_string());
    let env_name = std::env::var("APP_ENV").unwrap_or_else(|_| "production".to_string());
    (service, env_name)
}

// App info gauge (const)
pub static APP_INFO: Lazy<IntGauge> = Lazy::new(|| {
    let (service, env_name) = service_and_env();
    let g = IntGauge::with_opts(
        Opts::new("app_info", "Application info gauge")
            .const_label("service", &service)
            .const_label("env", &env_name)
            .const_label("version", env!("CARGO_PKG_VERSION")),
    )
    .unwrap();
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

// Ingest metrics
pub static INGEST_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("ingest_total", "Ingestion runs by outcome"),
        &["outcome"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static CHUNKS_EMBEDDED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("chunks_embedded_total", "Chunks embedded successfully").unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static CHUNKS_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("chunks_skipped_total", "Chunks dropped because embedding failed").unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static VECTORS_UPSERTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("vectors_upserted_total", "Vectors written to the vector store").unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static CORPUS_VERSION: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("corpus_version_ms", "Timestamp of the latest successful ingestion").unwrap();
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

// Query metrics
pub static QUERY_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(Opts::new("query_total", "Queries by outcome"), &["outcome"]).unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

fn parse_buckets_env(var: &str) -> Option<Vec<f64>> {
    match std::env::var(var) {
        Ok(val) if !val.trim().is_empty() => {
            let mut parsed: Vec<f64> = Vec::new();
            for tok in val.split(',') {
                let t = tok.trim();
                if t.is_empty() {
                    continue;
                }
                match t.parse::<f64>() {
                    Ok(v) if v > 0.0 => parsed.push(v),
                    _ => {
                        tracing::warn!(env_var = %var, token = %t, "Invalid histogram bucket value; ignoring");
                        return None;
                    }
                }
            }
            if parsed.is_empty() {
                None
            } else {
                parsed.sort_by(|a, b| a.total_cmp(b));
                Some(parsed)
            }
        }
        _ => None,
    }
}

fn latency_histogram(name: &str, help: &str, env_var: &str, default: Vec<f64>) -> Histogram {
    let (service, env_name) = service_and_env();
    let buckets = parse_buckets_env(env_var).unwrap_or(default);
    let mut opts = HistogramOpts::new(name, help).buckets(buckets);
    opts.common_opts = opts.common_opts.const_label("service", service).const_label("env", env_name);
    let h = Histogram::with_opts(opts).unwrap();
    REGISTRY.register(Box::new(h.clone())).ok();
    h
}

pub static INGEST_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    latency_histogram(
        "ingest_duration_ms",
        "Ingestion duration in milliseconds",
        "INGEST_HISTO_BUCKETS",
        vec![100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0],
    )
});

pub static QUERY_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    latency_histogram(
        "query_latency_ms",
        "Query latency in milliseconds",
        "QUERY_HISTO_BUCKETS",
        vec![50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0],
    )
});

pub fn observe_ingest_duration_ms(ms: f64) {
    INGEST_DURATION_MS.observe(ms);
}

pub fn observe_query_latency_ms(ms: f64) {
    QUERY_LATENCY_MS.observe(ms);
}

/// Forces registration of every metric so the first scrape lists them all.
pub fn init() {
    APP_INFO.set(1);
    Lazy::force(&INGEST_TOTAL);
    Lazy::force(&CHUNKS_EMBEDDED_TOTAL);
    Lazy::force(&CHUNKS_SKIPPED_TOTAL);
    Lazy::force(&VECTORS_UPSERTED_TOTAL);
    Lazy::force(&CORPUS_VERSION);
    Lazy::force(&QUERY_TOTAL);
    Lazy::force(&INGEST_DURATION_MS);
    Lazy::force(&QUERY_LATENCY_MS);
}

pub fn export_prometheus() -> String {
    let metric_families = REGISTRY.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}
