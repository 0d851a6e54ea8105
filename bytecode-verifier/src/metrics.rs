use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

lazy_static! {
    pub static ref DOWNLOAD_CACHE_TOTAL: IntCounter = register_int_counter!(
        "bytecode_verifier_download_cache_total",
        "total number of get calls in ArtifactCache",
    )
    .unwrap();
    pub static ref DOWNLOAD_CACHE_HITS: IntCounter = register_int_counter!(
        "bytecode_verifier_download_cache_hits",
        "number of cache hits in ArtifactCache",
    )
    .unwrap();
    pub static ref COMPILER_FETCH_TIME: Histogram = register_histogram!(
        "bytecode_verifier_compiler_fetch_time_seconds",
        "download time for compilers in seconds",
        vec![0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0, 20.0],
    )
    .unwrap();
    pub static ref COMPILATION_QUEUE_TIME: Histogram = register_histogram!(
        "bytecode_verifier_compilation_queue_time_seconds",
        "time spent waiting for a compilation slot in seconds",
    )
    .unwrap();
    pub static ref COMPILATIONS_IN_QUEUE: IntGauge = register_int_gauge!(
        "bytecode_verifier_compilations_in_queue",
        "number of compilations waiting for a slot",
    )
    .unwrap();
    pub static ref COMPILE_TIME: Histogram = register_histogram!(
        "bytecode_verifier_compile_time_seconds",
        "contract compilation time in seconds",
    )
    .unwrap();
    pub static ref COMPILATIONS_IN_FLIGHT: IntGauge = register_int_gauge!(
        "bytecode_verifier_compilations_in_flight",
        "number of compilations currently running",
    )
    .unwrap();
    pub static ref QUEUE_ITEMS_IN_FLIGHT: IntGauge = register_int_gauge!(
        "bytecode_verifier_queue_items_in_flight",
        "number of queue items being processed by workers",
    )
    .unwrap();
    pub static ref QUEUE_ITEMS_BUFFERED: IntGauge = register_int_gauge!(
        "bytecode_verifier_queue_items_buffered",
        "number of completed queue items waiting for earlier items",
    )
    .unwrap();
    pub static ref PIPELINE_OUTCOMES: IntCounterVec = register_int_counter_vec!(
        "bytecode_verifier_pipeline_outcomes",
        "number of processed contracts by outcome",
        &["outcome"],
    )
    .unwrap();
}

/// Decrements the gauge when dropped.
pub struct GaugeGuard {
    gauge: IntGauge,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

pub trait GuardedGauge {
    fn guarded_inc(&self) -> GaugeGuard;
}

impl GuardedGauge for IntGauge {
    fn guarded_inc(&self) -> GaugeGuard {
        self.inc();
        GaugeGuard {
            gauge: self.clone(),
        }
    }
}
