//! Metrics definitions for the broker.

use shared::metrics_defs::{MetricDef, MetricType};

pub const UPSTREAM_CACHE_HIT: MetricDef = MetricDef {
    name: "upstream_cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of template lookups served from the cache",
};

pub const UPSTREAM_CACHE_MISS: MetricDef = MetricDef {
    name: "upstream_cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of template lookups that required an upstream fetch",
};

pub const UPSTREAM_REFRESH_FAILURE: MetricDef = MetricDef {
    name: "upstream_cache.refresh_failure",
    metric_type: MetricType::Counter,
    description: "Number of failed upstream template fetches",
};

pub const UPSTREAM_FETCH_DURATION: MetricDef = MetricDef {
    name: "upstream_cache.fetch.duration",
    metric_type: MetricType::Histogram,
    description: "Time to fetch the upstream template in seconds",
};

pub const INSTANCE_VALIDATION_FAILURE: MetricDef = MetricDef {
    name: "instance_validation.failure",
    metric_type: MetricType::Counter,
    description: "Number of candidate instances that failed validation",
};

pub const ALL_METRICS: &[MetricDef] = &[
    UPSTREAM_CACHE_HIT,
    UPSTREAM_CACHE_MISS,
    UPSTREAM_REFRESH_FAILURE,
    UPSTREAM_FETCH_DURATION,
    INSTANCE_VALIDATION_FAILURE,
];
