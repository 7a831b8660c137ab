use shared::metrics_defs::{MetricDef, MetricType};

pub const WEBHOOK_REQUESTS: MetricDef = MetricDef {
    name: "webhook.requests",
    metric_type: MetricType::Counter,
    description: "Webhook deliveries handled. Tagged with status.",
};

pub const WEBHOOK_DURATION: MetricDef = MetricDef {
    name: "webhook.duration",
    metric_type: MetricType::Histogram,
    description: "Time to process a webhook delivery in seconds. Tagged with status.",
};

pub const ANSWERS_SKIPPED: MetricDef = MetricDef {
    name: "webhook.answers.skipped",
    metric_type: MetricType::Counter,
    description: "Answers dropped during normalization (empty value or unsupported kind)",
};

pub const NOTES_STORE_WRITES: MetricDef = MetricDef {
    name: "notes_store.writes",
    metric_type: MetricType::Counter,
    description: "Record creation attempts. Tagged with outcome (created, failed, skipped).",
};

pub const EMAIL_SENDS: MetricDef = MetricDef {
    name: "email.sends",
    metric_type: MetricType::Counter,
    description: "Email send attempts. Tagged with kind (operator, thank_you) and outcome.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    WEBHOOK_REQUESTS,
    WEBHOOK_DURATION,
    ANSWERS_SKIPPED,
    NOTES_STORE_WRITES,
    EMAIL_SENDS,
];
