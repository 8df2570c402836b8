//! Instrument traits and their backends
//!
//! The mempool only talks to [`Counter`], [`Gauge`] and [`Histogram`]. Two
//! backends implement them: the Prometheus client types, which record and
//! export, and the `Noop*` types, which drop every write.

/// Monotonically non-decreasing counter
pub trait Counter: Send + Sync {
    /// Increment by one
    fn inc(&self) {
        self.inc_by(1);
    }

    /// Increment by `delta`
    fn inc_by(&self, delta: u64);
}

/// Point-in-time value that may move in either direction
pub trait Gauge: Send + Sync {
    /// Set the current value
    fn set(&self, value: i64);

    /// Add `delta` to the current value
    fn add(&self, delta: i64);

    /// Subtract `delta` from the current value
    fn sub(&self, delta: i64) {
        self.add(delta.saturating_neg());
    }

    /// Increment by one
    fn inc(&self) {
        self.add(1);
    }

    /// Decrement by one
    fn dec(&self) {
        self.add(-1);
    }
}

/// Distribution of observed values over fixed buckets
pub trait Histogram: Send + Sync {
    /// Record one observation
    fn observe(&self, value: f64);
}

impl Counter for prometheus::IntCounter {
    fn inc(&self) {
        prometheus::IntCounter::inc(self);
    }

    fn inc_by(&self, delta: u64) {
        prometheus::IntCounter::inc_by(self, delta);
    }
}

impl Gauge for prometheus::IntGauge {
    fn set(&self, value: i64) {
        prometheus::IntGauge::set(self, value);
    }

    fn add(&self, delta: i64) {
        prometheus::IntGauge::add(self, delta);
    }
}

impl Histogram for prometheus::Histogram {
    fn observe(&self, value: f64) {
        prometheus::Histogram::observe(self, value);
    }
}

/// Counter that discards every increment
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCounter;

impl Counter for NoopCounter {
    fn inc_by(&self, _delta: u64) {}
}

/// Gauge that discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGauge;

impl Gauge for NoopGauge {
    fn set(&self, _value: i64) {}

    fn add(&self, _delta: i64) {}
}

/// Histogram that discards every observation
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHistogram;

impl Histogram for NoopHistogram {
    fn observe(&self, _value: f64) {}
}
