//! Metrics registry handle

use crate::error::{MetricsError, MetricsResult};
use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::warn;

/// Cloneable handle to a collection registry.
///
/// Clones share the same underlying registry. Instrument sets are built
/// against an explicit handle rather than the process-global default, so
/// independent registries can coexist.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// Wrap an existing Prometheus registry
    pub fn from_registry(registry: Registry) -> Self {
        Self { registry }
    }

    /// Get a reference to the underlying Prometheus registry
    pub fn inner(&self) -> &Registry {
        &self.registry
    }

    /// Register every collector or none of them.
    ///
    /// Collectors are registered in order. If one is rejected, the ones
    /// already registered by this call are unregistered before the error is
    /// returned.
    pub fn register_all(&self, collectors: Vec<(String, Box<dyn Collector>)>) -> MetricsResult<()> {
        let mut registered: Vec<Box<dyn Collector>> = Vec::with_capacity(collectors.len());

        for (name, collector) in collectors {
            let rollback = CollectorHandle::from_descs(&*collector);
            match self.registry.register(collector) {
                Ok(()) => registered.push(rollback),
                Err(err) => {
                    warn!(metric = %name, error = %err, "metric registration rejected, rolling back");
                    for collector in registered.into_iter().rev() {
                        // Only collectors registered above are removed, so this cannot miss.
                        let _ = self.registry.unregister(collector);
                    }
                    return Err(match err {
                        prometheus::Error::AlreadyReg => MetricsError::AlreadyRegistered(name),
                        other => other.into(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Collect every registered metric family
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render every registered series in the Prometheus text exposition format
    pub fn render(&self) -> MetricsResult<String> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| MetricsError::Prometheus(prometheus::Error::Msg(e.to_string())))
    }

    /// Find a metric family by its fully-qualified name
    pub fn family(&self, fq_name: &str) -> Option<MetricFamily> {
        self.gather()
            .into_iter()
            .find(|family| family.get_name() == fq_name)
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("families", &self.registry.gather().len())
            .finish()
    }
}

/// Stand-in collector carrying only the descriptors of a registered one,
/// which is all `Registry::unregister` matches on.
struct CollectorHandle {
    descs: Vec<prometheus::core::Desc>,
}

impl CollectorHandle {
    fn from_descs(collector: &dyn Collector) -> Box<dyn Collector> {
        Box::new(Self {
            descs: collector.desc().into_iter().cloned().collect(),
        })
    }
}

impl Collector for CollectorHandle {
    fn desc(&self) -> Vec<&prometheus::core::Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{IntCounter, Opts};

    fn counter(name: &str) -> IntCounter {
        IntCounter::with_opts(Opts::new(name, "test counter")).unwrap()
    }

    fn entry(name: &str, c: IntCounter) -> (String, Box<dyn Collector>) {
        (name.to_string(), Box::new(c))
    }

    #[test]
    fn test_clones_share_registry() {
        let registry = MetricsRegistry::new();
        let shared = registry.clone();
        registry
            .register_all(vec![entry("a", counter("a"))])
            .unwrap();
        assert!(shared.family("a").is_some());
    }

    #[test]
    fn test_register_all_rolls_back_on_conflict() {
        let registry = MetricsRegistry::new();
        registry
            .register_all(vec![entry("b", counter("b"))])
            .unwrap();

        let err = registry
            .register_all(vec![
                entry("a", counter("a")),
                entry("b", counter("b")),
            ])
            .unwrap_err();

        assert!(matches!(err, MetricsError::AlreadyRegistered(ref name) if name == "b"));
        assert!(registry.family("a").is_none());
        assert!(registry.family("b").is_some());
    }

    #[test]
    fn test_render_text_format() {
        let registry = MetricsRegistry::new();
        let c = counter("render_me");
        registry
            .register_all(vec![entry("render_me", c.clone())])
            .unwrap();
        c.inc_by(7);

        let text = registry.render().unwrap();
        assert!(text.contains("# HELP render_me test counter"));
        assert!(text.contains("# TYPE render_me counter"));
        assert!(text.contains("render_me 7"));
    }

    #[test]
    fn test_empty_registry_renders_nothing() {
        let registry = MetricsRegistry::new();
        assert!(registry.gather().is_empty());
        assert_eq!(registry.render().unwrap(), "");
    }
}
