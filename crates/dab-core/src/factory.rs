//! Adapter factories and the probe-in-order registry.
//!
//! Each adapter implementation exposes one [`AdapterFactory`]; the
//! registry probes them in registration order with the device address
//! and the first compatible factory builds the instance. This replaces
//! compile-time selection with a plain runtime list.

use crate::adapter::DeviceAdapter;
use crate::error::{DabError, DabResult};
use crate::outbound::PublishHandle;

/// Everything a factory needs to construct one adapter instance.
pub struct AdapterContext {
    pub device_id: String,
    /// Free-form device address from the bootstrap arguments.
    pub address: String,
    pub publish: PublishHandle,
}

/// A registered adapter implementation.
pub struct AdapterFactory {
    /// Implementation name, for logs.
    pub name: &'static str,
    /// Can this implementation manage the device at `address`?
    pub is_compatible: fn(address: &str) -> bool,
    pub build: Box<dyn Fn(AdapterContext) -> DabResult<DeviceAdapter> + Send + Sync>,
}

/// Ordered list of adapter factories.
#[derive(Default)]
pub struct AdapterRegistry {
    factories: Vec<AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: AdapterFactory) {
        self.factories.push(factory);
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Probe factories in order and build with the first compatible one.
    pub fn build(&self, ctx: AdapterContext) -> DabResult<DeviceAdapter> {
        for factory in &self.factories {
            if (factory.is_compatible)(&ctx.address) {
                tracing::debug!(
                    adapter = factory.name,
                    device = %ctx.device_id,
                    "building adapter instance"
                );
                return (factory.build)(ctx);
            }
        }
        Err(DabError::bad_request(format!(
            "no compatible adapter for device address \"{}\"",
            ctx.address
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterBuilder;
    use crate::outbound::publish_channel;

    fn stub_factory(name: &'static str, is_compatible: fn(&str) -> bool) -> AdapterFactory {
        AdapterFactory {
            name,
            is_compatible,
            build: Box::new(|ctx: AdapterContext| {
                Ok(AdapterBuilder::new(ctx.device_id, ctx.publish).build())
            }),
        }
    }

    #[test]
    fn first_compatible_factory_wins() {
        let mut registry = AdapterRegistry::new();
        registry.register(stub_factory("ipv4-only", |addr| addr.contains('.')));
        registry.register(stub_factory("fallback", |_| true));

        let (publish, _rx) = publish_channel(4);
        let adapter = registry
            .build(AdapterContext {
                device_id: "dev1".into(),
                address: "hostname".into(),
                publish,
            })
            .unwrap();
        assert_eq!(adapter.device_id(), "dev1");
    }

    #[test]
    fn no_match_is_an_error() {
        let mut registry = AdapterRegistry::new();
        registry.register(stub_factory("never", |_| false));

        let (publish, _rx) = publish_channel(4);
        let err = registry
            .build(AdapterContext {
                device_id: "dev1".into(),
                address: "10.0.0.1".into(),
                publish,
            })
            .unwrap_err();
        assert_eq!(err.code, 400);
    }
}
