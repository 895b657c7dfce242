//! Client objects behind generated interface adapters.
//!
//! A [ServiceProxy] holds everything one client instance needs at call time:
//! the transport, the shared [InterfaceMetadata], configuration, observers
//! and the backing slots of header properties. Generated adapters implement
//! [Interface] and forward every method to the proxy's `invoke_*` entry
//! points.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt::Debug,
    sync::Arc,
};

use indexmap::IndexMap;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::{
    cancel::Cancellation,
    config::ClientConfig,
    error::{Error, Result},
    metadata::{InterfaceMetadata, cached_for},
    observer::Observer,
    transport::Transport,
};

/// Implemented by the adapters `#[api]` generates for a trait.
pub trait Interface: Sized + 'static {
    type Transport: Transport;

    /// Registers the interface's methods and properties.
    fn describe() -> Result<InterfaceMetadata>;

    fn from_proxy(proxy: ServiceProxy<Self::Transport>) -> Self;

    fn proxy(&self) -> &ServiceProxy<Self::Transport>;

    /// The validated metadata, built once per process.
    fn metadata() -> Result<Arc<InterfaceMetadata>> {
        cached_for::<Self>(Self::describe)
    }

    fn connect(transport: Self::Transport) -> Result<Self> {
        Self::connect_with(transport, ClientConfig::default())
    }

    fn connect_with(transport: Self::Transport, config: ClientConfig) -> Result<Self> {
        let proxy = ServiceProxy::new(Self::metadata()?, Binding::Bound(transport), config);
        Ok(Self::from_proxy(proxy))
    }

    /// A client without transport: requests can be prepared and inspected,
    /// or sent through [ServiceProxy::invoke_via].
    fn unbound(config: ClientConfig) -> Result<Self> {
        let proxy = ServiceProxy::new(Self::metadata()?, Binding::Unbound, config);
        Ok(Self::from_proxy(proxy))
    }
}

#[derive(Debug)]
pub enum Binding<T> {
    Bound(T),
    Unbound,
}

pub struct ServiceProxy<T> {
    metadata: Arc<InterfaceMetadata>,
    binding: Binding<T>,
    config: ClientConfig,
    properties: RwLock<IndexMap<String, Option<String>>>,
    observers: Vec<Arc<dyn Observer>>,
    cancel: Cancellation,
}

impl<T> ServiceProxy<T> {
    pub fn new(metadata: Arc<InterfaceMetadata>, binding: Binding<T>, config: ClientConfig) -> Self {
        let properties = metadata
            .properties()
            .map(|p| (p.name.clone(), None))
            .collect();
        debug!("new proxy for {}", metadata.name());
        Self {
            metadata,
            binding,
            config,
            properties: RwLock::new(properties),
            observers: Vec::new(),
            cancel: Cancellation::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn metadata(&self) -> &InterfaceMetadata {
        &self.metadata
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> Option<&T> {
        match &self.binding {
            Binding::Bound(t) => Some(t),
            Binding::Unbound => None,
        }
    }

    pub(crate) fn observers(&self) -> &[Arc<dyn Observer>] {
        &self.observers
    }

    /// Cancelled by [ServiceProxy::cancel_all]; every call made through this
    /// proxy also observes it.
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// Cancels all in-flight and future calls of this proxy.
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    /// Current value of a header property; `None` before the first write and
    /// for unknown names.
    pub fn property(&self, name: &str) -> Option<String> {
        self.properties.read().get(name).cloned().flatten()
    }

    /// Stores a property value and returns the previous one. Setting an
    /// unknown property fails with [Error::Configuration].
    pub fn try_set_property(
        &self,
        name: &str,
        value: impl Into<Option<String>>,
    ) -> Result<Option<String>> {
        let mut properties = self.properties.write();
        let slot = properties.get_mut(name).ok_or_else(|| {
            Error::Configuration(format!(
                "{} has no property '{name}'",
                self.metadata.name()
            ))
        })?;
        Ok(std::mem::replace(slot, value.into()))
    }

    /// Like [ServiceProxy::try_set_property], logging unknown names instead
    /// of failing.
    pub fn set_property(&self, name: &str, value: impl Into<Option<String>>) -> Option<String> {
        match self.try_set_property(name, value) {
            Ok(previous) => previous,
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }

    /// header values of all properties that currently hold a value
    pub(crate) fn property_headers(&self) -> Vec<(String, String)> {
        let properties = self.properties.read();
        self.metadata
            .properties()
            .filter_map(|p| match properties.get(&p.name) {
                Some(Some(v)) => Some((p.header.clone(), v.clone())),
                _ => None,
            })
            .collect()
    }
}

impl<T> Debug for ServiceProxy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProxy")
            .field("interface", &self.metadata.name())
            .field("bound", &matches!(self.binding, Binding::Bound(_)))
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Hands out at most one shared instance per interface type.
#[derive(Default)]
pub struct ProxyRegistry {
    instances: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached instance of `I`, building it with `build` if there
    /// is none yet. The registry stays locked while `build` runs, so two
    /// racing callers never construct two instances.
    pub fn get_or_build<I>(&self, build: impl FnOnce() -> Result<I>) -> Result<Arc<I>>
    where
        I: Any + Send + Sync,
    {
        let mut instances = self.instances.lock();
        if let Some(instance) = instances.get(&TypeId::of::<I>()) {
            if let Ok(instance) = instance.clone().downcast::<I>() {
                return Ok(instance);
            }
        }
        let instance = Arc::new(build()?);
        instances.insert(TypeId::of::<I>(), instance.clone());
        Ok(instance)
    }

    /// Connects `I` to `transport` unless an instance is already cached, in
    /// which case `transport` is dropped.
    pub fn build<I>(&self, transport: I::Transport) -> Result<Arc<I>>
    where
        I: Interface + Send + Sync,
    {
        self.get_or_build(|| I::connect(transport))
    }

    pub fn get<I>(&self) -> Option<Arc<I>>
    where
        I: Any + Send + Sync,
    {
        self.instances
            .lock()
            .get(&TypeId::of::<I>())
            .cloned()
            .and_then(|i| i.downcast::<I>().ok())
    }
}
