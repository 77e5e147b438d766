//! Name-based collector registry.
//!
//! Collectors are registered in a static table at compile time. Instances
//! are created on first [`Registry::load`] and cached for the life of the
//! process; lookups of an already-loaded collector only take a shared lock.

use certsweep_core::{Collector, CollectorConfig, Harvest, Result, SweepError};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;

use crate::collectors::{
    AwsAcmCollector, AzureKeyVaultCollector, CertFolderCollector, DomainCollector,
    K8sSecretsCollector, KeystoreCollector, MacosKeychainCollector, NginxCollector,
    PkiBundleCollector, PostgresTlsCollector, SystemTrustCollector, WindowsCertStoreCollector,
};

/// A collector type that can be listed without being instantiated
pub trait Builtin: Collector + Default + 'static {
    /// Registry name
    const NAME: &'static str;
    /// One-line description
    const DESCRIPTION: &'static str;
    /// Required configuration keys
    const REQUIRED: &'static [&'static str] = &[];
}

/// One row of the registration table
#[derive(Clone, Copy)]
pub struct Registration {
    /// Registry name
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Required configuration keys
    pub required: &'static [&'static str],
    factory: fn() -> Arc<dyn Collector>,
}

impl Registration {
    /// Registration for a built-in collector type
    pub const fn of<C: Builtin>() -> Self {
        Self {
            name: C::NAME,
            description: C::DESCRIPTION,
            required: C::REQUIRED,
            factory: instantiate::<C>,
        }
    }

}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

fn instantiate<C: Builtin>() -> Arc<dyn Collector> {
    Arc::new(C::default())
}

/// Every collector shipped with certsweep
pub const BUILTIN: &[Registration] = &[
    Registration::of::<AwsAcmCollector>(),
    Registration::of::<AzureKeyVaultCollector>(),
    Registration::of::<CertFolderCollector>(),
    Registration::of::<DomainCollector>(),
    Registration::of::<K8sSecretsCollector>(),
    Registration::of::<KeystoreCollector>(),
    Registration::of::<MacosKeychainCollector>(),
    Registration::of::<NginxCollector>(),
    Registration::of::<PkiBundleCollector>(),
    Registration::of::<PostgresTlsCollector>(),
    Registration::of::<SystemTrustCollector>(),
    Registration::of::<WindowsCertStoreCollector>(),
];

/// Name-keyed collector table with a process-lifetime instance cache
pub struct Registry {
    table: Vec<Registration>,
    cache: RwLock<HashMap<&'static str, Arc<dyn Collector>>>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// Registry over the built-in collectors, with an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::with_registrations(BUILTIN.to_vec())
    }

    /// Registry over an explicit table
    #[must_use]
    pub fn with_registrations(table: Vec<Registration>) -> Self {
        Self {
            table,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide registry over the built-in collectors
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Registered names, in table order. Instantiates nothing.
    pub fn list_available(&self) -> Vec<&'static str> {
        self.table.iter().map(|r| r.name).collect()
    }

    /// Registration rows, in table order
    pub fn registrations(&self) -> &[Registration] {
        &self.table
    }

    /// Whether `name` has already been instantiated
    pub fn is_loaded(&self, name: &str) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// The cached instance for `name`, creating it on first use
    pub fn load(&self, name: &str) -> Result<Arc<dyn Collector>> {
        if let Some(found) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(found));
        }

        let registration = self
            .table
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| SweepError::PluginNotFound {
                name: name.to_string(),
                available: self.list_available().iter().map(|n| (*n).to_string()).collect(),
            })?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = cache.get(registration.name) {
            return Ok(Arc::clone(found));
        }

        let instance = (registration.factory)();
        if instance.name() != registration.name {
            return Err(SweepError::InvalidPlugin {
                registered: registration.name.to_string(),
                reported: instance.name().to_string(),
            });
        }

        debug!(collector = registration.name, "instantiated collector");
        cache.insert(registration.name, Arc::clone(&instance));
        Ok(instance)
    }

    /// Load `name` and run it with `config`
    pub async fn execute(&self, name: &str, config: &CollectorConfig) -> Result<Harvest> {
        let collector = self.load(name)?;
        collector.collect(config).await
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Impostor;

    #[async_trait]
    impl Collector for Impostor {
        fn name(&self) -> &'static str {
            "someone-else"
        }

        fn description(&self) -> &'static str {
            "Reports the wrong name"
        }

        async fn collect(&self, _config: &CollectorConfig) -> Result<Harvest> {
            Ok(Harvest::new(self.name()))
        }
    }

    impl Builtin for Impostor {
        const NAME: &'static str = "impostor";
        const DESCRIPTION: &'static str = "Reports the wrong name";
    }

    #[test]
    fn builtin_names_are_unique_and_match_instances() {
        let registry = Registry::new();
        let names = registry.list_available();
        let mut deduped = names.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
        assert_eq!(names.len(), 12);

        for registration in registry.registrations() {
            let collector = registry.load(registration.name).unwrap();
            assert_eq!(collector.name(), registration.name);
            assert_eq!(collector.required_parameters(), registration.required);
        }
    }

    #[test]
    fn load_is_memoized() {
        let registry = Registry::new();
        let first = registry.load("cert-folder").unwrap();
        let second = registry.load("cert-folder").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn listing_does_not_instantiate() {
        let registry = Registry::new();
        assert!(registry.list_available().contains(&"domain"));
        assert!(!registry.is_loaded("domain"));
        registry.load("domain").unwrap();
        assert!(registry.is_loaded("domain"));
    }

    #[test]
    fn unknown_name_is_not_found() {
        let err = Registry::new().load("ftp-server").err().unwrap();
        match err {
            SweepError::PluginNotFound { name, available } => {
                assert_eq!(name, "ftp-server");
                assert!(available.iter().any(|n| n == "aws-acm"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mismatched_factory_is_invalid() {
        let registry = Registry::with_registrations(vec![Registration::of::<Impostor>()]);
        assert!(matches!(
            registry.load("impostor").err().unwrap(),
            SweepError::InvalidPlugin { .. }
        ));
        assert!(!registry.is_loaded("impostor"));
    }

    #[test]
    fn concurrent_loads_share_one_instance() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.load("nginx").unwrap())
            })
            .collect();
        let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn execute_propagates_configuration_errors() {
        let err = Registry::global()
            .execute("cert-folder", &CollectorConfig::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SweepError::Configuration { ref parameter, .. } if parameter == "folders"));
    }
}
