pub mod features;
#[cfg(feature = "redis")]
mod redis_conn;

use infrakit_core::{Registries, Result};
use std::sync::OnceLock;
use tracing::warn;

pub const AXUM_BACKEND: &str = "axum";
pub const MEMORY_BACKEND: &str = "memory";
pub const REDIS_BACKEND: &str = "redis";

/// Registers every backend compiled into this crate.
pub fn register_builtin(registries: &Registries) -> Result<()> {
    registries.register_app(AXUM_BACKEND, features::http_server::create_app)?;

    registries.register_keyval(MEMORY_BACKEND, features::keyval::connect_memory)?;
    registries.register_queue(MEMORY_BACKEND, features::queue::connect_memory)?;

    #[cfg(feature = "redis")]
    {
        registries.register_keyval(REDIS_BACKEND, features::keyval::connect_redis)?;
        registries.register_queue(REDIS_BACKEND, features::queue::connect_redis)?;
    }

    Ok(())
}

/// Process-wide registries, pre-populated with the builtin backends.
///
/// Extra backends may be registered until a bootstrap freezes them.
pub fn registries() -> &'static Registries {
    static REGISTRIES: OnceLock<Registries> = OnceLock::new();
    REGISTRIES.get_or_init(|| {
        let registries = Registries::new();
        if let Err(e) = register_builtin(&registries) {
            warn!(error = %e, "Failed to register builtin backends");
        }
        registries
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use infrakit_core::{HttpConfig, InfraError};

    #[test]
    fn test_builtin_names() {
        let registries = Registries::new();
        register_builtin(&registries).unwrap();

        assert_eq!(registries.apps.names(), vec![AXUM_BACKEND]);
        assert!(registries.keyvals.contains(MEMORY_BACKEND));
        assert!(registries.queues.contains(MEMORY_BACKEND));
        #[cfg(feature = "redis")]
        {
            assert!(registries.keyvals.contains(REDIS_BACKEND));
            assert!(registries.queues.contains(REDIS_BACKEND));
        }
    }

    #[tokio::test]
    async fn test_memory_backends_from_url() {
        let registries = Registries::new();
        register_builtin(&registries).unwrap();

        let kv = registries.keyval_from_url("memory://").await.unwrap();
        kv.set("k", "v", None).await.unwrap();
        assert_eq!(kv.get("k").await, "v");

        let queue = registries.queue_from_url("memory://local").await.unwrap();
        queue.publish("jobs", "x".into()).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_not_found() {
        let registries = Registries::new();
        register_builtin(&registries).unwrap();

        let err = registries.keyval_from_url("etcd://localhost:2379").await.err().unwrap();
        assert!(matches!(err, InfraError::NotFound(_)));
    }

    #[test]
    fn test_builtin_app_factory() {
        let registries = Registries::new();
        register_builtin(&registries).unwrap();
        assert!(registries
            .create_app(AXUM_BACKEND, &HttpConfig::default())
            .is_ok());
        assert!(matches!(
            registries.create_app("actix", &HttpConfig::default()),
            Err(InfraError::NotFound(_))
        ));
    }

    #[test]
    fn test_global_registries_are_shared() {
        let first = registries() as *const Registries;
        let second = registries() as *const Registries;
        assert_eq!(first, second);
        assert!(registries().apps.contains(AXUM_BACKEND));
    }
}
