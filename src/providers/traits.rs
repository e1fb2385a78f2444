use anyhow::Result;
use async_trait::async_trait;

use crate::task_manager::TaskManager;

/// Base trait for providers that can create components asynchronously.
///
/// # Example
///
/// ```no_run
/// use argononed::providers::traits::AsyncProvider;
///
/// struct UnitProvider;
///
/// #[async_trait::async_trait]
/// impl AsyncProvider<String> for UnitProvider {
///     async fn provide(&self) -> anyhow::Result<String> {
///         Ok("C".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncProvider<T> {
    async fn provide(&self) -> Result<T>;
}

/// A long-running loop that can be started through the [`TaskManager`].
///
/// Services start in priority order. A critical service that fails to start
/// aborts startup; any other failure is logged and the daemon runs without
/// that service.
///
/// # Example
///
/// ```no_run
/// use argononed::providers::traits::ServiceProvider;
/// use argononed::task_manager::TaskManager;
/// use anyhow::Result;
///
/// struct HeartbeatService;
///
/// #[async_trait::async_trait]
/// impl ServiceProvider for HeartbeatService {
///     async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
///         task_manager.spawn_task("heartbeat".to_string(), |token| async move {
///             token.cancelled().await;
///             Ok(())
///         }).await
///     }
///
///     fn name(&self) -> &'static str { "HeartbeatService" }
///     fn priority(&self) -> i32 { 1 }
/// }
/// ```
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Starts the service in TaskManager.
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()>;

    /// Returns service name for logging and management.
    fn name(&self) -> &'static str;

    /// Returns startup priority (higher numbers start first).
    fn priority(&self) -> i32 {
        0
    }

    /// Indicates if service is critical for system operation.
    fn is_critical(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::{Arc, Mutex};
    use tokio::time::{Duration, sleep};
    use tokio_util::sync::CancellationToken;

    struct CountingProvider {
        value: u8,
        call_count: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl AsyncProvider<u8> for CountingProvider {
        async fn provide(&self) -> Result<u8> {
            *self.call_count.lock().unwrap() += 1;
            Ok(self.value)
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl AsyncProvider<u8> for FailingProvider {
        async fn provide(&self) -> Result<u8> {
            Err(anyhow!("bus not found"))
        }
    }

    struct LoopService {
        name: &'static str,
        priority: i32,
        critical: bool,
        ran: Arc<Mutex<bool>>,
    }

    impl LoopService {
        fn new(name: &'static str, priority: i32, critical: bool) -> Self {
            Self {
                name,
                priority,
                critical,
                ran: Arc::new(Mutex::new(false)),
            }
        }
    }

    #[async_trait]
    impl ServiceProvider for LoopService {
        async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
            let ran = self.ran.clone();
            task_manager
                .spawn_task(self.name.to_string(), move |token: CancellationToken| async move {
                    *ran.lock().unwrap() = true;
                    token.cancelled().await;
                    Ok(())
                })
                .await
        }

        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn is_critical(&self) -> bool {
            self.critical
        }
    }

    struct BrokenService;

    #[async_trait]
    impl ServiceProvider for BrokenService {
        async fn start(&self, _task_manager: &mut TaskManager) -> Result<()> {
            Err(anyhow!("device missing"))
        }

        fn name(&self) -> &'static str {
            "BrokenService"
        }
    }

    #[tokio::test]
    async fn async_provider_counts_calls() {
        let provider = CountingProvider {
            value: 42,
            call_count: Arc::new(Mutex::new(0)),
        };

        for i in 1..=3 {
            assert_eq!(provider.provide().await.unwrap(), 42);
            assert_eq!(*provider.call_count.lock().unwrap(), i);
        }
    }

    #[tokio::test]
    async fn async_provider_errors_propagate() {
        let err = FailingProvider.provide().await.unwrap_err();
        assert_eq!(err.to_string(), "bus not found");
    }

    #[tokio::test]
    async fn service_defaults() {
        assert_eq!(BrokenService.priority(), 0);
        assert!(!BrokenService.is_critical());
    }

    #[tokio::test]
    async fn service_starts_a_task() {
        let mut task_manager = TaskManager::new();
        let service = LoopService::new("loop", 5, true);

        service.start(&mut task_manager).await.unwrap();
        sleep(Duration::from_millis(10)).await;

        assert!(*service.ran.lock().unwrap());
        assert!(task_manager.is_running("loop"));
        task_manager.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn failing_start_spawns_nothing() {
        let mut task_manager = TaskManager::new();
        assert!(BrokenService.start(&mut task_manager).await.is_err());
        assert_eq!(task_manager.active_count(), 0);
    }

    #[tokio::test]
    async fn services_sort_by_priority() {
        let mut services: Vec<Box<dyn ServiceProvider>> = vec![
            Box::new(LoopService::new("display", 5, false)),
            Box::new(BrokenService),
            Box::new(LoopService::new("fan", 10, true)),
            Box::new(LoopService::new("button", 8, true)),
        ];
        services.sort_by_key(|s| std::cmp::Reverse(s.priority()));

        let names: Vec<_> = services.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["fan", "button", "display", "BrokenService"]);
    }
}
