//! Dependency injection providers for service management.
//!
//! The application state is built by [`AppStateProvider`]; the three loops
//! of the daemon are started by one [`ServiceProvider`] each.

pub mod app_state;
pub mod button;
pub mod display;
pub mod fan;
pub mod traits;

// Re-export core types for convenience
pub use app_state::AppStateProvider;
pub use button::ButtonServiceProvider;
pub use display::DisplayServiceProvider;
pub use fan::FanServiceProvider;
pub use traits::{AsyncProvider, ServiceProvider};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::{app_context::testing, config::Config};

    #[tokio::test]
    async fn provider_metadata() {
        let state = testing::state(Config::default());

        let fan = FanServiceProvider::new(state.clone());
        let button = ButtonServiceProvider::new(state.clone());
        let display = DisplayServiceProvider::new(state.clone());

        assert_eq!(fan.name(), "FanService");
        assert_eq!(button.name(), "ButtonService");
        assert_eq!(display.name(), "DisplayService");

        // The fan loop must be running before the button can stop it.
        assert!(fan.priority() > button.priority());
        assert!(button.priority() > display.priority());

        assert!(fan.is_critical());
        assert!(button.is_critical());
        assert!(!display.is_critical());
    }

    #[tokio::test]
    async fn providers_share_one_state() {
        let state = testing::state(Config::default());
        let before = std::sync::Arc::strong_count(&state);

        let providers: Vec<Box<dyn ServiceProvider>> = vec![
            Box::new(FanServiceProvider::new(state.clone())),
            Box::new(ButtonServiceProvider::new(state.clone())),
            Box::new(DisplayServiceProvider::new(state.clone())),
        ];

        assert_eq!(std::sync::Arc::strong_count(&state), before + providers.len());
        drop(providers);
        assert_eq!(std::sync::Arc::strong_count(&state), before);
    }
}
