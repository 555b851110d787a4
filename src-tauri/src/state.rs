use std::sync::Arc;

use tokio::sync::Mutex;

use crate::assets::CharacterAsset;
use crate::dispatch::UiDispatcher;
use crate::settings::SettingsStore;

pub struct RuntimeState {
    pub dispatcher: UiDispatcher,
    pub settings: Mutex<SettingsStore>,
    /// Image chosen at launch. Changing the character takes effect on the
    /// next start.
    pub character: CharacterAsset,
}

#[derive(Clone)]
pub struct AppState {
    runtime: Arc<RuntimeState>,
}

impl AppState {
    pub fn new(
        dispatcher: UiDispatcher,
        settings: SettingsStore,
        character: CharacterAsset,
    ) -> Self {
        let runtime = RuntimeState {
            dispatcher,
            settings: Mutex::new(settings),
            character,
        };
        Self {
            runtime: Arc::new(runtime),
        }
    }

    pub fn runtime(&self) -> Arc<RuntimeState> {
        Arc::clone(&self.runtime)
    }
}
