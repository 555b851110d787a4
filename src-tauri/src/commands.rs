use serde::Serialize;
use tauri::State;
use tauri::ipc::Response;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::dispatch::UiEvent;
use crate::error::AppError;
use crate::geometry::{Point, PointerButton};
use crate::menu::MenuAction;
use crate::metrics::PipelineReport;
use crate::settings::Settings;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    pub service: &'static str,
    pub version: &'static str,
    pub ready: bool,
    pub character_available: bool,
}

fn post(state: &State<'_, AppState>, event: UiEvent) -> Result<(), String> {
    if state.runtime().dispatcher.post(event) {
        Ok(())
    } else {
        Err(AppError::Runtime("ui loop is not running".to_string()).to_string())
    }
}

#[tauri::command]
pub fn app_status(state: State<'_, AppState>) -> Result<AppStatus, String> {
    let runtime = state.runtime();
    Ok(AppStatus {
        service: "mascot-companion",
        version: env!("CARGO_PKG_VERSION"),
        ready: !runtime.dispatcher.is_closed(),
        character_available: runtime.character.is_available(),
    })
}

#[tauri::command]
pub fn pointer_pressed(
    state: State<'_, AppState>,
    button: PointerButton,
    x: f64,
    y: f64,
) -> Result<(), String> {
    post(
        &state,
        UiEvent::PointerPressed {
            button,
            position: Point::new(x, y),
        },
    )
}

#[tauri::command]
pub fn pointer_moved(state: State<'_, AppState>, x: f64, y: f64) -> Result<(), String> {
    post(
        &state,
        UiEvent::PointerMoved {
            position: Point::new(x, y),
        },
    )
}

#[tauri::command]
pub fn pointer_released(state: State<'_, AppState>, button: PointerButton) -> Result<(), String> {
    post(&state, UiEvent::PointerReleased { button })
}

/// Resolves to whether the prompt was accepted. The page keeps the input
/// text when it was not.
#[tauri::command]
pub async fn submit_prompt(state: State<'_, AppState>, prompt: String) -> Result<bool, String> {
    let (reply_tx, reply_rx) = oneshot::channel();
    post(
        &state,
        UiEvent::Submit {
            prompt,
            reply: Some(reply_tx),
        },
    )?;
    let submission = reply_rx.await.map_err(|err| err.to_string())?;
    Ok(submission.accepted())
}

#[tauri::command]
pub fn close_bubble(state: State<'_, AppState>) -> Result<(), String> {
    post(&state, UiEvent::CloseBubble)
}

#[tauri::command]
pub fn menu_action(state: State<'_, AppState>, action: MenuAction) -> Result<(), String> {
    post(&state, UiEvent::Menu(action))
}

#[tauri::command]
pub async fn get_settings(state: State<'_, AppState>) -> Result<Settings, String> {
    let runtime = state.runtime();
    let store = runtime.settings.lock().await;
    Ok(store.current().clone())
}

#[tauri::command]
pub async fn begin_settings_edit(state: State<'_, AppState>) -> Result<Settings, String> {
    let runtime = state.runtime();
    let store = runtime.settings.lock().await;
    Ok(store.begin_edit())
}

#[tauri::command]
pub async fn save_settings(
    state: State<'_, AppState>,
    settings: Settings,
) -> Result<Settings, String> {
    let runtime = state.runtime();
    let mut store = runtime.settings.lock().await;
    let saved = store
        .commit(settings)
        .map_err(|err| AppError::from(err).to_string())?;
    info!(
        character = saved.character_image_file_name.as_str(),
        "settings committed from editor"
    );
    Ok(saved)
}

/// Called when the editor closes, whether or not anything was saved.
#[tauri::command]
pub async fn settings_editor_closed(state: State<'_, AppState>) -> Result<(), String> {
    let current = {
        let runtime = state.runtime();
        let store = runtime.settings.lock().await;
        store.current().clone()
    };
    post(&state, UiEvent::SettingsChanged(current))
}

#[tauri::command]
pub async fn list_characters(state: State<'_, AppState>) -> Result<Vec<String>, String> {
    let runtime = state.runtime();
    let store = runtime.settings.lock().await;
    Ok(store.scan_available_characters())
}

/// Raw PNG bytes of the launch character, or an error when it is missing.
#[tauri::command]
pub async fn character_image(state: State<'_, AppState>) -> Result<Response, String> {
    let runtime = state.runtime();
    if !runtime.character.is_available() {
        return Err("character image unavailable".to_string());
    }
    let path = runtime.character.path.clone();
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(Response::new(bytes)),
        Err(err) => {
            warn!(path = %path.display(), "failed to read character image: {err}");
            Err(err.to_string())
        }
    }
}

#[tauri::command]
pub async fn get_performance_report(
    state: State<'_, AppState>,
) -> Result<PipelineReport, String> {
    let (reply_tx, reply_rx) = oneshot::channel();
    post(&state, UiEvent::ReportRequested(reply_tx))?;
    reply_rx.await.map_err(|err| err.to_string())
}
