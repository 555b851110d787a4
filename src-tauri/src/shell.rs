use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use tauri::menu::{IsMenuItem, Menu, MenuItem};
use tauri::tray::TrayIconBuilder;
use tauri::{
    Emitter, LogicalPosition, LogicalSize, Manager, RunEvent, WebviewWindow, WindowEvent, Wry,
};
use tracing::{error, info, warn};

use crate::assets::{CharacterAsset, RESOURCES_DIR_NAME, default_resources_dir};
use crate::commands;
use crate::companion::{Companion, CompanionConfig, CompanionView, ViewFrame, run_ui_loop};
use crate::dispatch::{UiDispatcher, UiEvent};
use crate::error::AppError;
use crate::generator::CannedGenerator;
use crate::geometry::WorkArea;
use crate::menu::MenuAction;
use crate::probe::TcpProbe;
use crate::settings::{SETTINGS_FILE_NAME, SettingsStore, default_settings_path};
use crate::state::AppState;

const MAIN_WINDOW_LABEL: &str = "main";
const EVENT_COMPANION_FRAME: &str = "companion_frame";
const EVENT_OPEN_SETTINGS_EDITOR: &str = "open_settings_editor";

type SetupResult<T> = Result<T, Box<dyn Error>>;

/// Drives the Tauri window from the UI loop's frames.
struct TauriView {
    app_handle: tauri::AppHandle,
    window: WebviewWindow,
    last_frame: Option<ViewFrame>,
}

impl TauriView {
    fn new(app_handle: tauri::AppHandle, window: WebviewWindow) -> Self {
        Self {
            app_handle,
            window,
            last_frame: None,
        }
    }
}

impl CompanionView for TauriView {
    fn render(&mut self, frame: &ViewFrame) {
        let previous = self.last_frame.as_ref();
        if previous.is_none_or(|last| last.position != frame.position) {
            let position = LogicalPosition::new(frame.position.x, frame.position.y);
            if let Err(err) = self.window.set_position(position) {
                warn!("failed to move main window: {err}");
            }
        }
        if previous.is_none_or(|last| last.size != frame.size) {
            let size = LogicalSize::new(frame.size.width, frame.size.height);
            if let Err(err) = self.window.set_size(size) {
                warn!("failed to resize main window: {err}");
            }
        }
        if let Err(err) = self.app_handle.emit(EVENT_COMPANION_FRAME, frame) {
            warn!(
                event_name = EVENT_COMPANION_FRAME,
                "failed to emit event: {err}"
            );
        }
        self.last_frame = Some(frame.clone());
    }

    fn open_context_menu(&mut self) {
        let result = build_action_menu(&self.app_handle)
            .and_then(|menu| self.window.popup_menu(&menu));
        if let Err(err) = result {
            warn!("failed to open context menu: {err}");
        }
    }

    fn open_settings_editor(&mut self) {
        if let Err(err) = self.window.show() {
            warn!("failed to show main window for settings: {err}");
        }
        if let Err(err) = self.window.set_focus() {
            warn!("failed to focus main window for settings: {err}");
        }
        if let Err(err) = self.app_handle.emit(EVENT_OPEN_SETTINGS_EDITOR, ()) {
            warn!(
                event_name = EVENT_OPEN_SETTINGS_EDITOR,
                "failed to emit event: {err}"
            );
        }
    }

    fn exit(&mut self) {
        info!("exiting application");
        self.app_handle.exit(0);
    }
}

fn build_action_menu<M: Manager<Wry>>(manager: &M) -> tauri::Result<Menu<Wry>> {
    let items = MenuAction::ALL
        .iter()
        .map(|action| {
            MenuItem::with_id(manager, action.id(), action.label(), true, None::<&str>)
        })
        .collect::<tauri::Result<Vec<_>>>()?;
    let item_refs = items
        .iter()
        .map(|item| item as &dyn IsMenuItem<Wry>)
        .collect::<Vec<_>>();
    Menu::with_items(manager, &item_refs)
}

/// Tray and context menu share one table, so one handler covers both.
fn setup_menus(app: &mut tauri::App, dispatcher: UiDispatcher) -> SetupResult<()> {
    let menu = build_action_menu(app)?;

    TrayIconBuilder::new()
        .icon(tauri::include_image!("./icons/icon.png"))
        .menu(&menu)
        .show_menu_on_left_click(true)
        .build(app)?;

    app.on_menu_event(move |_app_handle, event| {
        let id: &str = event.id().as_ref();
        match MenuAction::from_id(id) {
            Some(action) => {
                dispatcher.post(UiEvent::Menu(action));
            }
            None => warn!(id, "unknown menu id"),
        }
    });
    Ok(())
}

fn resolve_settings_path(app: &tauri::App) -> Result<PathBuf, AppError> {
    match app.path().app_config_dir() {
        Ok(dir) => Ok(dir.join(SETTINGS_FILE_NAME)),
        Err(err) => {
            warn!("failed to resolve app config dir; using user config dir: {err}");
            Ok(default_settings_path()?)
        }
    }
}

fn resolve_resources_dir(app: &tauri::App) -> PathBuf {
    let local = default_resources_dir();
    if local.is_dir() {
        return local;
    }
    match app.path().resource_dir() {
        Ok(dir) => dir.join(RESOURCES_DIR_NAME),
        Err(err) => {
            warn!("failed to resolve bundled resource dir: {err}");
            local
        }
    }
}

/// Work area of the primary screen in logical pixels.
fn primary_work_area(window: &WebviewWindow) -> Option<WorkArea> {
    let monitor = match window.primary_monitor() {
        Ok(Some(monitor)) => monitor,
        Ok(None) => {
            warn!("no primary monitor reported");
            return None;
        }
        Err(err) => {
            warn!("failed to query primary monitor: {err}");
            return None;
        }
    };

    let scale = monitor.scale_factor();
    let area = monitor.work_area();
    Some(WorkArea::new(
        (f64::from(area.position.x) / scale) as i32,
        (f64::from(area.position.y) / scale) as i32,
        (f64::from(area.size.width) / scale) as u32,
        (f64::from(area.size.height) / scale) as u32,
    ))
}

fn setup_app(app: &mut tauri::App) -> SetupResult<()> {
    let store = SettingsStore::open(resolve_settings_path(app)?, resolve_resources_dir(app));
    let settings = store.current().clone();
    let character =
        CharacterAsset::locate(store.resources_dir(), &settings.character_image_file_name);
    let initial_size = character.initial_window_size();

    let window = app
        .get_webview_window(MAIN_WINDOW_LABEL)
        .ok_or_else(|| AppError::Runtime("main window not found".to_string()))?;
    if let Err(err) = window.set_icon(tauri::include_image!("./icons/icon.png")) {
        warn!("failed to set main window icon: {err}");
    }
    let screen = primary_work_area(&window);

    let (dispatcher, events) = UiDispatcher::channel();
    let companion = Companion::new(
        CompanionConfig::new(settings, initial_size),
        Arc::new(CannedGenerator::new()),
        Arc::new(TcpProbe::default()),
        dispatcher.clone(),
    );
    let mut view = TauriView::new(app.handle().clone(), window);
    tauri::async_runtime::spawn(async move {
        run_ui_loop(companion, events, &mut view).await;
    });

    app.manage(AppState::new(dispatcher.clone(), store, character));
    setup_menus(app, dispatcher.clone())?;
    dispatcher.post(UiEvent::WindowOpened { screen });
    Ok(())
}

fn handle_run_event(app_handle: &tauri::AppHandle, event: RunEvent) {
    if let RunEvent::WindowEvent {
        label,
        event: WindowEvent::CloseRequested { api, .. },
        ..
    } = event
    {
        if label == MAIN_WINDOW_LABEL {
            api.prevent_close();
            let posted = app_handle
                .try_state::<AppState>()
                .is_some_and(|state| state.runtime().dispatcher.post(UiEvent::Shutdown));
            if !posted {
                app_handle.exit(0);
            }
        }
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    if let Err(init_err) = crate::init_logging() {
        eprintln!("logging bootstrap failed: {init_err}");
    }

    info!("starting mascot companion");

    let builder = tauri::Builder::default()
        .setup(setup_app)
        .invoke_handler(tauri::generate_handler![
            commands::app_status,
            commands::pointer_pressed,
            commands::pointer_moved,
            commands::pointer_released,
            commands::submit_prompt,
            commands::close_bubble,
            commands::menu_action,
            commands::get_settings,
            commands::begin_settings_edit,
            commands::save_settings,
            commands::settings_editor_closed,
            commands::list_characters,
            commands::character_image,
            commands::get_performance_report
        ]);

    let app = match builder.build(tauri::generate_context!()) {
        Ok(app) => app,
        Err(build_err) => {
            error!("failed to build tauri app: {build_err}");
            return;
        }
    };

    app.run(handle_run_event);
}
