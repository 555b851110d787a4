use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::dispatch::{UiDispatcher, UiEvent, UiReceiver};
use crate::generator::ResponseGenerator;
use crate::geometry::{
    DragState, GeometryController, PixelPoint, Point, PointerButton, Size, WorkArea,
    initial_size_for_image,
};
use crate::menu::MenuAction;
use crate::metrics::PipelineReport;
use crate::pipeline::{
    PipelineState, REQUEST_TIMEOUT, Readiness, RequestOutcome, RequestPipeline, RequestToken,
    Submission,
};
use crate::probe::{NetworkProbe, NetworkStatus};
use crate::settings::Settings;
use crate::speech::{BubbleStyle, SpeechBubbleState, SpeechState, SpeechSurface};

/// Everything a view needs to draw the companion after an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewFrame {
    pub position: PixelPoint,
    pub size: Size,
    pub image_top_margin: f64,
    pub bubble: SpeechBubbleState,
    pub style: BubbleStyle,
    pub drag: DragState,
    pub request: PipelineState,
    pub readiness: Readiness,
}

/// Window-side effects of the UI loop. The shell backs this with the Tauri
/// window; tests record calls.
pub trait CompanionView: Send {
    fn render(&mut self, frame: &ViewFrame);

    fn open_context_menu(&mut self);

    fn open_settings_editor(&mut self);

    fn exit(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    DismissedBubble,
    DragStarted,
    ContextMenu,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct CompanionConfig {
    pub settings: Settings,
    pub initial_size: Size,
    pub request_timeout: Duration,
}

impl CompanionConfig {
    pub fn new(settings: Settings, initial_size: Size) -> Self {
        Self {
            settings,
            initial_size,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self::new(Settings::default(), initial_size_for_image(None))
    }
}

/// The interaction engine. Owned by the UI loop; all mutation happens in
/// the named transitions below.
pub struct Companion {
    geometry: GeometryController,
    speech: SpeechState,
    pipeline: RequestPipeline,
    settings: Settings,
    style: BubbleStyle,
    probe: Arc<dyn NetworkProbe>,
    dispatcher: UiDispatcher,
}

impl Companion {
    pub fn new(
        config: CompanionConfig,
        generator: Arc<dyn ResponseGenerator>,
        probe: Arc<dyn NetworkProbe>,
        dispatcher: UiDispatcher,
    ) -> Self {
        let pipeline = RequestPipeline::new(generator, dispatcher.clone())
            .with_timeout(config.request_timeout);
        Self {
            geometry: GeometryController::new(config.initial_size),
            speech: SpeechState::new(),
            pipeline,
            style: BubbleStyle::from_settings(&config.settings),
            settings: config.settings,
            probe,
            dispatcher,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn frame(&self) -> ViewFrame {
        let geometry = self.geometry.geometry();
        ViewFrame {
            position: geometry.position,
            size: geometry.size,
            image_top_margin: self.geometry.image_top_margin(),
            bubble: self.speech.bubble().clone(),
            style: self.style,
            drag: self.geometry.drag_state(),
            request: self.pipeline.state(),
            readiness: self.pipeline.readiness(),
        }
    }

    pub fn report(&self) -> PipelineReport {
        self.pipeline.metrics().report()
    }

    /// Window shown (or shown again): forget any drag, snap to the startup
    /// corner, and start loading the generator on first open.
    pub fn open_window(&mut self, screen: Option<WorkArea>) {
        self.geometry.reset();
        if screen.is_none() {
            debug!("no screen available; keeping current window position");
        }
        self.geometry.position_at_corner(
            self.settings.startup_corner,
            self.settings.margin(),
            screen,
        );
        self.pipeline.start_initialization();
    }

    /// A press on a visible bubble only dismisses it; it never also starts
    /// a drag.
    pub fn press(&mut self, button: PointerButton, position: Point) -> PressOutcome {
        if self.speech.is_visible() {
            self.speech.dismiss(&mut self.geometry);
            return PressOutcome::DismissedBubble;
        }

        match button {
            PointerButton::Left => {
                self.geometry.begin_drag(position);
                PressOutcome::DragStarted
            }
            PointerButton::Right => PressOutcome::ContextMenu,
            PointerButton::Middle | PointerButton::Other => PressOutcome::Ignored,
        }
    }

    pub fn move_pointer(&mut self, position: Point) -> Option<PixelPoint> {
        self.geometry.update_drag(position)
    }

    pub fn release(&mut self, button: PointerButton) {
        self.geometry.release(button);
    }

    pub fn submit(&mut self, prompt: &str) -> Submission {
        let mut surface = SpeechSurface::new(&mut self.speech, &mut self.geometry);
        self.pipeline.submit(prompt, &mut surface)
    }

    pub fn close_bubble(&mut self) {
        self.speech.dismiss(&mut self.geometry);
    }

    pub fn show_notice(&mut self, text: impl Into<String>) {
        self.speech.show(text, &mut self.geometry);
    }

    pub fn finish_initialization(&mut self, result: Result<(), String>) {
        let mut surface = SpeechSurface::new(&mut self.speech, &mut self.geometry);
        self.pipeline.finish_initialization(result, &mut surface);
    }

    pub fn resolve(&mut self, token: RequestToken, outcome: RequestOutcome) -> bool {
        let mut surface = SpeechSurface::new(&mut self.speech, &mut self.geometry);
        self.pipeline.resolve(token, outcome, &mut surface)
    }

    /// Picks up corner, margin, and colors after the settings editor
    /// closed. The character image is only read at startup.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.style = BubbleStyle::from_settings(&settings);
        info!(
            corner = settings.startup_corner.label(),
            margin = settings.margin(),
            "settings refreshed"
        );
        self.settings = settings;
    }

    /// Runs the network probe on the blocking pool and reports back as a
    /// notice.
    pub fn check_network(&self) {
        let probe = Arc::clone(&self.probe);
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let status = match tokio::task::spawn_blocking(move || probe.check_status()).await {
                Ok(status) => status,
                Err(err) => NetworkStatus::Error(err.to_string()),
            };
            dispatcher.post(UiEvent::Notice(status.message()));
        });
    }

    pub fn handle_menu(&mut self, action: MenuAction, view: &mut dyn CompanionView) -> Flow {
        debug!(action = action.id(), "menu action");
        match action {
            MenuAction::OpenSettings => view.open_settings_editor(),
            MenuAction::NetworkStatus => self.check_network(),
            MenuAction::CloseBubble => self.close_bubble(),
            MenuAction::Quit => {
                info!("quit requested from menu");
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    pub fn handle(&mut self, event: UiEvent, view: &mut dyn CompanionView) -> Flow {
        match event {
            UiEvent::WindowOpened { screen } => self.open_window(screen),
            UiEvent::PointerPressed { button, position } => {
                if self.press(button, position) == PressOutcome::ContextMenu {
                    view.open_context_menu();
                }
            }
            UiEvent::PointerMoved { position } => {
                self.move_pointer(position);
            }
            UiEvent::PointerReleased { button } => self.release(button),
            UiEvent::Submit { prompt, reply } => {
                let submission = self.submit(&prompt);
                if let Some(reply) = reply {
                    if reply.send(submission).is_err() {
                        debug!("submit requester went away");
                    }
                }
            }
            UiEvent::CloseBubble => self.close_bubble(),
            UiEvent::Menu(action) => return self.handle_menu(action, view),
            UiEvent::GeneratorInitialized(result) => self.finish_initialization(result),
            UiEvent::RequestResolved { token, outcome } => {
                self.resolve(token, outcome);
            }
            UiEvent::Notice(text) => self.show_notice(text),
            UiEvent::SettingsChanged(settings) => self.apply_settings(settings),
            UiEvent::ReportRequested(reply) => {
                if reply.send(self.report()).is_err() {
                    debug!("report requester went away");
                }
            }
            UiEvent::Shutdown => return Flow::Exit,
        }
        Flow::Continue
    }
}

/// Processes events one at a time until the channel closes or an event asks
/// to exit. A frame is rendered after each event, so nothing is drawn before
/// the first one arrives. Returns the companion for inspection.
pub async fn run_ui_loop<V: CompanionView>(
    mut companion: Companion,
    mut events: UiReceiver,
    view: &mut V,
) -> Companion {
    info!("ui loop started");

    while let Some(event) = events.recv().await {
        let flow = companion.handle(event, view);
        view.render(&companion.frame());
        if flow == Flow::Exit {
            view.exit();
            break;
        }
    }

    info!("ui loop stopped");
    companion
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{NOT_READY_MESSAGE, READY_MESSAGE, RejectReason, THINKING_MESSAGE};
    use crate::settings::Corner;
    use crate::test_utils::ScriptedGenerator;
    use tokio::sync::oneshot;

    const INITIAL: Size = Size {
        width: 300.0,
        height: 580.0,
    };

    struct StaticProbe(NetworkStatus);

    impl NetworkProbe for StaticProbe {
        fn check_status(&self) -> NetworkStatus {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct RecordingView {
        frames: Vec<ViewFrame>,
        context_menus: usize,
        editor_opens: usize,
        exited: bool,
    }

    impl CompanionView for RecordingView {
        fn render(&mut self, frame: &ViewFrame) {
            self.frames.push(frame.clone());
        }

        fn open_context_menu(&mut self) {
            self.context_menus += 1;
        }

        fn open_settings_editor(&mut self) {
            self.editor_opens += 1;
        }

        fn exit(&mut self) {
            self.exited = true;
        }
    }

    fn companion_with(
        generator: Arc<ScriptedGenerator>,
        probe: NetworkStatus,
    ) -> (Companion, UiDispatcher, UiReceiver) {
        let (dispatcher, rx) = UiDispatcher::channel();
        let companion = Companion::new(
            CompanionConfig::new(Settings::default(), INITIAL),
            generator,
            Arc::new(StaticProbe(probe)),
            dispatcher.clone(),
        );
        (companion, dispatcher, rx)
    }

    fn companion() -> (Companion, UiDispatcher, UiReceiver) {
        companion_with(
            Arc::new(ScriptedGenerator::echoing(Duration::from_millis(100))),
            NetworkStatus::Connected,
        )
    }

    fn screen() -> Option<WorkArea> {
        Some(WorkArea::new(0, 25, 1920, 1055))
    }

    #[test]
    fn press_on_visible_bubble_dismisses_without_dragging() {
        let (mut companion, _dispatcher, _rx) = companion();
        companion.show_notice("hello");
        assert!(companion.frame().bubble.visible);

        let outcome = companion.press(PointerButton::Left, Point::new(10.0, 10.0));
        assert_eq!(outcome, PressOutcome::DismissedBubble);

        let frame = companion.frame();
        assert!(!frame.bubble.visible);
        assert_eq!(frame.drag, DragState::Idle);
        assert_eq!(frame.size, INITIAL);
        assert_eq!(frame.image_top_margin, 0.0);
        assert_eq!(companion.move_pointer(Point::new(60.0, 60.0)), None);
    }

    #[test]
    fn left_press_drags_by_truncated_delta() {
        let (mut companion, _dispatcher, _rx) = companion();
        assert_eq!(
            companion.press(PointerButton::Left, Point::new(10.0, 10.0)),
            PressOutcome::DragStarted
        );
        assert_eq!(
            companion.move_pointer(Point::new(15.7, 7.2)),
            Some(PixelPoint::new(5, -2))
        );

        companion.release(PointerButton::Right);
        assert_eq!(companion.frame().drag, DragState::Dragging);
        companion.release(PointerButton::Left);
        assert_eq!(companion.frame().drag, DragState::Idle);
    }

    #[test]
    fn right_press_opens_context_menu_only_when_bubble_hidden() {
        let (mut companion, _dispatcher, _rx) = companion();
        let mut view = RecordingView::default();
        let press = || UiEvent::PointerPressed {
            button: PointerButton::Right,
            position: Point::new(5.0, 5.0),
        };

        companion.handle(press(), &mut view);
        assert_eq!(view.context_menus, 1);
        assert_eq!(companion.frame().drag, DragState::Idle);

        companion.show_notice("busy");
        companion.handle(press(), &mut view);
        assert_eq!(view.context_menus, 1);
        assert!(!companion.frame().bubble.visible);
    }

    #[tokio::test]
    async fn opening_window_resets_drag_and_snaps_to_corner() {
        let (mut companion, _dispatcher, _rx) = companion();
        companion.press(PointerButton::Left, Point::new(1.0, 1.0));

        companion.open_window(screen());

        let frame = companion.frame();
        assert_eq!(frame.drag, DragState::Idle);
        assert_eq!(frame.position, PixelPoint::new(1600, 480));
        assert_eq!(frame.readiness, Readiness::Loading);
    }

    #[tokio::test]
    async fn opening_without_screen_keeps_position() {
        let (mut companion, _dispatcher, _rx) = companion();
        companion.open_window(None);
        assert_eq!(companion.frame().position, PixelPoint::default());
    }

    #[tokio::test]
    async fn settings_change_refreshes_style_and_corner() {
        let (mut companion, _dispatcher, _rx) = companion();
        let mut view = RecordingView::default();
        let settings = Settings {
            speech_bubble_background_color: "#112233".to_string(),
            startup_corner: Corner::TopLeft,
            screen_margin: 0,
            ..Settings::default()
        };

        companion.handle(UiEvent::SettingsChanged(settings), &mut view);
        companion.open_window(screen());

        let frame = companion.frame();
        assert_eq!(frame.style.background.to_string(), "#112233");
        assert_eq!(frame.position, PixelPoint::new(0, 25));
    }

    #[test]
    fn menu_actions_route_through_table() {
        let (mut companion, _dispatcher, _rx) = companion();
        let mut view = RecordingView::default();

        assert_eq!(
            companion.handle(UiEvent::Menu(MenuAction::OpenSettings), &mut view),
            Flow::Continue
        );
        assert_eq!(view.editor_opens, 1);

        companion.show_notice("hello");
        companion.handle(UiEvent::Menu(MenuAction::CloseBubble), &mut view);
        assert!(!companion.frame().bubble.visible);

        assert_eq!(
            companion.handle(UiEvent::Menu(MenuAction::Quit), &mut view),
            Flow::Exit
        );
    }

    #[tokio::test]
    async fn network_status_comes_back_as_notice() {
        let (mut companion, _dispatcher, mut rx) = companion_with(
            Arc::new(ScriptedGenerator::echoing(Duration::ZERO)),
            NetworkStatus::Disconnected,
        );
        let mut view = RecordingView::default();

        companion.handle(UiEvent::Menu(MenuAction::NetworkStatus), &mut view);
        let event = rx.recv().await.expect("notice event");
        companion.handle(event, &mut view);

        assert_eq!(
            companion.frame().bubble.text,
            NetworkStatus::Disconnected.message()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn submit_before_generator_loads_shows_loading_message() {
        let (mut companion, _dispatcher, _rx) = companion();
        companion.open_window(screen());

        assert_eq!(companion.submit("hello"), Submission::NotReady);
        let frame = companion.frame();
        assert_eq!(frame.bubble.text, NOT_READY_MESSAGE);
        assert_eq!(frame.request, PipelineState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn ui_loop_serializes_background_results() {
        let (companion, dispatcher, rx) = companion();
        let ui = tokio::spawn(async move {
            let mut view = RecordingView::default();
            let companion = run_ui_loop(companion, rx, &mut view).await;
            (companion, view)
        });

        dispatcher.post(UiEvent::WindowOpened { screen: screen() });
        tokio::time::sleep(Duration::from_millis(10)).await;

        dispatcher.post(UiEvent::Submit {
            prompt: "hi".to_string(),
            reply: None,
        });
        dispatcher.post(UiEvent::Submit {
            prompt: "again".to_string(),
            reply: None,
        });
        tokio::time::sleep(Duration::from_secs(1)).await;

        let (reply_tx, reply_rx) = oneshot::channel();
        dispatcher.post(UiEvent::ReportRequested(reply_tx));
        let report = reply_rx.await.expect("report");
        assert_eq!(report.completed, 1);
        assert_eq!(report.rejected, 1);

        dispatcher.post(UiEvent::Menu(MenuAction::Quit));
        let (companion, view) = ui.await.expect("ui loop task");

        assert!(view.exited);
        let texts: Vec<&str> = view
            .frames
            .iter()
            .map(|frame| frame.bubble.text.as_str())
            .collect();
        assert!(texts.contains(&READY_MESSAGE));
        assert!(texts.contains(&THINKING_MESSAGE));
        assert_eq!(companion.frame().bubble.text, "re:hi");
        assert_eq!(companion.frame().request, PipelineState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn first_rendered_frame_is_already_at_startup_corner() {
        let (mut reference, _reference_dispatcher, _reference_rx) = companion();
        reference.open_window(screen());
        let (companion, dispatcher, rx) = companion();
        let ui = tokio::spawn(async move {
            let mut view = RecordingView::default();
            run_ui_loop(companion, rx, &mut view).await;
            view
        });

        dispatcher.post(UiEvent::WindowOpened { screen: screen() });
        dispatcher.post(UiEvent::Shutdown);
        let view = ui.await.expect("ui loop task");

        let first = view.frames.first().expect("rendered frame");
        assert_eq!(first.position, reference.frame().position);
        assert_ne!(first.position, PixelPoint::default());
    }

    #[tokio::test(start_paused = true)]
    async fn submit_reply_reports_rejection_while_in_flight() {
        let (companion, dispatcher, rx) = companion();
        let ui = tokio::spawn(async move {
            let mut view = RecordingView::default();
            run_ui_loop(companion, rx, &mut view).await;
        });

        dispatcher.post(UiEvent::WindowOpened { screen: screen() });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let (first_tx, first_rx) = oneshot::channel();
        dispatcher.post(UiEvent::Submit {
            prompt: "A".to_string(),
            reply: Some(first_tx),
        });
        let (second_tx, second_rx) = oneshot::channel();
        dispatcher.post(UiEvent::Submit {
            prompt: "B".to_string(),
            reply: Some(second_tx),
        });

        let first = first_rx.await.expect("first reply");
        let second = second_rx.await.expect("second reply");
        assert!(matches!(first, Submission::Started(_)));
        assert!(first.accepted());
        assert_eq!(second, Submission::Rejected(RejectReason::InFlight));
        assert!(!second.accepted());

        dispatcher.post(UiEvent::Shutdown);
        ui.await.expect("ui loop task");
    }
}
