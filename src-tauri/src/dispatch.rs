use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::geometry::{Point, PointerButton, WorkArea};
use crate::menu::MenuAction;
use crate::metrics::PipelineReport;
use crate::pipeline::{RequestOutcome, RequestToken, Submission};
use crate::settings::Settings;

/// Everything the UI loop reacts to. Background work reports back through
/// these events instead of touching companion state.
#[derive(Debug)]
pub enum UiEvent {
    WindowOpened {
        screen: Option<WorkArea>,
    },
    PointerPressed {
        button: PointerButton,
        position: Point,
    },
    PointerMoved {
        position: Point,
    },
    PointerReleased {
        button: PointerButton,
    },
    /// `reply` receives the submission outcome when the caller needs it.
    Submit {
        prompt: String,
        reply: Option<oneshot::Sender<Submission>>,
    },
    CloseBubble,
    Menu(MenuAction),
    GeneratorInitialized(Result<(), String>),
    RequestResolved {
        token: RequestToken,
        outcome: RequestOutcome,
    },
    Notice(String),
    SettingsChanged(Settings),
    ReportRequested(oneshot::Sender<PipelineReport>),
    Shutdown,
}

/// Posts events to the UI loop. Cheap to clone and safe to use from any
/// thread or task.
#[derive(Debug, Clone)]
pub struct UiDispatcher {
    tx: mpsc::UnboundedSender<UiEvent>,
}

pub type UiReceiver = mpsc::UnboundedReceiver<UiEvent>;

impl UiDispatcher {
    pub fn channel() -> (Self, UiReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns `false` once the UI loop has stopped.
    pub fn post(&self, event: UiEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                debug!(?event, "ui loop closed; event dropped");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_post_order() {
        let (dispatcher, mut rx) = UiDispatcher::channel();
        let background = dispatcher.clone();
        assert!(dispatcher.post(UiEvent::CloseBubble));
        assert!(background.post(UiEvent::Notice("done".to_string())));

        assert!(matches!(rx.recv().await, Some(UiEvent::CloseBubble)));
        assert!(matches!(rx.recv().await, Some(UiEvent::Notice(text)) if text == "done"));
    }

    #[test]
    fn post_after_loop_exit_reports_closed() {
        let (dispatcher, rx) = UiDispatcher::channel();
        drop(rx);
        assert!(dispatcher.is_closed());
        assert!(!dispatcher.post(UiEvent::Shutdown));
    }
}
