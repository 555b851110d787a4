use serde::{Deserialize, Serialize};

/// Entries shared by the tray menu and the character's context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuAction {
    OpenSettings,
    NetworkStatus,
    CloseBubble,
    Quit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 4] = [
        MenuAction::OpenSettings,
        MenuAction::NetworkStatus,
        MenuAction::CloseBubble,
        MenuAction::Quit,
    ];

    pub fn id(self) -> &'static str {
        match self {
            MenuAction::OpenSettings => "open_settings",
            MenuAction::NetworkStatus => "network_status",
            MenuAction::CloseBubble => "close_bubble",
            MenuAction::Quit => "quit",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MenuAction::OpenSettings => "設定",
            MenuAction::NetworkStatus => "ネットワーク状態",
            MenuAction::CloseBubble => "吹き出しを閉じる",
            MenuAction::Quit => "閉じる",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_lookup() {
        for action in MenuAction::ALL {
            assert_eq!(MenuAction::from_id(action.id()), Some(action));
        }
        assert_eq!(MenuAction::from_id("open_history"), None);
    }

    #[test]
    fn serde_names_match_menu_ids() {
        for action in MenuAction::ALL {
            let encoded = serde_json::to_string(&action).expect("serialize action");
            assert_eq!(encoded, format!("\"{}\"", action.id()));
        }
    }

    #[test]
    fn labels_are_japanese_menu_text() {
        assert_eq!(MenuAction::Quit.label(), "閉じる");
        assert_eq!(MenuAction::NetworkStatus.label(), "ネットワーク状態");
    }
}
