use serde::{Deserialize, Serialize};

/// Where a connection is in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    /// Connected but no message handled yet.
    #[default]
    Unstarted,
    Initial,
    AwaitingId,
    AwaitingDescription,
    AwaitingVendor,
    AwaitingReceipt,
    AwaitingAmount,
    AwaitingNext,
    AwaitingFormFill,
    AwaitingScan,
}

impl ChatState {
    /// True for the states of the per-expense loop, which need an open report.
    pub fn in_expense_loop(&self) -> bool {
        matches!(
            self,
            ChatState::AwaitingDescription
                | ChatState::AwaitingVendor
                | ChatState::AwaitingReceipt
                | ChatState::AwaitingAmount
                | ChatState::AwaitingNext
        )
    }
}

impl std::fmt::Display for ChatState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatState::Unstarted => write!(f, "Unstarted"),
            ChatState::Initial => write!(f, "Initial"),
            ChatState::AwaitingId => write!(f, "Awaiting ERR ID"),
            ChatState::AwaitingDescription => write!(f, "Awaiting description"),
            ChatState::AwaitingVendor => write!(f, "Awaiting vendor"),
            ChatState::AwaitingReceipt => write!(f, "Awaiting receipt"),
            ChatState::AwaitingAmount => write!(f, "Awaiting amount"),
            ChatState::AwaitingNext => write!(f, "Awaiting next action"),
            ChatState::AwaitingFormFill => write!(f, "Awaiting form fill"),
            ChatState::AwaitingScan => write!(f, "Awaiting scan upload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unstarted() {
        assert_eq!(ChatState::default(), ChatState::Unstarted);
    }

    #[test]
    fn test_expense_loop_states() {
        assert!(ChatState::AwaitingAmount.in_expense_loop());
        assert!(ChatState::AwaitingNext.in_expense_loop());
        assert!(!ChatState::AwaitingId.in_expense_loop());
        assert!(!ChatState::AwaitingScan.in_expense_loop());
    }

    #[test]
    fn test_serde_name() {
        assert_eq!(
            serde_json::to_string(&ChatState::AwaitingFormFill).unwrap(),
            "\"awaiting_form_fill\""
        );
    }
}
