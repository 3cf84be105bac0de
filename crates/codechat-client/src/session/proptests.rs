//! Property tests for the session state machine.

use proptest::prelude::*;

use super::state::{SessionState, Transition};

fn arb_transition() -> impl Strategy<Value = Transition> {
    prop_oneof![
        Just(Transition::Start),
        Just(Transition::ResponseAccepted),
        Just(Transition::Event),
        Just(Transition::Finish),
        Just(Transition::Fail),
        Just(Transition::Cancel),
    ]
}

fn arb_state() -> impl Strategy<Value = SessionState> {
    prop_oneof![
        Just(SessionState::Idle),
        Just(SessionState::Requesting),
        Just(SessionState::Streaming),
        Just(SessionState::Completed),
        Just(SessionState::Failed),
        Just(SessionState::Cancelled),
    ]
}

proptest! {
    #[test]
    fn at_most_one_terminal_transition(inputs in prop::collection::vec(arb_transition(), 0..32)) {
        let mut state = SessionState::Idle;
        let mut terminal_entries = 0;
        for input in inputs {
            if let Ok(next) = state.apply(input) {
                if next.is_terminal() && !state.is_terminal() {
                    terminal_entries += 1;
                }
                state = next;
            }
        }
        prop_assert!(terminal_entries <= 1);
    }

    #[test]
    fn terminal_states_absorb_every_input(state in arb_state(), input in arb_transition()) {
        prop_assume!(state.is_terminal());
        prop_assert!(state.apply(input).is_err());
    }

    #[test]
    fn only_active_states_can_be_cancelled(state in arb_state()) {
        prop_assert_eq!(state.apply(Transition::Cancel).is_ok(), state.is_active());
    }
}
