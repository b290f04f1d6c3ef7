//! Input handling.
//!
//! In a real client this would integrate with windowing and key bindings.
//! Here it only turns sampled key state into a `UserCommand`.

use arena_shared::command::{Actions, UserCommand};

/// Held keys at a moment in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    pub up: bool,
    pub down: bool,
}

impl InputState {
    pub fn actions(self) -> Actions {
        let mut actions = Actions::empty();
        actions.set(Actions::UP, self.up);
        actions.set(Actions::DOWN, self.down);
        actions
    }
}

/// Turns sampled input into a command.
pub fn build_command(input: InputState) -> UserCommand {
    UserCommand::new(input.actions())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_map_to_bits() {
        let cmd = build_command(InputState { up: true, down: false });
        assert_eq!(cmd.encode(), [1, 0, 0, 0]);
        let both = build_command(InputState { up: true, down: true });
        assert_eq!(both.actions, Actions::UP | Actions::DOWN);
        assert_eq!(build_command(InputState::default()).encode(), [0; 4]);
    }
}
