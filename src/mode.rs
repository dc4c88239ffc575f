//! Key-driven mode state machine.
//!
//! The controller owns the active stage. It keeps no history: every
//! transition depends only on the key just polled, never on how the current
//! stage was reached. `Terminated` is absorbing.

use std::collections::HashMap;

use crate::filter::StageKind;

/// A key polled from the display sink.
///
/// Letters are carried as their ASCII code; Escape is 27.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: u32,
}

impl KeyEvent {
    pub const ESCAPE: KeyEvent = KeyEvent { code: 27 };

    pub fn new(code: u32) -> Self {
        Self { code }
    }

    pub fn char(c: char) -> Self {
        Self { code: c as u32 }
    }

    /// Letter keys fold to lowercase; other codes pass through.
    fn normalized(self) -> Self {
        match char::from_u32(self.code) {
            Some(c) if c.is_ascii_uppercase() => Self::char(c.to_ascii_lowercase()),
            _ => self,
        }
    }
}

impl std::fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match char::from_u32(self.code) {
            _ if *self == KeyEvent::ESCAPE => write!(f, "ESC"),
            Some(c) if c.is_ascii_graphic() => write!(f, "'{}'", c),
            _ => write!(f, "key {}", self.code),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Select(StageKind),
    Terminate,
}

/// Key table consulted by the controller.
#[derive(Clone, Debug)]
pub struct KeyBindings {
    actions: HashMap<KeyEvent, Action>,
}

impl KeyBindings {
    /// `P`/`B`/`F`/`C` select a stage, `Q` and Esc quit.
    pub fn filters() -> Self {
        let mut actions = HashMap::new();
        actions.insert(KeyEvent::char('p'), Action::Select(StageKind::Preview));
        actions.insert(KeyEvent::char('b'), Action::Select(StageKind::Blur));
        actions.insert(KeyEvent::char('f'), Action::Select(StageKind::Features));
        actions.insert(KeyEvent::char('c'), Action::Select(StageKind::Edges));
        actions.insert(KeyEvent::char('q'), Action::Terminate);
        actions.insert(KeyEvent::ESCAPE, Action::Terminate);
        Self { actions }
    }

    /// Plain preview: only Esc does anything.
    pub fn preview_only() -> Self {
        let mut actions = HashMap::new();
        actions.insert(KeyEvent::ESCAPE, Action::Terminate);
        Self { actions }
    }

    fn lookup(&self, key: KeyEvent) -> Option<Action> {
        self.actions.get(&key.normalized()).copied()
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::filters()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Active(StageKind),
    Terminated,
}

/// Outcome of feeding one key to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Switched { from: StageKind, to: StageKind },
    Terminated,
}

pub struct ModeController {
    mode: Mode,
    bindings: KeyBindings,
}

impl ModeController {
    /// Filter-tool bindings, starting in Preview.
    pub fn new() -> Self {
        Self::with_bindings(KeyBindings::filters())
    }

    pub fn with_bindings(bindings: KeyBindings) -> Self {
        Self {
            mode: Mode::Active(StageKind::Preview),
            bindings,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Stage to apply this tick, `None` once terminated.
    pub fn active_stage(&self) -> Option<StageKind> {
        match self.mode {
            Mode::Active(kind) => Some(kind),
            Mode::Terminated => None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.mode == Mode::Terminated
    }

    pub fn handle_key(&mut self, key: Option<KeyEvent>) -> Transition {
        let Mode::Active(current) = self.mode else {
            return Transition::Unchanged;
        };
        let Some(key) = key else {
            return Transition::Unchanged;
        };
        match self.bindings.lookup(key) {
            None => {
                log::trace!("ModeController: ignoring {}", key);
                Transition::Unchanged
            }
            Some(Action::Terminate) => {
                log::debug!("ModeController: {} requested termination", key);
                self.mode = Mode::Terminated;
                Transition::Terminated
            }
            Some(Action::Select(next)) if next == current => Transition::Unchanged,
            Some(Action::Select(next)) => {
                log::debug!("ModeController: {} -> {}", current, next);
                self.mode = Mode::Active(next);
                Transition::Switched {
                    from: current,
                    to: next,
                }
            }
        }
    }

    /// Force termination (Ctrl-C). Returns whether the mode changed.
    pub fn terminate(&mut self) -> bool {
        let changed = !self.is_terminated();
        self.mode = Mode::Terminated;
        changed
    }
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(controller: &mut ModeController, c: char) -> Transition {
        controller.handle_key(Some(KeyEvent::char(c)))
    }

    #[test]
    fn starts_in_preview() {
        let controller = ModeController::new();
        assert_eq!(controller.mode(), Mode::Active(StageKind::Preview));
        assert_eq!(controller.active_stage(), Some(StageKind::Preview));
    }

    #[test]
    fn letter_keys_select_stages_in_either_case() {
        let mut controller = ModeController::new();
        assert_eq!(
            press(&mut controller, 'B'),
            Transition::Switched {
                from: StageKind::Preview,
                to: StageKind::Blur
            }
        );
        press(&mut controller, 'f');
        assert_eq!(controller.active_stage(), Some(StageKind::Features));
        press(&mut controller, 'C');
        assert_eq!(controller.active_stage(), Some(StageKind::Edges));
        press(&mut controller, 'p');
        assert_eq!(controller.active_stage(), Some(StageKind::Preview));
    }

    #[test]
    fn unknown_and_missing_keys_leave_state_unchanged() {
        let mut controller = ModeController::new();
        press(&mut controller, 'b');
        for key in [
            Some(KeyEvent::char('x')),
            Some(KeyEvent::char('1')),
            Some(KeyEvent::new(0)),
            Some(KeyEvent::new(0x1F600)),
            None,
        ] {
            assert_eq!(controller.handle_key(key), Transition::Unchanged);
            assert_eq!(controller.active_stage(), Some(StageKind::Blur));
        }
    }

    #[test]
    fn reselecting_the_active_stage_is_not_a_switch() {
        let mut controller = ModeController::new();
        assert_eq!(press(&mut controller, 'p'), Transition::Unchanged);
    }

    #[test]
    fn switching_is_memoryless() {
        let mut direct = ModeController::new();
        press(&mut direct, 'p');

        let mut detour = ModeController::new();
        press(&mut detour, 'p');
        press(&mut detour, 'b');
        press(&mut detour, 'p');

        assert_eq!(direct.mode(), detour.mode());
    }

    #[test]
    fn quit_keys_terminate_and_absorb() {
        for quit in [KeyEvent::char('q'), KeyEvent::char('Q'), KeyEvent::ESCAPE] {
            let mut controller = ModeController::new();
            assert_eq!(controller.handle_key(Some(quit)), Transition::Terminated);
            assert!(controller.is_terminated());
            assert_eq!(press(&mut controller, 'b'), Transition::Unchanged);
            assert_eq!(controller.mode(), Mode::Terminated);
            assert_eq!(controller.active_stage(), None);
        }
    }

    #[test]
    fn preview_only_bindings_ignore_filter_keys() {
        let mut controller = ModeController::with_bindings(KeyBindings::preview_only());
        assert_eq!(press(&mut controller, 'b'), Transition::Unchanged);
        assert_eq!(press(&mut controller, 'q'), Transition::Unchanged);
        assert_eq!(
            controller.handle_key(Some(KeyEvent::ESCAPE)),
            Transition::Terminated
        );
    }

    #[test]
    fn terminate_is_idempotent() {
        let mut controller = ModeController::new();
        assert!(controller.terminate());
        assert!(!controller.terminate());
        assert!(controller.is_terminated());
    }
}
