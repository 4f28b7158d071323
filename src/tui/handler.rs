use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::models::HighlightColor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Reading,
    Selecting,
    ConfirmRemove,
    ResumePrompt,
    CompletionPrompt,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    Quit,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    ScrollToTop,
    ScrollToBottom,
    SetColor(HighlightColor),
    TogglePause,
    Export,
    ShowHelp,
    HideHelp,
    // Selection mode
    StartSelection,
    CancelSelection,
    CaretLeft,
    CaretRight,
    CaretUp,
    CaretDown,
    CaretWordForward,
    CaretWordBack,
    SetAnchor,
    SaveHighlight,
    RequestRemove,
    ConfirmRemove,
    CancelRemove,
    // Resume prompt
    ResumeReading,
    StartOver,
    AlwaysResume,
    // Completion prompt
    ContinueReading,
    Revise,
}

pub fn handle_key_event(key: KeyEvent, mode: InputMode) -> Option<AppAction> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(AppAction::Quit);
    }

    match mode {
        // Any key closes help
        InputMode::Help => Some(AppAction::HideHelp),

        InputMode::ResumePrompt => match key.code {
            KeyCode::Char('r') | KeyCode::Enter => Some(AppAction::ResumeReading),
            KeyCode::Char('s') | KeyCode::Esc => Some(AppAction::StartOver),
            KeyCode::Char('a') => Some(AppAction::AlwaysResume),
            KeyCode::Char('q') => Some(AppAction::Quit),
            _ => None,
        },

        InputMode::CompletionPrompt => match key.code {
            KeyCode::Char('c') | KeyCode::Enter | KeyCode::Esc => Some(AppAction::ContinueReading),
            KeyCode::Char('r') => Some(AppAction::Revise),
            KeyCode::Char('q') => Some(AppAction::Quit),
            _ => None,
        },

        InputMode::ConfirmRemove => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(AppAction::ConfirmRemove),
            _ => Some(AppAction::CancelRemove),
        },

        InputMode::Selecting => match key.code {
            KeyCode::Esc | KeyCode::Char('v') => Some(AppAction::CancelSelection),
            KeyCode::Char('h') | KeyCode::Left => Some(AppAction::CaretLeft),
            KeyCode::Char('l') | KeyCode::Right => Some(AppAction::CaretRight),
            KeyCode::Char('k') | KeyCode::Up => Some(AppAction::CaretUp),
            KeyCode::Char('j') | KeyCode::Down => Some(AppAction::CaretDown),
            KeyCode::Char('w') => Some(AppAction::CaretWordForward),
            KeyCode::Char('b') => Some(AppAction::CaretWordBack),
            KeyCode::Char('m') | KeyCode::Char(' ') => Some(AppAction::SetAnchor),
            KeyCode::Enter => Some(AppAction::SaveHighlight),
            KeyCode::Char('x') => Some(AppAction::RequestRemove),
            KeyCode::Char(c @ '1'..='4') => color_key(c).map(AppAction::SetColor),
            KeyCode::Char('q') => Some(AppAction::Quit),
            _ => None,
        },

        InputMode::Reading => match key.code {
            KeyCode::Char('q') => Some(AppAction::Quit),

            KeyCode::Char('j') | KeyCode::Down => Some(AppAction::ScrollDown),
            KeyCode::Char('k') | KeyCode::Up => Some(AppAction::ScrollUp),
            KeyCode::PageDown | KeyCode::Char(' ') => Some(AppAction::PageDown),
            KeyCode::PageUp => Some(AppAction::PageUp),
            KeyCode::Char('g') | KeyCode::Home => Some(AppAction::ScrollToTop),
            KeyCode::Char('G') | KeyCode::End => Some(AppAction::ScrollToBottom),

            KeyCode::Char('v') => Some(AppAction::StartSelection),
            KeyCode::Char(c @ '1'..='4') => color_key(c).map(AppAction::SetColor),
            KeyCode::Char('p') => Some(AppAction::TogglePause),
            KeyCode::Char('e') => Some(AppAction::Export),

            KeyCode::Char('?') => Some(AppAction::ShowHelp),

            _ => None,
        },
    }
}

pub fn handle_mouse_event(mouse: MouseEvent, mode: InputMode) -> Option<AppAction> {
    if mode != InputMode::Reading {
        return None;
    }
    match mouse.kind {
        MouseEventKind::ScrollDown => Some(AppAction::ScrollDown),
        MouseEventKind::ScrollUp => Some(AppAction::ScrollUp),
        _ => None,
    }
}

fn color_key(c: char) -> Option<HighlightColor> {
    let index = c.to_digit(10)? as usize;
    HighlightColor::ALL.get(index.checked_sub(1)?).copied()
}
