use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Reload the collection view now instead of waiting for the poll interval
    Refresh,
    /// Move the selected shipment to the next status on the main chain
    Advance,
    /// Cancel the selected shipment
    Cancel,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{Char, Down, Enter, Esc, Left, Right, Up};

    // Global shortcuts
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }
    if key.code == Char('q') && key.modifiers.is_empty() {
        return Action::Quit;
    }
    if key.code == Char('r') && key.modifiers.is_empty() {
        return Action::Refresh;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::Routes => match key.code {
            Up | Char('k') => {
                app.route_index = app.route_index.saturating_sub(1);
            }
            Down | Char('j') => {
                if app.route_index + 1 < app.route_row_count() {
                    app.route_index += 1;
                }
            }
            Enter | Right | Char(' ') => {
                app.select_current_route();
            }
            _ => {}
        },

        Screen::Shipments => match key.code {
            Up | Char('k') => {
                app.shipment_index = app.shipment_index.saturating_sub(1);
            }
            Down | Char('j') => {
                if app.shipment_index + 1 < app.shipments.len() {
                    app.shipment_index += 1;
                }
            }
            Enter | Right => {
                app.select_current_shipment();
            }
            Left | Esc | Char('b') => {
                app.screen = Screen::Routes;
                app.selection = None;
            }
            _ => {}
        },

        Screen::Detail => match key.code {
            Char('n') => {
                action = Action::Advance;
            }
            Char('x') => {
                action = Action::Cancel;
            }
            Left | Esc | Char('b') => {
                app.screen = Screen::Shipments;
                app.selected = None;
            }
            _ => {}
        },
    }
    action
}
