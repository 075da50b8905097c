use crate::console::Console;

#[derive(Clone)]
pub struct AppState {
    pub console: Console,
}
