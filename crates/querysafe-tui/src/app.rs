use ratatui::layout::Rect;
use querysafe_core::{ChatController, Completion, WidgetConfig};

/// Most lines the input bar grows to before it scrolls.
pub const MAX_INPUT_LINES: u16 = 5;

pub struct App {
    pub should_quit: bool,
    pub controller: ChatController,

    // Input bar
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Message log scrolling
    pub scroll: u16,
    pub follow: bool, // keep the newest entry in view
    pub chat_height: u16,
    pub total_lines: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for the typing indicator

    // Panel area for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
}

impl App {
    pub fn new(config: WidgetConfig) -> Self {
        Self::with_controller(ChatController::new(config))
    }

    pub fn with_controller(controller: ChatController) -> Self {
        Self {
            should_quit: false,
            controller,
            input: String::new(),
            cursor: 0,
            scroll: 0,
            follow: true,
            chat_height: 0,
            total_lines: 0,
            animation_frame: 0,
            chat_area: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.controller.widget().is_open()
    }

    pub fn input_enabled(&self) -> bool {
        self.controller.widget().input_enabled()
    }

    pub fn toggle(&mut self) {
        if self.controller.toggle_widget() {
            self.follow = true;
        }
    }

    /// Send whatever is in the input bar. Does nothing while input is
    /// disabled; blank input is dropped by the controller.
    pub fn submit(&mut self) {
        if !self.input_enabled() {
            return;
        }
        let text = std::mem::take(&mut self.input);
        self.cursor = 0;
        if self.controller.send_message(&text).is_some() {
            self.follow = true;
        }
    }

    pub fn toggle_input_enabled(&mut self) {
        let enabled = !self.input_enabled();
        self.controller.set_input_enabled(enabled);
    }

    pub fn on_completion(&mut self, completion: Completion) {
        self.controller.apply(completion);
        self.follow = true;
    }

    pub fn tick_animation(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 3;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.scroll = self.scroll.saturating_add(lines).min(max);
        self.follow = self.scroll >= max;
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    pub fn max_scroll(&self) -> u16 {
        self.total_lines.saturating_sub(self.chat_height)
    }

    /// Called by the renderer once it knows how tall the log is.
    pub fn update_scroll_bounds(&mut self, total_lines: u16, chat_height: u16) {
        self.total_lines = total_lines;
        self.chat_height = chat_height;
        if self.follow {
            self.scroll = self.max_scroll();
        } else {
            self.scroll = self.scroll.min(self.max_scroll());
        }
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, text: &str) {
        for c in text.chars().filter(|c| *c != '\r') {
            self.insert_char(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    /// Line and column of the cursor within the input, both in chars.
    pub fn cursor_line_col(&self) -> (usize, usize) {
        let before: String = self.input.chars().take(self.cursor).collect();
        let line = before.matches('\n').count();
        let col = before.rsplit('\n').next().map(|s| s.chars().count()).unwrap_or(0);
        (line, col)
    }

    pub fn input_line_count(&self) -> u16 {
        let lines = self.input.split('\n').count() as u16;
        lines.clamp(1, MAX_INPUT_LINES)
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
