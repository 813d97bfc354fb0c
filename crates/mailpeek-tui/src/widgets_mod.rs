use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_width::UnicodeWidthChar as _;

/// Longest query the search box accepts, in characters.
pub(crate) const SEARCH_CHAR_LIMIT: usize = 100;

/// Cursor over the rows of the message table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ListCursor {
    selected: usize,
}

impl ListCursor {
    pub(crate) fn selected(&self) -> usize {
        self.selected
    }

    pub(crate) fn up(&mut self, by: usize) {
        self.selected = self.selected.saturating_sub(by);
    }

    pub(crate) fn down(&mut self, by: usize, len: usize) {
        self.selected = self.selected.saturating_add(by).min(len.saturating_sub(1));
    }

    /// Keeps the cursor on an existing row after the rows change.
    pub(crate) fn clamp(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    pub(crate) fn reset(&mut self) {
        self.selected = 0;
    }

    /// First row to draw so the cursor stays inside `rows_visible`.
    pub(crate) fn window_start(&self, len: usize, rows_visible: usize) -> usize {
        let rows_visible = rows_visible.max(1);
        let mut start = self.selected.saturating_sub(rows_visible - 1);
        if start + rows_visible > len {
            start = len.saturating_sub(rows_visible);
        }
        start
    }
}

/// Scrollable, wrapped view of one message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DetailViewport {
    content: String,
    lines: Vec<String>,
    offset: usize,
    width: u16,
    height: u16,
}

impl DetailViewport {
    pub(crate) fn new(content: &str, width: u16, height: u16) -> Self {
        Self {
            content: content.to_string(),
            lines: wrap_lines(content, width as usize),
            offset: 0,
            width,
            height,
        }
    }

    pub(crate) fn resize(&mut self, width: u16, height: u16) {
        if width != self.width {
            self.lines = wrap_lines(&self.content, width as usize);
        }
        self.width = width;
        self.height = height;
        self.offset = self.offset.min(self.max_offset());
    }

    pub(crate) fn line_up(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
    }

    pub(crate) fn line_down(&mut self, n: usize) {
        self.offset = self.offset.saturating_add(n).min(self.max_offset());
    }

    pub(crate) fn page_up(&mut self) {
        self.line_up(self.height as usize);
    }

    pub(crate) fn page_down(&mut self) {
        self.line_down(self.height as usize);
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub(crate) fn total_lines(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn visible_lines(&self) -> &[String] {
        let end = (self.offset + self.height as usize).min(self.lines.len());
        &self.lines[self.offset.min(end)..end]
    }

    fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.height as usize)
    }
}

/// Greedy word wrap by display width; words wider than a line are split.
pub(crate) fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for raw in text.split('\n') {
        let raw = raw.trim_end_matches('\r');
        let mut line = String::new();
        let mut line_width = 0usize;
        for word in raw.split(' ') {
            let word_width: usize = word.chars().map(|c| c.width().unwrap_or(0)).sum();
            let sep = usize::from(!line.is_empty());
            if line_width + sep + word_width <= width {
                if sep == 1 {
                    line.push(' ');
                }
                line.push_str(word);
                line_width += sep + word_width;
                continue;
            }
            if !line.is_empty() {
                out.push(std::mem::take(&mut line));
                line_width = 0;
            }
            for ch in word.chars() {
                let w = ch.width().unwrap_or(0);
                if line_width + w > width && !line.is_empty() {
                    out.push(std::mem::take(&mut line));
                    line_width = 0;
                }
                line.push(ch);
                line_width += w;
            }
        }
        out.push(line);
    }
    out
}

/// Single-line text input with a character cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SearchInput {
    value: String,
    cursor: usize,
    focused: bool,
}

impl SearchInput {
    pub(crate) fn value(&self) -> &str {
        &self.value
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn is_focused(&self) -> bool {
        self.focused
    }

    pub(crate) fn focus(&mut self) {
        self.focused = true;
        self.cursor = text_char_len(&self.value);
    }

    pub(crate) fn blur(&mut self) {
        self.focused = false;
    }

    pub(crate) fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Applies an editing key. Returns true when the text changed.
    pub(crate) fn apply_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return false;
        }
        let len = text_char_len(&self.value);
        self.cursor = self.cursor.min(len);
        match key.code {
            KeyCode::Backspace if self.cursor > 0 => {
                remove_char_at(&mut self.value, self.cursor - 1);
                self.cursor -= 1;
                true
            }
            KeyCode::Delete if self.cursor < len => {
                remove_char_at(&mut self.value, self.cursor);
                true
            }
            KeyCode::Char(c) if len < SEARCH_CHAR_LIMIT => {
                let idx = char_to_byte_idx(&self.value, self.cursor);
                self.value.insert(idx, c);
                self.cursor += 1;
                true
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                false
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(len);
                false
            }
            KeyCode::Home => {
                self.cursor = 0;
                false
            }
            KeyCode::End => {
                self.cursor = len;
                false
            }
            _ => false,
        }
    }
}

fn text_char_len(text: &str) -> usize {
    text.chars().count()
}

fn char_to_byte_idx(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

fn remove_char_at(text: &mut String, char_idx: usize) {
    let start = char_to_byte_idx(text, char_idx);
    let end = char_to_byte_idx(text, char_idx + 1);
    if start < end {
        text.replace_range(start..end, "");
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use super::{DetailViewport, ListCursor, SEARCH_CHAR_LIMIT, SearchInput, wrap_lines};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn list_cursor_stays_in_bounds() {
        let mut cursor = ListCursor::default();
        cursor.up(1);
        assert_eq!(cursor.selected(), 0);
        cursor.down(10, 3);
        assert_eq!(cursor.selected(), 2);
        cursor.clamp(1);
        assert_eq!(cursor.selected(), 0);
        cursor.down(1, 0);
        assert_eq!(cursor.selected(), 0);
    }

    #[test]
    fn list_window_follows_cursor() {
        let mut cursor = ListCursor::default();
        cursor.down(7, 10);
        assert_eq!(cursor.window_start(10, 5), 3);
        cursor.up(7);
        assert_eq!(cursor.window_start(10, 5), 0);
        assert_eq!(cursor.window_start(3, 5), 0);
    }

    #[test]
    fn wrap_splits_on_words_and_long_runs() {
        assert_eq!(wrap_lines("aaa bbb ccc", 7), vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap_lines("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_lines("a\n\nb", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn viewport_scroll_is_clamped() {
        let body = (1..=10).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let mut vp = DetailViewport::new(&body, 20, 4);
        vp.line_up(1);
        assert_eq!(vp.offset(), 0);
        vp.line_down(1);
        assert_eq!(vp.visible_lines(), ["2", "3", "4", "5"]);
        vp.page_down();
        vp.page_down();
        assert_eq!(vp.offset(), 6);
        vp.resize(20, 8);
        assert_eq!(vp.offset(), 2);
        vp.page_up();
        assert_eq!(vp.offset(), 0);
    }

    #[test]
    fn viewport_handles_short_content() {
        let mut vp = DetailViewport::new("only", 20, 5);
        vp.line_down(3);
        assert_eq!(vp.offset(), 0);
        assert_eq!(vp.visible_lines(), ["only"]);
    }

    #[test]
    fn search_input_edits_at_cursor() {
        let mut input = SearchInput::default();
        for c in "héllo".chars() {
            assert!(input.apply_key(key(KeyCode::Char(c))));
        }
        input.apply_key(key(KeyCode::Left));
        input.apply_key(key(KeyCode::Backspace));
        assert_eq!(input.value(), "hélo");
        assert_eq!(input.cursor(), 3);
        input.apply_key(key(KeyCode::Home));
        input.apply_key(key(KeyCode::Delete));
        assert_eq!(input.value(), "élo");
        assert!(!input.apply_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn search_input_respects_char_limit() {
        let mut input = SearchInput::default();
        for _ in 0..SEARCH_CHAR_LIMIT + 5 {
            input.apply_key(key(KeyCode::Char('a')));
        }
        assert_eq!(input.value().chars().count(), SEARCH_CHAR_LIMIT);
    }
}
