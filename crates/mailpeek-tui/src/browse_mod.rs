use std::borrow::Cow;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use tracing::debug;

use mailpeek_core::{MatchPolicy, Message, SearchField, filter_indices};

use crate::keymap_mod::{Action, KeyMap};
use crate::layout_mod::Layout;
use crate::widgets_mod::{DetailViewport, ListCursor, SearchInput};

/// Input delivered by the terminal runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AppEvent {
    Key(KeyEvent),
    Resize { width: u16, height: u16 },
}

/// What the runtime should do after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Intent {
    None,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DetailView {
    /// Index into the full message list.
    pub(crate) message: usize,
    pub(crate) viewport: DetailViewport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mode {
    List,
    Searching,
    Detail(DetailView),
}

/// Browsing session: the fetched messages plus everything the user has done
/// to them. Owned by the event loop and replaced on every update.
#[derive(Debug, Clone)]
pub(crate) struct Browser {
    messages: Vec<Message>,
    mode: Mode,
    input: SearchInput,
    /// Ranked indices into `messages`. Set while searching, and kept in
    /// `List` after a search is confirmed with Enter.
    filtered: Option<Vec<usize>>,
    cursor: ListCursor,
    size: (u16, u16),
    layout: Layout,
    keys: Arc<KeyMap>,
    policy: MatchPolicy,
    field: SearchField,
}

impl Browser {
    pub(crate) fn new(
        messages: Vec<Message>,
        keys: Arc<KeyMap>,
        policy: MatchPolicy,
        field: SearchField,
        width: u16,
        height: u16,
    ) -> Self {
        Self {
            messages,
            mode: Mode::List,
            input: SearchInput::default(),
            filtered: None,
            cursor: ListCursor::default(),
            size: (width, height),
            layout: Layout::compute(width, height, false),
            keys,
            policy,
            field,
        }
    }

    pub(crate) fn update(mut self, event: AppEvent) -> (Self, Intent) {
        let intent = match event {
            AppEvent::Resize { width, height } => {
                self.size = (width, height);
                Intent::None
            }
            AppEvent::Key(key) => match self.mode {
                Mode::List => self.on_list_key(key),
                Mode::Searching => self.on_search_key(key),
                Mode::Detail(_) => self.on_detail_key(key),
            },
        };
        self.relayout();
        let len = self.visible_indices().len();
        self.cursor.clamp(len);
        (self, intent)
    }

    pub(crate) fn mode(&self) -> &Mode {
        &self.mode
    }

    pub(crate) fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn keys(&self) -> &KeyMap {
        &self.keys
    }

    pub(crate) fn layout(&self) -> &Layout {
        &self.layout
    }

    pub(crate) fn input(&self) -> &SearchInput {
        &self.input
    }

    pub(crate) fn query(&self) -> &str {
        self.input.value()
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor.selected()
    }

    pub(crate) fn list_cursor(&self) -> &ListCursor {
        &self.cursor
    }

    /// The search box is on screen while typing and while a filter is kept.
    pub(crate) fn shows_search_bar(&self) -> bool {
        matches!(self.mode, Mode::Searching) || self.filtered.is_some()
    }

    /// True when rows are a filtered subset rather than the whole inbox.
    pub(crate) fn is_filtered(&self) -> bool {
        self.filtered.is_some()
    }

    /// Indices into [`Browser::messages`] of the rows on screen, in display
    /// order.
    pub(crate) fn visible_indices(&self) -> Cow<'_, [usize]> {
        match &self.filtered {
            Some(indices) => Cow::Borrowed(indices.as_slice()),
            None => Cow::Owned((0..self.messages.len()).collect()),
        }
    }

    pub(crate) fn selected_message(&self) -> Option<&Message> {
        match &self.mode {
            Mode::Detail(view) => self.messages.get(view.message),
            _ => None,
        }
    }

    fn on_list_key(&mut self, key: KeyEvent) -> Intent {
        if self.filtered.is_some() && key.code == KeyCode::Esc {
            self.clear_search();
            return Intent::None;
        }
        let Some(action) = self.keys.action_for(&key) else {
            return Intent::None;
        };
        let len = self.visible_indices().len();
        let page = self.layout.list_height as usize;
        match action {
            Action::Quit => return Intent::Quit,
            Action::Search => self.start_search(),
            Action::Select => self.open_detail(),
            Action::Up => self.cursor.up(1),
            Action::Down => self.cursor.down(1, len),
            Action::PageUp => self.cursor.up(page),
            Action::PageDown => self.cursor.down(page, len),
            Action::Back => {}
        }
        Intent::None
    }

    fn on_search_key(&mut self, key: KeyEvent) -> Intent {
        if self.keys.matches(Action::Quit, &key) {
            return Intent::Quit;
        }
        if key.code == KeyCode::Esc || self.keys.matches(Action::Search, &key) {
            self.clear_search();
            self.mode = Mode::List;
            return Intent::None;
        }
        if key.code == KeyCode::Enter {
            self.input.blur();
            self.mode = Mode::List;
            debug!(
                query = self.input.value(),
                matches = self.visible_indices().len(),
                "search kept"
            );
            return Intent::None;
        }
        if self.input.apply_key(key) {
            self.refilter();
        }
        Intent::None
    }

    fn on_detail_key(&mut self, key: KeyEvent) -> Intent {
        let Some(action) = self.keys.action_for(&key) else {
            return Intent::None;
        };
        let Mode::Detail(view) = &mut self.mode else {
            return Intent::None;
        };
        match action {
            Action::Quit => return Intent::Quit,
            Action::Back => self.mode = Mode::List,
            Action::Up => view.viewport.line_up(1),
            Action::Down => view.viewport.line_down(1),
            Action::PageUp => view.viewport.page_up(),
            Action::PageDown => view.viewport.page_down(),
            Action::Select | Action::Search => {}
        }
        Intent::None
    }

    fn start_search(&mut self) {
        if self.filtered.is_none() {
            self.input.clear();
            self.filtered = Some((0..self.messages.len()).collect());
        }
        self.input.focus();
        self.mode = Mode::Searching;
    }

    fn clear_search(&mut self) {
        self.input.clear();
        self.input.blur();
        self.filtered = None;
        self.cursor.reset();
    }

    fn refilter(&mut self) {
        let indices = filter_indices(&self.messages, self.input.value(), self.field, self.policy);
        debug!(query = self.input.value(), matches = indices.len(), "search");
        self.filtered = Some(indices);
        self.cursor.reset();
    }

    fn open_detail(&mut self) {
        let Some(&message) = self.visible_indices().get(self.cursor.selected()) else {
            return;
        };
        let viewport = DetailViewport::new(
            &self.messages[message].body,
            self.layout.detail_width,
            self.layout.detail_height,
        );
        self.mode = Mode::Detail(DetailView { message, viewport });
    }

    /// Recomputes geometry from the terminal size and the current chrome.
    fn relayout(&mut self) {
        let (width, height) = self.size;
        let layout = Layout::compute(width, height, self.shows_search_bar());
        if layout == self.layout {
            return;
        }
        self.layout = layout;
        if let Mode::Detail(view) = &mut self.mode {
            view.viewport
                .resize(self.layout.detail_width, self.layout.detail_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use mailpeek_core::{MatchPolicy, Message, SearchField};

    use super::{AppEvent, Browser, Intent, Mode};
    use crate::keymap_mod::KeyMap;

    fn inbox() -> Vec<Message> {
        vec![
            Message::new("alice@example.com", "Lunch", "2024-11-15 12:00:00", "tacos"),
            Message::new("bob@example.com", "Report", "2024-11-14 09:00:00", "numbers"),
            Message::new(
                "carol@example.com",
                "Trip",
                "2024-11-13 08:30:00",
                (1..=60).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n"),
            ),
        ]
    }

    fn browser() -> Browser {
        Browser::new(
            inbox(),
            Arc::new(KeyMap::default()),
            MatchPolicy::default(),
            SearchField::Subject,
            120,
            40,
        )
    }

    fn press(b: Browser, code: KeyCode) -> (Browser, Intent) {
        b.update(AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn typed(mut b: Browser, text: &str) -> Browser {
        for c in text.chars() {
            b = press(b, KeyCode::Char(c)).0;
        }
        b
    }

    #[test]
    fn starts_in_list_with_everything_visible() {
        let b = browser();
        assert_eq!(b.mode(), &Mode::List);
        assert_eq!(b.visible_indices().as_ref(), [0, 1, 2]);
        assert!(!b.is_filtered());
    }

    #[test]
    fn search_then_escape_restores_full_list() {
        let (b, _) = press(browser(), KeyCode::Char('/'));
        assert_eq!(b.mode(), &Mode::Searching);
        assert!(b.input().is_focused());
        assert_eq!(b.visible_indices().len(), 3);
        let b = typed(b, "lunch");
        assert_eq!(b.visible_indices().as_ref(), [0]);
        let (b, intent) = press(b, KeyCode::Esc);
        assert_eq!(intent, Intent::None);
        assert_eq!(b.mode(), &Mode::List);
        assert_eq!(b.query(), "");
        assert!(!b.input().is_focused());
        assert_eq!(b.visible_indices().as_ref(), [0, 1, 2]);
    }

    #[test]
    fn search_key_toggles_search_off() {
        let (b, _) = press(browser(), KeyCode::Char('/'));
        let b = typed(b, "re");
        let (b, _) = press(b, KeyCode::Char('/'));
        assert_eq!(b.mode(), &Mode::List);
        assert_eq!(b.query(), "");
        assert!(!b.is_filtered());
    }

    #[test]
    fn typing_recomputes_filter_against_all_messages() {
        let (b, _) = press(browser(), KeyCode::Char('/'));
        let b = typed(b, "rep");
        assert_eq!(b.visible_indices().as_ref(), [1]);
        let (b, _) = press(b, KeyCode::Backspace);
        let (b, _) = press(b, KeyCode::Backspace);
        let (b, _) = press(b, KeyCode::Backspace);
        assert_eq!(b.query(), "");
        assert_eq!(b.visible_indices().as_ref(), [0, 1, 2]);
    }

    #[test]
    fn enter_keeps_the_filtered_view() {
        let (b, _) = press(browser(), KeyCode::Char('/'));
        let b = typed(b, "trip");
        let (b, _) = press(b, KeyCode::Enter);
        assert_eq!(b.mode(), &Mode::List);
        assert_eq!(b.query(), "trip");
        assert_eq!(b.visible_indices().as_ref(), [2]);

        let (b, _) = press(b, KeyCode::Enter);
        assert_eq!(b.selected_message().map(|m| m.subject.as_str()), Some("Trip"));
        let (b, _) = press(b, KeyCode::Char('x'));
        assert_eq!(b.visible_indices().as_ref(), [2]);

        let (b, _) = press(b, KeyCode::Char('/'));
        assert_eq!(b.mode(), &Mode::Searching);
        assert_eq!(b.query(), "trip");

        let (b, _) = press(b, KeyCode::Enter);
        let (b, _) = press(b, KeyCode::Esc);
        assert!(!b.is_filtered());
        assert_eq!(b.visible_indices().len(), 3);
    }

    #[test]
    fn select_opens_row_under_cursor_and_back_preserves_cursor() {
        let (b, _) = press(browser(), KeyCode::Char('j'));
        assert_eq!(b.cursor(), 1);
        let (b, _) = press(b, KeyCode::Enter);
        let Mode::Detail(view) = b.mode() else {
            panic!("expected detail");
        };
        assert_eq!(view.message, 1);
        assert_eq!(b.selected_message(), Some(&inbox()[1]));
        let (b, _) = press(b, KeyCode::Char('x'));
        assert_eq!(b.mode(), &Mode::List);
        assert_eq!(b.cursor(), 1);
    }

    #[test]
    fn detail_scroll_does_not_move_list_cursor() {
        let (b, _) = press(browser(), KeyCode::Down);
        let (b, _) = press(b, KeyCode::Down);
        let (b, _) = press(b, KeyCode::Enter);
        let (b, _) = press(b, KeyCode::Char('j'));
        let (b, _) = press(b, KeyCode::Char('j'));
        let (b, _) = press(b, KeyCode::Char('k'));
        let Mode::Detail(view) = b.mode() else {
            panic!("expected detail");
        };
        assert_eq!(view.viewport.offset(), 1);
        assert_eq!(b.cursor(), 2);
        let (b, _) = press(b, KeyCode::PageDown);
        let Mode::Detail(view) = b.mode() else {
            panic!("expected detail");
        };
        assert_eq!(view.viewport.offset(), 30);
        assert_eq!(b.cursor(), 2);
    }

    #[test]
    fn select_on_empty_list_stays_in_list() {
        let b = Browser::new(
            Vec::new(),
            Arc::new(KeyMap::default()),
            MatchPolicy::default(),
            SearchField::All,
            80,
            24,
        );
        let (b, _) = press(b, KeyCode::Enter);
        assert_eq!(b.mode(), &Mode::List);
        let (b, _) = press(b, KeyCode::Down);
        assert_eq!(b.cursor(), 0);
    }

    #[test]
    fn cursor_is_clamped_when_filter_shrinks() {
        let (b, _) = press(browser(), KeyCode::Char('j'));
        let (b, _) = press(b, KeyCode::Char('j'));
        let (b, _) = press(b, KeyCode::Char('/'));
        let b = typed(b, "zzzz");
        assert!(b.visible_indices().is_empty());
        assert_eq!(b.cursor(), 0);
    }

    #[test]
    fn quit_from_every_mode() {
        let (_, intent) = press(browser(), KeyCode::Char('q'));
        assert_eq!(intent, Intent::Quit);
        let (b, _) = press(browser(), KeyCode::Enter);
        let (_, intent) = press(b, KeyCode::Char('q'));
        assert_eq!(intent, Intent::Quit);
        let (b, _) = press(browser(), KeyCode::Char('/'));
        let (_, intent) = b.update(AppEvent::Key(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
        )));
        assert_eq!(intent, Intent::Quit);
    }

    #[test]
    fn resize_recomputes_layout_without_changing_mode() {
        let (b, _) = press(browser(), KeyCode::Enter);
        let (b, intent) = b.update(AppEvent::Resize {
            width: 60,
            height: 20,
        });
        assert_eq!(intent, Intent::None);
        assert_eq!(b.layout().columns.message, 20);
        let Mode::Detail(view) = b.mode() else {
            panic!("expected detail");
        };
        assert_eq!(view.viewport.size(), (52, 9));

        let (b, _) = press(b, KeyCode::Char('x'));
        let (b, _) = b.update(AppEvent::Resize {
            width: 100,
            height: 40,
        });
        assert_eq!(b.mode(), &Mode::List);
        assert_eq!(b.layout().columns.message, 45);
    }
}
