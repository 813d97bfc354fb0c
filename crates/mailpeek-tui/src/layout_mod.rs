//! Terminal geometry to widget sizes. Everything here is a pure function of
//! the terminal width and height.

pub(crate) const SENDER_WIDTH: u16 = 25;
pub(crate) const DATE_WIDTH: u16 = 10;
pub(crate) const TIME_WIDTH: u16 = 10;
pub(crate) const MIN_MESSAGE_WIDTH: u16 = 20;
pub(crate) const MIN_VIEWPORT_HEIGHT: u16 = 5;

pub(crate) const TITLE_HEIGHT: u16 = 1;
pub(crate) const SEARCH_BAR_HEIGHT: u16 = 3;
/// Top border plus two wrapped lines of key help.
pub(crate) const HELP_BAR_HEIGHT: u16 = 3;
/// From, Date, Time, Subject and a rule.
pub(crate) const DETAIL_HEADER_HEIGHT: u16 = 5;

/// Border and padding around the message table.
const TABLE_CHROME_WIDTH: u16 = 10;
/// Header, search bar, padding and help rows around the list.
const LIST_CHROME_HEIGHT: u16 = 20;
/// Frame padding around the detail view.
const DETAIL_CHROME_WIDTH: u16 = 8;
/// Title, help bar, frame borders and header block around the detail body.
const DETAIL_CHROME_HEIGHT: u16 = TITLE_HEIGHT + HELP_BAR_HEIGHT + 2 + DETAIL_HEADER_HEIGHT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Columns {
    pub(crate) sender: u16,
    pub(crate) date: u16,
    pub(crate) time: u16,
    pub(crate) message: u16,
}

impl Columns {
    pub(crate) fn for_width(width: u16) -> Self {
        let fixed = SENDER_WIDTH + DATE_WIDTH + TIME_WIDTH;
        let message = width
            .saturating_sub(TABLE_CHROME_WIDTH)
            .saturating_sub(fixed)
            .max(MIN_MESSAGE_WIDTH);
        Self {
            sender: SENDER_WIDTH,
            date: DATE_WIDTH,
            time: TIME_WIDTH,
            message,
        }
    }

    pub(crate) fn as_array(&self) -> [u16; 4] {
        [self.sender, self.date, self.time, self.message]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) columns: Columns,
    pub(crate) list_height: u16,
    pub(crate) detail_width: u16,
    pub(crate) detail_height: u16,
}

impl Layout {
    /// `search_bar` is whether the search box takes rows above the body.
    pub(crate) fn compute(width: u16, height: u16, search_bar: bool) -> Self {
        let detail_chrome = if search_bar {
            DETAIL_CHROME_HEIGHT + SEARCH_BAR_HEIGHT
        } else {
            DETAIL_CHROME_HEIGHT
        };
        Self {
            width,
            height,
            columns: Columns::for_width(width),
            list_height: height
                .saturating_sub(LIST_CHROME_HEIGHT)
                .max(MIN_VIEWPORT_HEIGHT),
            detail_width: width
                .saturating_sub(DETAIL_CHROME_WIDTH)
                .max(MIN_MESSAGE_WIDTH),
            detail_height: height
                .saturating_sub(detail_chrome)
                .max(MIN_VIEWPORT_HEIGHT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Columns, Layout};

    #[test]
    fn wide_terminal_gives_message_the_rest() {
        let cols = Columns::for_width(100);
        assert_eq!(cols.as_array(), [25, 10, 10, 45]);
    }

    #[test]
    fn narrow_terminal_floors_message_width() {
        assert_eq!(Columns::for_width(10).message, 20);
        assert_eq!(Columns::for_width(0).message, 20);
        assert_eq!(Columns::for_width(65).message, 20);
        assert_eq!(Columns::for_width(76).message, 21);
    }

    #[test]
    fn viewports_never_drop_below_minimum() {
        let tiny = Layout::compute(4, 3, true);
        assert_eq!(tiny.list_height, 5);
        assert_eq!(tiny.detail_height, 5);
        assert_eq!(tiny.detail_width, 20);
    }

    #[test]
    fn viewports_take_remaining_height() {
        let layout = Layout::compute(120, 40, false);
        assert_eq!(layout.list_height, 20);
        assert_eq!(layout.detail_height, 29);
        assert_eq!(layout.detail_width, 112);
        assert_eq!(Layout::compute(120, 40, true).detail_height, 26);
    }
}
