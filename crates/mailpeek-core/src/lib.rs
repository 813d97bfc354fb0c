//! Shared message model and search for mailpeek.

mod filter;

pub use filter::{MatchPolicy, filter, filter_by_field, filter_indices};

/// Layout of every [`Message::timestamp`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp used when a message carries no usable date.
pub const UNKNOWN_TIMESTAMP: &str = "0001-01-01 00:00:00";

/// Name of the only mailbox the client opens.
pub const INBOX: &str = "INBOX";

/// One fetched message. Built once by the fetcher and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: String,
    pub subject: String,
    /// Always `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    /// Plain text; markup is already normalized away.
    pub body: String,
}

impl Message {
    pub fn new(
        from: impl Into<String>,
        subject: impl Into<String>,
        timestamp: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            subject: subject.into(),
            timestamp: timestamp.into(),
            body: body.into(),
        }
    }

    /// `YYYY-MM-DD` part of the timestamp, or the whole value if it is short.
    pub fn date_part(&self) -> &str {
        self.timestamp.get(..10).unwrap_or(&self.timestamp)
    }

    /// `HH:MM` part of the timestamp, empty if the value is short.
    pub fn time_part(&self) -> &str {
        self.timestamp.get(11..16).unwrap_or("")
    }

    /// Lower-cased text the filter scores against.
    pub fn searchable(&self, field: SearchField) -> String {
        match field {
            SearchField::Sender => self.from.to_lowercase(),
            SearchField::Subject => self.subject.to_lowercase(),
            SearchField::Body => self.body.to_lowercase(),
            SearchField::All => {
                format!("{} {} {}", self.from, self.subject, self.body).to_lowercase()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchField {
    Sender,
    Subject,
    Body,
    #[default]
    All,
}

impl SearchField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sender" | "from" => Some(Self::Sender),
            "subject" => Some(Self::Subject),
            "body" => Some(Self::Body),
            "all" | "" => Some(Self::All),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, SearchField};

    #[test]
    fn timestamp_parts_slice_canonical_format() {
        let msg = Message::new("a@b.c", "hi", "2024-11-15 09:15:42", "");
        assert_eq!(msg.date_part(), "2024-11-15");
        assert_eq!(msg.time_part(), "09:15");
    }

    #[test]
    fn timestamp_parts_survive_short_values() {
        let msg = Message::new("a@b.c", "hi", "2024", "");
        assert_eq!(msg.date_part(), "2024");
        assert_eq!(msg.time_part(), "");
    }

    #[test]
    fn searchable_all_joins_fields_lowercased() {
        let msg = Message::new("Alice@Example.com", "Lunch", "", "See You");
        assert_eq!(
            msg.searchable(SearchField::All),
            "alice@example.com lunch see you"
        );
        assert_eq!(msg.searchable(SearchField::Subject), "lunch");
    }

    #[test]
    fn search_field_parses_aliases() {
        assert_eq!(SearchField::parse("from"), Some(SearchField::Sender));
        assert_eq!(SearchField::parse("BODY"), Some(SearchField::Body));
        assert_eq!(SearchField::parse("nope"), None);
    }
}
