//! Turns decoded records into display units and places them in a bounded,
//! newest-first feed.

use crate::feeds::record::StreamRecord;
use std::collections::VecDeque;
use std::io::Write;
use thiserror::Error;
use tokio::sync::mpsc;

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template unavailable: {0}")]
    Template(String),
    #[error("feed display is gone")]
    SinkClosed,
    #[error("failed to write feed item: {0}")]
    Io(#[from] std::io::Error),
}

/// One renderable unit in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub id: String,
    pub avatar_url: String,
    pub display_name: String,
    /// Handle with its leading `@`.
    pub handle: String,
    pub permalink: String,
    pub timestamp: String,
    pub body: String,
}

/// Instantiates a [`FeedItem`] for a record.
pub trait TemplateFactory: Send {
    fn instantiate(&self, record: &StreamRecord) -> Result<FeedItem, RenderError>;
}

/// The standard post card.
#[derive(Debug, Clone, Copy, Default)]
pub struct CardTemplate;

impl TemplateFactory for CardTemplate {
    fn instantiate(&self, record: &StreamRecord) -> Result<FeedItem, RenderError> {
        Ok(FeedItem {
            id: record.id.clone(),
            avatar_url: plain_text(&record.author.avatar_url),
            display_name: plain_text(&record.author.display_name),
            handle: format!("@{}", plain_text(&record.author.handle)),
            permalink: plain_text(&record.permalink()),
            timestamp: plain_text(&record.created_at),
            body: plain_text(&record.body),
        })
    }
}

/// Text from the stream is shown literally. Control characters (escape
/// sequences included), zero-width and bidi override/isolate characters
/// become spaces so the terminal neither interprets nor reorders them.
pub fn plain_text(text: &str) -> String {
    text.chars()
        .map(|c| if is_unsafe_char(c) { ' ' } else { c })
        .collect()
}

fn is_unsafe_char(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '\u{200B}'..='\u{200F}'
                | '\u{202A}'..='\u{202E}'
                | '\u{2060}'..='\u{2069}'
                | '\u{FEFF}'
        )
}

/// Ordered, insert-at-front display container.
pub trait RenderSink: Send {
    fn prepend(&mut self, item: FeedItem) -> Result<(), RenderError>;
}

/// Bounded newest-first list. Inserting past capacity evicts the oldest
/// item in the same call, so the list is never observed over capacity.
#[derive(Debug, Clone)]
pub struct FeedList {
    items: VecDeque<FeedItem>,
    capacity: usize,
}

impl FeedList {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Insert at the front; returns the evicted item, if any.
    pub fn push_front(&mut self, item: FeedItem) -> Option<FeedItem> {
        self.items.push_front(item);
        if self.items.len() > self.capacity {
            self.items.pop_back()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&FeedItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedItem> {
        self.items.iter()
    }
}

impl Default for FeedList {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RenderSink for FeedList {
    fn prepend(&mut self, item: FeedItem) -> Result<(), RenderError> {
        self.push_front(item);
        Ok(())
    }
}

/// Forwards items to the UI task, which owns the visible [`FeedList`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<FeedItem>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<FeedItem>) -> Self {
        Self { tx }
    }
}

impl RenderSink for ChannelSink {
    fn prepend(&mut self, item: FeedItem) -> Result<(), RenderError> {
        self.tx.send(item).map_err(|_| RenderError::SinkClosed)
    }
}

/// Headless sink: keeps the bounded list and prints each new item.
pub struct LineSink<W: Write + Send> {
    feed: FeedList,
    out: W,
}

impl<W: Write + Send> LineSink<W> {
    pub fn new(capacity: usize, out: W) -> Self {
        Self {
            feed: FeedList::new(capacity),
            out,
        }
    }

    pub fn feed(&self) -> &FeedList {
        &self.feed
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RenderSink for LineSink<W> {
    fn prepend(&mut self, item: FeedItem) -> Result<(), RenderError> {
        writeln!(
            self.out,
            "{} {} · {}\n  {}\n  {}",
            item.display_name, item.handle, item.timestamp, item.body, item.permalink
        )
        .and_then(|()| self.out.flush())
        .map_err(|err| match err.kind() {
            // Nobody is reading any more (e.g. `livefeed --headless | head -1`).
            std::io::ErrorKind::BrokenPipe => RenderError::SinkClosed,
            _ => RenderError::Io(err),
        })?;
        self.feed.push_front(item);
        Ok(())
    }
}

/// Projects records into a sink through a template.
pub struct FeedRenderer<T: TemplateFactory> {
    template: T,
}

impl<T: TemplateFactory> FeedRenderer<T> {
    pub fn new(template: T) -> Self {
        Self { template }
    }

    pub fn render(&self, record: &StreamRecord, sink: &mut dyn RenderSink) -> Result<(), RenderError> {
        let item = self.template.instantiate(record)?;
        sink.prepend(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::record::{decode, Author, RawMessage};

    fn record(id: &str) -> StreamRecord {
        StreamRecord {
            id: id.to_string(),
            author: Author {
                display_name: "Ada".to_string(),
                handle: "ada".to_string(),
                avatar_url: "https://img/ada.png".to_string(),
            },
            created_at: "Wed Oct 10 20:19:24 +0000 2018".to_string(),
            body: format!("post {}", id),
        }
    }

    fn ids(feed: &FeedList) -> Vec<String> {
        feed.iter().map(|item| item.id.clone()).collect()
    }

    #[test]
    fn test_card_binds_every_field() {
        let raw = RawMessage::from(
            r#"{"id_str":"42","text":"hi","created_at":"t","user":{"name":"A","screen_name":"a","profile_image_url_https":"u"}}"#,
        );
        let item = CardTemplate.instantiate(&decode(&raw).unwrap()).unwrap();
        assert_eq!(
            item,
            FeedItem {
                id: "42".to_string(),
                avatar_url: "u".to_string(),
                display_name: "A".to_string(),
                handle: "@a".to_string(),
                permalink: "https://twitter.com/a/status/42".to_string(),
                timestamp: "t".to_string(),
                body: "hi".to_string(),
            }
        );
    }

    #[test]
    fn test_markup_and_escapes_stay_literal() {
        let mut rec = record("1");
        rec.body = "<b>bold</b>\x1b[31mred\nnext".to_string();
        rec.author.display_name = "<script>x</script>".to_string();
        let item = CardTemplate.instantiate(&rec).unwrap();
        assert_eq!(item.body, "<b>bold</b> [31mred next");
        assert_eq!(item.display_name, "<script>x</script>");
    }

    #[test]
    fn test_newest_first_ordering() {
        let renderer = FeedRenderer::new(CardTemplate);
        let mut feed = FeedList::new(10);
        for id in ["1", "2", "3"] {
            renderer.render(&record(id), &mut feed).unwrap();
        }
        assert_eq!(ids(&feed), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let renderer = FeedRenderer::new(CardTemplate);
        let mut feed = FeedList::new(3);
        for n in 1..=5 {
            renderer.render(&record(&n.to_string()), &mut feed).unwrap();
            assert!(feed.len() <= 3);
        }
        assert_eq!(ids(&feed), vec!["5", "4", "3"]);
    }

    #[test]
    fn test_push_front_returns_evicted() {
        let mut feed = FeedList::new(1);
        assert!(feed.push_front(CardTemplate.instantiate(&record("a")).unwrap()).is_none());
        let evicted = feed.push_front(CardTemplate.instantiate(&record("b")).unwrap());
        assert_eq!(evicted.map(|item| item.id), Some("a".to_string()));
        assert_eq!(FeedList::new(0).capacity(), 1);
    }

    #[test]
    fn test_channel_sink_reports_closed_display() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sink = ChannelSink::new(tx);
        let renderer = FeedRenderer::new(CardTemplate);

        renderer.render(&record("1"), &mut sink).unwrap();
        assert_eq!(rx.try_recv().unwrap().id, "1");

        drop(rx);
        assert!(matches!(
            renderer.render(&record("2"), &mut sink),
            Err(RenderError::SinkClosed)
        ));
    }

    #[test]
    fn test_line_sink_prints_item() {
        let renderer = FeedRenderer::new(CardTemplate);
        let mut sink = LineSink::new(5, Vec::new());
        renderer.render(&record("9"), &mut sink).unwrap();
        assert_eq!(sink.feed().len(), 1);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.starts_with("Ada @ada · Wed Oct 10"));
        assert!(out.contains("post 9"));
        assert!(out.contains("https://twitter.com/ada/status/9"));
    }

    #[test]
    fn test_line_sink_never_writes_escape_sequences() {
        let raw = RawMessage::from(
            r#"{"id_str":"4\u001b]0;pwned\u0007","text":"hi","created_at":"t","user":{"name":"A","screen_name":"a\u001b[2J","profile_image_url_https":"https://img/\u001b[31m.png"}}"#,
        );
        let record = decode(&raw).unwrap();
        let item = CardTemplate.instantiate(&record).unwrap();
        assert!(!item.permalink.contains('\u{1b}'));
        assert!(!item.avatar_url.contains('\u{1b}'));

        let renderer = FeedRenderer::new(CardTemplate);
        let mut sink = LineSink::new(5, Vec::new());
        renderer.render(&record, &mut sink).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(!out.contains('\u{1b}'));
        assert!(!out.contains('\u{7}'));
        assert!(out.contains("https://twitter.com/a [2J/status/4 ]0;pwned "));
    }

    #[test]
    fn test_plain_text_neutralises_bidi_and_zero_width() {
        assert_eq!(plain_text("evil\u{202E}gnp.exe"), "evil gnp.exe");
        assert_eq!(plain_text("a\u{2066}b\u{2069}c"), "a b c");
        assert_eq!(plain_text("zero\u{200B}width\u{FEFF}"), "zero width ");
        assert_eq!(plain_text("Zoë 日本 🎉"), "Zoë 日本 🎉");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_line_sink_reports_closed_pipe() {
        let renderer = FeedRenderer::new(CardTemplate);
        let mut sink = LineSink::new(5, BrokenPipe);
        assert!(matches!(
            renderer.render(&record("1"), &mut sink),
            Err(RenderError::SinkClosed)
        ));
        assert!(sink.feed().is_empty());
    }

    struct BrokenTemplate;

    impl TemplateFactory for BrokenTemplate {
        fn instantiate(&self, _record: &StreamRecord) -> Result<FeedItem, RenderError> {
            Err(RenderError::Template("card template missing".to_string()))
        }
    }

    #[test]
    fn test_template_failure_leaves_sink_untouched() {
        let renderer = FeedRenderer::new(BrokenTemplate);
        let mut feed = FeedList::new(5);
        assert!(renderer.render(&record("1"), &mut feed).is_err());
        assert!(feed.is_empty());
    }
}
