pub mod widgets;

use crate::config::Config;
use crate::feeds::{Orchestrator, StreamStatus, WsConnector};
use crate::location::{read_filter, with_filter};
use crate::renderer::{CardTemplate, ChannelSink, FeedItem};
use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use url::Url;
use widgets::stream::StreamWidget;

type Tui = Terminal<CrosstermBackend<Stdout>>;

pub struct App {
    widget: StreamWidget,
    location: watch::Sender<Url>,
    should_quit: bool,
}

impl App {
    pub fn new(widget: StreamWidget, location: watch::Sender<Url>) -> Self {
        Self {
            widget,
            location,
            should_quit: false,
        }
    }

    pub fn widget(&self) -> &StreamWidget {
        &self.widget
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn push_item(&mut self, item: FeedItem) {
        self.widget.push(item);
    }

    pub fn update_status(&mut self, status: StreamStatus) {
        self.widget.update_status(status);
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.widget.is_filter_prompt_open() {
            match key.code {
                KeyCode::Esc => self.widget.close_modal(),
                KeyCode::Enter => {
                    if let Some(filter) = self.widget.submit_filter() {
                        self.apply_filter(&filter);
                    }
                }
                KeyCode::Backspace => self.widget.delete_char(),
                KeyCode::Char(c) => self.widget.add_char(c),
                _ => {}
            }
            return;
        }

        if self.widget.is_detail_open() {
            match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => self.widget.close_detail(),
                KeyCode::Char('o') => self.open_selected(),
                _ => {}
            }
            return;
        }

        self.widget.clear_status_message();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.widget.scroll_down(),
            KeyCode::Char('k') | KeyCode::Up => self.widget.scroll_up(),
            KeyCode::Char('g') | KeyCode::Home => self.widget.select_first(),
            KeyCode::Enter => self.widget.open_detail(),
            KeyCode::Char('o') => self.open_selected(),
            KeyCode::Char('/') => {
                let current = read_filter(&self.location.borrow());
                self.widget.open_filter_prompt(current.as_deref());
            }
            _ => {}
        }
    }

    fn apply_filter(&mut self, filter: &str) {
        let page = with_filter(&self.location.borrow(), Some(filter));
        info!(page = %page, "page filter changed");
        self.location.send_replace(page);
        self.widget
            .set_status_message("Filter applies on the next reconnect");
    }

    fn open_selected(&mut self) {
        if let Some(url) = self.widget.selected_permalink() {
            if let Err(e) = open::that(&url) {
                warn!(error = %e, url = %url, "failed to open browser");
                self.widget.set_status_message(format!("Could not open {}: {}", url, e));
            }
        }
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Tui,
        mut items: mpsc::UnboundedReceiver<FeedItem>,
        mut status: watch::Receiver<StreamStatus>,
    ) -> Result<()> {
        let mut events = EventStream::new();
        let mut status_open = true;
        // Keeps the "reconnecting in" countdown moving.
        let mut redraw = tokio::time::interval(Duration::from_millis(500));

        while !self.should_quit {
            terminal.draw(|frame| {
                let area = frame.area();
                self.widget.render(frame, area);
            })?;

            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => self.handle_key(key),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                },
                Some(item) = items.recv() => {
                    self.push_item(item);
                    while let Ok(item) = items.try_recv() {
                        self.push_item(item);
                    }
                }
                changed = status.changed(), if status_open => {
                    if changed.is_ok() {
                        let snapshot = status.borrow_and_update().clone();
                        self.update_status(snapshot);
                    } else {
                        status_open = false;
                    }
                }
                _ = redraw.tick() => {}
            }
        }
        Ok(())
    }
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the terminal UI until the user quits.
pub async fn run(config: &Config, page: Url) -> Result<()> {
    let (location_tx, location_rx) = watch::channel(page);
    let (item_tx, item_rx) = mpsc::unbounded_channel();

    let connector = WsConnector::new(Duration::from_secs(config.stream.handshake_timeout_secs));
    let mut orchestrator = Orchestrator::new(
        Box::new(connector),
        config.reconnect.clone(),
        location_rx,
        ChannelSink::new(item_tx),
        CardTemplate,
    );
    let status_rx = orchestrator.subscribe();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let feed_task = tokio::spawn(async move { orchestrator.run(shutdown_rx).await });

    let mut app = App::new(
        StreamWidget::new(config.feed.title.clone(), config.feed.capacity),
        location_tx,
    );

    let mut terminal = setup_terminal()?;
    let result = app.event_loop(&mut terminal, item_rx, status_rx).await;
    restore_terminal(&mut terminal)?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = feed_task.await {
        warn!(error = %e, "feed task ended abnormally");
    }
    result
}
