//! Interactive terminal player.
//!
//! `ShellState` holds everything that is not the terminal: the catalog, the
//! playback controller, one waveform renderer per track and the regions drawn
//! last frame (used for mouse hit testing). `PlayerShell` owns the terminal and
//! runs the event loop.

use std::collections::HashMap;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Gauge, Padding, Paragraph, Wrap},
};

use super::format::format_time;
use crate::catalog::{album_id, Catalog};
use crate::config::PlayerConfig;
use crate::player::{AudioBackend, PlaybackController};
use crate::waveform::{
    surface_for, PointerDown, PointerKind, WaveformPalette, WaveformRenderer, WaveformStyle,
    WaveformView,
};

const BG: Color = Color::Rgb(0, 0, 0);
const FG: Color = Color::Rgb(255, 255, 255);
const MUTED_FG: Color = Color::Rgb(100, 100, 100);
const HIGHLIGHT_BG: Color = Color::Rgb(20, 20, 20);

/// Rows used by one album entry on the home view.
const ALBUM_ROW_HEIGHT: u16 = 3;
/// Rows used by one track entry: a title line and the waveform below it.
const TRACK_ROW_HEIGHT: u16 = 4;
const WAVEFORM_ROWS: u16 = 2;
/// Width of the clickable play marker in front of each album title.
const PLAY_MARKER_WIDTH: u16 = 3;

const SEEK_STEP_SECONDS: f64 = 5.0;
const VOLUME_STEP: f32 = 0.1;
const STATUS_TTL: Duration = Duration::from_secs(4);
const LOADING_PREFIX: &str = "Loading ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    Album(usize),
    About,
}

/// Something the event loop must carry out after input was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Quit,
    /// Start `track` of `album` at `start` seconds with the album as playlist
    Play { album: usize, track: usize, start: f64 },
    Toggle,
    Next,
    Previous,
    Seek(f64),
    SeekBy(f64),
    VolumeBy(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Previous,
    Toggle,
    Next,
}

pub struct ShellState<B: AudioBackend> {
    catalog: Catalog,
    controller: PlaybackController<B>,
    style: WaveformStyle,
    palette: WaveformPalette,
    seek_debounce: Duration,
    renderers: HashMap<String, WaveformRenderer>,
    view: View,
    /// View to return to when leaving the about page
    previous_view: View,
    album_cursor: usize,
    track_cursor: usize,
    album_hits: Vec<(usize, Rect)>,
    title_hits: Vec<(usize, Rect)>,
    waveform_hits: Vec<(usize, Rect)>,
    transport_hits: Vec<(Transport, Rect)>,
    status: Option<(String, Instant)>,
}

/// Returns the renderer for `track_id`, creating it from the catalog's
/// waveform on first use.
fn renderer_for<'a>(
    renderers: &'a mut HashMap<String, WaveformRenderer>,
    catalog: &Catalog,
    style: WaveformStyle,
    debounce: Duration,
    track_id: &str,
) -> &'a mut WaveformRenderer {
    renderers.entry(track_id.to_string()).or_insert_with(|| {
        let mut renderer = WaveformRenderer::new(style, debounce);
        renderer.set_series(catalog.waveform(track_id));
        renderer
    })
}

/// First index to show so that `cursor` is visible in a list of `capacity` rows.
fn scroll_offset(cursor: usize, capacity: usize) -> usize {
    if capacity == 0 || cursor < capacity {
        0
    } else {
        cursor + 1 - capacity
    }
}

impl<B: AudioBackend> ShellState<B> {
    /// # Errors
    /// - If a configured waveform color cannot be parsed
    pub fn new(
        catalog: Catalog,
        controller: PlaybackController<B>,
        config: &PlayerConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            catalog,
            controller,
            style: WaveformStyle::from(&config.waveform),
            palette: WaveformPalette::from_config(&config.waveform)?,
            seek_debounce: Duration::from_millis(config.seek_debounce_ms),
            renderers: HashMap::new(),
            view: View::Home,
            previous_view: View::Home,
            album_cursor: 0,
            track_cursor: 0,
            album_hits: Vec::new(),
            title_hits: Vec::new(),
            waveform_hits: Vec::new(),
            transport_hits: Vec::new(),
            status: None,
        })
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn controller(&self) -> &PlaybackController<B> {
        &self.controller
    }

    fn open_album(&mut self, index: usize) {
        if index < self.catalog.albums.len() {
            self.view = View::Album(index);
            self.album_cursor = index;
            self.track_cursor = 0;
        }
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match key.code {
            KeyCode::Char('q') => Some(Command::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Command::Quit)
            }
            KeyCode::Char(' ') => Some(Command::Toggle),
            KeyCode::Char('n') => Some(Command::Next),
            KeyCode::Char('p') => Some(Command::Previous),
            KeyCode::Left => Some(Command::SeekBy(-SEEK_STEP_SECONDS)),
            KeyCode::Right => Some(Command::SeekBy(SEEK_STEP_SECONDS)),
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Command::VolumeBy(VOLUME_STEP)),
            KeyCode::Char('-') => Some(Command::VolumeBy(-VOLUME_STEP)),
            KeyCode::Char('a') => {
                if self.view != View::About {
                    self.previous_view = self.view;
                    self.view = View::About;
                }
                None
            }
            KeyCode::Esc => {
                self.view = match self.view {
                    View::About => self.previous_view,
                    _ => View::Home,
                };
                None
            }
            KeyCode::Up => {
                self.move_cursor(-1);
                None
            }
            KeyCode::Down => {
                self.move_cursor(1);
                None
            }
            KeyCode::Enter => match self.view {
                View::Home => {
                    self.open_album(self.album_cursor);
                    None
                }
                View::Album(album) => {
                    let has_track = self
                        .catalog
                        .albums
                        .get(album)
                        .is_some_and(|a| self.track_cursor < a.tracks.len());
                    has_track.then_some(Command::Play {
                        album,
                        track: self.track_cursor,
                        start: 0.0,
                    })
                }
                View::About => None,
            },
            _ => None,
        }
    }

    fn move_cursor(&mut self, step: isize) {
        let (cursor, len) = match self.view {
            View::Home => (&mut self.album_cursor, self.catalog.albums.len()),
            View::Album(album) => (
                &mut self.track_cursor,
                self.catalog.albums.get(album).map_or(0, |a| a.tracks.len()),
            ),
            View::About => return,
        };
        if len == 0 {
            return;
        }
        *cursor = cursor.saturating_add_signed(step).min(len - 1);
    }

    /// Routes a mouse event using the regions drawn in the last frame.
    pub fn handle_mouse(&mut self, mouse: MouseEvent, at: Instant) -> Option<Command> {
        match mouse.kind {
            MouseEventKind::ScrollUp => {
                self.move_cursor(-1);
                None
            }
            MouseEventKind::ScrollDown => {
                self.move_cursor(1);
                None
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let position = Position::new(mouse.column, mouse.row);
                self.click(position, at)
            }
            _ => None,
        }
    }

    fn click(&mut self, position: Position, at: Instant) -> Option<Command> {
        if let Some(&(button, _)) = self
            .transport_hits
            .iter()
            .find(|(_, area)| area.contains(position))
        {
            return Some(match button {
                Transport::Previous => Command::Previous,
                Transport::Toggle => Command::Toggle,
                Transport::Next => Command::Next,
            });
        }

        match self.view {
            View::Home => {
                let &(album, area) = self
                    .album_hits
                    .iter()
                    .find(|(_, area)| area.contains(position))?;
                if position.x < area.x + PLAY_MARKER_WIDTH {
                    self.album_cursor = album;
                    Some(Command::Play {
                        album,
                        track: 0,
                        start: 0.0,
                    })
                } else {
                    self.open_album(album);
                    None
                }
            }
            View::Album(album) => {
                if let Some(&(track, _)) =
                    self.title_hits.iter().find(|(_, area)| area.contains(position))
                {
                    self.track_cursor = track;
                    return None;
                }
                let &(track, area) = self
                    .waveform_hits
                    .iter()
                    .find(|(_, area)| area.contains(position))?;
                self.waveform_click(album, track, area, position, at)
            }
            View::About => None,
        }
    }

    fn waveform_click(
        &mut self,
        album: usize,
        track: usize,
        area: Rect,
        position: Position,
        at: Instant,
    ) -> Option<Command> {
        let track_id = self.catalog.albums.get(album)?.tracks.get(track)?.id.clone();
        self.track_cursor = track;

        let renderer = renderer_for(
            &mut self.renderers,
            &self.catalog,
            self.style,
            self.seek_debounce,
            &track_id,
        );
        // Press lands in the middle of the clicked column
        let offset_x = f32::from(position.x - area.x) + 0.5;
        let response = renderer.pointer_down(PointerDown {
            kind: PointerKind::Mouse,
            offset_x,
            at,
        });
        let intent = response.seek?;

        if self.controller.current_track_id() == Some(track_id.as_str()) {
            Some(Command::Seek(intent.time_seconds))
        } else {
            Some(Command::Play {
                album,
                track,
                start: intent.time_seconds,
            })
        }
    }

    /// Shows a loading notice for commands that fetch media. Returns true when
    /// the caller should redraw before awaiting [`ShellState::execute`].
    pub fn announce(&mut self, command: &Command) -> bool {
        let what = match command {
            Command::Play { album, track, .. } => {
                let Some(selected) = self
                    .catalog
                    .albums
                    .get(*album)
                    .and_then(|a| a.tracks.get(*track))
                else {
                    return false;
                };
                selected.title.clone()
            }
            Command::Next if self.controller.current_track().is_some() => "next track".to_string(),
            Command::Previous if self.controller.current_track().is_some() => {
                "previous track".to_string()
            }
            _ => return false,
        };
        self.notify(format!("{LOADING_PREFIX}{what}…"));
        true
    }

    /// Carries out `command`. Playback failures are logged and surfaced in
    /// the status line; they never end the session.
    pub async fn execute(&mut self, command: Command) {
        let result = match command {
            Command::Quit => Ok(()),
            Command::Play {
                album,
                track,
                start,
            } => {
                let Some(album) = self.catalog.albums.get(album) else {
                    return;
                };
                let Some(selected) = album.tracks.get(track).cloned() else {
                    return;
                };
                let playlist = album.tracks.clone();
                self.controller
                    .load_and_play(selected, playlist, start)
                    .await
            }
            Command::Toggle => {
                self.controller.toggle();
                Ok(())
            }
            Command::Next => self.controller.next().await,
            Command::Previous => self.controller.previous().await,
            Command::Seek(seconds) => self.controller.seek(seconds),
            Command::SeekBy(delta) => {
                let target = self.controller.progress() + delta;
                self.controller.seek(target)
            }
            Command::VolumeBy(delta) => {
                let volume = self.controller.volume() + delta;
                self.controller.set_volume(volume);
                self.notify(format!(
                    "Volume {:.0}%",
                    self.controller.volume() * 100.0
                ));
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                if self
                    .status
                    .as_ref()
                    .is_some_and(|(message, _)| message.starts_with(LOADING_PREFIX))
                {
                    self.status = None;
                }
            }
            Err(e) => {
                tracing::error!("Playback command failed: {e}");
                self.notify(format!("Playback failed: {e}"));
            }
        }
    }

    /// Advances polling and end-of-track handling for one frame.
    pub async fn tick(&mut self, now: Instant) {
        if let Err(e) = self.controller.tick(now).await {
            tracing::error!("Could not advance to the next track: {e}");
            self.notify(format!("Playback failed: {e}"));
        }
        if self
            .status
            .as_ref()
            .is_some_and(|(_, since)| now.duration_since(*since) >= STATUS_TTL)
        {
            self.status = None;
        }
    }

    pub fn render(&mut self, frame: &mut Frame) {
        self.album_hits.clear();
        self.title_hits.clear();
        self.waveform_hits.clear();
        self.transport_hits.clear();

        let area = frame.area();
        let outer = Block::default()
            .padding(Padding::horizontal(1))
            .style(Style::default().fg(FG).bg(BG));
        frame.render_widget(&outer, area);
        let inner = outer.inner(area);

        let [header_area, body_area, transport_area, footer_area] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(inner);

        self.render_header(frame, header_area);
        match self.view {
            View::Home => self.render_home(frame, body_area),
            View::Album(album) => self.render_album(frame, body_area, album),
            View::About => self.render_about(frame, body_area),
        }
        self.render_transport(frame, transport_area);
        self.render_footer(frame, footer_area);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let section = match self.view {
            View::Home => "Albums".to_string(),
            View::Album(index) => self
                .catalog
                .albums
                .get(index)
                .map(|a| a.title.clone())
                .unwrap_or_default(),
            View::About => "About".to_string(),
        };
        let line = Line::from(vec![
            Span::styled("unjazz", Style::default().fg(self.palette.active).bold()),
            Span::styled(format!("  {section}"), Style::default().fg(MUTED_FG)),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_home(&mut self, frame: &mut Frame, area: Rect) {
        if self.catalog.albums.is_empty() {
            frame.render_widget(
                Paragraph::new("No albums in the manifest.").style(Style::default().fg(MUTED_FG)),
                area,
            );
            return;
        }

        let capacity = usize::from(area.height / ALBUM_ROW_HEIGHT);
        let first = scroll_offset(self.album_cursor, capacity);
        let playing_album = self
            .controller
            .current_track()
            .map(|t| album_id(&t.album));

        for (slot, (index, album)) in self
            .catalog
            .albums
            .iter()
            .enumerate()
            .skip(first)
            .take(capacity)
            .enumerate()
        {
            let row = Rect {
                x: area.x,
                y: area.y + slot as u16 * ALBUM_ROW_HEIGHT,
                width: area.width,
                height: ALBUM_ROW_HEIGHT - 1,
            };
            let selected = index == self.album_cursor;
            let playing = playing_album.as_deref() == Some(album.id.as_str());
            let marker_fg = if playing { self.palette.active } else { FG };
            let count = album.tracks.len();

            let lines = vec![
                Line::from(vec![
                    Span::styled(" ▶ ", Style::default().fg(marker_fg)),
                    Span::styled(album.title.clone(), Style::default().fg(FG).bold()),
                ]),
                Line::styled(
                    format!(
                        "   {} · {count} {} · {}",
                        album.artist,
                        if count == 1 { "track" } else { "tracks" },
                        format_time(album.total_duration())
                    ),
                    Style::default().fg(MUTED_FG),
                ),
            ];
            let bg = if selected { HIGHLIGHT_BG } else { BG };
            frame.render_widget(Paragraph::new(lines).style(Style::default().bg(bg)), row);
            self.album_hits.push((index, row));
        }
    }

    fn render_album(&mut self, frame: &mut Frame, area: Rect, album_index: usize) {
        let Some(album) = self.catalog.albums.get(album_index) else {
            return;
        };

        let description_rows = if album.description.is_empty() { 0 } else { 2 };
        let [intro_area, tracks_area] = Layout::vertical([
            Constraint::Length(2 + description_rows),
            Constraint::Min(0),
        ])
        .areas(area);

        let mut intro = vec![Line::styled(
            album.artist.clone(),
            Style::default().fg(MUTED_FG),
        )];
        if !album.description.is_empty() {
            intro.push(Line::styled(
                album.description.clone(),
                Style::default().fg(MUTED_FG).italic(),
            ));
        }
        frame.render_widget(Paragraph::new(intro).wrap(Wrap { trim: true }), intro_area);

        let capacity = usize::from(tracks_area.height / TRACK_ROW_HEIGHT);
        let first = scroll_offset(self.track_cursor, capacity);
        let current_id = self.controller.current_track_id().map(str::to_string);
        let (progress, duration) = (self.controller.progress(), self.controller.duration());

        for (slot, (index, track)) in album
            .tracks
            .iter()
            .enumerate()
            .skip(first)
            .take(capacity)
            .enumerate()
        {
            let y = tracks_area.y + slot as u16 * TRACK_ROW_HEIGHT;
            let title_area = Rect {
                x: tracks_area.x,
                y,
                width: tracks_area.width,
                height: 1,
            };
            let waveform_area = Rect {
                x: tracks_area.x,
                y: y + 1,
                width: tracks_area.width,
                height: WAVEFORM_ROWS,
            };

            let is_current = current_id.as_deref() == Some(track.id.as_str());
            let selected = index == self.track_cursor;
            let title_fg = if is_current { self.palette.active } else { FG };
            let number = if track.track_number > 0 {
                format!("{:>2}. ", track.track_number)
            } else {
                "    ".to_string()
            };
            let time = if is_current {
                format!("{} / {}", format_time(progress), format_time(duration))
            } else {
                format_time(track.duration)
            };
            let [name_area, time_area] = Layout::horizontal([
                Constraint::Min(0),
                Constraint::Length(time.chars().count() as u16 + 1),
            ])
            .areas(title_area);

            let bg = if selected { HIGHLIGHT_BG } else { BG };
            frame.render_widget(
                Paragraph::new(Line::from(vec![
                    Span::styled(if selected { "> " } else { "  " }, Style::default().fg(FG)),
                    Span::styled(number, Style::default().fg(MUTED_FG)),
                    Span::styled(track.title.clone(), Style::default().fg(title_fg)),
                ]))
                .style(Style::default().bg(bg)),
                name_area,
            );
            frame.render_widget(
                Paragraph::new(time)
                    .alignment(Alignment::Right)
                    .style(Style::default().fg(MUTED_FG).bg(bg)),
                time_area,
            );

            let renderer = renderer_for(
                &mut self.renderers,
                &self.catalog,
                self.style,
                self.seek_debounce,
                &track.id,
            );
            if is_current {
                renderer.set_playback(progress, duration);
            } else {
                renderer.set_playback(0.0, track.duration);
            }
            renderer.observe_surface(surface_for(waveform_area));
            frame.render_widget(
                WaveformView::new(renderer.layout(), self.palette),
                waveform_area,
            );

            self.title_hits.push((index, title_area));
            self.waveform_hits.push((index, waveform_area));
        }
    }

    fn render_about(&self, frame: &mut Frame, area: Rect) {
        let text = vec![
            Line::styled("unjazz", Style::default().fg(self.palette.active).bold()),
            Line::default(),
            Line::raw(
                "A small player for albums published as static manifests. Every track \
                 is drawn as a waveform; click anywhere on it to jump there.",
            ),
            Line::default(),
            Line::styled(
                format!(
                    "{} albums, {} tracks, manifest generated {}",
                    self.catalog.albums.len(),
                    self.catalog.track_count(),
                    if self.catalog.generated_at.is_empty() {
                        "at an unknown time"
                    } else {
                        self.catalog.generated_at.as_str()
                    }
                ),
                Style::default().fg(MUTED_FG),
            ),
            Line::styled(
                format!("version {}", env!("CARGO_PKG_VERSION")),
                Style::default().fg(MUTED_FG),
            ),
        ];
        frame.render_widget(
            Paragraph::new(text)
                .wrap(Wrap { trim: true })
                .block(Block::default().padding(Padding::top(1))),
            area,
        );
    }

    fn render_transport(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(MUTED_FG));
        frame.render_widget(&block, area);
        let inner = block.inner(area);
        let [controls_area, gauge_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(inner);

        let toggle = if self.controller.is_playing() { " ❚❚ " } else { "  ▶ " };
        let buttons = [
            (Transport::Previous, " ◀◀ "),
            (Transport::Toggle, toggle),
            (Transport::Next, " ▶▶ "),
        ];
        let mut spans = Vec::new();
        let mut x = controls_area.x;
        for (button, label) in buttons {
            let span = Span::styled(label, Style::default().fg(FG).bold());
            let width = span.width() as u16;
            self.transport_hits.push((
                button,
                Rect {
                    x,
                    y: controls_area.y,
                    width,
                    height: 1,
                },
            ));
            x += width;
            spans.push(span);
        }

        match self.controller.current_track() {
            Some(track) => {
                spans.push(Span::styled(
                    format!("  {}", track.title),
                    Style::default().fg(self.palette.active),
                ));
                spans.push(Span::styled(
                    format!(" · {}", track.artist),
                    Style::default().fg(MUTED_FG),
                ));
            }
            None => spans.push(Span::styled("  nothing playing", Style::default().fg(MUTED_FG))),
        }

        let right = format!(
            "{} / {}  vol {:.0}%",
            format_time(self.controller.progress()),
            format_time(self.controller.duration()),
            self.controller.volume() * 100.0
        );
        let [left_area, right_area] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(right.chars().count() as u16),
        ])
        .areas(controls_area);
        frame.render_widget(Paragraph::new(Line::from(spans)), left_area);
        frame.render_widget(
            Paragraph::new(right)
                .alignment(Alignment::Right)
                .style(Style::default().fg(MUTED_FG)),
            right_area,
        );

        let duration = self.controller.duration();
        let ratio = if duration > 0.0 {
            (self.controller.progress() / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        frame.render_widget(
            Gauge::default()
                .ratio(ratio)
                .label("")
                .use_unicode(true)
                .gauge_style(Style::default().fg(self.palette.active).bg(self.palette.dimmed)),
            gauge_area,
        );
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let (text, fg) = match &self.status {
            Some((message, _)) => (message.clone(), FG),
            None => {
                let help = match self.view {
                    View::Home => "↑↓ select, ↵ open, click ▶ play, a about, q quit",
                    View::Album(_) => {
                        "↵ play, space pause, n/p next/prev, ←→ seek, +/- volume, esc back, q quit"
                    }
                    View::About => "esc back, q quit",
                };
                (help.to_string(), MUTED_FG)
            }
        };
        frame.render_widget(
            Paragraph::new(text)
                .alignment(Alignment::Center)
                .style(Style::default().fg(fg)),
            area,
        );
    }
}

/// Owns the terminal for the lifetime of a player session.
pub struct PlayerShell<B: AudioBackend> {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    state: ShellState<B>,
}

impl<B: AudioBackend> PlayerShell<B> {
    /// Enters the alternate screen with mouse capture.
    ///
    /// # Errors
    /// - If the terminal cannot be initialized
    pub fn new(state: ShellState<B>) -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal, state })
    }

    /// Runs until the user quits.
    ///
    /// # Errors
    /// - If drawing or reading terminal events fails
    pub async fn run(&mut self) -> anyhow::Result<()> {
        tracing::debug!("Player shell started");

        loop {
            self.terminal.draw(|frame| self.state.render(frame))?;

            if event::poll(Duration::from_millis(50))? {
                let command = match event::read()? {
                    Event::Key(key) => self.state.handle_key(key),
                    Event::Mouse(mouse) => self.state.handle_mouse(mouse, Instant::now()),
                    _ => None,
                };
                match command {
                    Some(Command::Quit) => break,
                    Some(command) => {
                        if self.state.announce(&command) {
                            self.terminal.draw(|frame| self.state.render(frame))?;
                        }
                        self.state.execute(command).await
                    }
                    None => {}
                }
            }

            self.state.tick(Instant::now()).await;
        }

        tracing::debug!("Player shell exited");
        Ok(())
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl<B: AudioBackend> Drop for PlayerShell<B> {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::group_albums;
    use crate::config::RelayConfig;
    use crate::manifest::types::Track;
    use crate::player::MediaFetcher;
    use ratatui::backend::TestBackend;

    /// Plays nothing; enough for input routing and drawing.
    #[derive(Default)]
    struct SilentBackend {
        loaded: bool,
    }

    impl AudioBackend for SilentBackend {
        fn open(&mut self, _media: Vec<u8>, _volume: f32) -> anyhow::Result<Option<f64>> {
            self.loaded = true;
            Ok(None)
        }
        fn release(&mut self) {
            self.loaded = false;
        }
        fn play(&mut self) {}
        fn pause(&mut self) {}
        fn seek(&mut self, _seconds: f64) -> anyhow::Result<()> {
            Ok(())
        }
        fn position(&self) -> f64 {
            0.0
        }
        fn set_volume(&mut self, _volume: f32) {}
        fn is_finished(&self) -> bool {
            false
        }
        fn is_loaded(&self) -> bool {
            self.loaded
        }
    }

    fn track(album: &str, number: u32, id: &str) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Title {id}"),
            artist: "Miles".to_string(),
            album: album.to_string(),
            album_description: String::new(),
            duration: 100.0,
            filename: format!("{id}.mp3"),
            track_number: number,
            url: format!("/unjazz/albums/x/{id}.mp3"),
            artwork: None,
            waveform: String::new(),
        }
    }

    fn state() -> ShellState<SilentBackend> {
        let tracks = vec![
            track("Kind of Blue", 1, "so-what"),
            track("Kind of Blue", 2, "freddie"),
            track("Blue Train", 1, "blue-train"),
        ];
        let mut catalog = Catalog {
            albums: group_albums(&tracks),
            ..Catalog::default()
        };
        for t in &tracks {
            catalog.waveforms.insert(t.id.clone(), vec![0.5; 200]);
        }

        let config = PlayerConfig::default();
        let fetcher = MediaFetcher::new(&config, &RelayConfig::default()).unwrap();
        let controller = PlaybackController::new(
            SilentBackend::default(),
            fetcher,
            Duration::from_millis(100),
            1.0,
        );
        ShellState::new(catalog, controller, &config).unwrap()
    }

    fn draw(state: &mut ShellState<SilentBackend>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| state.render(frame)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(usize::from(buffer.area.width))
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn left_click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_home_lists_albums_and_enter_opens() {
        let mut s = state();
        let screen = draw(&mut s);
        assert!(screen.contains("Kind of Blue"));
        assert!(screen.contains("2 tracks"));
        assert!(screen.contains("Blue Train"));

        s.handle_key(press(KeyCode::Down));
        assert_eq!(s.handle_key(press(KeyCode::Enter)), None);
        assert_eq!(s.view(), View::Album(1));

        s.handle_key(press(KeyCode::Esc));
        assert_eq!(s.view(), View::Home);
    }

    #[test]
    fn test_about_returns_to_previous_view() {
        let mut s = state();
        s.handle_key(press(KeyCode::Enter));
        s.handle_key(press(KeyCode::Char('a')));
        assert_eq!(s.view(), View::About);
        assert!(draw(&mut s).contains("3 tracks"));
        s.handle_key(press(KeyCode::Esc));
        assert_eq!(s.view(), View::Album(0));
    }

    #[test]
    fn test_transport_keys() {
        let mut s = state();
        assert_eq!(s.handle_key(press(KeyCode::Char('q'))), Some(Command::Quit));
        assert_eq!(s.handle_key(press(KeyCode::Char(' '))), Some(Command::Toggle));
        assert_eq!(s.handle_key(press(KeyCode::Char('n'))), Some(Command::Next));
        assert_eq!(s.handle_key(press(KeyCode::Char('p'))), Some(Command::Previous));
        assert_eq!(
            s.handle_key(press(KeyCode::Left)),
            Some(Command::SeekBy(-SEEK_STEP_SECONDS))
        );
        assert_eq!(
            s.handle_key(press(KeyCode::Char('-'))),
            Some(Command::VolumeBy(-VOLUME_STEP))
        );
    }

    #[test]
    fn test_enter_in_album_plays_selected_track() {
        let mut s = state();
        s.handle_key(press(KeyCode::Enter));
        s.handle_key(press(KeyCode::Down));
        assert_eq!(
            s.handle_key(press(KeyCode::Enter)),
            Some(Command::Play {
                album: 0,
                track: 1,
                start: 0.0
            })
        );
    }

    #[test]
    fn test_waveform_click_starts_other_track_at_clicked_time() {
        let mut s = state();
        s.handle_key(press(KeyCode::Enter));
        let screen = draw(&mut s);
        assert!(screen.contains("Title freddie"));

        let (track, area) = s.waveform_hits[1];
        assert_eq!(track, 1);
        let column = area.x + area.width / 2;
        let at = Instant::now();

        let command = s.handle_mouse(left_click(column, area.y), at);
        let expected =
            (f64::from(column - area.x) + 0.5) / f64::from(area.width) * 100.0;
        match command {
            Some(Command::Play {
                album: 0,
                track: 1,
                start,
            }) => assert!((start - expected).abs() < 1e-4),
            other => panic!("unexpected command {other:?}"),
        }

        // Within the debounce window the same row ignores the press
        let again = s.handle_mouse(left_click(column, area.y), at + Duration::from_millis(100));
        assert_eq!(again, None);
        let later = s.handle_mouse(left_click(area.x, area.y), at + Duration::from_millis(400));
        assert!(matches!(later, Some(Command::Play { track: 1, .. })));
    }

    #[test]
    fn test_home_play_marker_plays_album_from_first_track() {
        let mut s = state();
        draw(&mut s);
        let (album, area) = s.album_hits[1];
        assert_eq!(album, 1);

        assert_eq!(
            s.handle_mouse(left_click(area.x + 1, area.y), Instant::now()),
            Some(Command::Play {
                album: 1,
                track: 0,
                start: 0.0
            })
        );
        assert_eq!(s.view(), View::Home);

        assert_eq!(s.handle_mouse(left_click(area.x + 10, area.y), Instant::now()), None);
        assert_eq!(s.view(), View::Album(1));
    }

    #[test]
    fn test_transport_buttons_are_clickable() {
        let mut s = state();
        draw(&mut s);
        let (button, area) = s.transport_hits[2];
        assert_eq!(button, Transport::Next);
        assert_eq!(
            s.handle_mouse(left_click(area.x, area.y), Instant::now()),
            Some(Command::Next)
        );
    }

    #[tokio::test]
    async fn test_volume_command_updates_status() {
        let mut s = state();
        s.execute(Command::VolumeBy(-0.25)).await;
        assert_eq!(s.controller().volume(), 0.75);
        assert!(draw(&mut s).contains("Volume 75%"));
    }

    #[tokio::test]
    async fn test_play_shows_loading_until_the_load_settles() {
        let mut s = state();
        s.handle_key(press(KeyCode::Enter));
        let command = Command::Play {
            album: 0,
            track: 1,
            start: 0.0,
        };

        assert!(s.announce(&command));
        assert!(draw(&mut s).contains("Loading Title freddie…"));

        s.execute(command).await;
        assert!(!draw(&mut s).contains("Loading"));
    }

    #[test]
    fn test_only_media_commands_announce() {
        let mut s = state();
        assert!(!s.announce(&Command::Toggle));
        assert!(!s.announce(&Command::Seek(3.0)));
        // Nothing is playing, so there is no next track to fetch
        assert!(!s.announce(&Command::Next));
        assert!(!s.announce(&Command::Play {
            album: 9,
            track: 0,
            start: 0.0
        }));
        assert!(draw(&mut s).contains("q quit"));
    }

    #[test]
    fn test_scroll_offset() {
        assert_eq!(scroll_offset(0, 5), 0);
        assert_eq!(scroll_offset(4, 5), 0);
        assert_eq!(scroll_offset(7, 5), 3);
        assert_eq!(scroll_offset(3, 0), 0);
    }
}
