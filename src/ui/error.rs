//! Full-screen display for fatal player errors.

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Paragraph, Wrap},
};
use std::io::{self, Stdout};
use std::time::Duration;

const ERROR_BG: Color = Color::Rgb(120, 0, 0);
const ERROR_FG: Color = Color::Rgb(255, 255, 255);
const HINT_FG: Color = Color::Rgb(255, 170, 170);

/// Owns the terminal while an error is shown; restores it on drop.
pub struct ErrorScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl ErrorScreen {
    /// # Errors
    /// - If raw mode or the alternate screen cannot be entered
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(ErrorScreen { terminal })
    }

    /// Draws `message` centered on a red screen until any key is pressed.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn show_error(&mut self, message: &str) -> anyhow::Result<()> {
        loop {
            self.terminal.draw(|frame| {
                let area = frame.area();
                frame.buffer_mut().set_style(area, Style::default().bg(ERROR_BG));

                let text = Text::from(vec![
                    Line::styled(message, Style::default().fg(ERROR_FG).bold()),
                    Line::default(),
                    Line::styled("press any key to exit", Style::default().fg(HINT_FG)),
                ]);
                let [_, body, _] = Layout::vertical([
                    Constraint::Fill(1),
                    Constraint::Length(text.height() as u16 + 2),
                    Constraint::Fill(1),
                ])
                .areas(area);
                let [_, body, _] = Layout::horizontal([
                    Constraint::Percentage(10),
                    Constraint::Percentage(80),
                    Constraint::Percentage(10),
                ])
                .areas(body);

                frame.render_widget(
                    Paragraph::new(text)
                        .alignment(Alignment::Center)
                        .wrap(Wrap { trim: true })
                        .style(Style::default().bg(ERROR_BG)),
                    body,
                );
            })?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(_) = event::read()? {
                    break;
                }
            }
        }
        Ok(())
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ErrorScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Shows `message` full-screen, falling back to stderr when the terminal
/// cannot be taken over.
pub fn show_fatal(message: &str) {
    let shown = ErrorScreen::new().and_then(|mut screen| screen.show_error(message));
    if let Err(e) = shown {
        tracing::warn!("Could not show error screen: {e}");
        eprintln!("{message}");
    }
}
