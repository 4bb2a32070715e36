//! Render loop: redraw the traffic view whenever the capture thread signals.

use std::io::{self, Stdout};

use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::Terminal;
use tracing::{info, warn};

use crate::aggregate::AggregateStore;
use crate::config::RenderOptions;
use crate::handoff::{UpdateReceiver, Wake};
use crate::shutdown::ShutdownCheck;
use crate::tui::views::traffic::{self, TrafficView};

/// A terminal the traffic view is drawn on.
///
/// Raw mode is left off so Ctrl+C still raises SIGINT and reaches the
/// shutdown handler instead of arriving as a key event.
pub struct Screen<B: Backend> {
    terminal: Terminal<B>,
    /// Whether we switched stdout to the alternate screen and must switch back.
    alternate: bool,
}

impl Screen<CrosstermBackend<Stdout>> {
    /// Take over stdout with the alternate screen.
    pub fn stdout() -> anyhow::Result<Self> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self {
            terminal,
            alternate: true,
        })
    }
}

impl<B: Backend> Screen<B> {
    /// A screen over an arbitrary backend, without touching stdout.
    #[cfg(test)]
    pub fn headless(backend: B) -> anyhow::Result<Self> {
        Ok(Self {
            terminal: Terminal::new(backend)?,
            alternate: false,
        })
    }

    pub fn draw(&mut self, view: &TrafficView<'_>) -> anyhow::Result<()> {
        self.terminal.draw(|f| traffic::render(f, view))?;
        Ok(())
    }

    #[cfg(test)]
    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    /// Restore the terminal. Also happens on drop, ignoring errors.
    pub fn close(mut self) -> anyhow::Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> anyhow::Result<()> {
        if self.alternate {
            self.alternate = false;
            execute!(io::stdout(), LeaveAlternateScreen, Show)?;
        }
        Ok(())
    }
}

impl<B: Backend> Drop for Screen<B> {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Redraw on every update, and once per poll interval otherwise, until
/// shutdown is requested or the capture side hangs up. Returns the number of
/// frames drawn.
pub fn run_render_loop<B, C>(
    screen: &mut Screen<B>,
    updates: &UpdateReceiver,
    store: &AggregateStore,
    options: &RenderOptions,
    shutdown: &C,
) -> u64
where
    B: Backend,
    C: ShutdownCheck + ?Sized,
{
    let mut redraws = 0;
    while !shutdown.should_stop() {
        let snapshot = store.snapshot();
        let view = TrafficView {
            options,
            snapshot: &snapshot,
        };
        match screen.draw(&view) {
            Ok(()) => redraws += 1,
            Err(e) => warn!("redraw failed: {:#}", e),
        }

        match updates.wait(options.poll) {
            Wake::Update | Wake::Timeout => {}
            Wake::Closed => {
                info!("capture side closed the handoff; leaving render loop");
                break;
            }
        }
    }
    redraws
}
