//! Traffic view: context header above one table per IP version.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::aggregate::{IpVersion, Snapshot};
use crate::config::RenderOptions;
use crate::tui::widgets::traffic_table;

pub struct TrafficView<'a> {
    pub options: &'a RenderOptions,
    pub snapshot: &'a Snapshot,
}

pub fn render(f: &mut Frame, view: &TrafficView<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Context header
            Constraint::Fill(1),   // IPv4
            Constraint::Fill(1),   // IPv6
        ])
        .split(f.area());

    draw_header(f, chunks[0], view);

    for (version, area) in [(IpVersion::V4, chunks[1]), (IpVersion::V6, chunks[2])] {
        let rows = view.snapshot.rows(version);
        let title = format!(" {} Traffic ", version.label());
        f.render_widget(traffic_table(&rows, &title), area);
    }
}

fn draw_header(f: &mut Frame, area: Rect, view: &TrafficView<'_>) {
    let title = Line::from(Span::styled(
        format!("Traffic in Context: {}", view.options.context),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ));
    let addresses = if view.snapshot.is_empty() {
        "waiting for TCP/UDP traffic".to_string()
    } else {
        format!("Addresses: {}", view.snapshot.address_count())
    };
    let status = Line::from(vec![
        Span::styled(view.options.interface.as_str(), Style::default().fg(Color::Cyan)),
        Span::raw(format!("  |  {}  |  ", addresses)),
        Span::styled("Ctrl+C", Style::default().fg(Color::Yellow)),
        Span::raw(" stop and export"),
    ]);
    f.render_widget(Paragraph::new(vec![title, status]), area);
}
