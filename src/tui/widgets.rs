//! Table adapter: snapshot rows → ratatui table.

use ratatui::layout::Constraint;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Row, Table};

use crate::aggregate::SnapshotRow;

const ADDRESS_HEADER: &str = "IP Address";

/// Build a bordered table titled `title` with one line per row.
pub fn traffic_table(rows: &[SnapshotRow], title: &str) -> Table<'static> {
    let dim = Style::default().fg(Color::Gray);

    let body: Vec<Row> = rows
        .iter()
        .map(|r| {
            Row::new(vec![
                Cell::from(r.address.to_string()),
                Cell::from(r.protocol.as_str()).style(dim),
                Cell::from(r.ports_joined()).style(dim),
            ])
        })
        .collect();

    let header = Row::new(vec![ADDRESS_HEADER, "Protocol", "Ports"]).style(
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let widths = [
        Constraint::Length(address_width(rows)),
        Constraint::Length(8),
        Constraint::Min(10),
    ];

    Table::new(body, widths)
        .header(header)
        .column_spacing(2)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(title.to_string()),
        )
}

/// Widest address in `rows`, at least the header width.
fn address_width(rows: &[SnapshotRow]) -> u16 {
    rows.iter()
        .map(|r| r.address.to_string().len())
        .max()
        .unwrap_or(0)
        .max(ADDRESS_HEADER.len()) as u16
}
