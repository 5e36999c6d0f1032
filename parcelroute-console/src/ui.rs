use parcelroute_core::{
    Collection, DRUM_ITEM, LineItem, Shipment, ShipmentStatus, UnassignedReason,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
};

use crate::app::{App, Screen, Selection};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let header = Paragraph::new(format!(
        "parcelroute – collection runs · {} active · {} drums · operator {}",
        app.view.groups.values().map(|group| group.shipments.len()).sum::<usize>()
            + app.view.unassigned.len(),
        app.view.drum_count(),
        app.operator.label()
    ))
    .block(Block::default().borders(Borders::ALL).title("Parcelroute"));
    frame.render_widget(header, *header_area);

    match app.screen {
        Screen::Routes => draw_routes(frame, app, *content_area),
        Screen::Shipments => draw_shipments(frame, app, *content_area),
        Screen::Detail => draw_detail(frame, app, *content_area),
    }

    let nav_hint = match app.screen {
        Screen::Routes => "↑/↓ move · Enter open route · r refresh · q/Ctrl-C quit",
        Screen::Shipments => "↑/↓ move · Enter open shipment · Esc/←/b back · r refresh · q quit",
        Screen::Detail => "n next status (delivery needs driver evidence) · x cancel · Esc/←/b back · r refresh · q quit",
    };

    let status_text = if app.is_loading {
        format!("Loading… · {nav_hint}")
    } else if let Some(msg) = &app.error_message {
        format!("{msg} · {nav_hint}")
    } else if let Some(msg) = &app.info_message {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn draw_routes(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let mut rows: Vec<Row<'_>> = app
        .groups()
        .map(|group| {
            Row::new(vec![
                Cell::from(group.route.to_string()),
                Cell::from(group.collection_date.format("%a %d.%m.%Y").to_string()),
                Cell::from(group.areas.join(" ")),
                Cell::from(group.drum_count.to_string()),
                Cell::from(group.unit_count.to_string()),
                Cell::from(group.unique_customer_count.to_string()),
                Cell::from(group.shipments.len().to_string()),
            ])
        })
        .collect();
    if !app.view.unassigned.is_empty() {
        rows.push(
            Row::new(vec![
                Cell::from("Unassigned"),
                Cell::from("manual"),
                Cell::from(""),
                Cell::from(""),
                Cell::from(""),
                Cell::from(""),
                Cell::from(app.view.unassigned.len().to_string()),
            ])
            .style(Style::default().fg(Color::Red)),
        );
    }

    let title = format!(
        "Collection runs ({} re-resolved on load)",
        app.view.re_resolved
    );
    let column_widths = [
        Constraint::Min(14),
        Constraint::Length(16),
        Constraint::Min(12),
        Constraint::Length(6),
        Constraint::Length(6),
        Constraint::Length(10),
        Constraint::Length(10),
    ];
    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Route", "Collection", "Areas", "Drums", "Units", "Customers", "Shipments"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .column_spacing(1);

    let mut state = TableState::default();
    if app.route_row_count() > 0 {
        state.select(Some(app.route_index));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_shipments(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let title = match &app.selection {
        Some(Selection::Route(route)) => format!("Shipments on {route}"),
        Some(Selection::Unassigned) => "Shipments needing manual collection".to_owned(),
        None => "Shipments".to_owned(),
    };

    if app.shipments.is_empty() {
        let paragraph = Paragraph::new("No active shipments here.")
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let rows = app.shipments.iter().map(|shipment| {
        Row::new(vec![
            Cell::from(shipment.tracking_number.to_string()),
            Cell::from(shipment.owner.to_string()),
            Cell::from(shipment.sender.address.postal_code.clone()),
            Cell::from(shipment.composition.units_of(DRUM_ITEM).to_string()),
            Cell::from(format!("{} {}", shipment.total_amount, shipment.currency)),
            Cell::from(status_text(app, shipment)),
        ])
        .style(Style::default().fg(status_color(shipment.status)))
    });

    let column_widths = [
        Constraint::Length(12),
        Constraint::Min(12),
        Constraint::Length(10),
        Constraint::Length(6),
        Constraint::Length(14),
        Constraint::Min(20),
    ];
    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Tracking", "Customer", "Postcode", "Drums", "Total", "Status"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .column_spacing(1);

    let mut state = TableState::default();
    state.select(Some(app.shipment_index));
    frame.render_stateful_widget(table, area, &mut state);
}

fn status_text(app: &App, shipment: &Shipment) -> String {
    let reason = app
        .view
        .unassigned
        .iter()
        .find(|unassigned| unassigned.shipment.id == shipment.id)
        .map(|unassigned| unassigned_label(&unassigned.reason));
    match reason {
        Some(reason) => format!("{} · {reason}", shipment.status.label()),
        None => shipment.status.label().to_owned(),
    }
}

fn draw_detail(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let Some(shipment) = &app.selected else {
        let paragraph = Paragraph::new("No shipment selected.")
            .block(Block::default().borders(Borders::ALL).title("Shipment"));
        frame.render_widget(paragraph, area);
        return;
    };

    let layout_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    let chunks = layout_chunks.as_ref();
    let [summary_area, history_area] = chunks else {
        return;
    };

    let summary = Paragraph::new(summary_lines(shipment))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Shipment {}", shipment.tracking_number)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(summary, *summary_area);

    let mut history: Vec<Line<'_>> = shipment
        .history
        .iter()
        .map(|record| {
            let reason = record
                .reason
                .as_deref()
                .map(|reason| format!(" ({reason})"))
                .unwrap_or_default();
            Line::from(format!(
                "{} {} → {} by {}{reason}",
                record.at.format("%d.%m. %H:%M"),
                record.from,
                record.to,
                record.actor
            ))
        })
        .collect();
    if history.is_empty() {
        history.push(Line::from("No status changes yet."));
    }
    for note in &shipment.notes {
        history.push(Line::from(format!(
            "{} note by {}: {}",
            note.written_at.format("%d.%m. %H:%M"),
            note.author,
            note.note
        )));
    }

    let history = Paragraph::new(history)
        .block(Block::default().borders(Borders::ALL).title("History"))
        .wrap(Wrap { trim: true });
    frame.render_widget(history, *history_area);
}

fn summary_lines(shipment: &Shipment) -> Vec<Line<'static>> {
    let sender = &shipment.sender;
    let recipient = &shipment.recipient;
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Status: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                shipment.status.label(),
                Style::default().fg(status_color(shipment.status)),
            ),
        ]),
        Line::from(format!(
            "Owner: {} · modifiable: {} · cancellable: {}",
            shipment.owner,
            yes_no(shipment.can_modify),
            yes_no(shipment.can_cancel)
        )),
        Line::from(format!(
            "From: {}, {}, {} {} ({})",
            sender.contact.name,
            sender.address.line1,
            sender.address.postal_code,
            sender.address.city,
            sender.address.country
        )),
        Line::from(format!(
            "To: {}, {}, {} ({})",
            recipient.contact.name,
            recipient.address.line1,
            recipient.address.city,
            recipient.address.country
        )),
        Line::from(format!("Collection: {}", collection_label(&shipment.collection))),
        Line::from(format!(
            "Payment: {} via {} · total {} {}",
            shipment.payment_option, shipment.flow, shipment.total_amount, shipment.currency
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Items",
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];

    for (index, item) in shipment.composition.items.iter().enumerate() {
        let text = match item {
            LineItem::Fixed {
                item_type,
                quantity,
            } => format!("  {quantity} × {item_type}"),
            LineItem::Custom {
                description,
                quantity,
            } => {
                let quote = shipment
                    .manual_quotes
                    .iter()
                    .find(|quote| quote.item_index == index)
                    .map_or_else(
                        || "awaiting quote".to_owned(),
                        |quote| format!("quoted {} by {}", quote.amount, quote.quoted_by),
                    );
                format!("  {quantity} × {description} ({quote})")
            }
        };
        lines.push(Line::from(text));
    }
    if !shipment.composition.add_ons.is_empty() {
        let add_ons: Vec<&str> = shipment
            .composition
            .add_ons
            .iter()
            .map(String::as_str)
            .collect();
        lines.push(Line::from(format!("  add-ons: {}", add_ons.join(", "))));
    }
    lines.push(Line::from(format!(
        "Evidence: {}",
        shipment.evidence_url.as_deref().unwrap_or("none")
    )));
    lines
}

fn collection_label(collection: &Collection) -> String {
    match collection {
        Collection::Assigned { assignment, .. } => format!(
            "{} on {}",
            assignment.route,
            assignment.collection_date.format("%a %d.%m.%Y")
        ),
        Collection::Restricted { prefix, .. } => {
            format!("restricted area {prefix}, contact customer")
        }
        Collection::Pending { .. } => "pending, postal code incomplete".to_owned(),
    }
}

fn unassigned_label(reason: &UnassignedReason) -> String {
    match reason {
        UnassignedReason::Restricted { prefix } => format!("restricted area {prefix}"),
        UnassignedReason::Unresolved(reason) => format!("unresolved ({reason:?})"),
        UnassignedReason::UnknownCountry(country) => format!("unknown country {country}"),
    }
}

fn status_color(status: ShipmentStatus) -> Color {
    match status {
        ShipmentStatus::BookingConfirmed => Color::Gray,
        ShipmentStatus::ReadyForPickup => Color::Yellow,
        ShipmentStatus::ProcessingOriginWarehouse
        | ShipmentStatus::InTransit
        | ShipmentStatus::CustomsClearance
        | ShipmentStatus::ProcessingDestinationWarehouse => Color::Cyan,
        ShipmentStatus::OutForDelivery => Color::LightBlue,
        ShipmentStatus::Delivered => Color::Green,
        ShipmentStatus::Cancelled | ShipmentStatus::FailedAttempt => Color::Red,
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
