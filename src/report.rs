//! Printable reports over the whole ledger. Each composer only reads.

use time::Date;

use crate::db::Store;
use crate::document::{Block, Column, Document, Table, TextStyle};
use crate::error::Result;
use crate::format::{format_date, format_money, format_purity, format_rate, format_weight};
use crate::ledger::{client_order_summary, current_stock, daily_totals, effective_rate};
use crate::models::Settings;

pub const INVENTORY_REPORT_FILE: &str = "inventory_report.pdf";
pub const CLIENT_ORDERS_REPORT_FILE: &str = "client_orders_report.pdf";

pub fn daily_summary_file_name(day: Date) -> String {
    format!("daily_summary_{}.pdf", format_date(day))
}

fn grams(v: f64) -> String {
    format!("{}g", format_weight(v))
}

/// Orders and stock movements of `today`. The estimated value prices the
/// day's actual weight at the gold rate in effect on that day.
pub fn daily_summary(store: &Store, today: Date, settings: &Settings) -> Result<Document> {
    let totals = daily_totals(store, today)?;
    let rate = effective_rate(store, today, settings)?;
    let cur = &settings.currency;

    let mut doc = Document::new(format!("Daily Summary {}", format_date(today)));
    doc.push(Block::Title(format!("Daily Summary Report - {}", format_date(today))));

    doc.push(Block::Heading("Orders Summary".to_string()));
    doc.field("Total Orders:", totals.order_count.to_string())
        .field("Total Gold Weight:", grams(totals.total_actual_weight))
        .field(
            "Gold Rate:",
            format!("{} {cur}/g ({})", format_rate(rate.gold_rate), format_date(rate.date)),
        )
        .field(
            "Estimated Value:",
            format!("{cur} {}", format_money(totals.total_actual_weight * rate.gold_rate)),
        );
    doc.push(Block::Spacer(4.0));

    doc.push(Block::Heading("Inventory Summary".to_string()));
    doc.field("Gold Received:", grams(totals.received_weight))
        .field("Gold Issued:", grams(totals.issued_weight))
        .field("Net Change:", grams(totals.net()));
    Ok(doc)
}

/// Current stock followed by every movement, newest first.
pub fn inventory_report(store: &Store) -> Result<Document> {
    let settings = store.get_settings()?;
    let stock = current_stock(store)?;
    let movements = store.list_inventory()?;

    let mut doc = Document::new("Gold Inventory Report");
    doc.push(Block::Title("Gold Inventory Report".to_string()));
    doc.field("Current Gold Stock:", grams(stock));
    doc.push(Block::Spacer(4.0));

    let mut table = Table::new(vec![
        Column::text("Date", 25.0),
        Column::text("Type", 22.0),
        Column::numeric("Weight (g)", 25.0),
        Column::numeric("Purity", 20.0),
        Column::numeric(&format!("Rate ({}/g)", settings.currency), 28.0),
        Column::text("Notes", 60.0),
    ]);
    table.body_style = TextStyle::Small;
    for tx in &movements {
        table.push_row(vec![
            format_date(tx.date),
            tx.kind.label().to_string(),
            format_weight(tx.weight),
            format_purity(tx.purity),
            rate_cell(tx.price_per_gram),
            tx.notes.clone().unwrap_or_default(),
        ]);
    }
    doc.push(Block::Table(table));
    Ok(doc)
}

/// An unpriced movement, stored as NULL or as 0 by older files, shows `N/A`.
fn rate_cell(price_per_gram: Option<f64>) -> String {
    match price_per_gram {
        Some(p) if p != 0.0 => format_rate(p),
        _ => "N/A".to_string(),
    }
}

/// One row per client, including clients that never ordered.
pub fn client_orders_report(store: &Store) -> Result<Document> {
    let summary = client_order_summary(store)?;

    let mut doc = Document::new("Client Orders Report");
    doc.push(Block::Title("Client Orders Report".to_string()));

    let mut table = Table::new(vec![
        Column::text("Client Name", 80.0),
        Column::text("Phone", 40.0),
        Column::numeric("Total Orders", 30.0),
        Column::numeric("Total Gold (g)", 30.0),
    ]);
    table.body_style = TextStyle::Small;
    for row in &summary {
        table.push_row(vec![
            row.name.clone(),
            row.phone.clone().unwrap_or_default(),
            row.order_count.to_string(),
            format_weight(row.total_actual_weight),
        ]);
    }
    doc.push(Block::Table(table));
    Ok(doc)
}
