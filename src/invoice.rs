use time::Date;

use crate::document::{Block, Column, Document, SummaryRow, Table};
use crate::format::{format_date, format_money, format_purity, format_rate, format_weight, invoice_label};
use crate::models::{Client, Order, OrderItem, Settings};

/// The billed lines: the stored items, as entered and in insertion order.
pub fn invoice_lines(order: &Order) -> &[OrderItem] {
    &order.items
}

/// Sum of the item amounts plus making charges, if any.
pub fn invoice_total(order: &Order) -> f64 {
    let items: f64 = invoice_lines(order).iter().map(|it| it.amount).sum();
    items + order.making_charges.unwrap_or(0.0)
}

/// `invoice_ORD-0007.pdf`
pub fn invoice_file_name(settings: &Settings, order_id: i64) -> String {
    format!("invoice_{}.pdf", invoice_label(&settings.invoice_prefix, order_id))
}

fn or_dash(v: Option<&str>) -> String {
    match v {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => "-".to_string(),
    }
}

/// Lays out the invoice for one order. `client` is `None` when the order's
/// client row is gone; the client block then shows dashes.
pub fn compose_invoice(order: &Order, client: Option<&Client>, settings: &Settings, issued_on: Date) -> Document {
    let label = invoice_label(&settings.invoice_prefix, order.id);
    let cur = &settings.currency;

    let mut doc = Document::new(format!("Invoice {label}"));
    doc.push(Block::Title(settings.shop_name.clone()));
    doc.field("Invoice #:", label.clone())
        .field("Date:", format_date(issued_on));
    doc.push(Block::Spacer(3.0));

    doc.push(Block::Heading("Client Information".to_string()));
    doc.field("Name:", or_dash(client.map(|c| c.name.as_str())))
        .field("Phone:", or_dash(client.and_then(|c| c.phone.as_deref())))
        .field("Address:", or_dash(client.and_then(|c| c.address.as_deref())));
    doc.push(Block::Spacer(3.0));

    doc.push(Block::Heading("Order Details".to_string()));
    doc.field("Description:", order.description.clone())
        .field(
            "Delivery Date:",
            order.delivery_date.map(format_date).unwrap_or_else(|| "-".to_string()),
        )
        .field("Status:", order.status.as_str());
    doc.push(Block::Spacer(3.0));

    doc.push(Block::Heading("Items".to_string()));
    let mut table = Table::new(vec![
        Column::text("Description", 70.0),
        Column::numeric("Weight (g)", 30.0),
        Column::numeric("Purity", 25.0),
        Column::numeric(&format!("Rate ({cur}/g)"), 27.5),
        Column::numeric(&format!("Amount ({cur})"), 27.5),
    ]);
    for it in invoice_lines(order) {
        table.push_row(vec![
            it.description.clone(),
            format_weight(it.weight),
            format_purity(it.purity),
            format_rate(it.rate),
            format_money(it.amount),
        ]);
    }
    if let Some(m) = order.making_charges.filter(|m| *m != 0.0) {
        table.summary.push(SummaryRow {
            label: "Making Charges:".to_string(),
            value: format_money(m),
            emphasis: false,
        });
    }
    table.summary.push(SummaryRow {
        label: "TOTAL:".to_string(),
        value: format_money(invoice_total(order)),
        emphasis: true,
    });
    doc.push(Block::Table(table));

    doc.push(Block::Spacer(8.0));
    doc.push(Block::Text("Thank you for your business.".to_string()));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;
    use time::macros::date;

    fn item(id: i64, description: &str, weight: f64, rate: f64, amount: f64) -> OrderItem {
        OrderItem {
            id,
            order_id: 7,
            description: description.to_string(),
            weight,
            purity: 0.999,
            rate,
            amount,
        }
    }

    fn order(items: Vec<OrderItem>, making_charges: Option<f64>) -> Order {
        Order {
            id: 7,
            client_id: 1,
            description: "Wedding set".to_string(),
            estimated_weight: 8.0,
            actual_weight: Some(8.2),
            purity: 0.999,
            order_date: date!(2024 - 01 - 01),
            delivery_date: Some(date!(2024 - 01 - 10)),
            status: OrderStatus::Completed,
            price_per_gram: Some(5000.0),
            making_charges,
            items,
        }
    }

    fn john() -> Client {
        Client {
            id: 1,
            name: "John".to_string(),
            phone: Some("555-0101".to_string()),
            address: None,
            created_date: date!(2024 - 01 - 01),
        }
    }

    #[test]
    fn total_includes_entered_amounts_and_making_charges() {
        let o = order(vec![item(1, "Ring", 8.2, 5000.0, 41000.0)], Some(800.0));
        assert_eq!(invoice_total(&o), 41800.0);
        assert_eq!(format_money(invoice_total(&o)), "41,800.00");
    }

    #[test]
    fn total_without_items_is_making_charges_or_zero() {
        assert_eq!(invoice_total(&order(vec![], Some(250.0))), 250.0);
        assert_eq!(invoice_total(&order(vec![], None)), 0.0);
    }

    #[test]
    fn lines_keep_insertion_order() {
        let o = order(
            vec![item(3, "Chain", 10.0, 5000.0, 50000.0), item(4, "Ring", 2.0, 5000.0, 10000.0)],
            None,
        );
        let names: Vec<_> = invoice_lines(&o).iter().map(|i| i.description.as_str()).collect();
        assert_eq!(names, vec!["Chain", "Ring"]);
    }

    #[test]
    fn invoice_shows_label_client_and_formatted_rows() {
        let o = order(vec![item(1, "Ring", 8.2, 5000.0, 41000.0)], Some(800.0));
        let doc = compose_invoice(&o, Some(&john()), &Settings::default(), date!(2024 - 02 - 01));

        assert_eq!(doc.field_value("Invoice #:"), Some("ORD-0007"));
        assert_eq!(doc.field_value("Date:"), Some("2024-02-01"));
        assert_eq!(doc.field_value("Name:"), Some("John"));
        assert_eq!(doc.field_value("Address:"), Some("-"));
        assert_eq!(doc.field_value("Status:"), Some("Completed"));

        let table = doc.tables().next().unwrap();
        assert_eq!(table.rows[0], vec!["Ring", "8.20", "0.999", "5000.00", "41,000.00"]);
        assert_eq!(table.columns[4].header, "Amount (KWD)");
        let labels: Vec<_> = table.summary.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Making Charges:", "TOTAL:"]);
        assert_eq!(table.summary[1].value, "41,800.00");
    }

    #[test]
    fn making_charges_row_only_when_present() {
        for making in [None, Some(0.0)] {
            let o = order(vec![item(1, "Ring", 1.0, 100.0, 100.0)], making);
            let doc = compose_invoice(&o, Some(&john()), &Settings::default(), date!(2024 - 02 - 01));
            let table = doc.tables().next().unwrap();
            assert_eq!(table.summary.len(), 1);
            assert_eq!(table.summary[0].value, "100.00");
        }
    }

    #[test]
    fn missing_client_is_dashed() {
        let o = order(vec![], None);
        let doc = compose_invoice(&o, None, &Settings::default(), date!(2024 - 02 - 01));
        assert_eq!(doc.field_value("Name:"), Some("-"));
        assert_eq!(doc.field_value("Phone:"), Some("-"));
    }

    #[test]
    fn file_name_uses_invoice_label() {
        assert_eq!(invoice_file_name(&Settings::default(), 1), "invoice_ORD-0001.pdf");
    }
}
