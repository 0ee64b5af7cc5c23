use serde::Serialize;
use time::{Date, Duration};

use crate::db::{self, Store};
use crate::error::Result;
use crate::models::{
    NewClient, NewInventoryTransaction, NewOrder, NewOrderItem, OrderStatus, RateEntry, TransactionKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSummary {
    pub clients: usize,
    pub orders: usize,
    pub movements: usize,
}

fn days_after(day: Date, n: i64) -> Date {
    day.checked_add(Duration::days(n)).unwrap_or(day)
}

/// Wipes clients, orders, stock movements and rates, then loads a small
/// demo shop dated `today`. Settings are kept.
///
/// Runs as one write transaction: if any row is rejected the previous data is
/// left untouched.
pub fn generate_sample_data(store: &mut Store, today: Date) -> Result<SampleSummary> {
    let rate = RateEntry {
        date: today,
        gold_rate: 5000.0,
        silver_rate: 60.0,
    };
    rate.validate()?;

    let clients: Vec<NewClient> = [
        ("John Smith", "555-0101", "123 Main St"),
        ("Emma Johnson", "555-0102", "456 Oak Ave"),
        ("Michael Brown", "555-0103", "789 Pine Rd"),
    ]
    .into_iter()
    .map(|(name, phone, address)| NewClient {
        name: name.to_string(),
        phone: Some(phone.to_string()),
        address: Some(address.to_string()),
    })
    .collect();
    for c in &clients {
        c.validate()?;
    }

    let summary = store.with_write("generate_sample_data", move |tx| {
        db::clear_tables(tx)?;
        db::write_rate(tx, &rate)?;

        let mut client_ids = Vec::with_capacity(clients.len());
        for c in clients {
            client_ids.push(db::insert_client(tx, c)?);
        }

        let movements = [
            (TransactionKind::Received, 100.5, "Initial stock", 4800.0, None),
            (TransactionKind::Issued, 25.2, "For order #1", 5000.0, Some(client_ids[0])),
            (TransactionKind::Received, 50.0, "New purchase", 4900.0, None),
        ];
        for (kind, weight, notes, price, client_id) in movements {
            let movement = NewInventoryTransaction {
                kind,
                weight,
                purity: 0.999,
                date: today,
                price_per_gram: Some(price),
                notes: Some(notes.to_string()),
                client_id,
            };
            movement.validate()?;
            db::insert_inventory(tx, movement)?;
        }

        let orders = [
            (client_ids[0], "Gold chain", 15.5, Some(15.3), 7, OrderStatus::Completed, 1500.0),
            (client_ids[1], "Gold ring", 8.2, Some(8.1), 5, OrderStatus::InProgress, 800.0),
            (client_ids[2], "Gold bracelet", 22.0, None, 10, OrderStatus::Pending, 1200.0),
        ];
        for (client_id, description, estimated, actual, lead_days, status, making) in orders {
            let weight: f64 = actual.unwrap_or(estimated);
            let order = NewOrder {
                client_id,
                description: description.to_string(),
                estimated_weight: estimated,
                actual_weight: actual,
                purity: 0.999,
                order_date: Some(today),
                delivery_date: Some(days_after(today, lead_days)),
                status,
                price_per_gram: Some(5000.0),
                making_charges: Some(making),
                items: vec![NewOrderItem::priced(description, weight, 0.999, 5000.0)],
            };
            order.validate()?;
            db::insert_order(tx, &order)?;
        }

        Ok(SampleSummary {
            clients: client_ids.len(),
            orders: orders.len(),
            movements: movements.len(),
        })
    })?;
    tracing::info!(?summary, %today, "loaded sample data");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{current_stock, dashboard_counts};
    use time::macros::date;

    #[test]
    fn sample_data_replaces_existing_rows() {
        let mut store = Store::open_in_memory().unwrap();
        crate::db::tests::client(&mut store, "Old client");

        let today = date!(2024 - 05 - 01);
        let summary = generate_sample_data(&mut store, today).unwrap();
        assert_eq!(
            summary,
            SampleSummary {
                clients: 3,
                orders: 3,
                movements: 3
            }
        );

        let names: Vec<_> = store.list_clients().unwrap().into_iter().map(|c| c.name).collect();
        assert!(!names.iter().any(|n| n == "Old client"));
        assert_eq!(names.len(), 3);

        assert!((current_stock(&store).unwrap() - 125.3).abs() < 1e-9);
        let counts = dashboard_counts(&store).unwrap();
        assert_eq!(counts.total_orders, 3);
        assert_eq!(counts.pending_orders, 1);
        assert_eq!(store.get_rate(today).unwrap().map(|r| r.gold_rate), Some(5000.0));
    }

    #[test]
    fn sample_data_can_be_loaded_twice() {
        let mut store = Store::open_in_memory().unwrap();
        let today = date!(2024 - 05 - 01);
        generate_sample_data(&mut store, today).unwrap();
        generate_sample_data(&mut store, today).unwrap();

        let order = store.get_order(1).unwrap().unwrap();
        assert_eq!(order.description, "Gold chain");
        assert_eq!(order.delivery_date, Some(date!(2024 - 05 - 08)));
        assert_eq!(order.items.len(), 1);
        assert_eq!(store.list_orders().unwrap().len(), 3);
    }

    #[test]
    fn failed_load_keeps_existing_rows() {
        let mut store = Store::open_in_memory().unwrap();
        let old_client = crate::db::tests::client(&mut store, "Old client");
        let old_order = crate::db::tests::order(&mut store, old_client.id, vec![]);
        store
            .upsert_rate(RateEntry {
                date: date!(2024 - 01 - 01),
                gold_rate: 4700.0,
                silver_rate: 55.0,
            })
            .unwrap();

        // The last order of the demo set is rejected after everything else was written.
        crate::db::tests::exec(
            &store,
            "CREATE TRIGGER reject_bracelet BEFORE INSERT ON orders \
             WHEN NEW.description = 'Gold bracelet' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        );

        let err = generate_sample_data(&mut store, date!(2024 - 05 - 01)).unwrap_err();
        assert!(matches!(err, crate::LedgerError::Storage(_)));

        assert_eq!(store.list_clients().unwrap(), vec![old_client]);
        assert_eq!(store.get_order(old_order.id).unwrap(), Some(old_order));
        assert_eq!(store.list_orders().unwrap().len(), 1);
        assert!(store.list_inventory().unwrap().is_empty());
        let rates = store.list_rates().unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].gold_rate, 4700.0);
    }
}
