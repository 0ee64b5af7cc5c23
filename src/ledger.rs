//! Point-in-time totals derived from the raw rows.
//!
//! Nothing here keeps a running counter: every call scans the tables again,
//! so the figures can never disagree with the rows they summarise. Empty sums
//! come back as `0.0`, never as an error or a missing value.

use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use time::Date;

use crate::db::Store;
use crate::error::Result;
use crate::models::{validate_purity, validate_weight, OrderStatus, RateEntry, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotals {
    pub order_count: i64,
    pub total_actual_weight: f64,
    pub received_weight: f64,
    pub issued_weight: f64,
}

impl DailyTotals {
    pub fn net(&self) -> f64 {
        self.received_weight - self.issued_weight
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOrderSummary {
    pub client_id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub order_count: i64,
    pub total_actual_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCounts {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub current_stock: f64,
    pub total_clients: i64,
}

/// Gold on hand: everything received minus everything issued, since the first entry.
pub fn current_stock(store: &Store) -> Result<f64> {
    store.with_read("current_stock", |conn| {
        Ok(conn.query_row(
            "SELECT \
                COALESCE(SUM(CASE WHEN transaction_type = 'received' THEN weight ELSE 0 END), 0.0) \
              - COALESCE(SUM(CASE WHEN transaction_type = 'issued' THEN weight ELSE 0 END), 0.0) \
             FROM inventory",
            [],
            |r| r.get::<_, f64>(0),
        )?)
    })
}

/// Orders placed on `date` (cancelled ones excluded) and gold moved on `date`.
pub fn daily_totals(store: &Store, date: Date) -> Result<DailyTotals> {
    store.with_read("daily_totals", move |conn| {
        let (order_count, total_actual_weight): (i64, f64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(actual_weight), 0.0) FROM orders \
             WHERE order_date = ?1 AND status != ?2",
            params![date, OrderStatus::Cancelled.as_str()],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        let (received_weight, issued_weight): (f64, f64) = conn.query_row(
            "SELECT \
                COALESCE(SUM(CASE WHEN transaction_type = 'received' THEN weight ELSE 0 END), 0.0), \
                COALESCE(SUM(CASE WHEN transaction_type = 'issued' THEN weight ELSE 0 END), 0.0) \
             FROM inventory WHERE date = ?1",
            params![date],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(DailyTotals {
            order_count,
            total_actual_weight,
            received_weight,
            issued_weight,
        })
    })
}

/// One row per client, including clients without orders, by name then id.
pub fn client_order_summary(store: &Store) -> Result<Vec<ClientOrderSummary>> {
    store.with_read("client_order_summary", |conn| {
        let mut stmt = conn.prepare(
            "SELECT c.id, COALESCE(c.name, ''), c.phone, COUNT(o.id), COALESCE(SUM(o.actual_weight), 0.0) \
             FROM clients c LEFT JOIN orders o ON o.client_id = c.id \
             GROUP BY c.id ORDER BY c.name, c.id",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(ClientOrderSummary {
                client_id: r.get(0)?,
                name: r.get(1)?,
                phone: r.get(2)?,
                order_count: r.get(3)?,
                total_actual_weight: r.get(4)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    })
}

pub fn dashboard_counts(store: &Store) -> Result<DashboardCounts> {
    let current_stock = current_stock(store)?;
    store.with_read("dashboard_counts", move |conn| {
        let total_orders: i64 = conn.query_row("SELECT COUNT(*) FROM orders", [], |r| r.get(0))?;
        let pending_orders: i64 = conn.query_row(
            "SELECT COUNT(*) FROM orders WHERE status = ?1",
            params![OrderStatus::Pending.as_str()],
            |r| r.get(0),
        )?;
        let total_clients: i64 = conn.query_row("SELECT COUNT(*) FROM clients", [], |r| r.get(0))?;
        Ok(DashboardCounts {
            total_orders,
            pending_orders,
            current_stock,
            total_clients,
        })
    })
}

/// What the dashboard shows: the counts plus the rates in force today.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(flatten)]
    pub counts: DashboardCounts,
    pub rate: RateEntry,
    pub currency: String,
}

pub fn dashboard(store: &Store, today: Date) -> Result<Dashboard> {
    let counts = dashboard_counts(store)?;
    let settings = store.get_settings()?;
    let rate = effective_rate(store, today, &settings)?;
    Ok(Dashboard {
        counts,
        rate,
        currency: settings.currency,
    })
}

/// The rate in force on `date`: that day's entry, or the latest one before it.
pub fn rate_on(store: &Store, date: Date) -> Result<Option<RateEntry>> {
    store.with_read("rate_on", move |conn| {
        Ok(conn
            .query_row(
                "SELECT date, gold_rate, silver_rate FROM rates WHERE date <= ?1 \
                 ORDER BY date DESC LIMIT 1",
                params![date],
                |r| {
                    Ok(RateEntry {
                        date: r.get(0)?,
                        gold_rate: r.get(1)?,
                        silver_rate: r.get(2)?,
                    })
                },
            )
            .optional()?)
    })
}

pub fn latest_rate(store: &Store) -> Result<Option<RateEntry>> {
    store.with_read("latest_rate", |conn| {
        Ok(conn
            .query_row(
                "SELECT date, gold_rate, silver_rate FROM rates ORDER BY date DESC LIMIT 1",
                [],
                |r| {
                    Ok(RateEntry {
                        date: r.get(0)?,
                        gold_rate: r.get(1)?,
                        silver_rate: r.get(2)?,
                    })
                },
            )
            .optional()?)
    })
}

/// Never fails for lack of a rate: falls back to the latest entry, then to the
/// settings' default rates (dated `date`).
pub fn effective_rate(store: &Store, date: Date, settings: &Settings) -> Result<RateEntry> {
    if let Some(r) = rate_on(store, date)? {
        return Ok(r);
    }
    if let Some(r) = latest_rate(store)? {
        tracing::debug!(%date, latest = %r.date, "no rate on or before date; using latest entry");
        return Ok(r);
    }
    tracing::debug!(%date, "no rates recorded; using settings defaults");
    Ok(RateEntry {
        date,
        gold_rate: settings.default_gold_rate,
        silver_rate: settings.default_silver_rate,
    })
}

/// Value of `weight` grams at `purity` fineness, priced at `rate` per gram of pure gold.
pub fn gold_value(weight: f64, purity: f64, rate: f64) -> Result<f64> {
    validate_weight("weight", weight)?;
    validate_purity("purity", purity)?;
    Ok(weight * purity * rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{client, order};
    use crate::error::LedgerError;
    use crate::models::{NewInventoryTransaction, NewOrderItem, OrderUpdate, TransactionKind};
    use time::macros::date;

    fn movement(store: &mut Store, kind: TransactionKind, weight: f64, date: Date, client_id: Option<i64>) {
        store
            .create_inventory(NewInventoryTransaction {
                kind,
                weight,
                purity: 0.999,
                date,
                price_per_gram: None,
                notes: None,
                client_id,
            })
            .unwrap();
    }

    #[test]
    fn current_stock_of_empty_inventory_is_zero() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(current_stock(&store).unwrap(), 0.0);
    }

    #[test]
    fn current_stock_is_received_minus_issued() {
        let mut store = Store::open_in_memory().unwrap();
        let c = client(&mut store, "John");
        let d = date!(2024 - 01 - 01);
        movement(&mut store, TransactionKind::Received, 100.5, d, None);
        movement(&mut store, TransactionKind::Issued, 25.25, d, Some(c.id));
        movement(&mut store, TransactionKind::Received, 50.0, date!(2023 - 06 - 01), None);
        assert_eq!(current_stock(&store).unwrap(), 125.25);
    }

    #[test]
    fn each_movement_shifts_stock_by_its_signed_weight() {
        let mut store = Store::open_in_memory().unwrap();
        let c = client(&mut store, "John");
        let steps = [
            (TransactionKind::Received, 10.0),
            (TransactionKind::Issued, 2.5),
            (TransactionKind::Issued, 20.0),
            (TransactionKind::Received, 0.25),
        ];
        for (kind, w) in steps {
            let before = current_stock(&store).unwrap();
            let client_id = (kind == TransactionKind::Issued).then_some(c.id);
            movement(&mut store, kind, w, date!(2024 - 01 - 01), client_id);
            let after = current_stock(&store).unwrap();
            assert_eq!(after - before, kind.sign() * w);
        }
        // issuing more than is on hand is recorded, the balance just goes negative
        assert_eq!(current_stock(&store).unwrap(), -12.25);
    }

    #[test]
    fn daily_totals_skip_cancelled_orders_and_other_days() {
        let mut store = Store::open_in_memory().unwrap();
        let c = client(&mut store, "John");
        let day = date!(2024 - 01 - 01);

        order(&mut store, c.id, vec![]); // actual 8.1 on day
        let o2 = order(&mut store, c.id, vec![]);
        let mut cancelled = OrderUpdate::from(o2.clone());
        cancelled.status = OrderStatus::Cancelled;
        store.update_order(o2.id, cancelled).unwrap();
        let o3 = order(&mut store, c.id, vec![]);
        let mut unknown_weight = OrderUpdate::from(o3.clone());
        unknown_weight.actual_weight = None;
        store.update_order(o3.id, unknown_weight).unwrap();

        movement(&mut store, TransactionKind::Received, 30.0, day, None);
        movement(&mut store, TransactionKind::Issued, 12.5, day, Some(c.id));
        movement(&mut store, TransactionKind::Received, 99.0, date!(2024 - 01 - 02), None);

        let t = daily_totals(&store, day).unwrap();
        assert_eq!(t.order_count, 2);
        assert_eq!(t.total_actual_weight, 8.1);
        assert_eq!(t.received_weight, 30.0);
        assert_eq!(t.issued_weight, 12.5);
        assert_eq!(t.net(), 17.5);
    }

    #[test]
    fn daily_totals_of_quiet_day_are_zero() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(daily_totals(&store, date!(2024 - 01 - 01)).unwrap(), DailyTotals::default());
    }

    #[test]
    fn client_summary_includes_clients_without_orders() {
        let mut store = Store::open_in_memory().unwrap();
        let zed = client(&mut store, "Zed");
        let abe = client(&mut store, "Abe");
        let lower = client(&mut store, "abe");
        order(&mut store, zed.id, vec![NewOrderItem::priced("Ring", 8.2, 0.999, 5000.0)]);
        order(&mut store, zed.id, vec![]);

        let rows = client_order_summary(&store).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        // binary collation: uppercase sorts before lowercase
        assert_eq!(names, ["Abe", "Zed", "abe"]);

        let abe_row = rows.iter().find(|r| r.client_id == abe.id).unwrap();
        assert_eq!(abe_row.order_count, 0);
        assert_eq!(abe_row.total_actual_weight, 0.0);
        assert!(rows.iter().any(|r| r.client_id == lower.id));

        let zed_row = rows.iter().find(|r| r.client_id == zed.id).unwrap();
        assert_eq!(zed_row.order_count, 2);
        assert!((zed_row.total_actual_weight - 16.2).abs() < 1e-9);
    }

    #[test]
    fn client_summary_ties_keep_insertion_order() {
        let mut store = Store::open_in_memory().unwrap();
        let first = client(&mut store, "Sam");
        let second = client(&mut store, "Sam");
        let ids: Vec<i64> = client_order_summary(&store).unwrap().iter().map(|r| r.client_id).collect();
        assert_eq!(ids, [first.id, second.id]);
    }

    #[test]
    fn dashboard_counts_reflect_tables() {
        let mut store = Store::open_in_memory().unwrap();
        let c = client(&mut store, "John");
        client(&mut store, "Emma");
        let o = order(&mut store, c.id, vec![]);
        let mut pending = OrderUpdate::from(o.clone());
        pending.status = OrderStatus::Pending;
        store.update_order(o.id, pending).unwrap();
        order(&mut store, c.id, vec![]);
        movement(&mut store, TransactionKind::Received, 40.0, date!(2024 - 01 - 01), None);

        let counts = dashboard_counts(&store).unwrap();
        assert_eq!(
            counts,
            DashboardCounts {
                total_orders: 2,
                pending_orders: 1,
                current_stock: 40.0,
                total_clients: 2,
            }
        );
    }

    #[test]
    fn dashboard_shows_rate_in_force_today() {
        let mut store = Store::open_in_memory().unwrap();
        let today = date!(2024 - 02 - 10);

        let fresh = dashboard(&store, today).unwrap();
        assert_eq!(fresh.rate.date, today);
        assert_eq!(fresh.rate.gold_rate, 5000.0);
        assert_eq!(fresh.currency, "KWD");

        store
            .upsert_rate(RateEntry {
                date: date!(2024 - 02 - 01),
                gold_rate: 5120.0,
                silver_rate: 61.5,
            })
            .unwrap();
        store
            .upsert_rate(RateEntry {
                date: date!(2024 - 03 - 01),
                gold_rate: 5300.0,
                silver_rate: 63.0,
            })
            .unwrap();
        let d = dashboard(&store, today).unwrap();
        assert_eq!(d.rate.date, date!(2024 - 02 - 01));
        assert_eq!(d.rate.gold_rate, 5120.0);
        assert_eq!(d.rate.silver_rate, 61.5);
        assert_eq!(d.counts, dashboard_counts(&store).unwrap());

        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["totalOrders"], 0);
        assert_eq!(json["rate"]["goldRate"], 5120.0);
    }

    #[test]
    fn missing_day_falls_back_to_latest_prior_rate() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .upsert_rate(RateEntry {
                date: date!(2024 - 01 - 01),
                gold_rate: 5000.0,
                silver_rate: 60.0,
            })
            .unwrap();
        let settings = store.get_settings().unwrap();
        let r = effective_rate(&store, date!(2024 - 01 - 02), &settings).unwrap();
        assert_eq!(r.gold_rate, 5000.0);
        assert_eq!(r.date, date!(2024 - 01 - 01));
    }

    #[test]
    fn rate_on_ignores_later_entries() {
        let mut store = Store::open_in_memory().unwrap();
        for (d, g) in [(date!(2024 - 01 - 01), 5000.0), (date!(2024 - 01 - 10), 5200.0)] {
            store
                .upsert_rate(RateEntry { date: d, gold_rate: g, silver_rate: 60.0 })
                .unwrap();
        }
        assert_eq!(rate_on(&store, date!(2024 - 01 - 05)).unwrap().unwrap().gold_rate, 5000.0);
        assert_eq!(rate_on(&store, date!(2024 - 01 - 10)).unwrap().unwrap().gold_rate, 5200.0);
        assert_eq!(rate_on(&store, date!(2023 - 12 - 31)).unwrap(), None);
        assert_eq!(latest_rate(&store).unwrap().unwrap().gold_rate, 5200.0);

        // before the first entry: the latest one is used rather than failing
        let settings = store.get_settings().unwrap();
        let r = effective_rate(&store, date!(2023 - 12 - 31), &settings).unwrap();
        assert_eq!(r.gold_rate, 5200.0);
    }

    #[test]
    fn effective_rate_without_entries_uses_settings() {
        let store = Store::open_in_memory().unwrap();
        let settings = store.get_settings().unwrap();
        let r = effective_rate(&store, date!(2024 - 01 - 02), &settings).unwrap();
        assert_eq!((r.gold_rate, r.silver_rate), (5000.0, 60.0));
    }

    #[test]
    fn gold_value_scales_by_purity() {
        assert_eq!(gold_value(10.0, 0.5, 5000.0).unwrap(), 25000.0);
        assert!(matches!(gold_value(10.0, 1.5, 5000.0), Err(LedgerError::Validation { .. })));
    }
}
