use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use time::Date;

use crate::error::{sqlite_error_string, LedgerError, Result};
use crate::models::{
    norm_opt, Client, InventoryTransaction, NewClient, NewInventoryTransaction, NewOrder,
    NewOrderItem, Order, OrderItem, OrderRow, OrderStatus, OrderUpdate, RateEntry, Settings,
    SettingsPatch, TransactionKind,
};
use crate::today_local;

const SETTINGS_ID: &str = "default";
const SCHEMA_VERSION: i64 = 1;

/// Item amounts further than this from `weight * rate` are logged when written.
const AMOUNT_DRIFT_TOLERANCE: f64 = 0.005;

/// The shop's record store: one SQLite file, one connection, one writer.
///
/// Every public operation runs inside its own transaction, so a failure part
/// way through (e.g. between deleting and re-inserting an order's items)
/// leaves the file as it was.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        tracing::debug!(path = %path.display(), "opening store");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        configure_sqlite(&conn)?;
        init_schema(&conn)?;
        apply_migrations(&conn)?;
        ensure_settings_row(&conn)?;
        Ok(Self { conn })
    }

    /// Runs `f` in a deferred transaction that is never committed.
    pub(crate) fn with_read<T, F>(&self, op_name: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(&tx);
        log_failure(op_name, out)
    }

    /// Runs `f` in an IMMEDIATE transaction; commits on `Ok`, rolls back on `Err`.
    pub(crate) fn with_write<T, F>(&mut self, op_name: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = match f(&tx) {
            Ok(v) => tx.commit().map(|_| v).map_err(LedgerError::from),
            Err(e) => Err(e),
        };
        log_failure(op_name, out)
    }

    // ----- settings -----

    pub fn get_settings(&self) -> Result<Settings> {
        self.with_read("get_settings", |conn| read_settings_from_conn(conn))
    }

    pub fn update_settings(&mut self, patch: SettingsPatch) -> Result<Settings> {
        self.with_write("update_settings", move |tx| {
            let mut s = read_settings_from_conn(tx)?;
            s.apply(patch)?;
            tx.execute(
                r#"UPDATE settings SET shopName=?2, currency=?3, invoicePrefix=?4,
                   defaultGoldRate=?5, defaultSilverRate=?6, outputDir=?7, updatedAt=?8
                   WHERE id=?1"#,
                params![
                    SETTINGS_ID,
                    s.shop_name,
                    s.currency,
                    s.invoice_prefix,
                    s.default_gold_rate,
                    s.default_silver_rate,
                    s.output_dir,
                    today_local(),
                ],
            )?;
            Ok(s)
        })
    }

    // ----- clients -----

    pub fn create_client(&mut self, input: NewClient) -> Result<Client> {
        input.validate()?;
        self.with_write("create_client", move |tx| {
            let id = insert_client(tx, input)?;
            read_client_from_conn(tx, id)?.ok_or_else(|| LedgerError::not_found("client", id))
        })
    }

    pub fn update_client(&mut self, id: i64, input: NewClient) -> Result<Client> {
        input.validate()?;
        self.with_write("update_client", move |tx| {
            let changed = tx.execute(
                "UPDATE clients SET name=?2, phone=?3, address=?4 WHERE id=?1",
                params![id, input.name.trim(), norm_opt(input.phone), norm_opt(input.address)],
            )?;
            if changed == 0 {
                return Err(LedgerError::not_found("client", id));
            }
            read_client_from_conn(tx, id)?.ok_or_else(|| LedgerError::not_found("client", id))
        })
    }

    /// Refuses while any order or inventory transaction still points at the client.
    pub fn delete_client(&mut self, id: i64) -> Result<()> {
        self.with_write("delete_client", move |tx| {
            if read_client_from_conn(tx, id)?.is_none() {
                return Err(LedgerError::not_found("client", id));
            }
            let orders: i64 = tx.query_row(
                "SELECT COUNT(*) FROM orders WHERE client_id = ?1",
                params![id],
                |r| r.get(0),
            )?;
            if orders > 0 {
                return Err(LedgerError::Referential(format!(
                    "cannot delete client {id}: {orders} existing order(s)"
                )));
            }
            let movements: i64 = tx.query_row(
                "SELECT COUNT(*) FROM inventory WHERE client_id = ?1",
                params![id],
                |r| r.get(0),
            )?;
            if movements > 0 {
                return Err(LedgerError::Referential(format!(
                    "cannot delete client {id}: {movements} inventory transaction(s)"
                )));
            }
            tx.execute("DELETE FROM clients WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    pub fn get_client(&self, id: i64) -> Result<Option<Client>> {
        self.with_read("get_client", move |conn| read_client_from_conn(conn, id))
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        self.with_read("list_clients", |conn| {
            let mut stmt = conn.prepare(&format!("{CLIENT_SELECT} ORDER BY name, id"))?;
            let rows = stmt.query_map([], client_from_row)?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }

    /// Substring match on name, phone or address.
    pub fn search_clients(&self, term: &str) -> Result<Vec<Client>> {
        let term = term.trim();
        if term.is_empty() {
            return self.list_clients();
        }
        let pattern = like_pattern(term);
        self.with_read("search_clients", move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{CLIENT_SELECT} WHERE name LIKE ?1 ESCAPE '\\' OR phone LIKE ?1 ESCAPE '\\' \
                 OR address LIKE ?1 ESCAPE '\\' ORDER BY name, id"
            ))?;
            let rows = stmt.query_map(params![pattern], client_from_row)?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }

    // ----- orders -----

    pub fn create_order(&mut self, input: NewOrder) -> Result<Order> {
        input.validate()?;
        self.with_write("create_order", move |tx| {
            let id = insert_order(tx, &input)?;
            read_order_from_conn(tx, id)?.ok_or_else(|| LedgerError::not_found("order", id))
        })
    }

    /// Replaces the whole order row and its full item set in one transaction.
    pub fn update_order(&mut self, id: i64, input: OrderUpdate) -> Result<Order> {
        input.validate()?;
        self.with_write("update_order", move |tx| {
            ensure_client_exists(tx, input.client_id)?;
            let changed = tx.execute(
                r#"UPDATE orders SET
                    client_id=?2, description=?3, estimated_weight=?4, actual_weight=?5,
                    purity=?6, delivery_date=?7, status=?8, price_per_gm=?9, making_charges=?10
                   WHERE id=?1"#,
                params![
                    id,
                    input.client_id,
                    input.description.trim(),
                    input.estimated_weight,
                    input.actual_weight,
                    input.purity,
                    input.delivery_date,
                    input.status.as_str(),
                    input.price_per_gram,
                    input.making_charges,
                ],
            )?;
            if changed == 0 {
                return Err(LedgerError::not_found("order", id));
            }
            tx.execute("DELETE FROM order_items WHERE order_id = ?1", params![id])?;
            insert_items(tx, id, &input.items)?;
            read_order_from_conn(tx, id)?.ok_or_else(|| LedgerError::not_found("order", id))
        })
    }

    pub fn delete_order(&mut self, id: i64) -> Result<()> {
        self.with_write("delete_order", move |tx| {
            tx.execute("DELETE FROM order_items WHERE order_id = ?1", params![id])?;
            let changed = tx.execute("DELETE FROM orders WHERE id = ?1", params![id])?;
            if changed == 0 {
                return Err(LedgerError::not_found("order", id));
            }
            Ok(())
        })
    }

    pub fn get_order(&self, id: i64) -> Result<Option<Order>> {
        self.with_read("get_order", move |conn| read_order_from_conn(conn, id))
    }

    pub fn list_orders(&self) -> Result<Vec<OrderRow>> {
        self.with_read("list_orders", |conn| {
            let mut stmt =
                conn.prepare(&format!("{ORDER_ROW_SELECT} ORDER BY o.order_date DESC, o.id DESC"))?;
            let rows = stmt.query_map([], order_row_from_row)?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }

    /// Substring match on client name, description or status.
    pub fn search_orders(&self, term: &str) -> Result<Vec<OrderRow>> {
        let term = term.trim();
        if term.is_empty() {
            return self.list_orders();
        }
        let pattern = like_pattern(term);
        self.with_read("search_orders", move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{ORDER_ROW_SELECT} WHERE c.name LIKE ?1 ESCAPE '\\' OR o.description LIKE ?1 ESCAPE '\\' \
                 OR o.status LIKE ?1 ESCAPE '\\' ORDER BY o.order_date DESC, o.id DESC"
            ))?;
            let rows = stmt.query_map(params![pattern], order_row_from_row)?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }

    pub fn recent_orders(&self, limit: usize) -> Result<Vec<OrderRow>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_read("recent_orders", move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{ORDER_ROW_SELECT} ORDER BY o.order_date DESC, o.id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], order_row_from_row)?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }

    // ----- inventory -----

    pub fn create_inventory(&mut self, input: NewInventoryTransaction) -> Result<InventoryTransaction> {
        input.validate()?;
        self.with_write("create_inventory", move |tx| {
            let id = insert_inventory(tx, input)?;
            read_inventory_from_conn(tx, id)?.ok_or_else(|| LedgerError::not_found("inventory transaction", id))
        })
    }

    pub fn delete_inventory(&mut self, id: i64) -> Result<()> {
        self.with_write("delete_inventory", move |tx| {
            let changed = tx.execute("DELETE FROM inventory WHERE id = ?1", params![id])?;
            if changed == 0 {
                return Err(LedgerError::not_found("inventory transaction", id));
            }
            Ok(())
        })
    }

    pub fn get_inventory(&self, id: i64) -> Result<Option<InventoryTransaction>> {
        self.with_read("get_inventory", move |conn| read_inventory_from_conn(conn, id))
    }

    /// Newest first; same-day movements in reverse entry order.
    pub fn list_inventory(&self) -> Result<Vec<InventoryTransaction>> {
        self.with_read("list_inventory", |conn| {
            let mut stmt =
                conn.prepare(&format!("{INVENTORY_SELECT} ORDER BY i.date DESC, i.id DESC"))?;
            let rows = stmt.query_map([], inventory_from_row)?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }

    // ----- rates -----

    /// One entry per date: writing an existing date replaces its rates.
    pub fn upsert_rate(&mut self, entry: RateEntry) -> Result<RateEntry> {
        entry.validate()?;
        self.with_write("upsert_rate", move |tx| {
            write_rate(tx, &entry)?;
            Ok(entry)
        })
    }

    pub fn get_rate(&self, date: Date) -> Result<Option<RateEntry>> {
        self.with_read("get_rate", move |conn| {
            Ok(conn
                .query_row(
                    "SELECT date, gold_rate, silver_rate FROM rates WHERE date = ?1",
                    params![date],
                    rate_from_row,
                )
                .optional()?)
        })
    }

    pub fn list_rates(&self) -> Result<Vec<RateEntry>> {
        self.with_read("list_rates", |conn| {
            let mut stmt =
                conn.prepare("SELECT date, gold_rate, silver_rate FROM rates ORDER BY date DESC")?;
            let rows = stmt.query_map([], rate_from_row)?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }

    /// Seeds `today` with the settings' default rates when no rate was ever recorded.
    pub fn ensure_default_rate(&mut self, today: Date) -> Result<Option<RateEntry>> {
        self.with_write("ensure_default_rate", move |tx| {
            let count: i64 = tx.query_row("SELECT COUNT(*) FROM rates", [], |r| r.get(0))?;
            if count > 0 {
                return Ok(None);
            }
            let s = read_settings_from_conn(tx)?;
            let entry = RateEntry {
                date: today,
                gold_rate: s.default_gold_rate,
                silver_rate: s.default_silver_rate,
            };
            tx.execute(
                "INSERT INTO rates (date, gold_rate, silver_rate) VALUES (?1, ?2, ?3)",
                params![entry.date, entry.gold_rate, entry.silver_rate],
            )?;
            tracing::info!(date = %entry.date, gold = entry.gold_rate, "seeded default rate");
            Ok(Some(entry))
        })
    }

    /// Removes every client, order, inventory movement and rate; settings stay.
    pub fn clear_all(&mut self) -> Result<()> {
        self.with_write("clear_all", |tx| clear_tables(tx))
    }
}

// Row writers shared by the `Store` methods and multi-step loaders that need
// several of them inside one transaction. Inputs must already be validated.

pub(crate) fn clear_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DELETE FROM order_items;\n\
         DELETE FROM orders;\n\
         DELETE FROM inventory;\n\
         DELETE FROM clients;\n\
         DELETE FROM rates;\n\
         DELETE FROM sqlite_sequence WHERE name IN ('order_items','orders','inventory','clients');\n",
    )?;
    Ok(())
}

pub(crate) fn insert_client(conn: &Connection, input: NewClient) -> Result<i64> {
    conn.execute(
        "INSERT INTO clients (name, phone, address, created_date) VALUES (?1, ?2, ?3, ?4)",
        params![
            input.name.trim(),
            norm_opt(input.phone),
            norm_opt(input.address),
            today_local(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn insert_order(tx: &Transaction<'_>, input: &NewOrder) -> Result<i64> {
    ensure_client_exists(tx, input.client_id)?;
    let order_date = input.order_date.unwrap_or_else(today_local);
    tx.execute(
        r#"INSERT INTO orders (
            client_id, description, estimated_weight, actual_weight, purity,
            order_date, delivery_date, status, price_per_gm, making_charges
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
        params![
            input.client_id,
            input.description.trim(),
            input.estimated_weight,
            input.actual_weight,
            input.purity,
            order_date,
            input.delivery_date,
            input.status.as_str(),
            input.price_per_gram,
            input.making_charges,
        ],
    )?;
    let id = tx.last_insert_rowid();
    insert_items(tx, id, &input.items)?;
    Ok(id)
}

pub(crate) fn insert_inventory(conn: &Connection, input: NewInventoryTransaction) -> Result<i64> {
    if let Some(client_id) = input.client_id {
        ensure_client_exists(conn, client_id)?;
    }
    conn.execute(
        r#"INSERT INTO inventory
            (transaction_type, weight, purity, price_per_gm, date, notes, client_id)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        params![
            input.kind.as_str(),
            input.weight,
            input.purity,
            input.price_per_gram,
            input.date,
            norm_opt(input.notes),
            input.client_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn write_rate(conn: &Connection, entry: &RateEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO rates (date, gold_rate, silver_rate) VALUES (?1, ?2, ?3) \
         ON CONFLICT(date) DO UPDATE SET gold_rate = excluded.gold_rate, silver_rate = excluded.silver_rate",
        params![entry.date, entry.gold_rate, entry.silver_rate],
    )?;
    Ok(())
}

fn log_failure<T>(op_name: &'static str, out: Result<T>) -> Result<T> {
    if let Err(e) = &out {
        match e {
            LedgerError::Storage(inner) => {
                tracing::error!(op = op_name, error = %sqlite_error_string(inner), "sqlite operation failed");
            }
            other => tracing::warn!(op = op_name, error = %other, "operation rejected"),
        }
    }
    out
}

fn configure_sqlite(conn: &Connection) -> Result<()> {
    // Apply PRAGMAs on init (outside any transaction).
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;\n\
         PRAGMA synchronous = NORMAL;\n\
         PRAGMA foreign_keys = ON;\n\
         PRAGMA temp_store = MEMORY;\n",
    )?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            id TEXT PRIMARY KEY NOT NULL,
            shopName TEXT NOT NULL,
            currency TEXT NOT NULL,
            invoicePrefix TEXT NOT NULL,
            defaultGoldRate REAL NOT NULL,
            defaultSilverRate REAL NOT NULL,
            outputDir TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS clients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            phone TEXT,
            address TEXT,
            created_date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE RESTRICT,
            description TEXT,
            estimated_weight REAL NOT NULL,
            actual_weight REAL,
            purity REAL NOT NULL,
            order_date TEXT NOT NULL,
            delivery_date TEXT,
            status TEXT NOT NULL DEFAULT 'Pending',
            price_per_gm REAL,
            making_charges REAL
        );

        CREATE TABLE IF NOT EXISTS order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            description TEXT,
            weight REAL NOT NULL,
            purity REAL NOT NULL,
            rate REAL NOT NULL,
            amount REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS inventory (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_type TEXT NOT NULL,
            weight REAL NOT NULL,
            purity REAL NOT NULL,
            date TEXT NOT NULL,
            notes TEXT,
            price_per_gm REAL,
            client_id INTEGER REFERENCES clients(id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS rates (
            date TEXT PRIMARY KEY NOT NULL,
            gold_rate REAL NOT NULL,
            silver_rate REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_clients_name ON clients(name);
        CREATE INDEX IF NOT EXISTS idx_orders_client_id ON orders(client_id);
        CREATE INDEX IF NOT EXISTS idx_orders_order_date ON orders(order_date);
        CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items(order_id);
        CREATE INDEX IF NOT EXISTS idx_inventory_date ON inventory(date);
        "#,
    )?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    let v: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if v >= SCHEMA_VERSION {
        return Ok(());
    }

    // Shop files from before per-client issuing have no inventory.client_id.
    if !has_column(conn, "inventory", "client_id")? {
        conn.execute_batch(
            "ALTER TABLE inventory ADD COLUMN client_id INTEGER REFERENCES clients(id);",
        )?;
    }

    conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    Ok(())
}

fn ensure_settings_row(conn: &Connection) -> Result<()> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM settings WHERE id = ?1",
        params![SETTINGS_ID],
        |row| row.get(0),
    )?;
    if count > 0 {
        return Ok(());
    }

    let s = Settings::default();
    conn.execute(
        r#"INSERT INTO settings (
            id, shopName, currency, invoicePrefix, defaultGoldRate, defaultSilverRate, outputDir, updatedAt
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        params![
            SETTINGS_ID,
            s.shop_name,
            s.currency,
            s.invoice_prefix,
            s.default_gold_rate,
            s.default_silver_rate,
            s.output_dir,
            today_local(),
        ],
    )?;
    Ok(())
}

fn read_settings_from_conn(conn: &Connection) -> Result<Settings> {
    Ok(conn.query_row(
        "SELECT shopName, currency, invoicePrefix, defaultGoldRate, defaultSilverRate, outputDir \
         FROM settings WHERE id = ?1",
        params![SETTINGS_ID],
        |r| {
            Ok(Settings {
                shop_name: r.get(0)?,
                currency: r.get(1)?,
                invoice_prefix: r.get(2)?,
                default_gold_rate: r.get(3)?,
                default_silver_rate: r.get(4)?,
                output_dir: r.get(5)?,
            })
        },
    )?)
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn ensure_client_exists(conn: &Connection, id: i64) -> Result<()> {
    if read_client_from_conn(conn, id)?.is_none() {
        return Err(LedgerError::not_found("client", id));
    }
    Ok(())
}

const CLIENT_SELECT: &str = "SELECT id, COALESCE(name,''), phone, address, created_date FROM clients";

fn client_from_row(r: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: r.get(0)?,
        name: r.get(1)?,
        phone: r.get(2)?,
        address: r.get(3)?,
        created_date: r.get(4)?,
    })
}

fn read_client_from_conn(conn: &Connection, id: i64) -> Result<Option<Client>> {
    Ok(conn
        .query_row(&format!("{CLIENT_SELECT} WHERE id = ?1"), params![id], client_from_row)
        .optional()?)
}

fn status_from_column(r: &Row<'_>, idx: usize) -> rusqlite::Result<OrderStatus> {
    let raw: String = r.get(idx)?;
    raw.parse::<OrderStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn insert_items(tx: &Transaction<'_>, order_id: i64, items: &[NewOrderItem]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO order_items (order_id, description, weight, purity, rate, amount) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for item in items {
        let drift = item.amount_drift();
        if drift.abs() > AMOUNT_DRIFT_TOLERANCE {
            tracing::warn!(
                order_id,
                description = %item.description,
                amount = item.amount,
                expected = item.weight * item.rate,
                "item amount differs from weight x rate; storing as entered"
            );
        }
        stmt.execute(params![
            order_id,
            item.description.trim(),
            item.weight,
            item.purity,
            item.rate,
            item.amount,
        ])?;
    }
    Ok(())
}

fn read_items_from_conn(conn: &Connection, order_id: i64) -> Result<Vec<OrderItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, order_id, COALESCE(description,''), weight, purity, rate, amount \
         FROM order_items WHERE order_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![order_id], |r| {
        Ok(OrderItem {
            id: r.get(0)?,
            order_id: r.get(1)?,
            description: r.get(2)?,
            weight: r.get(3)?,
            purity: r.get(4)?,
            rate: r.get(5)?,
            amount: r.get(6)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

fn read_order_from_conn(conn: &Connection, id: i64) -> Result<Option<Order>> {
    let order = conn
        .query_row(
            r#"SELECT id, client_id, COALESCE(description,''), estimated_weight, actual_weight, purity,
                      order_date, delivery_date, status, price_per_gm, making_charges
               FROM orders WHERE id = ?1"#,
            params![id],
            |r| {
                Ok(Order {
                    id: r.get(0)?,
                    client_id: r.get(1)?,
                    description: r.get(2)?,
                    estimated_weight: r.get(3)?,
                    actual_weight: r.get(4)?,
                    purity: r.get(5)?,
                    order_date: r.get(6)?,
                    delivery_date: r.get(7)?,
                    status: status_from_column(r, 8)?,
                    price_per_gram: r.get(9)?,
                    making_charges: r.get(10)?,
                    items: Vec::new(),
                })
            },
        )
        .optional()?;

    match order {
        Some(mut o) => {
            o.items = read_items_from_conn(conn, id)?;
            Ok(Some(o))
        }
        None => Ok(None),
    }
}

const ORDER_ROW_SELECT: &str = r#"SELECT o.id, c.name, COALESCE(o.description,''), o.estimated_weight,
        o.actual_weight, o.purity, o.order_date, o.delivery_date, o.status
    FROM orders o LEFT JOIN clients c ON o.client_id = c.id"#;

fn order_row_from_row(r: &Row<'_>) -> rusqlite::Result<OrderRow> {
    Ok(OrderRow {
        id: r.get(0)?,
        client_name: r.get(1)?,
        description: r.get(2)?,
        estimated_weight: r.get(3)?,
        actual_weight: r.get(4)?,
        purity: r.get(5)?,
        order_date: r.get(6)?,
        delivery_date: r.get(7)?,
        status: status_from_column(r, 8)?,
    })
}

const INVENTORY_SELECT: &str = r#"SELECT i.id, i.transaction_type, i.weight, i.purity, i.date,
        i.price_per_gm, i.notes, i.client_id, c.name
    FROM inventory i LEFT JOIN clients c ON i.client_id = c.id"#;

fn inventory_from_row(r: &Row<'_>) -> rusqlite::Result<InventoryTransaction> {
    let raw_kind: String = r.get(1)?;
    let kind = raw_kind.parse::<TransactionKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(InventoryTransaction {
        id: r.get(0)?,
        kind,
        weight: r.get(2)?,
        purity: r.get(3)?,
        date: r.get(4)?,
        price_per_gram: r.get(5)?,
        notes: r.get(6)?,
        client_id: r.get(7)?,
        client_name: r.get(8)?,
    })
}

fn read_inventory_from_conn(conn: &Connection, id: i64) -> Result<Option<InventoryTransaction>> {
    Ok(conn
        .query_row(&format!("{INVENTORY_SELECT} WHERE i.id = ?1"), params![id], inventory_from_row)
        .optional()?)
}

fn rate_from_row(r: &Row<'_>) -> rusqlite::Result<RateEntry> {
    Ok(RateEntry {
        date: r.get(0)?,
        gold_rate: r.get(1)?,
        silver_rate: r.get(2)?,
    })
}
