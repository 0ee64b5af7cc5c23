use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use time::Date;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gold_ledger_lib::document::Document;
use gold_ledger_lib::format::{
    format_date, format_money, format_purity, format_rate, format_weight, invoice_label, parse_date,
};
use gold_ledger_lib::models::{
    NewClient, NewInventoryTransaction, NewOrder, NewOrderItem, OrderPatch, OrderRow, OrderStatus, OrderUpdate,
    RateEntry, SettingsPatch, TransactionKind,
};
use gold_ledger_lib::{invoice, ledger, pdf, report, sample, today_local, Store};

#[derive(Parser, Debug)]
#[command(name = "gold-ledger", version, about = "Gold shop ledger: clients, orders, stock, rates and PDF documents")]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, env = "GOLD_LEDGER_DB", default_value = "gold_shop.db")]
    db: PathBuf,

    /// Log filter, e.g. `info` or `gold_ledger_lib=debug`.
    #[arg(long, global = true, env = "GOLD_LEDGER_LOG", default_value = "info")]
    log: String,

    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    Client(ClientCommand),

    #[command(subcommand)]
    Order(OrderCommand),

    #[command(subcommand)]
    Inventory(InventoryCommand),

    #[command(subcommand)]
    Rate(RateCommand),

    /// Order, client and stock counts, and the rates in force today.
    Dashboard,

    /// Value of a weight of gold at a purity and rate.
    Value {
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        purity: f64,
        /// Rate per gram of pure gold; defaults to today's effective gold rate.
        #[arg(long)]
        rate: Option<f64>,
    },

    /// Write the PDF invoice of an order.
    Invoice {
        order_id: i64,
        #[arg(long)]
        out: Option<PathBuf>,
    },

    #[command(subcommand)]
    Report(ReportCommand),

    /// Replace all clients, orders, stock movements and rates with demo data.
    SampleData {
        /// Required; the existing rows are deleted.
        #[arg(long)]
        yes: bool,
    },

    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Args, Debug)]
struct ClientArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ClientCommand {
    Add(ClientArgs),
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    List,
    Search { term: String },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum OrderCommand {
    Add {
        #[arg(long)]
        client: i64,
        #[arg(long)]
        description: String,
        #[arg(long)]
        estimated_weight: f64,
        #[arg(long)]
        actual_weight: Option<f64>,
        #[arg(long, default_value_t = 0.999)]
        purity: f64,
        #[arg(long, value_parser = date_arg)]
        order_date: Option<Date>,
        #[arg(long, value_parser = date_arg)]
        delivery_date: Option<Date>,
        #[arg(long, default_value = "Pending")]
        status: OrderStatus,
        #[arg(long)]
        price_per_gram: Option<f64>,
        #[arg(long)]
        making_charges: Option<f64>,
        /// `description:weight:purity:rate[:amount]`, repeatable.
        #[arg(long = "item")]
        items: Vec<NewOrderItem>,
    },
    /// Change an order; fields not given keep their value, `--clear-*` empties one.
    Edit {
        id: i64,
        #[arg(long)]
        client: Option<i64>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        estimated_weight: Option<f64>,
        #[arg(long)]
        actual_weight: Option<f64>,
        /// Forget the actual weight, e.g. before the piece is weighed again.
        #[arg(long, conflicts_with = "actual_weight")]
        clear_actual_weight: bool,
        #[arg(long)]
        purity: Option<f64>,
        #[arg(long, value_parser = date_arg)]
        delivery_date: Option<Date>,
        #[arg(long, conflicts_with = "delivery_date")]
        clear_delivery_date: bool,
        #[arg(long)]
        status: Option<OrderStatus>,
        #[arg(long)]
        price_per_gram: Option<f64>,
        #[arg(long, conflicts_with = "price_per_gram")]
        clear_price_per_gram: bool,
        #[arg(long)]
        making_charges: Option<f64>,
        #[arg(long, conflicts_with = "making_charges")]
        clear_making_charges: bool,
        /// Replaces all items of the order.
        #[arg(long = "item")]
        items: Vec<NewOrderItem>,
        /// Remove every item.
        #[arg(long, conflicts_with = "items")]
        clear_items: bool,
    },
    List {
        /// Only the N newest orders.
        #[arg(long)]
        recent: Option<usize>,
    },
    Search { term: String },
    Show { id: i64 },
    Delete { id: i64 },
}

#[derive(Args, Debug)]
struct MovementArgs {
    #[arg(long)]
    weight: f64,
    #[arg(long, default_value_t = 0.999)]
    purity: f64,
    #[arg(long, value_parser = date_arg)]
    date: Option<Date>,
    #[arg(long)]
    price_per_gram: Option<f64>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Subcommand, Debug)]
enum InventoryCommand {
    Receive {
        #[command(flatten)]
        movement: MovementArgs,
        #[arg(long)]
        client: Option<i64>,
    },
    Issue {
        #[command(flatten)]
        movement: MovementArgs,
        #[arg(long)]
        client: i64,
    },
    List,
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum RateCommand {
    /// Record the rates of a day, replacing any entry for that day.
    Set {
        #[arg(long)]
        gold: f64,
        #[arg(long)]
        silver: f64,
        #[arg(long, value_parser = date_arg)]
        date: Option<Date>,
    },
    Show {
        #[arg(long, value_parser = date_arg)]
        date: Option<Date>,
        /// List every recorded day.
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ReportCommand {
    Daily {
        #[arg(long, value_parser = date_arg)]
        date: Option<Date>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Inventory {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Clients {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        shop_name: Option<String>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        invoice_prefix: Option<String>,
        #[arg(long)]
        default_gold_rate: Option<f64>,
        #[arg(long)]
        default_silver_rate: Option<f64>,
        #[arg(long)]
        output_dir: Option<String>,
    },
}

/// `--field v` sets, `--clear-field` empties, neither keeps.
fn set_or_clear<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

fn date_arg(s: &str) -> Result<Date, String> {
    parse_date(s).map_err(|e| e.to_string())
}

fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Prints `value` as JSON, or runs `text` for the human rendering.
fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn print_order_rows(rows: &[OrderRow]) {
    for o in rows {
        println!(
            "{:>5}  {:<20} {:<24} {:>8} {:>8}  {}  {}",
            o.id,
            o.client_name.as_deref().unwrap_or("-"),
            o.description,
            format_weight(o.estimated_weight),
            o.actual_weight.map(format_weight).unwrap_or_else(|| "-".to_string()),
            format_date(o.order_date),
            o.status,
        );
    }
}

fn write_doc(store: &Store, doc: &Document, out: Option<PathBuf>, file_name: &str) -> anyhow::Result<()> {
    let dir = match out {
        Some(dir) => dir,
        None => PathBuf::from(store.get_settings()?.output_dir),
    };
    let path = pdf::write_document(doc, &dir, file_name)?;
    println!("{}", path.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    let mut store = Store::open(&cli.db).with_context(|| format!("opening {}", cli.db.display()))?;
    let today = today_local();
    store.ensure_default_rate(today)?;
    let json = cli.json;

    match cli.command {
        Command::Client(cmd) => match cmd {
            ClientCommand::Add(args) => {
                let c = store.create_client(NewClient {
                    name: args.name,
                    phone: args.phone,
                    address: args.address,
                })?;
                emit(json, &c, |c| println!("added client {} ({})", c.id, c.name))?;
            }
            ClientCommand::Edit { id, name, phone, address } => {
                let existing = store.get_client(id)?.ok_or_else(|| anyhow!("client {id} not found"))?;
                let c = store.update_client(
                    id,
                    NewClient {
                        name: name.unwrap_or(existing.name),
                        phone: phone.or(existing.phone),
                        address: address.or(existing.address),
                    },
                )?;
                emit(json, &c, |c| println!("updated client {} ({})", c.id, c.name))?;
            }
            ClientCommand::List => {
                let clients = store.list_clients()?;
                emit(json, &clients, |clients| {
                    for c in clients {
                        println!(
                            "{:>5}  {:<24} {:<14} {}",
                            c.id,
                            c.name,
                            c.phone.as_deref().unwrap_or("-"),
                            c.address.as_deref().unwrap_or("-"),
                        );
                    }
                })?;
            }
            ClientCommand::Search { term } => {
                let clients = store.search_clients(&term)?;
                emit(json, &clients, |clients| {
                    for c in clients {
                        println!("{:>5}  {:<24} {}", c.id, c.name, c.phone.as_deref().unwrap_or("-"));
                    }
                })?;
            }
            ClientCommand::Delete { id } => {
                store.delete_client(id)?;
                println!("deleted client {id}");
            }
        },

        Command::Order(cmd) => match cmd {
            OrderCommand::Add {
                client,
                description,
                estimated_weight,
                actual_weight,
                purity,
                order_date,
                delivery_date,
                status,
                price_per_gram,
                making_charges,
                items,
            } => {
                let o = store.create_order(NewOrder {
                    client_id: client,
                    description,
                    estimated_weight,
                    actual_weight,
                    purity,
                    order_date: order_date.or(Some(today)),
                    delivery_date,
                    status,
                    price_per_gram,
                    making_charges,
                    items,
                })?;
                emit(json, &o, |o| println!("added order {} with {} item(s)", o.id, o.items.len()))?;
            }
            OrderCommand::Edit {
                id,
                client,
                description,
                estimated_weight,
                actual_weight,
                clear_actual_weight,
                purity,
                delivery_date,
                clear_delivery_date,
                status,
                price_per_gram,
                clear_price_per_gram,
                making_charges,
                clear_making_charges,
                items,
                clear_items,
            } => {
                let existing = store.get_order(id)?.ok_or_else(|| anyhow!("order {id} not found"))?;
                let mut update = OrderUpdate::from(existing);
                update.apply(OrderPatch {
                    client_id: client,
                    description,
                    estimated_weight,
                    actual_weight: set_or_clear(actual_weight, clear_actual_weight),
                    purity,
                    delivery_date: set_or_clear(delivery_date, clear_delivery_date),
                    status,
                    price_per_gram: set_or_clear(price_per_gram, clear_price_per_gram),
                    making_charges: set_or_clear(making_charges, clear_making_charges),
                    items: if clear_items {
                        Some(Vec::new())
                    } else if items.is_empty() {
                        None
                    } else {
                        Some(items)
                    },
                });
                let o = store.update_order(id, update)?;
                emit(json, &o, |o| println!("updated order {} ({} item(s))", o.id, o.items.len()))?;
            }
            OrderCommand::List { recent } => {
                let rows = match recent {
                    Some(n) => store.recent_orders(n)?,
                    None => store.list_orders()?,
                };
                emit(json, &rows, |rows| print_order_rows(rows))?;
            }
            OrderCommand::Search { term } => {
                let rows = store.search_orders(&term)?;
                emit(json, &rows, |rows| print_order_rows(rows))?;
            }
            OrderCommand::Show { id } => {
                let o = store.get_order(id)?.ok_or_else(|| anyhow!("order {id} not found"))?;
                let settings = store.get_settings()?;
                emit(json, &o, |o| {
                    println!("{}  {}  [{}]", invoice_label(&settings.invoice_prefix, o.id), o.description, o.status);
                    println!("client {}  ordered {}", o.client_id, format_date(o.order_date));
                    for it in invoice::invoice_lines(o) {
                        println!(
                            "  {:<24} {:>8}g {:>6} @ {:>10} = {:>14}",
                            it.description,
                            format_weight(it.weight),
                            format_purity(it.purity),
                            format_rate(it.rate),
                            format_money(it.amount),
                        );
                    }
                    if let Some(m) = o.making_charges {
                        println!("  making charges {:>45}", format_money(m));
                    }
                    println!("  total {:>54} {}", format_money(invoice::invoice_total(o)), settings.currency);
                })?;
            }
            OrderCommand::Delete { id } => {
                store.delete_order(id)?;
                println!("deleted order {id}");
            }
        },

        Command::Inventory(cmd) => match cmd {
            InventoryCommand::Receive { movement, client } => {
                let tx = store.create_inventory(movement_input(TransactionKind::Received, movement, client, today))?;
                emit(json, &tx, |tx| println!("recorded movement {} (+{}g)", tx.id, format_weight(tx.weight)))?;
            }
            InventoryCommand::Issue { movement, client } => {
                let tx = store.create_inventory(movement_input(TransactionKind::Issued, movement, Some(client), today))?;
                emit(json, &tx, |tx| println!("recorded movement {} (-{}g)", tx.id, format_weight(tx.weight)))?;
            }
            InventoryCommand::List => {
                let rows = store.list_inventory()?;
                emit(json, &rows, |rows| {
                    for t in rows {
                        println!(
                            "{:>5}  {}  {:<8} {:>10} {:>6} {:>10}  {:<16} {}",
                            t.id,
                            format_date(t.date),
                            t.kind.label(),
                            format_weight(t.weight),
                            format_purity(t.purity),
                            t.price_per_gram.map(format_rate).unwrap_or_else(|| "N/A".to_string()),
                            t.client_name.as_deref().unwrap_or("-"),
                            t.notes.as_deref().unwrap_or(""),
                        );
                    }
                })?;
            }
            InventoryCommand::Delete { id } => {
                store.delete_inventory(id)?;
                println!("deleted movement {id}");
            }
        },

        Command::Rate(cmd) => match cmd {
            RateCommand::Set { gold, silver, date } => {
                let r = store.upsert_rate(RateEntry {
                    date: date.unwrap_or(today),
                    gold_rate: gold,
                    silver_rate: silver,
                })?;
                emit(json, &r, |r| println!("rates for {}: gold {} silver {}", format_date(r.date), format_rate(r.gold_rate), format_rate(r.silver_rate)))?;
            }
            RateCommand::Show { date, all } => {
                if all {
                    let rates = store.list_rates()?;
                    emit(json, &rates, |rates| {
                        for r in rates {
                            println!("{}  gold {:>10}  silver {:>8}", format_date(r.date), format_rate(r.gold_rate), format_rate(r.silver_rate));
                        }
                    })?;
                } else {
                    let settings = store.get_settings()?;
                    let r = ledger::effective_rate(&store, date.unwrap_or(today), &settings)?;
                    emit(json, &r, |r| {
                        println!("gold {} {}/g, silver {} {}/g (set {})", format_rate(r.gold_rate), settings.currency, format_rate(r.silver_rate), settings.currency, format_date(r.date))
                    })?;
                }
            }
        },

        Command::Dashboard => {
            let dashboard = ledger::dashboard(&store, today)?;
            let recent = store.recent_orders(5)?;
            emit(json, &dashboard, |d| {
                let c = &d.counts;
                println!("orders:  {} ({} pending)", c.total_orders, c.pending_orders);
                println!("clients: {}", c.total_clients);
                println!("stock:   {}g", format_weight(c.current_stock));
                println!(
                    "rates:   gold {} / silver {} {} per gram (as of {})",
                    format_rate(d.rate.gold_rate),
                    format_rate(d.rate.silver_rate),
                    d.currency,
                    format_date(d.rate.date)
                );
                if !recent.is_empty() {
                    println!("recent orders:");
                    print_order_rows(&recent);
                }
            })?;
        }

        Command::Value { weight, purity, rate } => {
            let rate = match rate {
                Some(r) => r,
                None => ledger::effective_rate(&store, today, &store.get_settings()?)?.gold_rate,
            };
            let value = ledger::gold_value(weight, purity, rate)?;
            emit(json, &value, |v| println!("{}", format_money(*v)))?;
        }

        Command::Invoice { order_id, out } => {
            let order = store.get_order(order_id)?.ok_or_else(|| anyhow!("order {order_id} not found"))?;
            let client = store.get_client(order.client_id)?;
            let settings = store.get_settings()?;
            let doc = invoice::compose_invoice(&order, client.as_ref(), &settings, today);
            write_doc(&store, &doc, out, &invoice::invoice_file_name(&settings, order.id))?;
        }

        Command::Report(cmd) => match cmd {
            ReportCommand::Daily { date, out } => {
                let day = date.unwrap_or(today);
                let settings = store.get_settings()?;
                let doc = report::daily_summary(&store, day, &settings)?;
                write_doc(&store, &doc, out, &report::daily_summary_file_name(day))?;
            }
            ReportCommand::Inventory { out } => {
                let doc = report::inventory_report(&store)?;
                write_doc(&store, &doc, out, report::INVENTORY_REPORT_FILE)?;
            }
            ReportCommand::Clients { out } => {
                let doc = report::client_orders_report(&store)?;
                write_doc(&store, &doc, out, report::CLIENT_ORDERS_REPORT_FILE)?;
            }
        },

        Command::SampleData { yes } => {
            if !yes {
                bail!("sample-data deletes all clients, orders, stock movements and rates; pass --yes to continue");
            }
            let summary = sample::generate_sample_data(&mut store, today)?;
            emit(json, &summary, |s| {
                println!("loaded {} clients, {} orders, {} stock movements", s.clients, s.orders, s.movements)
            })?;
        }

        Command::Settings(cmd) => match cmd {
            SettingsCommand::Show => {
                let s = store.get_settings()?;
                emit(json, &s, |s| {
                    println!("shop name:      {}", s.shop_name);
                    println!("currency:       {}", s.currency);
                    println!("invoice prefix: {}", s.invoice_prefix);
                    println!("default gold:   {}", format_rate(s.default_gold_rate));
                    println!("default silver: {}", format_rate(s.default_silver_rate));
                    println!("output dir:     {}", s.output_dir);
                })?;
            }
            SettingsCommand::Set {
                shop_name,
                currency,
                invoice_prefix,
                default_gold_rate,
                default_silver_rate,
                output_dir,
            } => {
                let s = store.update_settings(SettingsPatch {
                    shop_name,
                    currency,
                    invoice_prefix,
                    default_gold_rate,
                    default_silver_rate,
                    output_dir,
                })?;
                emit(json, &s, |_| println!("settings saved"))?;
            }
        },
    }

    Ok(())
}

fn movement_input(
    kind: TransactionKind,
    m: MovementArgs,
    client_id: Option<i64>,
    today: Date,
) -> NewInventoryTransaction {
    NewInventoryTransaction {
        kind,
        weight: m.weight,
        purity: m.purity,
        date: m.date.unwrap_or(today),
        price_per_gram: m.price_per_gram,
        notes: m.notes,
        client_id,
    }
}
