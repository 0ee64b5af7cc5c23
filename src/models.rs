use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::error::{parse_number, LedgerError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub created_date: Date,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClient {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl NewClient {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::validation("name", "name is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::InProgress => "In Progress",
            OrderStatus::Completed => "Completed",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str().replace(' ', "").to_ascii_lowercase() == wanted)
            .ok_or_else(|| LedgerError::validation("status", format!("unknown order status '{s}'")))
    }
}

/// One priced line of an order. `amount` is what was entered, not `weight * rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub description: String,
    pub weight: f64,
    pub purity: f64,
    pub rate: f64,
    pub amount: f64,
}

impl OrderItem {
    /// How far the stored amount is from `weight * rate`.
    pub fn amount_drift(&self) -> f64 {
        self.amount - self.weight * self.rate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    pub description: String,
    pub weight: f64,
    pub purity: f64,
    pub rate: f64,
    pub amount: f64,
}

impl NewOrderItem {
    /// An item whose amount is `weight * rate`.
    pub fn priced(description: impl Into<String>, weight: f64, purity: f64, rate: f64) -> Self {
        NewOrderItem {
            description: description.into(),
            weight,
            purity,
            rate,
            amount: weight * rate,
        }
    }

    pub fn amount_drift(&self) -> f64 {
        self.amount - self.weight * self.rate
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_weight("item weight", self.weight)?;
        validate_purity("item purity", self.purity)?;
        validate_non_negative("item rate", self.rate)?;
        validate_non_negative("item amount", self.amount)?;
        Ok(())
    }
}

/// `description:weight:purity:rate[:amount]`; a missing amount is `weight * rate`.
impl FromStr for NewOrderItem {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if !(4..=5).contains(&parts.len()) || parts[0].trim().is_empty() {
            return Err(LedgerError::validation(
                "item",
                format!("'{s}' is not description:weight:purity:rate[:amount]"),
            ));
        }
        let weight = parse_number("item weight", parts[1])?;
        let purity = parse_number("item purity", parts[2])?;
        let rate = parse_number("item rate", parts[3])?;
        let mut item = NewOrderItem::priced(parts[0].trim(), weight, purity, rate);
        if let Some(amount) = parts.get(4) {
            item.amount = parse_number("item amount", amount)?;
        }
        item.validate()?;
        Ok(item)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub client_id: i64,
    pub description: String,
    pub estimated_weight: f64,
    #[serde(default)]
    pub actual_weight: Option<f64>,
    pub purity: f64,
    pub order_date: Date,
    #[serde(default)]
    pub delivery_date: Option<Date>,
    pub status: OrderStatus,
    #[serde(default)]
    pub price_per_gram: Option<f64>,
    #[serde(default)]
    pub making_charges: Option<f64>,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub client_id: i64,
    pub description: String,
    pub estimated_weight: f64,
    #[serde(default)]
    pub actual_weight: Option<f64>,
    pub purity: f64,
    /// Defaults to the day the order is stored.
    #[serde(default)]
    pub order_date: Option<Date>,
    #[serde(default)]
    pub delivery_date: Option<Date>,
    pub status: OrderStatus,
    #[serde(default)]
    pub price_per_gram: Option<f64>,
    #[serde(default)]
    pub making_charges: Option<f64>,
    #[serde(default)]
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub(crate) fn validate(&self) -> Result<()> {
        validate_order_fields(
            self.estimated_weight,
            self.actual_weight,
            self.purity,
            self.price_per_gram,
            self.making_charges,
            &self.items,
        )
    }
}

/// Full-row replacement of an order, items included. The order date is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub client_id: i64,
    pub description: String,
    pub estimated_weight: f64,
    #[serde(default)]
    pub actual_weight: Option<f64>,
    pub purity: f64,
    #[serde(default)]
    pub delivery_date: Option<Date>,
    pub status: OrderStatus,
    #[serde(default)]
    pub price_per_gram: Option<f64>,
    #[serde(default)]
    pub making_charges: Option<f64>,
    #[serde(default)]
    pub items: Vec<NewOrderItem>,
}

impl OrderUpdate {
    pub(crate) fn validate(&self) -> Result<()> {
        validate_order_fields(
            self.estimated_weight,
            self.actual_weight,
            self.purity,
            self.price_per_gram,
            self.making_charges,
            &self.items,
        )
    }
}

/// A partial edit of an order. `None` keeps a field; for the optional fields
/// `Some(None)` clears it. `items`, when given, replaces the whole item set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
    pub client_id: Option<i64>,
    pub description: Option<String>,
    pub estimated_weight: Option<f64>,
    pub actual_weight: Option<Option<f64>>,
    pub purity: Option<f64>,
    pub delivery_date: Option<Option<Date>>,
    pub status: Option<OrderStatus>,
    pub price_per_gram: Option<Option<f64>>,
    pub making_charges: Option<Option<f64>>,
    pub items: Option<Vec<NewOrderItem>>,
}

impl OrderUpdate {
    pub fn apply(&mut self, patch: OrderPatch) {
        if let Some(v) = patch.client_id {
            self.client_id = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.estimated_weight {
            self.estimated_weight = v;
        }
        if let Some(v) = patch.actual_weight {
            self.actual_weight = v;
        }
        if let Some(v) = patch.purity {
            self.purity = v;
        }
        if let Some(v) = patch.delivery_date {
            self.delivery_date = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.price_per_gram {
            self.price_per_gram = v;
        }
        if let Some(v) = patch.making_charges {
            self.making_charges = v;
        }
        if let Some(v) = patch.items {
            self.items = v;
        }
    }
}

/// Checks shared by new orders and order updates.
fn validate_order_fields(
    estimated_weight: f64,
    actual_weight: Option<f64>,
    purity: f64,
    price_per_gram: Option<f64>,
    making_charges: Option<f64>,
    items: &[NewOrderItem],
) -> Result<()> {
    validate_weight("estimated weight", estimated_weight)?;
    if let Some(w) = actual_weight {
        validate_weight("actual weight", w)?;
    }
    validate_purity("purity", purity)?;
    if let Some(p) = price_per_gram {
        validate_non_negative("price per gram", p)?;
    }
    if let Some(m) = making_charges {
        validate_non_negative("making charges", m)?;
    }
    for item in items {
        item.validate()?;
    }
    Ok(())
}

impl From<Order> for OrderUpdate {
    fn from(o: Order) -> Self {
        OrderUpdate {
            client_id: o.client_id,
            description: o.description,
            estimated_weight: o.estimated_weight,
            actual_weight: o.actual_weight,
            purity: o.purity,
            delivery_date: o.delivery_date,
            status: o.status,
            price_per_gram: o.price_per_gram,
            making_charges: o.making_charges,
            items: o
                .items
                .into_iter()
                .map(|it| NewOrderItem {
                    description: it.description,
                    weight: it.weight,
                    purity: it.purity,
                    rate: it.rate,
                    amount: it.amount,
                })
                .collect(),
        }
    }
}

/// A list row: the order header joined with its client's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub id: i64,
    #[serde(default)]
    pub client_name: Option<String>,
    pub description: String,
    pub estimated_weight: f64,
    #[serde(default)]
    pub actual_weight: Option<f64>,
    pub purity: f64,
    pub order_date: Date,
    #[serde(default)]
    pub delivery_date: Option<Date>,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Received,
    Issued,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Received => "received",
            TransactionKind::Issued => "issued",
        }
    }

    /// "Received" / "Issued", as printed in reports.
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Received => "Received",
            TransactionKind::Issued => "Issued",
        }
    }

    /// +1 for gold coming in, -1 for gold going out.
    pub fn sign(&self) -> f64 {
        match self {
            TransactionKind::Received => 1.0,
            TransactionKind::Issued => -1.0,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "received" => Ok(TransactionKind::Received),
            "issued" => Ok(TransactionKind::Issued),
            other => Err(LedgerError::validation(
                "transaction type",
                format!("expected 'received' or 'issued', got '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTransaction {
    pub id: i64,
    pub kind: TransactionKind,
    pub weight: f64,
    pub purity: f64,
    pub date: Date,
    #[serde(default)]
    pub price_per_gram: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub client_id: Option<i64>,
    /// Filled by list queries that join the client table.
    #[serde(default)]
    pub client_name: Option<String>,
}

impl InventoryTransaction {
    pub fn signed_weight(&self) -> f64 {
        self.kind.sign() * self.weight
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInventoryTransaction {
    pub kind: TransactionKind,
    pub weight: f64,
    pub purity: f64,
    pub date: Date,
    #[serde(default)]
    pub price_per_gram: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub client_id: Option<i64>,
}

impl NewInventoryTransaction {
    pub(crate) fn validate(&self) -> Result<()> {
        validate_weight("weight", self.weight)?;
        validate_purity("purity", self.purity)?;
        if let Some(p) = self.price_per_gram {
            validate_non_negative("price per gram", p)?;
        }
        if self.kind == TransactionKind::Issued && self.client_id.is_none() {
            return Err(LedgerError::validation(
                "client",
                "a client must be selected for issued gold",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateEntry {
    pub date: Date,
    pub gold_rate: f64,
    pub silver_rate: f64,
}

impl RateEntry {
    pub(crate) fn validate(&self) -> Result<()> {
        validate_non_negative("gold rate", self.gold_rate)?;
        validate_non_negative("silver rate", self.silver_rate)?;
        Ok(())
    }
}

/// Shop-wide settings kept in the single `settings` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub shop_name: String,
    pub currency: String,
    pub invoice_prefix: String,
    pub default_gold_rate: f64,
    pub default_silver_rate: f64,
    pub output_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            shop_name: "Gold Ledger".to_string(),
            currency: "KWD".to_string(),
            invoice_prefix: "ORD".to_string(),
            default_gold_rate: 5000.0,
            default_silver_rate: 60.0,
            output_dir: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default)]
    pub shop_name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub invoice_prefix: Option<String>,
    #[serde(default)]
    pub default_gold_rate: Option<f64>,
    #[serde(default)]
    pub default_silver_rate: Option<f64>,
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl Settings {
    pub(crate) fn apply(&mut self, patch: SettingsPatch) -> Result<()> {
        if let Some(v) = patch.shop_name {
            self.shop_name = v;
        }
        if let Some(v) = patch.currency {
            self.currency = v;
        }
        if let Some(v) = patch.invoice_prefix {
            if v.trim().is_empty() {
                return Err(LedgerError::validation("invoice prefix", "prefix must not be blank"));
            }
            self.invoice_prefix = v.trim().to_string();
        }
        if let Some(v) = patch.default_gold_rate {
            validate_non_negative("default gold rate", v)?;
            self.default_gold_rate = v;
        }
        if let Some(v) = patch.default_silver_rate {
            validate_non_negative("default silver rate", v)?;
            self.default_silver_rate = v;
        }
        if let Some(v) = patch.output_dir {
            self.output_dir = v;
        }
        Ok(())
    }
}

pub(crate) fn validate_non_negative(field: &'static str, v: f64) -> Result<()> {
    if !v.is_finite() || v < 0.0 {
        return Err(LedgerError::validation(field, format!("{v} must be a non-negative number")));
    }
    Ok(())
}

pub(crate) fn validate_weight(field: &'static str, v: f64) -> Result<()> {
    validate_non_negative(field, v)
}

pub(crate) fn validate_purity(field: &'static str, v: f64) -> Result<()> {
    if !v.is_finite() || !(0.0..=1.0).contains(&v) {
        return Err(LedgerError::validation(field, format!("{v} must be between 0 and 1")));
    }
    Ok(())
}

/// Empty or whitespace-only text is stored as NULL.
pub(crate) fn norm_opt(s: Option<String>) -> Option<String> {
    s.and_then(|v| {
        let t = v.trim().to_string();
        if t.is_empty() {
            None
        } else {
            Some(t)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn order_status_parses_display_and_cli_spellings() {
        assert_eq!("In Progress".parse::<OrderStatus>().unwrap(), OrderStatus::InProgress);
        assert_eq!("in-progress".parse::<OrderStatus>().unwrap(), OrderStatus::InProgress);
        assert_eq!("cancelled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn order_status_serializes_as_display_string() {
        let json = serde_json::to_string(&OrderStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
    }

    #[test]
    fn issued_transaction_requires_client() {
        let tx = NewInventoryTransaction {
            kind: TransactionKind::Issued,
            weight: 10.0,
            purity: 0.999,
            date: date!(2024 - 01 - 01),
            price_per_gram: None,
            notes: None,
            client_id: None,
        };
        assert!(matches!(tx.validate(), Err(LedgerError::Validation { field: "client", .. })));

        let received = NewInventoryTransaction {
            kind: TransactionKind::Received,
            ..tx
        };
        assert!(received.validate().is_ok());
    }

    #[test]
    fn purity_outside_unit_interval_is_rejected() {
        assert!(validate_purity("purity", 1.2).is_err());
        assert!(validate_purity("purity", -0.1).is_err());
        assert!(validate_purity("purity", 0.916).is_ok());
    }

    #[test]
    fn amount_drift_reports_inconsistent_entry() {
        let item = NewOrderItem {
            description: "Ring".to_string(),
            weight: 8.0,
            purity: 0.999,
            rate: 5000.0,
            amount: 41000.0,
        };
        assert_eq!(item.amount_drift(), 1000.0);
        assert_eq!(NewOrderItem::priced("Ring", 8.0, 0.999, 5000.0).amount_drift(), 0.0);
    }

    #[test]
    fn item_text_defaults_amount_to_weight_times_rate() {
        let item: NewOrderItem = "Ring:8.2:0.999:5000".parse().unwrap();
        assert_eq!(item.description, "Ring");
        assert_eq!(item.amount, 8.2 * 5000.0);

        let entered: NewOrderItem = "Ring:8.2:0.999:5000:41000".parse().unwrap();
        assert_eq!(entered.amount, 41000.0);
    }

    #[test]
    fn item_text_rejects_bad_parts() {
        assert!("Ring:8.2:0.999".parse::<NewOrderItem>().is_err());
        assert!("Ring:abc:0.999:5000".parse::<NewOrderItem>().is_err());
        assert!("Ring:8.2:1.5:5000".parse::<NewOrderItem>().is_err());
        assert!(":8.2:0.999:5000".parse::<NewOrderItem>().is_err());
    }

    fn ring_update() -> OrderUpdate {
        OrderUpdate {
            client_id: 1,
            description: "Gold ring".to_string(),
            estimated_weight: 8.2,
            actual_weight: Some(8.1),
            purity: 0.999,
            delivery_date: Some(date!(2024 - 01 - 06)),
            status: OrderStatus::InProgress,
            price_per_gram: Some(5000.0),
            making_charges: Some(800.0),
            items: vec![NewOrderItem::priced("Gold ring", 8.1, 0.999, 5000.0)],
        }
    }

    #[test]
    fn order_patch_keeps_sets_and_clears() {
        let mut update = ring_update();
        update.apply(OrderPatch {
            status: Some(OrderStatus::Completed),
            actual_weight: Some(None),
            delivery_date: Some(None),
            price_per_gram: Some(None),
            making_charges: Some(Some(650.0)),
            ..Default::default()
        });
        assert_eq!(update.status, OrderStatus::Completed);
        assert_eq!(update.actual_weight, None);
        assert_eq!(update.delivery_date, None);
        assert_eq!(update.price_per_gram, None);
        assert_eq!(update.making_charges, Some(650.0));
        assert_eq!(update.description, "Gold ring");
        assert_eq!(update.items.len(), 1);

        let mut untouched = ring_update();
        untouched.apply(OrderPatch::default());
        assert_eq!(untouched, ring_update());

        let mut emptied = ring_update();
        emptied.apply(OrderPatch {
            items: Some(Vec::new()),
            ..Default::default()
        });
        assert!(emptied.items.is_empty());
    }

    #[test]
    fn new_orders_and_updates_share_field_checks() {
        let mut update = ring_update();
        update.making_charges = Some(-1.0);
        assert!(matches!(
            update.validate(),
            Err(LedgerError::Validation { field: "making charges", .. })
        ));

        let new = NewOrder {
            client_id: 1,
            description: "Gold ring".to_string(),
            estimated_weight: 8.2,
            actual_weight: Some(f64::NAN),
            purity: 0.999,
            order_date: None,
            delivery_date: None,
            status: OrderStatus::Pending,
            price_per_gram: None,
            making_charges: Some(-1.0),
            items: vec![],
        };
        assert!(matches!(
            new.validate(),
            Err(LedgerError::Validation { field: "actual weight", .. })
        ));

        let mut bad_item = ring_update();
        bad_item.items[0].purity = 1.5;
        assert!(matches!(
            bad_item.validate(),
            Err(LedgerError::Validation { field: "item purity", .. })
        ));
        assert!(ring_update().validate().is_ok());
    }

    #[test]
    fn settings_patch_rejects_blank_prefix() {
        let mut s = Settings::default();
        let err = s
            .apply(SettingsPatch {
                invoice_prefix: Some("  ".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
        assert_eq!(s.invoice_prefix, "ORD");
    }
}
