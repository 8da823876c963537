// Wire models for the warehouse API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Paginated list envelope (`count` / `next` / `previous` / `results`).
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Decimal-as-string, as the server serializes money fields
    pub price: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub brand: Option<i64>,
    #[serde(default)]
    pub category: Option<i64>,
    #[serde(default)]
    pub supplier: Option<i64>,
    #[serde(default)]
    pub store: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreLocation {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

/// A stock movement between stores (or an inbound/outbound entry when one
/// side is absent). Movements are an append-style ledger: created and
/// listed, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: i64,
    pub product: i64,
    #[serde(default)]
    pub from_store: Option<i64>,
    #[serde(default)]
    pub to_store: Option<i64>,
    pub quantity: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_deserialization() {
        let body = r#"{
            "count": 2,
            "next": "http://api/products/?page=2",
            "previous": null,
            "results": [
                {"id": 1, "name": "Pallet jack", "price": "249.99", "quantity": 4},
                {"id": 2, "name": "Shrink wrap", "price": "12.50", "quantity": 310, "brand": 3}
            ]
        }"#;

        let page: Page<Product> = serde_json::from_str(body).unwrap();
        assert_eq!(page.count, 2);
        assert!(page.next.is_some());
        assert!(page.previous.is_none());
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].name, "Pallet jack");
        assert_eq!(page.results[1].brand, Some(3));
    }

    #[test]
    fn test_movement_tolerates_missing_sides() {
        let body = r#"{"id": 9, "product": 1, "to_store": 2, "quantity": 50}"#;
        let movement: Movement = serde_json::from_str(body).unwrap();
        assert_eq!(movement.from_store, None);
        assert_eq!(movement.to_store, Some(2));
        assert!(movement.created_at.is_none());
    }
}
