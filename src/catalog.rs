//! Product catalog operations.
//!
//! The catalog is a flat list of products keyed by name (case-sensitive).
//! Catalog edits never rewrite order lines already on a bill — lines keep
//! the price that was current when they were assigned.

use tracing::info;

use crate::ledger::{LedgerError, Product};

/// The seed catalog shipped with a fresh install.
pub fn default_products() -> Vec<Product> {
    [
        ("Cerveja", 5.0),
        ("Vinho", 8.0),
        ("Coquetel", 12.0),
        ("Refrigerante", 3.0),
        ("Água", 2.0),
        ("X-Tudo", 24.0),
        ("X-Bacon", 20.0),
        ("X-Salada", 18.0),
        ("Bauru", 15.0),
        ("Filé Mignon", 24.0),
        ("Batata Frita 300g", 20.0),
        ("Mandioca Frita 300g", 25.0),
        ("Torresmo 100g", 25.0),
        ("Frango a Passarinho 500g", 40.0),
        ("Coca-Cola (lata)", 5.0),
        ("Guaraná Antarctica (lata)", 5.0),
        ("Suco 1 L", 12.0),
        ("Água sem gás", 4.0),
        ("Cerveja lata Original", 6.0),
        ("Long Neck Heineken", 12.0),
        ("Garrafa 600 ml Original", 14.0),
        ("Chopp Brahma", 10.0),
        ("Dose Campari", 15.0),
        ("Copo com Gelo", 0.5),
        ("Balde de Gelo", 12.0),
    ]
    .into_iter()
    .map(|(name, price)| Product {
        name: name.to_string(),
        price,
    })
    .collect()
}

fn validate(product: &Product) -> Result<(), LedgerError> {
    if product.name.trim().is_empty() {
        return Err(LedgerError::EmptyProductName);
    }
    if product.price < 0.0 {
        return Err(LedgerError::NegativePrice);
    }
    Ok(())
}

/// Add a new product. Names are unique; re-adding an existing name fails.
pub fn add_product(catalog: &[Product], product: Product) -> Result<Vec<Product>, LedgerError> {
    validate(&product)?;
    if catalog.iter().any(|p| p.name == product.name) {
        return Err(LedgerError::DuplicateProduct(product.name));
    }

    let mut next = catalog.to_vec();
    info!(name = %product.name, price = product.price, "Product added to catalog");
    next.push(product);
    Ok(next)
}

/// Change the catalog price of an existing product. Outstanding order lines
/// keep their snapshot price.
pub fn update_product_price(
    catalog: &[Product],
    name: &str,
    price: f64,
) -> Result<Vec<Product>, LedgerError> {
    if price < 0.0 {
        return Err(LedgerError::NegativePrice);
    }

    let mut next = catalog.to_vec();
    let product = next
        .iter_mut()
        .find(|p| p.name == name)
        .ok_or_else(|| LedgerError::ProductNotFound(name.to_string()))?;
    product.price = price;
    info!(name, price, "Catalog price updated");
    Ok(next)
}

/// Remove a product from the catalog by name.
pub fn remove_product(catalog: &[Product], name: &str) -> Result<Vec<Product>, LedgerError> {
    if !catalog.iter().any(|p| p.name == name) {
        return Err(LedgerError::ProductNotFound(name.to_string()));
    }
    Ok(catalog.iter().filter(|p| p.name != name).cloned().collect())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_products_are_valid() {
        let products = default_products();
        assert!(!products.is_empty());
        assert!(products.iter().all(|p| p.price >= 0.0));
        assert!(products.iter().all(|p| !p.name.is_empty()));
    }

    #[test]
    fn test_add_product_rejects_duplicates() {
        let catalog = default_products();
        let err = add_product(
            &catalog,
            Product {
                name: "Cerveja".into(),
                price: 7.0,
            },
        )
        .unwrap_err();
        assert_eq!(err, LedgerError::DuplicateProduct("Cerveja".into()));
    }

    #[test]
    fn test_add_product_validates_fields() {
        let catalog: Vec<Product> = Vec::new();
        assert_eq!(
            add_product(
                &catalog,
                Product {
                    name: "  ".into(),
                    price: 1.0
                }
            )
            .unwrap_err(),
            LedgerError::EmptyProductName
        );
        assert_eq!(
            add_product(
                &catalog,
                Product {
                    name: "Gelo".into(),
                    price: -1.0
                }
            )
            .unwrap_err(),
            LedgerError::NegativePrice
        );
    }

    #[test]
    fn test_update_price_only_touches_catalog() {
        let catalog = vec![Product {
            name: "Cerveja".into(),
            price: 5.0,
        }];
        let updated = update_product_price(&catalog, "Cerveja", 6.0).unwrap();
        assert_eq!(updated[0].price, 6.0);
        assert_eq!(catalog[0].price, 5.0, "input slice must stay untouched");
    }

    #[test]
    fn test_remove_product() {
        let catalog = vec![
            Product {
                name: "Cerveja".into(),
                price: 5.0,
            },
            Product {
                name: "Vinho".into(),
                price: 8.0,
            },
        ];
        let next = remove_product(&catalog, "Cerveja").unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].name, "Vinho");

        assert_eq!(
            remove_product(&next, "Cerveja").unwrap_err(),
            LedgerError::ProductNotFound("Cerveja".into())
        );
    }
}
