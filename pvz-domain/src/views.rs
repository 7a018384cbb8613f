//! Composite read models
//!
//! A pickup point listing is returned as a tree: each pickup point with its
//! receptions, each reception with its products. Stores produce a flat join
//! and fold it with [`group_join_rows`].

use crate::entities::{PickupPoint, PickupPointId, Product, Reception, ReceptionId};
use std::collections::HashMap;

/// A reception together with the products scanned into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceptionView {
    /// The reception
    pub reception: Reception,
    /// Products in scan order
    pub products: Vec<Product>,
}

/// A pickup point together with its receptions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupPointView {
    /// The pickup point
    pub point: PickupPoint,
    /// Receptions in start order
    pub receptions: Vec<ReceptionView>,
}

/// One row of `pickup_point LEFT JOIN reception LEFT JOIN product`
#[derive(Debug, Clone)]
pub struct JoinRow {
    /// Left-most side, always present
    pub point: PickupPoint,
    /// `NULL` when the pickup point has no receptions
    pub reception: Option<Reception>,
    /// `NULL` when the reception has no products
    pub product: Option<Product>,
}

/// Fold flat join rows into a tree.
///
/// Order of first appearance is preserved at every level, so the caller's
/// `ORDER BY` decides the output order. Repeated pickup points and
/// receptions are merged; a product row without a reception is ignored.
pub fn group_join_rows<I>(rows: I) -> Vec<PickupPointView>
where
    I: IntoIterator<Item = JoinRow>,
{
    let mut views: Vec<PickupPointView> = Vec::new();
    let mut point_index: HashMap<PickupPointId, usize> = HashMap::new();
    let mut reception_index: HashMap<ReceptionId, (usize, usize)> = HashMap::new();

    for row in rows {
        let p = *point_index.entry(row.point.id).or_insert_with(|| {
            views.push(PickupPointView {
                point: row.point.clone(),
                receptions: Vec::new(),
            });
            views.len() - 1
        });

        let Some(reception) = row.reception else {
            continue;
        };

        let (p, r) = *reception_index.entry(reception.id).or_insert_with(|| {
            let receptions = &mut views[p].receptions;
            receptions.push(ReceptionView {
                reception,
                products: Vec::new(),
            });
            (p, receptions.len() - 1)
        });

        if let Some(product) = row.product {
            views[p].receptions[r].products.push(product);
        }
    }

    views
}

// =============================================================================
// Tests
// =============================================================================
