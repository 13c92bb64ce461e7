//! Trynex Cart
//!
//! Device-local shopping cart for the Trynex Lifestyle storefront: a write-through cart store
//! with subscriber broadcast, customization capture, checkout arithmetic and order drafts.

pub mod checkout;
pub mod customization;
pub mod images;
pub mod items;
pub mod orders;
pub mod prelude;
pub mod products;
pub mod storage;
pub mod store;
