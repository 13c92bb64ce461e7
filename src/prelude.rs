//! Trynex Cart prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    checkout::{CheckoutSummary, DeliveryPolicy, taka},
    customization::{
        Customization, CustomizationError, CustomizationKind, CustomizationOptions,
        CustomizationRequest, EmbeddedImage, RequestKind,
    },
    images::{FileImage, ImageError, ImageSource, InMemoryImage},
    items::{LineItem, LineItemId, total_items, total_price},
    orders::{CustomerDetails, OrderDraft, OrderError, OrderLine, PaymentMethod},
    products::{MAX_UNIT_PRICE, Product, ProductError},
    storage::{CartStorage, FileStorage, MemoryStorage, StorageError},
    store::{AddedItem, CartStore, DEFAULT_STORAGE_KEY, Subscription},
};
