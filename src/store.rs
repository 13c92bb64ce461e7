//! Cart store
//!
//! The single authoritative cart of a device. Every mutation is written through to durable
//! storage before subscribers hear about it, and subscribers are notified synchronously, in
//! mutation order, with the full updated sequence.
//!
//! [`CartStore`] is a cheap handle: clones share the same cart, storage and subscribers.
//!
//! Mutations are serialized. `add_item` may suspend while it embeds an attached image; the image
//! is embedded before the cart is locked, so the new line is appended to whatever the cart holds
//! once embedding finishes. Mutations issued in the meantime are not ordered against it.

use std::{cell::Cell, collections::HashSet, fmt, num::NonZeroU32, sync::Arc};

use parking_lot::{Mutex, ReentrantMutex};
use rust_decimal::Decimal;
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
    checkout::{CheckoutSummary, DeliveryPolicy},
    customization::{Customization, CustomizationKind, CustomizationRequest, RequestKind},
    images::{self, ImageError},
    items::{self, LineItem, LineItemId},
    products::Product,
    storage::CartStorage,
};

/// Storage key the cart is persisted under unless told otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "trynex_cart";

new_key_type! {
    /// Subscriber Key
    struct SubscriberKey;
}

type Listener = Arc<dyn Fn(&[LineItem]) + Send + Sync>;
type Listeners = Mutex<SlotMap<SubscriberKey, Listener>>;

/// Result of adding a product to the cart.
#[derive(Debug)]
pub struct AddedItem {
    /// Id of the new line.
    pub id: LineItemId,

    /// Why the attached image was left out, if it was.
    ///
    /// The line is in the cart either way; callers may use this to offer the shopper a retry.
    pub dropped_image: Option<ImageError>,
}

/// Shared cart handle.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<Inner>,
}

struct Inner {
    key: String,
    storage: Box<dyn CartStorage>,
    items: Mutex<Vec<LineItem>>,
    listeners: Arc<Listeners>,
    /// Serializes mutations and counts them, so a notification round can tell when a listener
    /// has already triggered a newer one.
    notifying: ReentrantMutex<Cell<u64>>,
}

impl fmt::Debug for CartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartStore")
            .field("key", &self.inner.key)
            .field("items", &self.inner.items.lock().len())
            .field("subscribers", &self.inner.listeners.lock().len())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Opens the cart persisted under [`DEFAULT_STORAGE_KEY`].
    pub fn open(storage: impl CartStorage + 'static) -> Self {
        Self::open_with_key(storage, DEFAULT_STORAGE_KEY)
    }

    /// Opens the cart persisted under `key`.
    ///
    /// Missing, unreadable or malformed content yields an empty cart, and malformed content is
    /// removed from storage.
    pub fn open_with_key(storage: impl CartStorage + 'static, key: impl Into<String>) -> Self {
        let key = key.into();
        let items = load(&storage, &key);

        debug!(%key, lines = items.len(), "opened cart");

        Self {
            inner: Arc::new(Inner {
                key,
                storage: Box::new(storage),
                items: Mutex::new(items),
                listeners: Arc::new(Mutex::new(SlotMap::with_key())),
                notifying: ReentrantMutex::new(Cell::new(0)),
            }),
        }
    }

    /// Storage key this cart is persisted under.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Adds a product to the end of the cart.
    ///
    /// The quantity comes from the customization request, defaulting to one. An attached image
    /// is embedded first; if that fails the failure is logged, the line is added without the
    /// image, and the error is returned in [`AddedItem::dropped_image`].
    pub async fn add_item(
        &self,
        product: &Product,
        customization: Option<CustomizationRequest>,
    ) -> AddedItem {
        let (quantity, customization, dropped_image) = match customization {
            Some(request) => {
                let (quantity, options, kind) = request.into_parts();
                let (kind, dropped_image) = resolve_kind(kind).await;

                (quantity, Some(Customization { options, kind }), dropped_image)
            }
            None => (None, None, None),
        };

        let id = LineItemId::generate();
        let quantity = quantity.unwrap_or(NonZeroU32::MIN);
        let item = LineItem::new(id, product, quantity, customization);

        debug!(%id, name = item.name(), quantity = quantity.get(), "adding line");

        self.mutate(|items| items.push(item));

        AddedItem { id, dropped_image }
    }

    /// Sets the quantity of a line; zero or below removes it.
    ///
    /// Subscribers are notified even when no line matches `id`.
    pub fn update_quantity(&self, id: LineItemId, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(id);
            return;
        }

        let quantity = NonZeroU32::new(u32::try_from(quantity).unwrap_or(u32::MAX))
            .unwrap_or(NonZeroU32::MAX);

        debug!(%id, quantity = quantity.get(), "updating quantity");

        self.mutate(|items| {
            if let Some(item) = items.iter_mut().find(|item| item.id() == id) {
                item.set_quantity(quantity);
            }
        });
    }

    /// Raises the quantity of a line by one.
    pub fn increment(&self, id: LineItemId) {
        let _notifying = self.inner.notifying.lock();
        let current = self.get(id).map_or(0, |item| i64::from(item.quantity().get()));

        self.update_quantity(id, current + 1);
    }

    /// Lowers the quantity of a line by one, removing it when it reaches zero.
    pub fn decrement(&self, id: LineItemId) {
        let _notifying = self.inner.notifying.lock();
        let current = self.get(id).map_or(0, |item| i64::from(item.quantity().get()));

        self.update_quantity(id, current - 1);
    }

    /// Removes a line. Removing an absent line leaves the cart unchanged.
    pub fn remove_item(&self, id: LineItemId) {
        debug!(%id, "removing line");

        self.mutate(|items| items.retain(|item| item.id() != id));
    }

    /// Empties the cart.
    pub fn clear(&self) {
        debug!("clearing cart");

        self.mutate(Vec::clear);
    }

    /// Registers a listener for cart changes.
    ///
    /// The listener is called straight away with the current cart, then after every mutation.
    /// It stays registered until the returned [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[LineItem]) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let _notifying = self.inner.notifying.lock();

        let snapshot = self.items();
        let key = self.inner.listeners.lock().insert(Arc::clone(&listener));

        listener(&snapshot);

        Subscription {
            key,
            listeners: Arc::downgrade(&self.inner.listeners),
        }
    }

    /// Snapshot of the current lines, in cart order.
    pub fn items(&self) -> Vec<LineItem> {
        self.inner.items.lock().clone()
    }

    /// Returns a copy of the line with the given id.
    pub fn get(&self, id: LineItemId) -> Option<LineItem> {
        self.inner
            .items
            .lock()
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.inner.items.lock().is_empty()
    }

    /// Sum of all line quantities.
    pub fn total_items(&self) -> u64 {
        items::total_items(&self.inner.items.lock())
    }

    /// Sum of unit price times quantity over all lines.
    pub fn total_price(&self) -> Decimal {
        items::total_price(&self.inner.items.lock())
    }

    /// Checkout values for the current cart.
    pub fn checkout(&self, policy: &DeliveryPolicy) -> CheckoutSummary {
        CheckoutSummary::from_items(&self.inner.items.lock(), policy)
    }

    /// Applies a mutation, writes it through to storage, then notifies subscribers.
    ///
    /// Mutations are serialized on the notification lock, which is re-entrant so a listener may
    /// mutate the cart from its callback. The cart lock is only held while changing and
    /// persisting, so listeners may read the cart.
    ///
    /// When a listener mutates, the nested round reaches every subscriber with the newer cart and
    /// the rest of this round is abandoned, so no subscriber is left holding a stale snapshot.
    fn mutate(&self, change: impl FnOnce(&mut Vec<LineItem>)) {
        let round = self.inner.notifying.lock();
        let this_round = round.get().wrapping_add(1);
        round.set(this_round);

        let snapshot = {
            let mut items = self.inner.items.lock();

            change(&mut items);
            self.persist(&items);

            items.clone()
        };

        let listeners: Vec<Listener> = self.inner.listeners.lock().values().cloned().collect();

        for listener in listeners {
            if round.get() != this_round {
                debug!("newer cart already delivered, ending notification round");
                break;
            }

            listener(&snapshot);
        }
    }

    fn persist(&self, items: &[LineItem]) {
        let key = &self.inner.key;

        let serialized = match serde_json::to_string(items) {
            Ok(serialized) => serialized,
            Err(serialize_error) => {
                error!(%key, %serialize_error, "failed to serialize cart");
                return;
            }
        };

        if let Err(storage_error) = self.inner.storage.set(key, &serialized) {
            error!(%key, %storage_error, "failed to persist cart, keeping in-memory state");
        }
    }
}

/// Registration of a cart listener.
///
/// Dropping the subscription unregisters the listener.
#[must_use = "dropping a subscription unregisters its listener"]
pub struct Subscription {
    key: SubscriberKey,
    listeners: std::sync::Weak<Listeners>,
}

impl Subscription {
    /// Unregisters the listener.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().remove(self.key);
        }
    }
}

fn load(storage: &dyn CartStorage, key: &str) -> Vec<LineItem> {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(storage_error) => {
            warn!(%key, %storage_error, "failed to read cart, starting empty");
            return Vec::new();
        }
    };

    match parse(&raw) {
        Ok(items) => items,
        Err(load_error) => {
            warn!(%key, %load_error, "discarding corrupt cart");

            if let Err(storage_error) = storage.remove(key) {
                warn!(%key, %storage_error, "failed to discard corrupt cart");
            }

            Vec::new()
        }
    }
}

/// Reasons a persisted cart is treated as corrupt.
#[derive(Debug, Error)]
enum LoadError {
    /// The content is not a JSON array of valid line items.
    #[error("malformed cart")]
    Json(#[from] serde_json::Error),

    /// Two lines share an id.
    #[error("duplicate line id {0}")]
    DuplicateId(LineItemId),
}

fn parse(raw: &str) -> Result<Vec<LineItem>, LoadError> {
    let items: Vec<LineItem> = serde_json::from_str(raw)?;

    let mut seen = HashSet::with_capacity(items.len());

    if let Some(duplicate) = items.iter().find(|item| !seen.insert(item.id())) {
        return Err(LoadError::DuplicateId(duplicate.id()));
    }

    Ok(items)
}

async fn resolve_kind(kind: RequestKind) -> (CustomizationKind, Option<ImageError>) {
    match kind {
        RequestKind::Plain => (CustomizationKind::Plain, None),
        RequestKind::Engraved(text) => (CustomizationKind::Engraved { text }, None),
        RequestKind::Image { source, text } => match images::embed(source.as_ref()).await {
            Ok(image) => (CustomizationKind::Image { image, text }, None),
            Err(image_error) => {
                warn!(
                    file_name = source.file_name(),
                    %image_error,
                    "failed to embed image, adding line without it"
                );

                let kind = match text {
                    Some(text) => CustomizationKind::Engraved { text },
                    None => CustomizationKind::Plain,
                };

                (kind, Some(image_error))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mockall::predicate::eq;
    use testresult::TestResult;

    use crate::{
        images::InMemoryImage,
        storage::{MemoryStorage, MockCartStorage, StorageError},
    };

    use super::*;

    fn product(name: &str, price: i64) -> TestResult<Product> {
        Ok(Product::new(name, Decimal::from(price))?)
    }

    #[tokio::test]
    async fn add_item_defaults_quantity_to_one() -> TestResult {
        let store = CartStore::open(MemoryStorage::new());

        let added = store.add_item(&product("Pen", 20)?, None).await;
        let item = store.get(added.id).ok_or("line missing")?;

        assert_eq!(item.quantity().get(), 1);
        assert_eq!(item.customization(), None);
        assert!(added.dropped_image.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn add_item_uses_requested_quantity() -> TestResult {
        let store = CartStore::open(MemoryStorage::new());
        let quantity = NonZeroU32::new(4).ok_or("zero")?;

        store
            .add_item(
                &product("Mug", 150)?,
                Some(CustomizationRequest::plain().with_quantity(quantity)),
            )
            .await;

        assert_eq!(store.total_items(), 4);
        assert_eq!(store.total_price(), Decimal::from(600));

        Ok(())
    }

    #[tokio::test]
    async fn add_item_embeds_images() -> TestResult {
        let store = CartStore::open(MemoryStorage::new());
        let request =
            CustomizationRequest::image(InMemoryImage::new("cat.png", "image/png", b"abc".to_vec()))
                .with_text("Mini")?;

        let added = store.add_item(&product("T-Shirt", 450)?, Some(request)).await;
        let item = store.get(added.id).ok_or("line missing")?;
        let customization = item.customization().ok_or("customization missing")?;
        let image = customization.image().ok_or("image missing")?;

        assert_eq!(image.data_url, "data:image/png;base64,YWJj");
        assert_eq!(image.file_name, "cat.png");
        assert_eq!(customization.text(), Some("Mini"));

        Ok(())
    }

    #[tokio::test]
    async fn failed_image_degrades_to_text() -> TestResult {
        let store = CartStore::open(MemoryStorage::new());
        let pdf = InMemoryImage::new("doc.pdf", "application/pdf", b"%PDF".to_vec());
        let request = CustomizationRequest::image(pdf).with_text("Mini")?;

        let added = store.add_item(&product("T-Shirt", 450)?, Some(request)).await;
        let item = store.get(added.id).ok_or("line missing")?;

        assert!(
            matches!(added.dropped_image, Some(ImageError::UnsupportedType(_))),
            "expected dropped image, got {:?}",
            added.dropped_image
        );
        assert_eq!(
            item.customization().map(|c| c.kind.clone()),
            Some(CustomizationKind::Engraved {
                text: "Mini".to_string()
            })
        );

        Ok(())
    }

    #[tokio::test]
    async fn failed_image_without_text_degrades_to_plain() -> TestResult {
        let store = CartStore::open(MemoryStorage::new());
        let blank = InMemoryImage::new("x.png", "image/png", Vec::new());
        let request = CustomizationRequest::image(blank);

        let added = store.add_item(&product("Frame", 300)?, Some(request)).await;
        let item = store.get(added.id).ok_or("line missing")?;

        assert_eq!(
            item.customization().map(|c| c.kind.clone()),
            Some(CustomizationKind::Plain)
        );

        Ok(())
    }

    #[tokio::test]
    async fn update_quantity_touches_only_the_matching_line() -> TestResult {
        let store = CartStore::open(MemoryStorage::new());
        let mug = store.add_item(&product("Mug", 150)?, None).await.id;
        let pen = store.add_item(&product("Pen", 20)?, None).await.id;

        store.update_quantity(mug, 3);

        assert_eq!(store.get(mug).map(|i| i.quantity().get()), Some(3));
        assert_eq!(store.get(pen).map(|i| i.quantity().get()), Some(1));

        Ok(())
    }

    #[tokio::test]
    async fn update_quantity_to_zero_or_below_removes() -> TestResult {
        let store = CartStore::open(MemoryStorage::new());
        let mug = store.add_item(&product("Mug", 150)?, None).await.id;
        let pen = store.add_item(&product("Pen", 20)?, None).await.id;

        store.update_quantity(mug, 0);
        store.update_quantity(pen, -5);

        assert!(store.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn increment_and_decrement() -> TestResult {
        let store = CartStore::open(MemoryStorage::new());
        let mug = store.add_item(&product("Mug", 150)?, None).await.id;

        store.increment(mug);
        store.increment(mug);
        assert_eq!(store.total_items(), 3);

        store.decrement(mug);
        store.decrement(mug);
        assert_eq!(store.total_items(), 1);

        store.decrement(mug);
        assert!(store.is_empty());

        Ok(())
    }

    #[test]
    fn absent_ids_still_notify() {
        let store = CartStore::open(MemoryStorage::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let _subscription = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.update_quantity(LineItemId::generate(), 2);
        store.remove_item(LineItemId::generate());
        store.increment(LineItemId::generate());

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_stops_notifications() -> TestResult {
        let store = CartStore::open(MemoryStorage::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let subscription = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.add_item(&product("Pen", 20)?, None).await;
        subscription.unsubscribe();
        store.clear();

        assert_eq!(calls.load(Ordering::SeqCst), 2);

        Ok(())
    }

    #[tokio::test]
    async fn listeners_may_read_the_store() -> TestResult {
        let store = CartStore::open(MemoryStorage::new());
        let observed = Arc::new(Mutex::new(Vec::new()));

        let reader = store.clone();
        let sink = Arc::clone(&observed);
        let _subscription = store.subscribe(move |items| {
            sink.lock().push((items.len(), reader.total_items()));
        });

        store.add_item(&product("Pen", 20)?, None).await;

        assert_eq!(*observed.lock(), vec![(0, 0), (1, 1)]);

        Ok(())
    }

    #[tokio::test]
    async fn storage_failures_keep_the_session_consistent() -> TestResult {
        let mut storage = MockCartStorage::new();

        storage
            .expect_get()
            .with(eq(DEFAULT_STORAGE_KEY))
            .returning(|_| Ok(None));
        storage.expect_set().returning(|key, value| {
            Err(StorageError::QuotaExceeded(key.to_string(), value.len(), 0))
        });

        let store = CartStore::open(storage);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let _subscription = store.subscribe(move |items| {
            counter.store(items.len(), Ordering::SeqCst);
        });

        store.add_item(&product("Mug", 150)?, None).await;

        assert_eq!(store.len(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[test]
    fn unreadable_storage_starts_empty_without_discarding() {
        let mut storage = MockCartStorage::new();

        storage.expect_get().returning(|key| {
            Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::other("disk gone"),
            })
        });
        storage.expect_remove().never();

        let store = CartStore::open(storage);

        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_storage_is_discarded() {
        let mut storage = MockCartStorage::new();

        storage
            .expect_get()
            .returning(|_| Ok(Some("undefined".to_string())));
        storage
            .expect_remove()
            .with(eq("custom_key"))
            .times(1)
            .returning(|_| Ok(()));

        let store = CartStore::open_with_key(storage, "custom_key");

        assert!(store.is_empty());
        assert_eq!(store.key(), "custom_key");
    }

    #[test]
    fn duplicate_ids_are_corrupt() {
        let id = LineItemId::generate();
        let line = format!(r#"{{"id":"{id}","name":"Mug","unit_price":"150","quantity":1}}"#);

        let result = parse(&format!("[{line},{line}]"));

        assert!(
            matches!(result, Err(LoadError::DuplicateId(duplicate)) if duplicate == id),
            "expected duplicate id error, got {result:?}"
        );
    }

    #[test]
    fn lines_failing_product_checks_are_corrupt() {
        let id = LineItemId::generate();

        for line in [
            format!(r#"{{"id":"{id}","name":"Mug","unit_price":"-500","quantity":1}}"#),
            format!(r#"{{"id":"{id}","name":"","unit_price":"150","quantity":1}}"#),
        ] {
            let result = parse(&format!("[{line}]"));

            assert!(
                matches!(result, Err(LoadError::Json(_))),
                "expected malformed cart for {line}, got {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn nested_mutation_ends_the_stale_round() -> TestResult {
        let store = CartStore::open(MemoryStorage::new());
        let writer = store.clone();
        let rounds = Arc::new(AtomicUsize::new(0));

        let _first = store.subscribe(move |items| {
            if items.iter().any(|item| item.quantity().get() > 1) {
                writer.clear();
            }
        });

        let counter = Arc::clone(&rounds);
        let last_seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&last_seen);
        let _second = store.subscribe(move |items| {
            counter.fetch_add(1, Ordering::SeqCst);
            *sink.lock() = Some(items.len());
        });

        let three = NonZeroU32::new(3).ok_or("zero")?;
        let request = CustomizationRequest::plain().with_quantity(three);
        store.add_item(&product("Mug", 150)?, Some(request)).await;

        assert_eq!(*last_seen.lock(), Some(0));
        assert_eq!(rounds.load(Ordering::SeqCst), 2, "subscribe snapshot and the cleared cart");
        assert!(store.is_empty());

        Ok(())
    }
}
