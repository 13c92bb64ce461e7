//! Durability of the cart across reloads.

use std::num::NonZeroU32;

use rust_decimal::Decimal;
use testresult::TestResult;

use trynex_cart::prelude::*;

#[tokio::test]
async fn reload_yields_identical_sequence() -> TestResult {
    let storage = MemoryStorage::new();
    let store = CartStore::open(storage.clone());

    let photo = InMemoryImage::new("dad.jpg", "image/jpeg", b"jpeg".to_vec());
    let request = CustomizationRequest::image(photo)
        .with_text("Best Abbu")?
        .with_quantity(NonZeroU32::new(2).ok_or("zero")?)
        .with_options(CustomizationOptions {
            color: Some("white".to_string()),
            ..CustomizationOptions::default()
        });

    store
        .add_item(
            &Product::new("Mug", 150)?.with_image_url("/images/mug.webp"),
            Some(request),
        )
        .await;
    store.add_item(&Product::parse("Pen", "19.99")?, None).await;

    let reloaded = CartStore::open(storage);

    assert_eq!(reloaded.items(), store.items());
    assert_eq!(reloaded.total_price(), Decimal::new(31999, 2));

    Ok(())
}

#[tokio::test]
async fn every_mutation_is_written_through() -> TestResult {
    let storage = MemoryStorage::new();
    let store = CartStore::open(storage.clone());

    let pen = store.add_item(&Product::new("Pen", 20)?, None).await.id;
    let persisted = storage.raw(DEFAULT_STORAGE_KEY).ok_or("missing")?;
    assert_eq!(serde_json::from_str::<Vec<LineItem>>(&persisted)?, store.items());

    store.update_quantity(pen, 4);
    let persisted = storage.raw(DEFAULT_STORAGE_KEY).ok_or("missing")?;
    assert!(persisted.contains("\"quantity\":4"), "persisted {persisted}");

    store.clear();
    assert_eq!(storage.raw(DEFAULT_STORAGE_KEY).as_deref(), Some("[]"));

    Ok(())
}

#[test]
fn corrupt_content_yields_empty_cart() {
    for corrupt in ["undefined", "{not json", r#"{"id":1}"#, "[1,2,3]", r#"[{"name":"Mug"}]"#] {
        let storage = MemoryStorage::new();
        storage.insert_raw(DEFAULT_STORAGE_KEY, corrupt);

        let store = CartStore::open(storage.clone());

        assert!(store.is_empty(), "content {corrupt:?}");
        assert_eq!(storage.raw(DEFAULT_STORAGE_KEY), None, "content {corrupt:?}");
    }
}

#[test]
fn legacy_numeric_prices_load() -> TestResult {
    let storage = MemoryStorage::new();
    storage.insert_raw(
        DEFAULT_STORAGE_KEY,
        r#"[{"id":"0b8f2a4e-2f44-4f0e-9d43-6f1f7c2d9a11","name":"Mug","unit_price":150,"quantity":2}]"#,
    );

    let store = CartStore::open(storage);

    assert_eq!(store.total_price(), Decimal::from(300));

    Ok(())
}

#[tokio::test]
async fn quota_exceeded_keeps_session_but_loses_durability() -> TestResult {
    let storage = MemoryStorage::with_quota(64);
    let store = CartStore::open(storage.clone());

    let product = Product::new("A very long product name that will not fit", 150)?;

    store.add_item(&product, None).await;

    assert_eq!(store.len(), 1);
    assert_eq!(storage.raw(DEFAULT_STORAGE_KEY), None);

    Ok(())
}

#[tokio::test]
async fn file_storage_survives_a_new_process() -> TestResult {
    let dir = tempfile::tempdir()?;

    let id = {
        let store = CartStore::open(FileStorage::open(dir.path())?);
        let cushion = Product::new("Cushion", 650)?;

        store
            .add_item(&cushion, Some(CustomizationRequest::engraved("ঘর")?))
            .await
            .id
    };

    let store = CartStore::open(FileStorage::open(dir.path())?);
    let cushion = store.get(id).ok_or("line missing after reload")?;

    assert_eq!(cushion.customization().and_then(Customization::text), Some("ঘর"));
    assert!(store.checkout(&DeliveryPolicy::default()).has_free_delivery());

    Ok(())
}

#[tokio::test]
async fn separate_keys_hold_separate_carts() -> TestResult {
    let storage = MemoryStorage::new();
    let first = CartStore::open_with_key(storage.clone(), "cart_a");
    let second = CartStore::open_with_key(storage.clone(), "cart_b");

    first.add_item(&Product::new("Mug", 150)?, None).await;

    assert!(second.is_empty());
    assert_eq!(CartStore::open_with_key(storage, "cart_a").len(), 1);

    Ok(())
}
