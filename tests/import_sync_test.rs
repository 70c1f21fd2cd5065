//! Import engine: upsert reconciliation, local-progress preservation on
//! re-sync (S5), auto-pack of vanished orders (S6), idempotence, clamp
//! warnings and the single-flight busy check.

mod common;

use chrono::Utc;
use common::{document, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;

use pickhouse_api::entities::{order, order_line, product, sync_log};
use pickhouse_api::errors::ServiceError;

fn two_order_feed() -> serde_json::Value {
    json!({
        "success": true,
        "items_by_category": [{
            "category_name": "Pantry",
            "subcategories": [{
                "subcategory_name": "Snacks",
                "items": [
                    {
                        "sku": "SKU-1",
                        "title": "Crackers",
                        "vendor_name": "Acme",
                        "price": "4.50",
                        "orders": [
                            {"order_id": "ext-a", "number": "1001", "customer_name": "Ada", "quantity": 4},
                            {"order_id": "ext-b", "number": "1002", "customer_name": "Bo", "quantity": 2}
                        ]
                    },
                    {
                        "sku": "SKU-2",
                        "title": "Olives",
                        "orders": [
                            {"order_id": "ext-a", "number": "1001", "customer_name": "Ada", "quantity": 1}
                        ]
                    }
                ]
            }]
        }]
    })
}

#[tokio::test]
async fn first_sync_creates_products_orders_and_lines() {
    let app = TestApp::new().await;

    let log = app
        .state
        .services
        .import
        .apply_document(&document(two_order_feed()), Some("root"))
        .await
        .expect("sync should succeed");

    assert_eq!(log.status, sync_log::STATUS_SUCCESS);
    assert_eq!(log.orders_fetched, 2);
    assert_eq!(log.orders_created, 2);
    assert_eq!(log.products_created, 2);
    assert_eq!(log.items_created, 3);
    assert_eq!(log.warnings, 0);
    assert_eq!(log.triggered_by.as_deref(), Some("root"));
    assert!(log.completed_at.is_some());

    let orders = order::Entity::find().all(&**app.db()).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.status == order::STATUS_OPEN));

    let lines = order_line::Entity::find().all(&**app.db()).await.unwrap();
    assert_eq!(lines.len(), 3);
    assert!(lines
        .iter()
        .all(|l| l.qty_picked == 0 && l.qty_short == 0 && l.shipment_batch == 1));

    let crackers = product::Entity::find()
        .filter(product::Column::Sku.eq("SKU-1"))
        .one(&**app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(crackers.price, Some(dec!(4.50)));
    assert_eq!(crackers.vendor_name.as_deref(), Some("Acme"));

    // Sync status was stamped on the configuration.
    let status = app.state.services.settings.sync_status().await.unwrap();
    assert_eq!(status.last_sync_status, "success");
    assert!(status.last_sync_at.is_some());
}

#[tokio::test]
async fn resync_is_idempotent_and_preserves_local_progress() {
    let app = TestApp::new().await;
    let import = &app.state.services.import;

    import
        .apply_document(&document(two_order_feed()), None)
        .await
        .unwrap();

    // Pick half of order A's crackers, then author local order state.
    app.state
        .services
        .picking
        .pick("SKU-1", 2, "picker", None)
        .await
        .unwrap();

    let header = order::Entity::find()
        .filter(order::Column::ExternalId.eq("ext-a"))
        .one(&**app.db())
        .await
        .unwrap()
        .unwrap();
    app.state
        .services
        .order_state
        .update_message(header.id, Some("ring the bell".into()), Some(true))
        .await
        .unwrap();

    let before_lines = order_line::Entity::find().all(&**app.db()).await.unwrap();
    let before_orders = order::Entity::find().all(&**app.db()).await.unwrap();

    // Re-sync the identical document.
    let log = import
        .apply_document(&document(two_order_feed()), None)
        .await
        .unwrap();

    assert_eq!(log.orders_created, 0);
    assert_eq!(log.orders_updated, 0);
    assert_eq!(log.products_created, 0);
    assert_eq!(log.products_updated, 0);
    assert_eq!(log.items_created, 0);
    assert_eq!(log.items_updated, 0);
    assert_eq!(log.orders_auto_packed, 0);

    // Byte-identical rows apart from timestamps.
    let after_lines = order_line::Entity::find().all(&**app.db()).await.unwrap();
    assert_eq!(before_lines, after_lines);

    let after_orders = order::Entity::find().all(&**app.db()).await.unwrap();
    for (before, after) in before_orders.iter().zip(after_orders.iter()) {
        assert_eq!(before.status, after.status);
        assert_eq!(before.customer_message, after.customer_message);
        assert_eq!(before.email_sent, after.email_sent);
        assert_eq!(before.total_shipments, after.total_shipments);
        assert_eq!(before.current_shipment, after.current_shipment);
    }
}

#[tokio::test]
async fn vanished_orders_are_auto_packed() {
    let app = TestApp::new().await;
    let import = &app.state.services.import;

    import
        .apply_document(&document(two_order_feed()), None)
        .await
        .unwrap();

    // Progress order B into picking.
    app.state
        .services
        .picking
        .pick("SKU-1", 5, "picker", None)
        .await
        .unwrap();

    // The next feed only contains order A.
    let partial = json!({
        "success": true,
        "items_by_category": [{
            "category_name": "Pantry",
            "subcategories": [{
                "subcategory_name": "Snacks",
                "items": [{
                    "sku": "SKU-1",
                    "title": "Crackers",
                    "orders": [
                        {"order_id": "ext-a", "number": "1001", "customer_name": "Ada", "quantity": 4}
                    ]
                }]
            }]
        }]
    });

    let log = import.apply_document(&document(partial), None).await.unwrap();
    assert_eq!(log.orders_auto_packed, 1);

    let packed = order::Entity::find()
        .filter(order::Column::ExternalId.eq("ext-b"))
        .one(&**app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(packed.status, order::STATUS_PACKED);
    assert_eq!(packed.packed_by.as_deref(), Some(order::PACKED_BY_SYSTEM));
    assert!(packed.packed_at.is_some());

    // Order A is still live.
    let live = order::Entity::find()
        .filter(order::Column::ExternalId.eq("ext-a"))
        .one(&**app.db())
        .await
        .unwrap()
        .unwrap();
    assert_ne!(live.status, order::STATUS_PACKED);
}

#[tokio::test]
async fn quantity_below_local_progress_is_left_with_a_warning() {
    let app = TestApp::new().await;
    let import = &app.state.services.import;

    import
        .apply_document(&document(two_order_feed()), None)
        .await
        .unwrap();

    // Pick 3 of the 4 crackers on order A.
    app.state
        .services
        .picking
        .pick("SKU-1", 3, "picker", None)
        .await
        .unwrap();

    // Upstream now claims only 2 were ordered: below picked progress.
    let mut shrunk = two_order_feed();
    shrunk["items_by_category"][0]["subcategories"][0]["items"][0]["orders"][0]["quantity"] =
        json!(2);

    let log = import.apply_document(&document(shrunk), None).await.unwrap();
    assert_eq!(log.warnings, 1);
    assert_eq!(log.items_updated, 0);

    let line = order_line::Entity::find()
        .filter(order_line::Column::Sku.eq("SKU-1"))
        .all(&**app.db())
        .await
        .unwrap()
        .into_iter()
        .find(|l| l.qty_picked == 3)
        .unwrap();
    assert_eq!(line.qty_ordered, 4);

    let errors = log.detailed_errors.as_array().unwrap();
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn quantity_change_within_progress_is_applied() {
    let app = TestApp::new().await;
    let import = &app.state.services.import;

    import
        .apply_document(&document(two_order_feed()), None)
        .await
        .unwrap();

    let mut grown = two_order_feed();
    grown["items_by_category"][0]["subcategories"][0]["items"][0]["orders"][1]["quantity"] =
        json!(6);

    let log = import.apply_document(&document(grown), None).await.unwrap();
    assert_eq!(log.items_updated, 1);

    let line = order_line::Entity::find()
        .filter(order_line::Column::Sku.eq("SKU-1"))
        .all(&**app.db())
        .await
        .unwrap()
        .into_iter()
        .find(|l| l.qty_ordered == 6)
        .unwrap();
    assert_eq!(line.qty_picked, 0);
}

#[tokio::test]
async fn product_updates_are_applied_and_counted() {
    let app = TestApp::new().await;
    let import = &app.state.services.import;

    import
        .apply_document(&document(two_order_feed()), None)
        .await
        .unwrap();

    let mut renamed = two_order_feed();
    renamed["items_by_category"][0]["subcategories"][0]["items"][0]["title"] =
        json!("Salted Crackers");

    let log = import.apply_document(&document(renamed), None).await.unwrap();
    assert_eq!(log.products_created, 0);
    assert_eq!(log.products_updated, 1);

    let item = product::Entity::find()
        .filter(product::Column::Sku.eq("SKU-1"))
        .one(&**app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.title, "Salted Crackers");
}

#[tokio::test]
async fn concurrent_sync_is_rejected_as_busy() {
    let app = TestApp::new().await;

    // Simulate a sync already in flight.
    sync_log::ActiveModel {
        started_at: Set(Utc::now()),
        status: Set(sync_log::STATUS_IN_PROGRESS.to_string()),
        detailed_errors: Set(json!([])),
        ..Default::default()
    }
    .insert(&**app.db())
    .await
    .unwrap();

    let err = app
        .state
        .services
        .import
        .apply_document(&document(two_order_feed()), None)
        .await
        .expect_err("second sync must be rejected");
    assert!(matches!(err, ServiceError::SyncBusy));
}

#[tokio::test]
async fn stale_in_progress_sync_does_not_block() {
    let app = TestApp::new().await;

    // A sync that crashed an hour ago no longer holds the advisory lock.
    sync_log::ActiveModel {
        started_at: Set(Utc::now() - chrono::Duration::hours(1)),
        status: Set(sync_log::STATUS_IN_PROGRESS.to_string()),
        detailed_errors: Set(json!([])),
        ..Default::default()
    }
    .insert(&**app.db())
    .await
    .unwrap();

    let log = app
        .state
        .services
        .import
        .apply_document(&document(two_order_feed()), None)
        .await
        .expect("stale lock must not block");
    assert_eq!(log.status, sync_log::STATUS_SUCCESS);
}

#[tokio::test]
async fn packed_orders_are_not_reopened_by_resync() {
    let app = TestApp::new().await;
    let import = &app.state.services.import;

    import
        .apply_document(&document(two_order_feed()), None)
        .await
        .unwrap();

    // Pack order B completely.
    app.state
        .services
        .picking
        .pick("SKU-1", 6, "picker", None)
        .await
        .unwrap();
    app.state
        .services
        .picking
        .mark_short(
            "SKU-2",
            &[pickhouse_api::services::picking::ShortAllocation {
                order_id: order::Entity::find()
                    .filter(order::Column::ExternalId.eq("ext-a"))
                    .one(&**app.db())
                    .await
                    .unwrap()
                    .unwrap()
                    .id,
                qty_short: 1,
            }],
            "picker",
            None,
        )
        .await
        .unwrap();

    let header_b = order::Entity::find()
        .filter(order::Column::ExternalId.eq("ext-b"))
        .one(&**app.db())
        .await
        .unwrap()
        .unwrap();
    app.state
        .services
        .order_state
        .mark_packed(header_b.id, "packer")
        .await
        .unwrap();

    // The same feed arrives again; the packed order must stay packed.
    import
        .apply_document(&document(two_order_feed()), None)
        .await
        .unwrap();

    let header_b = app.reload_order(header_b.id).await;
    assert_eq!(header_b.status, order::STATUS_PACKED);
    assert_eq!(header_b.packed_by.as_deref(), Some("packer"));
}
