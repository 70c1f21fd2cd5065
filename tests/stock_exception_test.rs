//! Stock-exception engine: resolution flags, na-cancel re-derivation and
//! the operator-facing filters.

mod common;

use chrono::Utc;
use common::TestApp;

use pickhouse_api::entities::order;
use pickhouse_api::errors::ServiceError;
use pickhouse_api::services::picking::ShortAllocation;
use pickhouse_api::services::stock_exceptions::ExceptionQuery;

async fn seed_shortage(app: &TestApp, sku: &str, qty_ordered: i32, qty_short: i32) -> (i64, i64) {
    let item = app.seed_product(sku, &format!("{sku} title"), "Pantry").await;
    let header = app
        .seed_order(&format!("ext-{sku}"), &format!("N-{sku}"), Utc::now())
        .await;
    app.seed_line(&header, &item, qty_ordered).await;

    let outcome = app
        .state
        .services
        .picking
        .mark_short(
            sku,
            &[ShortAllocation {
                order_id: header.id,
                qty_short,
            }],
            "picker",
            None,
        )
        .await
        .expect("shortage should record");
    (outcome.exception_id, header.id)
}

#[tokio::test]
async fn resolve_is_idempotent_and_annotates_notes() {
    let app = TestApp::new().await;
    let (exception_id, _) = seed_shortage(&app, "SKU-1", 5, 2).await;

    let service = &app.state.services.stock_exceptions;
    let resolved = service.resolve(exception_id, "lead").await.unwrap();
    assert!(resolved.resolved);
    assert!(resolved.notes.contains("Resolved by lead"));

    // Second resolve is a no-op, not an error.
    let again = service.resolve(exception_id, "lead").await.unwrap();
    assert!(again.resolved);
    assert_eq!(again.notes.matches("Resolved by lead").count(), 1);

    assert!(matches!(
        service.resolve(9999, "lead").await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn toggles_flip_back_and_forth() {
    let app = TestApp::new().await;
    let (exception_id, _) = seed_shortage(&app, "SKU-1", 5, 2).await;

    let service = &app.state.services.stock_exceptions;
    let on = service.toggle_ordered_from_company(exception_id).await.unwrap();
    assert!(on.value);
    let off = service.toggle_ordered_from_company(exception_id).await.unwrap();
    assert!(!off.value);
}

#[tokio::test]
async fn na_cancel_marks_waiting_orders_ready() {
    let app = TestApp::new().await;

    // Order fully short: the shortage is all that stands between the order
    // and readiness... and shorts already complete lines, so build a mixed
    // case instead: one line picked, one line short.
    let widget = app.seed_product("W", "Widget", "Pantry").await;
    let header = app.seed_order("ext-w", "3001", Utc::now()).await;
    app.seed_line(&header, &widget, 2).await;

    let outcome = app
        .state
        .services
        .picking
        .mark_short(
            "W",
            &[ShortAllocation {
                order_id: header.id,
                qty_short: 2,
            }],
            "picker",
            None,
        )
        .await
        .unwrap();

    // The short completed the only line, so the order is already ready.
    assert_eq!(outcome.orders_ready, vec!["3001".to_string()]);

    let toggled = app
        .state
        .services
        .stock_exceptions
        .toggle_na_cancel(outcome.exception_id)
        .await
        .unwrap();
    assert!(toggled.value);
    // Already-ready orders are not re-reported.
    assert!(toggled.orders_made_ready.is_empty());

    let header = app.reload_order(header.id).await;
    assert_eq!(header.status, order::STATUS_READY_TO_PACK);
}

#[tokio::test]
async fn list_filters_by_resolved_and_search() {
    let app = TestApp::new().await;
    let (first, _) = seed_shortage(&app, "SKU-1", 5, 2).await;
    seed_shortage(&app, "SKU-2", 3, 1).await;

    let service = &app.state.services.stock_exceptions;
    service.resolve(first, "lead").await.unwrap();

    let unresolved = service
        .list(&ExceptionQuery {
            resolved: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].sku, "SKU-2");

    let matched = service
        .list(&ExceptionQuery {
            search: Some("SKU-1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].sku, "SKU-1");

    let by_qty = service
        .list(&ExceptionQuery {
            sort_by: Some("qty_short".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_qty[0].qty_short, 2);
}

#[tokio::test]
async fn aggregation_groups_by_sku() {
    let app = TestApp::new().await;

    // Two shortages for the same SKU across different orders.
    let item = app.seed_product("SKU-1", "Crackers", "Pantry").await;
    let first = app.seed_order("ext-1", "4001", Utc::now()).await;
    let second = app.seed_order("ext-2", "4002", Utc::now()).await;
    app.seed_line(&first, &item, 5).await;
    app.seed_line(&second, &item, 5).await;

    let picking = &app.state.services.picking;
    picking
        .mark_short(
            "SKU-1",
            &[ShortAllocation {
                order_id: first.id,
                qty_short: 2,
            }],
            "picker",
            None,
        )
        .await
        .unwrap();
    picking
        .mark_short(
            "SKU-1",
            &[ShortAllocation {
                order_id: second.id,
                qty_short: 3,
            }],
            "picker",
            None,
        )
        .await
        .unwrap();

    let aggregated = app
        .state
        .services
        .stock_exceptions
        .aggregated()
        .await
        .unwrap();
    assert_eq!(aggregated.len(), 1);
    assert_eq!(aggregated[0].total_qty_short, 5);
    assert_eq!(aggregated[0].exception_count, 2);
    assert_eq!(
        aggregated[0].order_numbers,
        vec!["4001".to_string(), "4002".to_string()]
    );
}
