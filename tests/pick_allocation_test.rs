//! FIFO pick allocation: distribution across orders, shortage allocations,
//! readiness derivation and reverts (scenarios S1, S2, S3, S7).

mod common;

use chrono::{Duration, Utc};
use common::TestApp;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use pickhouse_api::entities::{order, pick_event};
use pickhouse_api::errors::ServiceError;
use pickhouse_api::services::picking::ShortAllocation;

#[tokio::test]
async fn pick_allocates_fifo_across_orders() {
    let app = TestApp::new().await;
    let item = app.seed_product("X", "Widget", "Pantry").await;

    let base = Utc::now() - Duration::hours(1);
    let order_a = app.seed_order("ext-a", "1001", base).await;
    let order_b = app
        .seed_order("ext-b", "1002", base + Duration::minutes(5))
        .await;
    let line_a = app.seed_line(&order_a, &item, 3).await;
    let line_b = app.seed_line(&order_b, &item, 3).await;

    let outcome = app
        .state
        .services
        .picking
        .pick("X", 4, "picker", None)
        .await
        .expect("pick should succeed");

    // Oldest order filled first, remainder spills into the next.
    let line_a = app.reload_line(line_a.id).await;
    let line_b = app.reload_line(line_b.id).await;
    assert_eq!(line_a.qty_picked, 3);
    assert_eq!(line_b.qty_picked, 1);

    let order_a = app.reload_order(order_a.id).await;
    let order_b = app.reload_order(order_b.id).await;
    assert!(order_a.ready_to_pack);
    assert_eq!(order_a.status, order::STATUS_READY_TO_PACK);
    assert_eq!(order_b.status, order::STATUS_PICKING);
    assert!(!order_b.ready_to_pack);

    assert_eq!(outcome.affected_order_ids, vec![order_a.id, order_b.id]);
    assert_eq!(outcome.orders_ready, vec!["1001".to_string()]);

    // Two audit events, one per touched line.
    let events = pick_event::Entity::find()
        .all(&**app.db())
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|e| e.kind == pick_event::KIND_PICK && e.username == "picker"));
    let deltas: Vec<i32> = events.iter().map(|e| e.delta_qty).collect();
    assert!(deltas.contains(&3) && deltas.contains(&1));
}

#[tokio::test]
async fn pick_exceeding_supply_fails_without_partial_application() {
    let app = TestApp::new().await;
    let item = app.seed_product("X", "Widget", "Pantry").await;
    let header = app.seed_order("ext-a", "1001", Utc::now()).await;
    let line = app.seed_line(&header, &item, 3).await;

    let err = app
        .state
        .services
        .picking
        .pick("X", 5, "picker", None)
        .await
        .expect_err("overdraft should fail");
    assert!(matches!(err, ServiceError::InsufficientRemaining(_)));

    // Nothing was applied.
    let line = app.reload_line(line.id).await;
    assert_eq!(line.qty_picked, 0);
    let events = pick_event::Entity::find().all(&**app.db()).await.unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn pick_of_unknown_sku_is_rejected() {
    let app = TestApp::new().await;
    let err = app
        .state
        .services
        .picking
        .pick("NOPE", 1, "picker", None)
        .await
        .expect_err("no demand for unknown sku");
    assert!(matches!(err, ServiceError::InsufficientRemaining(_)));
}

#[tokio::test]
async fn short_allocation_records_exception_and_keeps_order_picking() {
    let app = TestApp::new().await;
    let item = app.seed_product("Y", "Gadget", "Hardware").await;
    let header = app.seed_order("ext-a", "1001", Utc::now()).await;
    let line = app.seed_line(&header, &item, 5).await;

    let outcome = app
        .state
        .services
        .picking
        .mark_short(
            "Y",
            &[ShortAllocation {
                order_id: header.id,
                qty_short: 2,
            }],
            "picker",
            None,
        )
        .await
        .expect("short should succeed");

    let line = app.reload_line(line.id).await;
    assert_eq!(line.qty_short, 2);
    assert_eq!(line.qty_remaining(), 3);

    let header = app.reload_order(header.id).await;
    assert_eq!(header.status, order::STATUS_PICKING);
    assert!(!header.ready_to_pack);

    assert_eq!(outcome.total_short, 2);
    let exceptions = app
        .state
        .services
        .stock_exceptions
        .unresolved()
        .await
        .unwrap();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].qty_short, 2);
    assert_eq!(exceptions[0].order_number_list(), vec!["1001".to_string()]);
    assert_eq!(exceptions[0].reported_by, "picker");
}

#[tokio::test]
async fn short_exceeding_remaining_rejects_the_whole_call() {
    let app = TestApp::new().await;
    let item = app.seed_product("Y", "Gadget", "Hardware").await;
    let header_a = app.seed_order("ext-a", "1001", Utc::now()).await;
    let header_b = app
        .seed_order("ext-b", "1002", Utc::now() + Duration::minutes(1))
        .await;
    let line_a = app.seed_line(&header_a, &item, 2).await;
    let line_b = app.seed_line(&header_b, &item, 2).await;

    let err = app
        .state
        .services
        .picking
        .mark_short(
            "Y",
            &[
                ShortAllocation {
                    order_id: header_a.id,
                    qty_short: 1,
                },
                ShortAllocation {
                    order_id: header_b.id,
                    qty_short: 5,
                },
            ],
            "picker",
            None,
        )
        .await
        .expect_err("oversized allocation should fail");
    assert!(matches!(err, ServiceError::Validation(_)));

    // All-or-nothing: the valid first allocation rolled back too.
    assert_eq!(app.reload_line(line_a.id).await.qty_short, 0);
    assert_eq!(app.reload_line(line_b.id).await.qty_short, 0);
    let exceptions = app
        .state
        .services
        .stock_exceptions
        .unresolved()
        .await
        .unwrap();
    assert!(exceptions.is_empty());
}

#[tokio::test]
async fn picks_and_shorts_together_derive_ready_to_pack() {
    let app = TestApp::new().await;
    let widget = app.seed_product("W", "Widget", "Pantry").await;
    let gadget = app.seed_product("G", "Gadget", "Pantry").await;
    let header = app.seed_order("ext-c", "1003", Utc::now()).await;
    app.seed_line(&header, &widget, 2).await;
    app.seed_line(&header, &gadget, 1).await;

    app.state
        .services
        .picking
        .pick("W", 2, "picker", None)
        .await
        .unwrap();

    let midway = app.reload_order(header.id).await;
    assert_eq!(midway.status, order::STATUS_PICKING);

    app.state
        .services
        .picking
        .mark_short(
            "G",
            &[ShortAllocation {
                order_id: header.id,
                qty_short: 1,
            }],
            "picker",
            None,
        )
        .await
        .unwrap();

    let done = app.reload_order(header.id).await;
    assert!(done.ready_to_pack);
    assert_eq!(done.status, order::STATUS_READY_TO_PACK);
}

#[tokio::test]
async fn revert_regresses_order_from_ready_to_picking() {
    let app = TestApp::new().await;
    let widget = app.seed_product("W", "Widget", "Pantry").await;
    let gadget = app.seed_product("G", "Gadget", "Pantry").await;
    let header = app.seed_order("ext-c", "1003", Utc::now()).await;
    let widget_line = app.seed_line(&header, &widget, 2).await;
    app.seed_line(&header, &gadget, 1).await;

    app.state
        .services
        .picking
        .pick("W", 2, "picker", None)
        .await
        .unwrap();
    app.state
        .services
        .picking
        .mark_short(
            "G",
            &[ShortAllocation {
                order_id: header.id,
                qty_short: 1,
            }],
            "picker",
            None,
        )
        .await
        .unwrap();
    assert!(app.reload_order(header.id).await.ready_to_pack);

    let outcome = app
        .state
        .services
        .picking
        .revert_picked(widget_line.id, Some(2), "lead")
        .await
        .expect("revert should succeed");
    assert_eq!(outcome.qty_reverted, 2);
    assert_eq!(outcome.order_status, order::STATUS_PICKING);

    // The short on the other line still counts as progress.
    let header = app.reload_order(header.id).await;
    assert!(!header.ready_to_pack);
    assert_eq!(header.status, order::STATUS_PICKING);

    let revert_events = pick_event::Entity::find()
        .filter(pick_event::Column::Kind.eq(pick_event::KIND_REVERT))
        .all(&**app.db())
        .await
        .unwrap();
    assert_eq!(revert_events.len(), 1);
    assert_eq!(revert_events[0].delta_qty, -2);
}

#[tokio::test]
async fn revert_defaults_to_full_picked_quantity() {
    let app = TestApp::new().await;
    let item = app.seed_product("X", "Widget", "Pantry").await;
    let header = app.seed_order("ext-a", "1001", Utc::now()).await;
    let line = app.seed_line(&header, &item, 3).await;

    app.state
        .services
        .picking
        .pick("X", 3, "picker", None)
        .await
        .unwrap();

    app.state
        .services
        .picking
        .revert_picked(line.id, None, "picker")
        .await
        .unwrap();

    let line = app.reload_line(line.id).await;
    assert_eq!(line.qty_picked, 0);
    assert_eq!(app.reload_order(header.id).await.status, order::STATUS_OPEN);
}

#[tokio::test]
async fn pick_event_deltas_reconcile_with_line_quantities() {
    let app = TestApp::new().await;
    let item = app.seed_product("X", "Widget", "Pantry").await;
    let header = app.seed_order("ext-a", "1001", Utc::now()).await;
    let line = app.seed_line(&header, &item, 5).await;

    let picking = &app.state.services.picking;
    picking.pick("X", 3, "picker", None).await.unwrap();
    picking.pick("X", 2, "picker", None).await.unwrap();
    picking
        .revert_picked(line.id, Some(1), "picker")
        .await
        .unwrap();

    let line = app.reload_line(line.id).await;
    assert_eq!(line.qty_picked, 4);

    // Invariant: the audit trail sums to the stored quantity.
    let events = pick_event::Entity::find()
        .filter(pick_event::Column::OrderLineId.eq(line.id))
        .all(&**app.db())
        .await
        .unwrap();
    let total: i32 = events
        .iter()
        .filter(|e| e.kind != pick_event::KIND_SHORT)
        .map(|e| e.delta_qty)
        .sum();
    assert_eq!(total, line.qty_picked);
    assert!(line.qty_picked + line.qty_short <= line.qty_ordered);
}

#[tokio::test]
async fn fifo_skips_orders_with_no_remaining_demand() {
    let app = TestApp::new().await;
    let item = app.seed_product("X", "Widget", "Pantry").await;

    let base = Utc::now() - Duration::hours(1);
    let order_a = app.seed_order("ext-a", "1001", base).await;
    let order_b = app
        .seed_order("ext-b", "1002", base + Duration::minutes(5))
        .await;
    app.seed_line(&order_a, &item, 2).await;
    let line_b = app.seed_line(&order_b, &item, 2).await;

    let picking = &app.state.services.picking;
    picking.pick("X", 2, "picker", None).await.unwrap();

    // A is fully allocated; the next pick must land on B only.
    picking.pick("X", 1, "picker", None).await.unwrap();
    assert_eq!(app.reload_line(line_b.id).await.qty_picked, 1);
}

#[tokio::test]
async fn pick_list_aggregates_by_sku_and_hides_completed_rows() {
    let app = TestApp::new().await;
    let widget = app.seed_product("W", "Widget", "Pantry").await;
    let gadget = app.seed_product("G", "Gadget", "Hardware").await;

    let base = Utc::now() - Duration::hours(1);
    let order_a = app.seed_order("ext-a", "1001", base).await;
    let order_b = app
        .seed_order("ext-b", "1002", base + Duration::minutes(5))
        .await;
    app.seed_line(&order_a, &widget, 3).await;
    app.seed_line(&order_b, &widget, 2).await;
    app.seed_line(&order_a, &gadget, 1).await;

    let picking = &app.state.services.picking;

    let list = picking.pick_list().await.unwrap();
    assert_eq!(list.len(), 2);
    let widget_row = list.iter().find(|r| r.sku == "W").unwrap();
    assert_eq!(widget_row.needed, 5);
    assert_eq!(widget_row.remaining, 5);

    // Fully covering the gadget demand removes its row.
    picking.pick("G", 1, "picker", None).await.unwrap();
    let list = picking.pick_list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].sku, "W");

    let stats = picking.pick_list_stats().await.unwrap();
    assert_eq!(stats.total_skus, 1);
    assert_eq!(stats.total_items_remaining, 5);
}

#[tokio::test]
async fn picked_items_view_reports_attribution() {
    let app = TestApp::new().await;
    let item = app.seed_product("X", "Widget", "Pantry").await;
    let header = app.seed_order("ext-a", "1001", Utc::now()).await;
    app.seed_line(&header, &item, 3).await;

    app.state
        .services
        .picking
        .pick("X", 2, "alice", None)
        .await
        .unwrap();

    let items = app
        .state
        .services
        .picking
        .picked_items(&Default::default())
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].qty_picked, 2);
    assert_eq!(items[0].picked_by.as_deref(), Some("alice"));
    assert_eq!(items[0].order_number, "1001");
}
