//! Order state machine: mark-packed shipment advance (S4), split/unsplit
//! validation, admin reversals and illegal transitions.

mod common;

use chrono::Utc;
use common::TestApp;

use pickhouse_api::entities::order;
use pickhouse_api::errors::ServiceError;
use pickhouse_api::services::order_state::{LineBatchAssignment, StateTarget};

#[tokio::test]
async fn split_advances_batches_on_pack() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("A", "Alpha", "Pantry").await;
    let p2 = app.seed_product("B", "Beta", "Pantry").await;
    let p3 = app.seed_product("C", "Gamma", "Pantry").await;
    let header = app.seed_order("ext-d", "2001", Utc::now()).await;
    let l1 = app.seed_line(&header, &p1, 1).await;
    let l2 = app.seed_line(&header, &p2, 1).await;
    let l3 = app.seed_line(&header, &p3, 2).await;

    let state = &app.state.services.order_state;
    let picking = &app.state.services.picking;

    state
        .split(
            header.id,
            vec![
                LineBatchAssignment {
                    line_id: l1.id,
                    batch: 1,
                },
                LineBatchAssignment {
                    line_id: l2.id,
                    batch: 1,
                },
                LineBatchAssignment {
                    line_id: l3.id,
                    batch: 2,
                },
            ],
        )
        .await
        .expect("split should succeed");

    let header_now = app.reload_order(header.id).await;
    assert_eq!(header_now.total_shipments, 2);
    assert_eq!(header_now.current_shipment, 1);

    // Only batch-1 lines are visible on the pick list.
    let list = picking.pick_list().await.unwrap();
    let skus: Vec<&str> = list.iter().map(|r| r.sku.as_str()).collect();
    assert!(skus.contains(&"A") && skus.contains(&"B"));
    assert!(!skus.contains(&"C"));

    // Fully pick batch 1 and pack it.
    picking.pick("A", 1, "picker", None).await.unwrap();
    picking.pick("B", 1, "picker", None).await.unwrap();
    assert!(app.reload_order(header.id).await.ready_to_pack);

    let outcome = state.mark_packed(header.id, "packer").await.unwrap();
    assert!(!outcome.packed);
    assert_eq!(outcome.current_shipment, 2);

    let header_now = app.reload_order(header.id).await;
    assert_eq!(header_now.current_shipment, 2);
    assert!(!header_now.ready_to_pack);
    assert_eq!(header_now.status, order::STATUS_OPEN);

    // Batch 2 is now the visible demand.
    let list = picking.pick_list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].sku, "C");

    picking.pick("C", 2, "picker", None).await.unwrap();
    let outcome = state.mark_packed(header.id, "packer").await.unwrap();
    assert!(outcome.packed);

    let final_order = app.reload_order(header.id).await;
    assert_eq!(final_order.status, order::STATUS_PACKED);
    assert_eq!(final_order.packed_by.as_deref(), Some("packer"));
    assert!(final_order.packed_at.is_some());
    assert_eq!(final_order.current_shipment, final_order.total_shipments);

    for line_id in [l1.id, l2.id, l3.id] {
        let line = app.reload_line(line_id).await;
        assert_eq!(line.qty_picked + line.qty_short, line.qty_ordered);
    }
}

#[tokio::test]
async fn mark_packed_requires_readiness() {
    let app = TestApp::new().await;
    let item = app.seed_product("A", "Alpha", "Pantry").await;
    let header = app.seed_order("ext-d", "2001", Utc::now()).await;
    app.seed_line(&header, &item, 2).await;

    let err = app
        .state
        .services
        .order_state
        .mark_packed(header.id, "packer")
        .await
        .expect_err("pack before ready must fail");
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn split_validates_batch_shape() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("A", "Alpha", "Pantry").await;
    let p2 = app.seed_product("B", "Beta", "Pantry").await;
    let header = app.seed_order("ext-d", "2001", Utc::now()).await;
    let l1 = app.seed_line(&header, &p1, 1).await;
    let l2 = app.seed_line(&header, &p2, 1).await;

    let state = &app.state.services.order_state;

    // Gap in the batch run: lines in 1 and 3, nothing in 2.
    let err = state
        .split(
            header.id,
            vec![
                LineBatchAssignment {
                    line_id: l1.id,
                    batch: 1,
                },
                LineBatchAssignment {
                    line_id: l2.id,
                    batch: 3,
                },
            ],
        )
        .await
        .expect_err("non-contiguous batches must fail");
    assert!(matches!(err, ServiceError::Validation(_)));

    // Batch number beyond the cap.
    let err = state
        .split(
            header.id,
            vec![LineBatchAssignment {
                line_id: l1.id,
                batch: 6,
            }],
        )
        .await
        .expect_err("batch above 5 must fail");
    assert!(matches!(err, ServiceError::Validation(_)));

    // Line from another order.
    let other = app.seed_order("ext-e", "2002", Utc::now()).await;
    let other_line = app.seed_line(&other, &p1, 1).await;
    let err = state
        .split(
            header.id,
            vec![LineBatchAssignment {
                line_id: other_line.id,
                batch: 1,
            }],
        )
        .await
        .expect_err("foreign line must fail");
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn unsplit_restores_single_shipment() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("A", "Alpha", "Pantry").await;
    let p2 = app.seed_product("B", "Beta", "Pantry").await;
    let header = app.seed_order("ext-d", "2001", Utc::now()).await;
    let l1 = app.seed_line(&header, &p1, 1).await;
    let l2 = app.seed_line(&header, &p2, 1).await;

    let state = &app.state.services.order_state;
    state
        .split(
            header.id,
            vec![
                LineBatchAssignment {
                    line_id: l1.id,
                    batch: 1,
                },
                LineBatchAssignment {
                    line_id: l2.id,
                    batch: 2,
                },
            ],
        )
        .await
        .unwrap();
    assert_eq!(app.reload_order(header.id).await.total_shipments, 2);

    state.unsplit(header.id).await.unwrap();
    let header_now = app.reload_order(header.id).await;
    assert_eq!(header_now.total_shipments, 1);
    assert_eq!(header_now.current_shipment, 1);
    assert_eq!(app.reload_line(l2.id).await.shipment_batch, 1);
}

#[tokio::test]
async fn revert_to_picking_preserves_line_progress() {
    let app = TestApp::new().await;
    let item = app.seed_product("A", "Alpha", "Pantry").await;
    let header = app.seed_order("ext-d", "2001", Utc::now()).await;
    let line = app.seed_line(&header, &item, 2).await;

    app.state
        .services
        .picking
        .pick("A", 2, "picker", None)
        .await
        .unwrap();
    assert!(app.reload_order(header.id).await.ready_to_pack);

    app.state
        .services
        .order_state
        .revert_to_picking(header.id)
        .await
        .unwrap();

    let header_now = app.reload_order(header.id).await;
    assert_eq!(header_now.status, order::STATUS_PICKING);
    assert!(!header_now.ready_to_pack);
    // Quantities are untouched by the reversal.
    assert_eq!(app.reload_line(line.id).await.qty_picked, 2);
}

#[tokio::test]
async fn revert_to_picking_rejects_open_orders() {
    let app = TestApp::new().await;
    let item = app.seed_product("A", "Alpha", "Pantry").await;
    let header = app.seed_order("ext-d", "2001", Utc::now()).await;
    app.seed_line(&header, &item, 2).await;

    let err = app
        .state
        .services
        .order_state
        .revert_to_picking(header.id)
        .await
        .expect_err("open order cannot be reverted");
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn change_state_from_packed_resets_shipment_counter() {
    let app = TestApp::new().await;
    let item = app.seed_product("A", "Alpha", "Pantry").await;
    let header = app.seed_order("ext-d", "2001", Utc::now()).await;
    app.seed_line(&header, &item, 1).await;

    let state = &app.state.services.order_state;
    let picking = &app.state.services.picking;

    picking.pick("A", 1, "picker", None).await.unwrap();
    state.mark_packed(header.id, "packer").await.unwrap();
    assert_eq!(app.reload_order(header.id).await.status, order::STATUS_PACKED);

    // packed → ready_to_pack clears packing metadata.
    state
        .change_state(header.id, StateTarget::ReadyToPack, "lead")
        .await
        .unwrap();
    let header_now = app.reload_order(header.id).await;
    assert_eq!(header_now.status, order::STATUS_READY_TO_PACK);
    assert!(header_now.packed_at.is_none());
    assert!(header_now.packed_by.is_none());

    // Back to packed, then to open: shipment counter resets.
    state
        .change_state(header.id, StateTarget::Packed, "lead")
        .await
        .unwrap();
    state
        .change_state(header.id, StateTarget::Open, "lead")
        .await
        .unwrap();
    let header_now = app.reload_order(header.id).await;
    assert_eq!(header_now.status, order::STATUS_OPEN);
    assert_eq!(header_now.current_shipment, 1);
    assert!(header_now.packed_at.is_none());
}

#[tokio::test]
async fn split_is_rejected_once_ready_or_advanced() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("A", "Alpha", "Pantry").await;
    let header = app.seed_order("ext-d", "2001", Utc::now()).await;
    let l1 = app.seed_line(&header, &p1, 1).await;

    app.state
        .services
        .picking
        .pick("A", 1, "picker", None)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .order_state
        .split(
            header.id,
            vec![LineBatchAssignment {
                line_id: l1.id,
                batch: 1,
            }],
        )
        .await
        .expect_err("ready order cannot be split");
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn status_overview_includes_lines_and_progress() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("A", "Alpha", "Pantry").await;
    let p2 = app.seed_product("B", "Beta", "Pantry").await;
    let header = app.seed_order("ext-d", "2001", Utc::now()).await;
    app.seed_line(&header, &p1, 2).await;
    app.seed_line(&header, &p2, 1).await;

    app.state
        .services
        .picking
        .pick("A", 2, "alice", None)
        .await
        .unwrap();

    let overview = app
        .state
        .services
        .order_state
        .status_overview(None, None)
        .await
        .unwrap();
    assert_eq!(overview.len(), 1);
    let detail = &overview[0];
    assert_eq!(detail.lines.len(), 2);
    assert_eq!(detail.progress.total_lines, 2);
    assert_eq!(detail.progress.fully_picked_lines, 1);
    assert_eq!(detail.progress.completion_percent, 50);

    let picked_line = detail.lines.iter().find(|l| l.sku == "A").unwrap();
    assert_eq!(picked_line.picked_by.as_deref(), Some("alice"));

    // Search narrows by order number.
    let filtered = app
        .state
        .services
        .order_state
        .status_overview(None, Some("9999"))
        .await
        .unwrap();
    assert!(filtered.is_empty());
}
