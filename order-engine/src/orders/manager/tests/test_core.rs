use super::*;

#[tokio::test]
async fn test_create_order() {
    let env = create_test_env();

    let (order, items) = place_order(&env, vec![line("P1", 2)]).await;

    assert_eq!(order.id, "ORD1000000001");
    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(order.sub_status, "Pending Confirmation");
    assert_eq!(order.total_price, 200.0);
    assert_eq!(order.products_price, 200.0);
    assert_eq!(order.other_charges, 0.0);
    assert_eq!(order.items_count, 1);

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.id, "ITM1000000001");
    assert_eq!(item.item_status, OrderStatus::New);
    assert_eq!(item.item_sub_status, "Pending Confirmation");
    assert_eq!(item.unit_price, 100.0);
    assert_eq!(item.subtotal, 200.0);
    assert_eq!(item.name.as_deref(), Some("Notebook"));
    assert_eq!(item.stock_record_id.as_deref(), Some("S1"));

    // placing an order does not touch stock
    assert_eq!(env.p1_stock(), 10);
    assert_eq!(env.hooks.events(), vec!["created:ORD1000000001"]);
}

#[tokio::test]
async fn test_create_order_keeps_external_total() {
    let env = create_test_env();
    let draft = OrderDraft {
        user_id: Some("U1".to_string()),
        total_price: Some(250.0),
        note: None,
    };

    let order = env
        .service
        .create_order(draft, vec![line("P1", 2)])
        .await
        .unwrap();

    assert_eq!(order.user_id.as_deref(), Some("U1"));
    assert_eq!(order.total_price, 250.0);
    assert_eq!(order.products_price, 200.0);
    assert_eq!(order.other_charges, 50.0);
}

#[tokio::test]
async fn test_create_order_creates_shipments() {
    let env = create_test_env();
    let (_, items) = place_order(&env, vec![line("P1", 1), line("P2", 3)]).await;

    for item in &items {
        let shipment = env.service.get_shipment(&item.id).unwrap().unwrap();
        assert_eq!(shipment.status, "Order received");
        assert_eq!(shipment.order_id, item.order_id);
    }
}

#[tokio::test]
async fn test_ids_are_sequential_across_orders() {
    let env = create_test_env();

    let (first, first_items) = place_order(&env, vec![line("P1", 1), line("P2", 1)]).await;
    let (second, second_items) = place_order(&env, vec![line("P2", 2)]).await;

    assert_eq!(first.id, "ORD1000000001");
    assert_eq!(second.id, "ORD1000000002");
    let item_ids: Vec<&str> = first_items
        .iter()
        .chain(second_items.iter())
        .map(|i| i.id.as_str())
        .collect();
    assert_eq!(item_ids, vec!["ITM1000000001", "ITM1000000002", "ITM1000000003"]);
}

#[tokio::test]
async fn test_free_item_has_zero_subtotal() {
    let env = create_test_env();
    let mut gift = line("P2", 1);
    gift.is_free = true;
    gift.free_offer_id = Some("OFFER-1".to_string());

    let (order, items) = place_order(&env, vec![line("P1", 1), gift]).await;

    assert_eq!(order.items_count, 2);
    assert_eq!(order.products_price, 100.0);
    assert_eq!(order.total_price, 100.0);
    let free = items.iter().find(|i| i.is_free).unwrap();
    assert_eq!(free.subtotal, 0.0);
    assert_eq!(free.free_offer_id.as_deref(), Some("OFFER-1"));
}

#[tokio::test]
async fn test_create_order_rejects_empty_order() {
    let env = create_test_env();
    let err = env
        .service
        .create_order(OrderDraft::default(), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));
}

#[tokio::test]
async fn test_create_order_rejects_bad_quantity() {
    let env = create_test_env();
    let err = env
        .service
        .create_order(OrderDraft::default(), vec![line("P1", 1), line("P2", 0)])
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidQuantity(0)));

    // nothing was written, no ID was consumed
    assert!(env.service.list_orders().unwrap().is_empty());
    let (order, _) = place_order(&env, vec![line("P1", 1)]).await;
    assert_eq!(order.id, "ORD1000000001");
}

#[tokio::test]
async fn test_create_order_rejects_unknown_product() {
    let env = create_test_env();
    let err = env
        .service
        .create_order(OrderDraft::default(), vec![line("P404", 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::ProductNotFound(ref id) if id == "P404"));
    assert!(err.is_validation());
    assert!(env.hooks.events().is_empty());
}

#[tokio::test]
async fn test_create_order_rejects_preassigned_item_id() {
    let env = create_test_env();
    let mut draft = line("P1", 1);
    draft.id = Some("ITM1000000042".to_string());

    let err = env
        .service
        .create_order(OrderDraft::default(), vec![draft])
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));
}

#[tokio::test]
async fn test_queries_report_not_found() {
    let env = create_test_env();

    assert!(matches!(
        env.service.get_order("ORD1000000009"),
        Err(LifecycleError::OrderNotFound(_))
    ));
    assert!(matches!(
        env.service.get_item("ITM1000000009"),
        Err(LifecycleError::ItemNotFound(_))
    ));
    assert!(matches!(
        env.service.list_items("ORD1000000009"),
        Err(LifecycleError::OrderNotFound(_))
    ));
}

#[tokio::test]
async fn test_add_item_to_existing_order() {
    let env = create_test_env();
    let (order, _) = place_order(&env, vec![line("P1", 2)]).await;

    let (item, report) = env
        .service
        .add_or_update_item(&order.id, line("P2", 3))
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(item.id, "ITM1000000002");
    assert_eq!(item.name.as_deref(), Some("Pen"));
    assert_eq!(item.subtotal, 60.0);
    assert_eq!(item.item_status, OrderStatus::New);
    assert!(env.service.get_shipment(&item.id).unwrap().is_some());

    let order = env.service.get_order(&order.id).unwrap();
    assert_eq!(order.items_count, 2);
    assert_eq!(order.products_price, 260.0);
    assert_eq!(order.total_price, 260.0);
    assert_eq!(
        env.hooks.events(),
        vec!["created:ORD1000000001", "updated:ORD1000000001"]
    );
}

#[tokio::test]
async fn test_edit_item_quantity_recomputes_subtotal() {
    let env = create_test_env();
    let (order, items) = place_order(&env, vec![line("P1", 2)]).await;

    let mut edit = line("P1", 3);
    edit.id = Some(items[0].id.clone());
    let (item, _) = env.service.add_or_update_item(&order.id, edit).await.unwrap();

    assert_eq!(item.quantity, 3);
    assert_eq!(item.unit_price, 100.0);
    assert_eq!(item.subtotal, 300.0);
    assert_eq!(item.name.as_deref(), Some("Notebook"));
    // new item: nothing held, nothing adjusted
    assert_eq!(env.p1_stock(), 10);

    let order = env.service.get_order(&order.id).unwrap();
    assert_eq!(order.total_price, 300.0);
    assert_eq!(order.items_count, 1);
}

#[tokio::test]
async fn test_edit_rejects_item_from_other_order() {
    let env = create_test_env();
    let (_, first_items) = place_order(&env, vec![line("P1", 1)]).await;
    let (second, _) = place_order(&env, vec![line("P2", 1)]).await;

    let mut edit = line("P1", 2);
    edit.id = Some(first_items[0].id.clone());
    let err = env
        .service
        .add_or_update_item(&second.id, edit)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::ItemOrderMismatch { .. }));
}

#[tokio::test]
async fn test_edit_rejects_product_change() {
    let env = create_test_env();
    let (order, items) = place_order(&env, vec![line("P1", 1)]).await;

    let mut edit = line("P2", 1);
    edit.id = Some(items[0].id.clone());
    let err = env.service.add_or_update_item(&order.id, edit).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));
}

#[tokio::test]
async fn test_add_item_to_missing_order() {
    let env = create_test_env();
    let err = env
        .service
        .add_or_update_item("ORD1000000001", line("P1", 1))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_change_status_rejects_unknown_status() {
    let env = create_test_env();
    let (_, items) = place_order(&env, vec![line("P1", 1)]).await;

    let err = env
        .service
        .change_item_status(&items[0].id, OrderStatus::parse("teleported"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidStatus(_)));
    assert_eq!(env.service.get_item(&items[0].id).unwrap().item_status, OrderStatus::New);
}

#[tokio::test]
async fn test_change_status_of_missing_item() {
    let env = create_test_env();
    let err = env
        .service
        .change_item_status("ITM1000000001", OrderStatus::OrderReceived, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::ItemNotFound(_)));
}
