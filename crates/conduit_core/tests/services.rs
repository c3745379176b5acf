use conduit_core::db::open_db_in_memory;
use conduit_core::{
    CallContext, NewOrder, NewOrderItem, NewProduct, OrderService, ProductPatch, ProductService,
    SqliteStorer,
};
use rust_decimal::Decimal;

fn new_widget() -> NewProduct {
    NewProduct {
        name: "Widget".to_string(),
        image: "widget.jpg".to_string(),
        category: "tools".to_string(),
        description: "a widget".to_string(),
        rating: 4.0,
        num_reviews: 3,
        price: Decimal::new(999, 2),
        count_in_stock: 50,
    }
}

#[test]
fn product_service_stamps_creation_and_merges_patches() {
    let mut conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteStorer::new(&mut conn));
    let ctx = CallContext::background();

    let created = service.create_product(&ctx, new_widget()).unwrap();
    assert_eq!(created.id, 1);
    assert!(created.updated_at.is_none());

    let patch = ProductPatch {
        price: Some(Decimal::new(1299, 2)),
        count_in_stock: Some(45),
        ..ProductPatch::default()
    };
    let updated = service.update_product(&ctx, created.id, &patch).unwrap();
    assert_eq!(updated.name, "Widget");
    assert_eq!(updated.price, Decimal::new(1299, 2));
    assert_eq!(updated.count_in_stock, 45);
    assert_eq!(updated.created_at, created.created_at);
    let first_update = updated.updated_at.unwrap();
    assert!(first_update >= created.created_at);

    let again = service
        .update_product(
            &ctx,
            created.id,
            &ProductPatch {
                name: Some("Widget v2".to_string()),
                ..ProductPatch::default()
            },
        )
        .unwrap();
    assert!(again.updated_at.unwrap() >= first_update);
    assert_eq!(again.price, Decimal::new(1299, 2));

    assert_eq!(service.get_product(&ctx, created.id).unwrap(), again);
    assert_eq!(service.list_products(&ctx).unwrap(), vec![again]);
}

#[test]
fn product_service_update_of_missing_product_is_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteStorer::new(&mut conn));

    let err = service
        .update_product(&CallContext::background(), 5, &ProductPatch::default())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn product_service_delete_removes_product() {
    let mut conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteStorer::new(&mut conn));
    let ctx = CallContext::background();

    let created = service.create_product(&ctx, new_widget()).unwrap();
    service.delete_product(&ctx, created.id).unwrap();
    assert!(service.list_products(&ctx).unwrap().is_empty());
}

#[test]
fn order_service_places_owned_orders_and_deletes_them() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = OrderService::new(SqliteStorer::new(&mut conn));
    let ctx = CallContext::background();

    let request = NewOrder {
        payment_method: "card".to_string(),
        tax_price: Decimal::new(100, 2),
        shipping_price: Decimal::new(200, 2),
        total_price: Decimal::new(1299, 2),
        items: vec![NewOrderItem {
            name: "Widget".to_string(),
            quantity: 1,
            image: "widget.jpg".to_string(),
            price: Decimal::new(999, 2),
            product_id: 1,
        }],
    };

    let placed = service.place_order(&ctx, 42, request).unwrap();
    assert_eq!(placed.user_id, 42);
    assert_eq!(placed.items[0].order_id, placed.id);
    assert_eq!(placed.total_price.to_string(), "12.99");

    assert_eq!(service.get_order(&ctx, placed.id).unwrap(), placed);
    assert_eq!(service.list_orders(&ctx).unwrap().len(), 1);

    service.delete_order(&ctx, placed.id).unwrap();
    assert!(service.get_order(&ctx, placed.id).unwrap_err().is_not_found());
}

#[test]
fn new_order_requests_deserialize_from_json() {
    let request: NewOrder = serde_json::from_str(
        r#"{
            "payment_method": "card",
            "tax_price": "1.00",
            "shipping_price": "2.00",
            "total_price": "12.99",
            "items": [
                {"name": "Widget", "quantity": 1, "image": "", "price": "9.99", "product_id": 1}
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(request.total_price, Decimal::new(1299, 2));
    assert_eq!(request.items[0].price, Decimal::new(999, 2));
}

#[test]
fn empty_checkout_is_rejected_by_the_service() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = OrderService::new(SqliteStorer::new(&mut conn));

    let err = service
        .place_order(
            &CallContext::background(),
            1,
            NewOrder {
                payment_method: "card".to_string(),
                tax_price: Decimal::ZERO,
                shipping_price: Decimal::ZERO,
                total_price: Decimal::ZERO,
                items: Vec::new(),
            },
        )
        .unwrap_err();
    assert!(err.to_string().contains("at least one item"));
}
