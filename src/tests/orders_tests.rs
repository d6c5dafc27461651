#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{Method, StatusCode};
    use chrono::Utc;
    use serde_json::{json, Value};

    use crate::services::orders::{self, OrderSettings};
    use crate::services::products;
    use crate::tests::support::{order_body, seed_category, seed_product, spawn_app, spawn_app_with, test_config, test_pool};
    use crate::types::{CreateOrderRequest, OrderStatus, PaymentStatus, UpdateOrderStatusRequest};

    fn request(items: &[(&str, i64)]) -> CreateOrderRequest {
        serde_json::from_value(order_body(items)).unwrap()
    }

    const SETTINGS: OrderSettings = OrderSettings { shipping_cost: 50.0, skip_payment: false };

    async fn wait_for_emails(app: &crate::tests::support::TestApp, count: usize) {
        for _ in 0..50 {
            if app.mailer.count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_create_order_prices_lines_and_decrements_stock() {
        let app = spawn_app().await;
        let cat = seed_category(app.pool(), "club-kits").await;
        let home = seed_product(app.pool(), &cat.id, "real-home", 4999.0, 10).await;
        let away = seed_product(app.pool(), &cat.id, "real-away", 3999.5, 4).await;

        let res = app.post("/api/v1/orders", &order_body(&[(&home.id, 2), (&away.id, 1)])).await;
        assert_eq!(res.status, StatusCode::CREATED);
        let order = &res.body["data"];
        assert_eq!(order["subtotal"], 13997.5);
        assert_eq!(order["shippingCost"], 50.0);
        assert_eq!(order["tax"], 0.0);
        assert_eq!(order["discount"], 0.0);
        assert_eq!(order["total"], 14047.5);
        assert_eq!(order["status"], "PENDING");
        assert_eq!(order["paymentStatus"], "PENDING");
        assert_eq!(order["items"].as_array().unwrap().len(), 2);
        assert_eq!(order["shippingAddress"]["country"], "India");

        let history = order["statusHistory"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["status"], "PENDING");
        assert_eq!(history[0]["note"], "Order created");

        let tracking = order["trackingId"].as_str().unwrap();
        assert!(tracking.starts_with("TRK-") && tracking.len() == 16);

        assert_eq!(products::find_by_id(app.pool(), &home.id).await.unwrap().stock, 8);
        assert_eq!(products::find_by_id(app.pool(), &away.id).await.unwrap().stock, 3);
        assert_eq!(app.state.metrics.get_snapshot().orders_created, 1);
    }

    #[tokio::test]
    async fn test_sale_price_is_used_for_lines() {
        let cfg = test_config();
        let pool = test_pool(&cfg).await;
        let cat = seed_category(&pool, "club-kits").await;
        let product = seed_product(&pool, &cat.id, "psg-home", 5000.0, 5).await;
        let update = serde_json::from_value(json!({ "salePrice": 4000.0 })).unwrap();
        products::update(&pool, &product.id, update).await.unwrap();

        let order = orders::create(&pool, SETTINGS, request(&[(&product.id, 3)])).await.unwrap();
        assert_eq!(order.items[0].price, 4000.0);
        assert_eq!(order.items[0].total, 12000.0);
        assert_eq!(order.subtotal, 12000.0);
        assert_eq!(order.total, 12050.0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let cfg = test_config();
        let pool = test_pool(&cfg).await;
        let cat = seed_category(&pool, "club-kits").await;
        let plenty = seed_product(&pool, &cat.id, "plenty-kit", 1000.0, 50).await;
        let scarce = seed_product(&pool, &cat.id, "scarce-kit", 1000.0, 1).await;

        let err = orders::create(&pool, SETTINGS, request(&[(&plenty.id, 5), (&scarce.id, 2)])).await.unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Insufficient stock for product: scarce kit");

        assert_eq!(products::find_by_id(&pool, &plenty.id).await.unwrap().stock, 50);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(&pool).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_product_is_rejected() {
        let app = spawn_app().await;
        let cat = seed_category(app.pool(), "club-kits").await;
        let product = seed_product(app.pool(), &cat.id, "hidden-kit", 1000.0, 5).await;
        sqlx::query("UPDATE products SET is_active = 0 WHERE id = ?").bind(&product.id).execute(app.pool()).await.unwrap();

        let missing = uuid::Uuid::new_v4().to_string();
        for id in [product.id.as_str(), missing.as_str()] {
            let res = app.post("/api/v1/orders", &order_body(&[(id, 1)])).await;
            assert_eq!(res.status, StatusCode::BAD_REQUEST);
            assert_eq!(res.body["message"], "One or more products not found or inactive");
        }
    }

    #[tokio::test]
    async fn test_order_validation_rules() {
        let app = spawn_app().await;
        let id = uuid::Uuid::new_v4().to_string();

        let res = app.post("/api/v1/orders", &order_body(&[(&id, 0)])).await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.body["error"]["details"][0]["field"], "items.0.quantity");

        let res = app.post("/api/v1/orders", &order_body(&[(&id, 1), (&id, 2)])).await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.body["error"]["details"][0]["field"], "items.1.productId");

        let mut body = order_body(&[(&id, 1)]);
        body["shippingAddress"]["pincode"] = json!("12");
        let res = app.post("/api/v1/orders", &body).await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.body["error"]["details"][0]["field"], "shippingAddress.pincode");
    }

    #[tokio::test]
    async fn test_skip_payment_creates_paid_order() {
        let mut cfg = test_config();
        cfg.orders.skip_payment = true;
        cfg.orders.shipping_cost = 0.0;
        let app = spawn_app_with(cfg).await;
        let cat = seed_category(app.pool(), "club-kits").await;
        let product = seed_product(app.pool(), &cat.id, "free-ship-kit", 2500.0, 5).await;

        let res = app.post("/api/v1/orders", &order_body(&[(&product.id, 1)])).await;
        assert_eq!(res.status, StatusCode::CREATED);
        let order = &res.body["data"];
        assert_eq!(order["status"], "PAID");
        assert_eq!(order["paymentStatus"], "COMPLETED");
        assert_eq!(order["total"], 2500.0);
        assert!(order["paidAt"].is_string());
        let notes: Vec<&str> =
            order["statusHistory"].as_array().unwrap().iter().map(|h| h["note"].as_str().unwrap()).collect();
        assert_eq!(notes, vec!["Order created", "Payment skipped"]);
    }

    #[tokio::test]
    async fn test_confirmation_email_sent_in_background() {
        let app = spawn_app().await;
        let cat = seed_category(app.pool(), "club-kits").await;
        let product = seed_product(app.pool(), &cat.id, "mail-kit", 1500.0, 5).await;

        let res = app.post("/api/v1/orders", &order_body(&[(&product.id, 1)])).await;
        let tracking = res.body["data"]["trackingId"].as_str().unwrap().to_string();

        wait_for_emails(&app, 1).await;
        let sent = app.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["asha@example.com".to_string()]);
        assert_eq!(sent[0].subject, format!("Order Confirmation - {}", tracking));
        assert!(sent[0].html.contains(&tracking));
    }

    #[tokio::test]
    async fn test_track_and_fetch_order() {
        let app = spawn_app().await;
        let cat = seed_category(app.pool(), "club-kits").await;
        let product = seed_product(app.pool(), &cat.id, "track-kit", 1500.0, 5).await;
        let created = app.post("/api/v1/orders", &order_body(&[(&product.id, 1)])).await.body["data"].clone();
        let tracking = created["trackingId"].as_str().unwrap();
        let id = created["id"].as_str().unwrap();

        let res = app.get(&format!("/api/v1/orders/track/{}", tracking)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["data"]["id"], id);
        assert_eq!(res.body["data"]["items"][0]["product"]["slug"], "track-kit");

        let res = app.get(&format!("/api/v1/orders/track/{}", tracking.to_lowercase())).await;
        assert_eq!(res.status, StatusCode::OK);

        let res = app.get("/api/v1/orders/track/TRK-DOESNOTEXIST").await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body["message"], "Order not found");

        let res = app.get(&format!("/api/v1/orders/{}", id)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["data"]["trackingId"], tracking);

        let res = app.get("/api/v1/orders/not-a-uuid").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_order_list_is_newest_first() {
        let app = spawn_app().await;
        let cat = seed_category(app.pool(), "club-kits").await;
        let product = seed_product(app.pool(), &cat.id, "list-kit", 100.0, 50).await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            let res = app.post("/api/v1/orders", &order_body(&[(&product.id, 1)])).await;
            ids.push(res.body["data"]["id"].as_str().unwrap().to_string());
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(app.get("/api/v1/orders").await.status, StatusCode::UNAUTHORIZED);

        let res = app.get_as_admin("/api/v1/orders?limit=2").await;
        assert_eq!(res.status, StatusCode::OK);
        let listed: Vec<&str> = res.body["data"].as_array().unwrap().iter().map(|o| o["id"].as_str().unwrap()).collect();
        assert_eq!(listed, vec![ids[2].as_str(), ids[1].as_str()]);
        assert_eq!(res.body["meta"]["total"], 3);
        assert_eq!(res.body["meta"]["totalPages"], 2);
    }

    #[tokio::test]
    async fn test_status_update_appends_history_and_sets_timestamps() {
        let app = spawn_app().await;
        let cat = seed_category(app.pool(), "club-kits").await;
        let product = seed_product(app.pool(), &cat.id, "ship-kit", 100.0, 5).await;
        let id = app.post("/api/v1/orders", &order_body(&[(&product.id, 1)])).await.body["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();
        let token = app.admin_token();
        let uri = format!("/api/v1/orders/{}/status", id);

        let res = app.json(Method::PATCH, &uri, &json!({ "status": "SHIPPED" }), None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);

        let res = app
            .json(Method::PATCH, &uri, &json!({ "status": "SHIPPED", "trackingNumber": "DLV123456" }), Some(&token))
            .await;
        assert_eq!(res.status, StatusCode::OK);
        let order = &res.body["data"];
        assert_eq!(order["status"], "SHIPPED");
        assert_eq!(order["trackingNumber"], "DLV123456");
        assert!(order["shippedAt"].is_string());
        assert!(order["deliveredAt"].is_null());
        let last = order["statusHistory"].as_array().unwrap().last().unwrap().clone();
        assert_eq!(last["status"], "SHIPPED");
        assert_eq!(last["note"], "Status updated to SHIPPED");

        let res = app
            .json(Method::PATCH, &uri, &json!({ "status": "DELIVERED", "notes": "Left with neighbour" }), Some(&token))
            .await;
        let order = &res.body["data"];
        assert_eq!(order["trackingNumber"], "DLV123456");
        assert!(order["deliveredAt"].is_string());
        let history: &Vec<Value> = order["statusHistory"].as_array().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2]["note"], "Left with neighbour");

        let res = app.json(Method::PATCH, &uri, &json!({ "status": "LOST" }), Some(&token)).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);

        let missing = format!("/api/v1/orders/{}/status", uuid::Uuid::new_v4());
        let res = app.json(Method::PATCH, &missing, &json!({ "status": "SHIPPED" }), Some(&token)).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        let cfg = test_config();
        let pool = test_pool(&cfg).await;
        let cat = seed_category(&pool, "club-kits").await;
        let product = seed_product(&pool, &cat.id, "stats-kit", 1000.0, 50).await;

        let paid = orders::create(&pool, SETTINGS, request(&[(&product.id, 1)])).await.unwrap();
        let shipped = orders::create(&pool, SETTINGS, request(&[(&product.id, 2)])).await.unwrap();
        let cancelled = orders::create(&pool, SETTINGS, request(&[(&product.id, 3)])).await.unwrap();
        orders::create(&pool, SETTINGS, request(&[(&product.id, 4)])).await.unwrap();

        for (order, status) in [(&paid, OrderStatus::Paid), (&shipped, OrderStatus::Shipped), (&cancelled, OrderStatus::Cancelled)] {
            let req = UpdateOrderStatusRequest { status, tracking_number: None, notes: None };
            orders::update_status(&pool, &order.id, req).await.unwrap();
        }

        let stats = orders::stats(&pool).await.unwrap();
        assert_eq!(stats.total_orders, 4);
        // PAID 1050 + SHIPPED 2050
        assert_eq!(stats.total_revenue, 3100.0);
        assert_eq!(stats.avg_order_value, 1550.0);
        // PENDING, PAID, SHIPPED
        assert_eq!(stats.active_orders, 3);
    }

    #[tokio::test]
    async fn test_analytics_zero_fills_every_day() {
        let cfg = test_config();
        let pool = test_pool(&cfg).await;
        let cat = seed_category(&pool, "club-kits").await;
        let product = seed_product(&pool, &cat.id, "chart-kit", 1000.0, 50).await;

        let order = orders::create(&pool, SETTINGS, request(&[(&product.id, 1)])).await.unwrap();
        let req = UpdateOrderStatusRequest { status: OrderStatus::Delivered, tracking_number: None, notes: None };
        orders::update_status(&pool, &order.id, req).await.unwrap();
        // Pending orders are not revenue
        orders::create(&pool, SETTINGS, request(&[(&product.id, 1)])).await.unwrap();

        let now = Utc::now();
        let series = orders::analytics(&pool, 7, now).await.unwrap();
        assert_eq!(series.len(), 8);
        assert_eq!(series.last().unwrap().date, now.format("%Y-%m-%d").to_string());
        assert_eq!(series.last().unwrap().revenue, 1050.0);
        assert_eq!(series.last().unwrap().orders, 1);
        assert!(series[..7].iter().all(|d| d.orders == 0 && d.revenue == 0.0));
    }

    #[tokio::test]
    async fn test_analytics_endpoint_validates_days() {
        let app = spawn_app().await;

        let res = app.get_as_admin("/api/v1/orders/analytics").await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["data"].as_array().unwrap().len(), 91);

        let res = app.get_as_admin("/api/v1/orders/analytics?days=400").await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

        let res = app.get_as_admin("/api/v1/orders/stats").await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["data"]["totalOrders"], 0);
    }

    #[tokio::test]
    async fn test_payment_status_round_trips_from_store() {
        let cfg = test_config();
        let pool = test_pool(&cfg).await;
        let cat = seed_category(&pool, "club-kits").await;
        let product = seed_product(&pool, &cat.id, "status-kit", 10.0, 5).await;
        let order = orders::create(&pool, SETTINGS, request(&[(&product.id, 1)])).await.unwrap();

        let found = orders::find_by_tracking_id(&pool, &order.tracking_id).await.unwrap();
        assert_eq!(found.payment_status, PaymentStatus::Pending);
        assert_eq!(found.status_history.len(), 1);
    }
}
