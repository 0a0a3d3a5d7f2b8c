//! Integration tests for the gift registry backend.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Store};
use crate::registry::RegistryService;
use crate::workflow::AdminConsole;
use crate::{create_router, AppState};

const ADMIN_KEY: &str = "test-admin-key";

/// Test fixture for integration tests.
struct TestFixture {
    /// Sends the admin key on every request
    admin: Client,
    /// Anonymous guest
    guest: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some(ADMIN_KEY.to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize the backing store
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let registry = RegistryService::new(Store::new(pool));
        registry.fetch_all().await;

        let admin = AdminConsole::new(registry.clone());
        admin.load().await;
        admin.attach();

        // Create config
        let config = Config {
            api_psk: psk.clone(),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            log_json: false,
        };

        let state = AppState {
            registry,
            admin,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut admin_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            admin_builder = admin_builder.default_headers(headers);
        }

        TestFixture {
            admin: admin_builder.build().unwrap(),
            guest: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn gifts(&self) -> Vec<Value> {
        let resp = self.guest.get(self.url("/api/gifts")).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].as_array().unwrap().clone()
    }

    async fn reserve(&self, id: i64, body: Value) -> reqwest::Response {
        self.guest
            .post(self.url(&format!("/api/gifts/{}/reserve", id)))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

fn find(gifts: &[Value], id: i64) -> &Value {
    gifts
        .iter()
        .find(|g| g["id"] == id)
        .unwrap_or_else(|| panic!("gift {} missing", id))
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .guest
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_catalog_is_seeded_in_display_order() {
    let fixture = TestFixture::new().await;

    let gifts = fixture.gifts().await;
    assert_eq!(gifts.len(), 10);
    assert_eq!(gifts[0]["id"], 10);
    assert_eq!(gifts[0]["openAmount"], true);
    let rest: Vec<i64> = gifts[1..].iter().map(|g| g["id"].as_i64().unwrap()).collect();
    assert_eq!(rest, (1..=9).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_catalog_category_filter() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .guest
        .get(fixture.url("/api/gifts?category=kitchen"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![4, 5, 6]);

    let resp = fixture
        .guest
        .get(fixture.url("/api/gifts?category=garage"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_categories_endpoint() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .guest
        .get(fixture.url("/api/categories"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let options = body["data"].as_array().unwrap();
    assert_eq!(options.len(), 5);
    assert_eq!(options[1], json!({ "value": "kitchen", "label": "Kitchen" }));
}

#[tokio::test]
async fn test_reserve_fixed_price_gift() {
    let fixture = TestFixture::new().await;

    fixture
        .admin
        .put(fixture.url("/api/admin/config/pix-key"))
        .json(&json!({ "pixKey": "  casal@example.com  " }))
        .send()
        .await
        .unwrap();

    let resp = fixture.reserve(6, json!({ "guestName": "Ana" })).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["amount"], 650.0);
    assert_eq!(body["data"]["formattedAmount"], "R$ 650,00");
    assert_eq!(body["data"]["pixKey"], "casal@example.com");

    let gifts = fixture.gifts().await;
    let gift = find(&gifts, 6);
    assert_eq!(gift["reserved"], true);
    assert_eq!(gift["reservedBy"], "Ana");
    assert!(!gift["reservedAt"].as_str().unwrap().is_empty());

    // Second attempt is refused and changes nothing
    let resp = fixture.reserve(6, json!({ "guestName": "Bruno" })).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let gifts = fixture.gifts().await;
    assert_eq!(find(&gifts, 6)["reservedBy"], "Ana");
}

#[tokio::test]
async fn test_contribute_to_open_amount_gift() {
    let fixture = TestFixture::new().await;

    for _ in 0..2 {
        let resp = fixture
            .reserve(10, json!({ "guestName": "Carla", "amount": "150.00" }))
            .await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["data"]["amount"], 150.0);
    }

    let gifts = fixture.gifts().await;
    let surprise = find(&gifts, 10);
    assert_eq!(surprise["reserved"], false);
    assert_eq!(surprise["price"], 0.0);
}

#[tokio::test]
async fn test_reserve_validation_and_not_found() {
    let fixture = TestFixture::new().await;

    let resp = fixture.reserve(10, json!({ "amount": "zero" })).await;
    assert_eq!(resp.status(), 400);

    let resp = fixture.reserve(2, json!({ "guestName": "" })).await;
    assert_eq!(resp.status(), 400);

    let resp = fixture.reserve(404, json!({ "guestName": "Ana" })).await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_config_endpoint() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .admin
        .put(fixture.url("/api/admin/config/qrcode"))
        .json(&json!({ "qrcode": "data:image/png;base64,AA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .admin
        .put(fixture.url("/api/admin/config/pix-key"))
        .json(&json!({ "pixKey": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = fixture
        .guest
        .get(fixture.url("/api/config"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["pixKey"], "");
    assert_eq!(body["data"]["qrcode"], "data:image/png;base64,AA");
}

#[tokio::test]
async fn test_admin_requires_psk() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .guest
        .get(fixture.url("/api/admin/gifts"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = fixture
        .guest
        .get(fixture.url("/api/admin/gifts"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .guest
        .get(fixture.url("/api/admin/gifts"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_admin_open_without_psk() {
    let fixture = TestFixture::with_psk(None).await;

    let resp = fixture
        .guest
        .get(fixture.url("/api/admin/summary"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_admin_gift_crud() {
    let fixture = TestFixture::new().await;

    // Create
    let resp = fixture
        .admin
        .post(fixture.url("/api/admin/gifts"))
        .json(&json!({
            "name": "Espresso machine",
            "price": "1.299,90",
            "category": "kitchen",
            "icon": "☕",
            "description": "For slow Sundays"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["id"], 11);
    assert_eq!(body["data"]["price"], 1299.9);
    assert_eq!(body["data"]["openAmount"], false);

    // Edit
    let resp = fixture
        .admin
        .put(fixture.url("/api/admin/gifts/11"))
        .json(&json!({
            "name": "Espresso machine",
            "price": "1500",
            "category": "fun",
            "icon": "☕"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let gifts = fixture.gifts().await;
    assert_eq!(find(&gifts, 11)["price"], 1500.0);
    assert_eq!(find(&gifts, 11)["category"], "fun");

    // Validation
    let resp = fixture
        .admin
        .post(fixture.url("/api/admin/gifts"))
        .json(&json!({ "name": "", "price": "10", "category": "home", "icon": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Delete
    let resp = fixture
        .admin
        .delete(fixture.url("/api/admin/gifts/11"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let gifts = fixture.gifts().await;
    assert_eq!(gifts.len(), 10);
    assert!(gifts.iter().all(|g| g["id"] != 11));
}

#[tokio::test]
async fn test_delete_reserved_gift_is_refused() {
    let fixture = TestFixture::new().await;

    let resp = fixture.reserve(1, json!({ "guestName": "Ana" })).await;
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .admin
        .delete(fixture.url("/api/admin/gifts/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(fixture.gifts().await.len(), 10);
}

#[tokio::test]
async fn test_replace_catalog() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .admin
        .put(fixture.url("/api/admin/gifts"))
        .json(&json!({ "gifts": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .admin
        .put(fixture.url("/api/admin/gifts"))
        .json(&json!([
            { "id": 2, "name": "Blender", "price": 320 },
            { "id": 1, "name": "Tv", "price": 4200, "category": "unknown" },
            { "id": 2, "name": "Blender (new)", "price": 350 }
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let gifts = fixture.gifts().await;
    assert_eq!(gifts.len(), 2);
    assert_eq!(gifts[0]["id"], 1);
    assert_eq!(gifts[0]["category"], "home");
    assert_eq!(gifts[1]["name"], "Blender (new)");
}

#[tokio::test]
async fn test_reset_flow() {
    let fixture = TestFixture::new().await;

    for (id, guest) in [(2, "Ana"), (8, "Bruno")] {
        let resp = fixture.reserve(id, json!({ "guestName": guest })).await;
        assert_eq!(resp.status(), 200);
    }

    // Confirming without a request is refused
    let resp = fixture
        .admin
        .post(fixture.url("/api/admin/reset/confirm"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = fixture
        .admin
        .post(fixture.url("/api/admin/reset"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"], "awaitingFirst");

    let resp = fixture
        .admin
        .post(fixture.url("/api/admin/reset/confirm"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "awaitingSecondConfirmation");
    assert!(fixture.gifts().await.iter().any(|g| g["reserved"] == true));

    let resp = fixture
        .admin
        .post(fixture.url("/api/admin/reset/confirm"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "executed");
    assert_eq!(body["data"]["resetIds"].as_array().unwrap().len(), 10);

    let gifts = fixture.gifts().await;
    assert!(gifts.iter().all(|g| g["reserved"] == false));
    assert_eq!(find(&gifts, 2)["price"], 3800.0);
    assert_eq!(find(&gifts, 8)["reservedBy"], "");
}

#[tokio::test]
async fn test_summary_counts_reservations() {
    let fixture = TestFixture::new().await;

    for (id, guest) in [(1, "Ana"), (5, "Ana")] {
        let resp = fixture.reserve(id, json!({ "guestName": guest })).await;
        assert_eq!(resp.status(), 200);
    }

    let mut body = Value::Null;
    for _ in 0..50 {
        body = fixture
            .admin
            .get(fixture.url("/api/admin/summary"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if body["data"]["reservedCount"] == 2 {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    }

    assert_eq!(body["data"]["reservedCount"], 2);
    assert_eq!(body["data"]["uniqueGuests"], 1);
    assert_eq!(body["data"]["availableCount"], 8);
    assert_eq!(body["data"]["totalReservedAmount"], 4520.0);
}

#[tokio::test]
async fn test_stream_pushes_catalog() {
    let fixture = TestFixture::new().await;

    let mut resp = fixture
        .guest
        .get(fixture.url("/api/gifts/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let first = tokio::time::timeout(tokio::time::Duration::from_secs(5), resp.chunk())
        .await
        .expect("no event received")
        .unwrap()
        .expect("stream ended");
    let text = String::from_utf8_lossy(&first);
    assert!(text.contains("event: catalog"));
    assert!(text.contains("\"openAmount\":true"));
}
