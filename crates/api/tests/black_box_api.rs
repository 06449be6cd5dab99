use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};

use telar_auth::{JwtClaims, UserId, encode_token};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = telar_api::app::build_app(JWT_SECRET.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(username: &str, superuser: bool) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::for_username(username),
        username: username.to_string(),
        role: None,
        superuser,
        iat: now.timestamp(),
        exp: (now + ChronoDuration::minutes(10)).timestamp(),
    };
    encode_token(&claims, JWT_SECRET.as_bytes()).expect("failed to encode jwt")
}

// The API is intentionally eventual-consistent (command path vs projection
// update); these helpers poll briefly until the read model catches up.

async fn eventually_ok(client: &reqwest::Client, url: &str, token: &str) {
    for _ in 0..100 {
        let res = client.get(url).bearer_auth(token).send().await.unwrap();
        if res.status() == StatusCode::OK {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("{url} did not become visible within the timeout");
}

async fn eventually_items(client: &reqwest::Client, url: &str, token: &str, expected: usize) {
    for _ in 0..100 {
        let res = client.get(url).bearer_auth(token).send().await.unwrap();
        if res.status() == StatusCode::OK {
            let body: Value = res.json().await.unwrap();
            if body["items"].as_array().map(|a| a.len()).unwrap_or(0) >= expected {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("{url} did not reach {expected} items within the timeout");
}

async fn stock_level(client: &reqwest::Client, server: &TestServer, token: &str) -> i64 {
    let res = client
        .get(server.url("/api/inventory/stock?location_id=ALM-01&material_id=MAT-001"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    body["current_stock"].as_i64().unwrap()
}

async fn eventually_stock(client: &reqwest::Client, server: &TestServer, token: &str, expected: i64) {
    for _ in 0..100 {
        if stock_level(client, server, token).await == expected {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!(
        "stock did not reach {expected} within the timeout (now {})",
        stock_level(client, server, token).await
    );
}

async fn post_json(client: &reqwest::Client, url: &str, token: &str, body: Value) -> reqwest::Response {
    client.post(url).bearer_auth(token).json(&body).send().await.unwrap()
}

/// Seed reference data, one material, one location, one customer, and a
/// minimal chart of accounts, waiting for each projection to catch up.
async fn seed(client: &reqwest::Client, server: &TestServer, token: &str) {
    let res = post_json(
        client,
        &server.url("/materials/types"),
        token,
        json!({ "name": "Insumo", "description": "Insumos generales" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    eventually_items(client, &server.url("/materials/types"), token, 1).await;

    let res = post_json(
        client,
        &server.url("/materials"),
        token,
        json!({
            "id_material": "MAT-001",
            "name": "Tornillo hexagonal",
            "description": "Acero inoxidable",
            "unit": "pza",
            "type": "Insumo",
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = post_json(
        client,
        &server.url("/inventory/locations"),
        token,
        json!({
            "code": "ALM-01",
            "name": "Almacén central",
            "location": "Av. Industria 100",
            "main_location": true,
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    for (path, body) in [
        ("/suppliers/countries", json!({ "name": "México", "symbol": "MX" })),
        ("/suppliers/currencies", json!({ "name": "Peso mexicano", "symbol": "MXN" })),
        ("/accounting/types", json!({ "id_account_type": "ACT", "name": "Activo" })),
        ("/accounting/groups", json!({ "id_account_group": "1", "name": "Activo circulante" })),
        ("/accounting/natures", json!({ "id_account_nature": "DEU", "name": "Deudora" })),
    ] {
        let res = post_json(client, &server.url(path), token, body).await;
        assert_eq!(res.status(), StatusCode::CREATED, "seeding {path}");
    }
    eventually_items(client, &server.url("/accounting/natures"), token, 1).await;
    eventually_items(client, &server.url("/suppliers/currencies"), token, 1).await;

    for (key, name) in [("1105", "Clientes Nacionales"), ("4105", "Ventas al por mayor")] {
        let res = post_json(
            client,
            &server.url("/accounting/accounts"),
            token,
            json!({
                "id_account": key,
                "name": name,
                "code": key,
                "account_type": "ACT",
                "account_group": "1",
                "nature": "DEU",
            }),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = post_json(
        client,
        &server.url("/customers"),
        token,
        json!({
            "id_customer": "CLI-001",
            "legal_name": "Comercial del Bajío SA de CV",
            "name": "Comercial del Bajío",
            "country": "México",
            "currency": "MXN",
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    // Wait until everything the bridges read is visible.
    eventually_ok(client, &server.url("/customers/CLI-001"), token).await;
    eventually_ok(client, &server.url("/accounting/accounts/4105"), token).await;
    eventually_ok(client, &server.url("/accounting/accounts/1105"), token).await;
    eventually_ok(client, &server.url("/materials/MAT-001"), token).await;
    eventually_items(client, &server.url("/inventory/locations"), token, 1).await;
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/materials")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Health stays open.
    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn a_user_without_the_module_permission_is_forbidden() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt("peon", false);

    let res = client
        .get(server.url("/materials"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn movements_fold_into_stock_and_salida_is_guarded() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt("ana", true);

    seed(&client, &server, &token).await;

    let res = post_json(
        &client,
        &server.url("/inventory/movements"),
        &token,
        json!({
            "id_location": "ALM-01",
            "id_material": "MAT-001",
            "quantity": 100,
            "movement_type": "ENTRADA",
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    eventually_stock(&client, &server, &token, 100).await;

    let res = post_json(
        &client,
        &server.url("/inventory/movements"),
        &token,
        json!({
            "id_location": "ALM-01",
            "id_material": "MAT-001",
            "quantity": 30,
            "movement_type": "SALIDA",
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    eventually_stock(&client, &server, &token, 70).await;

    // Overdraw is rejected on the single-movement path too.
    let res = post_json(
        &client,
        &server.url("/inventory/movements"),
        &token,
        json!({
            "id_location": "ALM-01",
            "id_material": "MAT-001",
            "quantity": 500,
            "movement_type": "SALIDA",
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(stock_level(&client, &server, &token).await, 70);

    // AJUSTE overwrites the balance.
    let res = post_json(
        &client,
        &server.url("/inventory/movements"),
        &token,
        json!({
            "id_location": "ALM-01",
            "id_material": "MAT-001",
            "quantity": 12,
            "movement_type": "AJUSTE",
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    eventually_stock(&client, &server, &token, 12).await;
}

#[tokio::test]
async fn an_insufficient_sale_is_rejected_in_full() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt("ana", true);

    seed(&client, &server, &token).await;

    // 5 units in stock.
    let res = post_json(
        &client,
        &server.url("/inventory/movements"),
        &token,
        json!({
            "id_location": "ALM-01",
            "id_material": "MAT-001",
            "quantity": 5,
            "movement_type": "ENTRADA",
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    eventually_stock(&client, &server, &token, 5).await;

    // Sale of 10 at price 20 must be rejected with nothing persisted.
    let res = post_json(
        &client,
        &server.url("/sales"),
        &token,
        json!({
            "id_customer": "CLI-001",
            "id_location": "ALM-01",
            "id_material": "MAT-001",
            "quantity": 10,
            "price": 20.0,
            "acc_debit": "1105",
            "acc_credit": "4105",
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(stock_level(&client, &server, &token).await, 5);
    let res = client.get(server.url("/sales")).bearer_auth(&token).send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());
    let res = client
        .get(server.url("/accounting/journal"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());

    // A covered sale goes through and posts the balanced pair.
    let res = post_json(
        &client,
        &server.url("/sales"),
        &token,
        json!({
            "id_customer": "CLI-001",
            "id_location": "ALM-01",
            "id_material": "MAT-001",
            "quantity": 3,
            "price": 20.0,
            "acc_debit": "1105",
            "acc_credit": "4105",
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total_amount"].as_f64().unwrap(), 60.0);

    eventually_stock(&client, &server, &token, 2).await;
    eventually_items(&client, &server.url("/accounting/journal"), &token, 1).await;
    eventually_items(&client, &server.url("/sales"), &token, 1).await;

    let res = client
        .get(server.url("/accounting/balances"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    let balances = body["items"].as_array().unwrap();
    let debit = balances.iter().find(|b| b["account"] == "1105").unwrap();
    let credit = balances.iter().find(|b| b["account"] == "4105").unwrap();
    assert_eq!(debit["balance"].as_f64().unwrap(), 60.0);
    assert_eq!(credit["balance"].as_f64().unwrap(), -60.0);
}

#[tokio::test]
async fn an_unbalanced_journal_entry_is_rejected_wholesale() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt("ana", true);

    seed(&client, &server, &token).await;

    let res = post_json(
        &client,
        &server.url("/accounting/journal"),
        &token,
        json!({
            "date": "2024-06-15",
            "description": "Asiento descuadrado",
            "lines": [
                { "account_id": "1105", "debit": 100.0, "credit": 0.0 },
                { "account_id": "4105", "debit": 0.0, "credit": 99.0 },
            ],
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = client
        .get(server.url("/accounting/journal"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());

    let res = post_json(
        &client,
        &server.url("/accounting/journal"),
        &token,
        json!({
            "date": "2024-06-15",
            "description": "Asiento cuadrado",
            "lines": [
                { "account_id": "1105", "debit": 100.0, "credit": 0.0 },
                { "account_id": "4105", "debit": 0.0, "credit": 100.0 },
            ],
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    eventually_items(&client, &server.url("/accounting/journal"), &token, 1).await;
}

#[tokio::test]
async fn receive_full_is_idempotent_across_requests() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt("ana", true);

    seed(&client, &server, &token).await;

    let res = post_json(
        &client,
        &server.url("/suppliers"),
        &token,
        json!({
            "id_suplier": "PROV-001",
            "legal_name": "Aceros del Norte SA de CV",
            "name": "Aceros del Norte",
            "country": "México",
            "currency": "MXN",
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    eventually_ok(&client, &server.url("/suppliers/PROV-001"), &token).await;

    let res = post_json(
        &client,
        &server.url("/purchases"),
        &token,
        json!({
            "id_purchase_order": "OC-2024-001",
            "id_supplier": "PROV-001",
            "issue_date": "2024-01-15",
            "estimated_delivery_date": "2024-02-01",
            "currency": "MXN",
            "lines": [
                { "id_material": "MAT-001", "quantity": 40, "price": 12.5 },
            ],
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    for status in ["Aprobada", "Enviada", "Recibida"] {
        let res = post_json(
            &client,
            &server.url("/purchases/OC-2024-001/status"),
            &token,
            json!({ "status": status }),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK, "transition to {status}");
    }

    let res =
        post_json(&client, &server.url("/purchases/OC-2024-001/receive"), &token, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["movements_created"].as_u64().unwrap(), 1);
    eventually_stock(&client, &server, &token, 40).await;

    // Second receipt: no pending quantities, no movements.
    let res =
        post_json(&client, &server.url("/purchases/OC-2024-001/receive"), &token, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["movements_created"].as_u64().unwrap(), 0);
    assert_eq!(stock_level(&client, &server, &token).await, 40);
}

#[tokio::test]
async fn supplier_import_applies_valid_rows_and_reports_the_bad_one() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt("ana", true);

    seed(&client, &server, &token).await;

    let mut csv = String::from(
        "ID_Proveedor,Razon_Social,Nombre,Pais,Moneda,RFC,Estado_Provincia,Ciudad,Direccion,Codigo_Postal,Telefono,Email,Nombre_Contacto,Rol_Contacto,Categoria,Terminos_Pago,Metodo_Pago,Cuenta_Bancaria,Estado\n",
    );
    for i in 1..=3 {
        csv.push_str(&format!(
            "PROV-00{i},Proveedor {i} SA,Proveedor {i},México,MXN,,,,,,,,,,,,,,1\n"
        ));
    }
    // Missing the required legal name.
    csv.push_str("PROV-004,,Proveedor 4,México,MXN,,,,,,,,,,,,,,1\n");

    let res = client
        .post(server.url("/suppliers/import"))
        .bearer_auth(&token)
        .header("content-type", "text/csv")
        .body(csv)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["created"].as_u64().unwrap(), 3);
    assert_eq!(body["error_count"].as_u64().unwrap(), 1);

    // The invalid row's id never appears.
    eventually_items(&client, &server.url("/suppliers"), &token, 3).await;
    let res = client
        .get(server.url("/suppliers"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 3);
    let res = client
        .get(server.url("/suppliers/PROV-004"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn material_export_import_round_trip_updates_in_place() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt("ana", true);

    seed(&client, &server, &token).await;

    let res = client
        .get(server.url("/materials/export"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let exported = res.text().await.unwrap();
    assert!(exported.contains("MAT-001"));
    assert!(exported.contains("Activo"));

    // Re-import the export verbatim: same codes, so zero creates.
    let res = client
        .post(server.url("/materials/import"))
        .bearer_auth(&token)
        .header("content-type", "text/csv")
        .body(exported)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["created"].as_u64().unwrap(), 0);
    assert_eq!(body["updated"].as_u64().unwrap(), 1);
    assert_eq!(body["error_count"].as_u64().unwrap(), 0);

    // Field values survive the round trip.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let res = client
        .get(server.url("/materials/MAT-001"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "Tornillo hexagonal");
    assert_eq!(body["unit"], "pza");
    assert_eq!(body["status"], true);
}

#[tokio::test]
async fn movement_import_skips_overdrawing_rows_but_commits_the_rest() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt("ana", true);

    seed(&client, &server, &token).await;

    let csv = "Ubicacion,Material,Cantidad,Tipo_Movimiento,Unidad,Notas\n\
               ALM-01,MAT-001,50,ENTRADA,pza,Carga inicial\n\
               ALM-01,MAT-001,500,SALIDA,pza,Sobregiro\n\
               ALM-01,MAT-001,20,SALIDA,pza,Salida valida\n";

    let res = client
        .post(server.url("/inventory/movements/import"))
        .bearer_auth(&token)
        .header("content-type", "text/csv")
        .body(csv)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["created"].as_u64().unwrap(), 2);
    assert_eq!(body["error_count"].as_u64().unwrap(), 1);

    eventually_stock(&client, &server, &token, 30).await;
}
