//! In-memory imitation of the EasyPost v2 API for integration tests.
//!
//! Accepts the same nested form bodies the client sends, requires HTTP Basic
//! auth, assigns prefixed ids, and reports failures as `{"error": ...}`
//! bodies. Every resource lives in one map keyed by id.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub type Store = HashMap<String, Value>;
pub type Db = Arc<RwLock<Store>>;

type Failure = (StatusCode, Json<Value>);
type Reply = Result<Json<Value>, Failure>;
type Pairs = Form<Vec<(String, String)>>;

const ADDRESS_FIELDS: [&str; 10] = [
    "name", "company", "street1", "street2", "city", "state", "zip", "country", "phone", "email",
];

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/addresses", post(create_address))
        .route("/addresses/{id}", get(retrieve))
        .route("/addresses/{id}/verify", get(verify_address))
        .route("/parcels", post(create_parcel))
        .route("/parcels/{id}", get(retrieve))
        .route("/shipments", post(create_shipment))
        .route("/shipments/{id}", get(retrieve))
        .route("/shipments/{id}/rates", get(retrieve))
        .route("/shipments/{id}/buy", post(buy_shipment))
        .route("/shipments/{id}/refund", get(refund_shipment))
        .route("/customs_items", post(create_customs_item))
        .route("/customs_items/{id}", get(retrieve))
        .route("/customs_infos", post(create_customs_info))
        .route("/customs_infos/{id}", get(retrieve))
        .route("/refunds", post(create_refund))
        .route("/refunds/{id}", get(retrieve))
        .route("/batches", post(create_batch))
        .route("/batches/create_and_buy", post(create_and_buy_batch))
        .route("/batches/{id}", get(retrieve))
        .route("/batches/{id}/label", post(batch_label))
        .route("/batches/{id}/add_shipments", post(add_shipments))
        .route("/batches/{id}/remove_shipments", post(remove_shipments))
        .route("/scan_forms", post(create_scan_form))
        .route("/scan_forms/{id}", get(retrieve))
        .layer(middleware::from_fn(require_api_key))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn require_api_key(request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|encoded| BASE64.decode(encoded).ok())
        .and_then(|raw| String::from_utf8(raw).ok())
        .is_some_and(|credentials| {
            credentials
                .split_once(':')
                .is_some_and(|(key, _)| !key.is_empty())
        });

    if !authorized {
        return failure(StatusCode::UNAUTHORIZED, "missing or invalid API key").into_response();
    }
    next.run(request).await
}

// ---------------------------------------------------------------------------
// Form decoding
// ---------------------------------------------------------------------------

/// Rebuild the nested document a flat `a[b][0][c]=v` form describes. Objects
/// whose keys are all indices become arrays ordered by index.
pub fn nest(pairs: &[(String, String)]) -> Value {
    let mut root = Map::new();
    for (key, value) in pairs {
        insert_path(&mut root, &key_path(key), value.clone());
    }
    index_objects_to_arrays(Value::Object(root))
}

fn key_path(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[') else {
        return vec![key];
    };
    let mut path = vec![&key[..open]];
    path.extend(key[open..].split(']').filter_map(|part| part.strip_prefix('[')));
    path
}

fn insert_path(map: &mut Map<String, Value>, path: &[&str], value: String) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert(first.to_string(), Value::String(value));
        return;
    }
    let entry = map
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(child) = entry {
        insert_path(child, rest, value);
    }
}

fn index_objects_to_arrays(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let all_indices = !map.is_empty() && map.keys().all(|k| k.parse::<usize>().is_ok());
            if all_indices {
                let mut items: Vec<(usize, Value)> = map
                    .into_iter()
                    .filter_map(|(k, v)| k.parse().ok().map(|i| (i, index_objects_to_arrays(v))))
                    .collect();
                items.sort_by_key(|(i, _)| *i);
                Value::Array(items.into_iter().map(|(_, v)| v).collect())
            } else {
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, index_objects_to_arrays(v)))
                        .collect(),
                )
            }
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn failure(status: StatusCode, message: &str) -> Failure {
    (status, Json(json!({ "error": message })))
}

fn unprocessable(message: &str) -> Failure {
    failure(StatusCode::UNPROCESSABLE_ENTITY, message)
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

fn text(spec: &Value, field: &str) -> String {
    spec.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// The field as a string, or null when absent or empty.
fn text_or_null(spec: &Value, field: &str) -> Value {
    match text(spec, field) {
        s if s.is_empty() => Value::Null,
        s => Value::String(s),
    }
}

fn number(spec: &Value, field: &str) -> Value {
    spec.get(field)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn lookup(store: &Store, id: &str) -> Result<Value, Failure> {
    store
        .get(id)
        .cloned()
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, &format!("{id} not found")))
}

fn save(store: &mut Store, doc: Value) -> Value {
    let id = text(&doc, "id");
    store.insert(id, doc.clone());
    doc
}

fn address_doc(spec: &Value) -> Value {
    let mut doc = json!({ "id": new_id("adr"), "object": "Address" });
    for field in ADDRESS_FIELDS {
        doc[field] = text_or_null(spec, field);
    }
    doc
}

fn parcel_doc(spec: &Value) -> Value {
    json!({
        "id": new_id("prcl"),
        "object": "Parcel",
        "length": number(spec, "length"),
        "width": number(spec, "width"),
        "height": number(spec, "height"),
        "weight": number(spec, "weight"),
        "predefined_package": text_or_null(spec, "predefined_package"),
    })
}

fn customs_item_doc(spec: &Value) -> Value {
    json!({
        "id": new_id("cstitem"),
        "object": "CustomsItem",
        "description": text_or_null(spec, "description"),
        "quantity": number(spec, "quantity"),
        "value": text_or_null(spec, "value"),
        "weight": number(spec, "weight"),
        "hs_tariff_number": text_or_null(spec, "hs_tariff_number"),
        "origin_country": text_or_null(spec, "origin_country"),
    })
}

/// Reference by `[id]` when present, otherwise create from the inline fields.
fn resolve(
    store: &mut Store,
    spec: &Value,
    build: impl FnOnce(&mut Store, &Value) -> Result<Value, Failure>,
) -> Result<Value, Failure> {
    match spec.get("id").and_then(Value::as_str) {
        Some(id) => lookup(store, id),
        None => {
            let doc = build(store, spec)?;
            Ok(save(store, doc))
        }
    }
}

fn resolve_address(store: &mut Store, spec: &Value) -> Result<Value, Failure> {
    resolve(store, spec, |_, spec| Ok(address_doc(spec)))
}

fn resolve_parcel(store: &mut Store, spec: &Value) -> Result<Value, Failure> {
    resolve(store, spec, |_, spec| Ok(parcel_doc(spec)))
}

fn resolve_customs_info(store: &mut Store, spec: &Value) -> Result<Value, Failure> {
    resolve(store, spec, |store, spec| {
        let mut items = Vec::new();
        for item in spec["customs_items"].as_array().into_iter().flatten() {
            items.push(resolve(store, item, |_, item| Ok(customs_item_doc(item)))?);
        }
        Ok(json!({
            "id": new_id("cstinfo"),
            "object": "CustomsInfo",
            "customs_certify": text(spec, "customs_certify") == "true",
            "customs_signer": text_or_null(spec, "customs_signer"),
            "contents_type": text_or_null(spec, "contents_type"),
            "contents_explanation": text_or_null(spec, "contents_explanation"),
            "restriction_type": text_or_null(spec, "restriction_type"),
            "restriction_comments": text_or_null(spec, "restriction_comments"),
            "non_delivery_option": text_or_null(spec, "non_delivery_option"),
            "eel_pfc": text_or_null(spec, "eel_pfc"),
            "customs_items": items,
        }))
    })
}

/// Three quotes whose prices scale with the parcel weight in ounces.
fn quote_rates(shipment_id: &str, parcel: &Value) -> Value {
    let weight = parcel["weight"].as_f64().unwrap_or(0.0);
    let quotes = [
        ("USPS", "First", 2.80, 0.05),
        ("USPS", "Priority", 7.10, 0.12),
        ("UPS", "Ground", 9.50, 0.20),
    ];
    Value::Array(
        quotes
            .iter()
            .map(|(carrier, service, base, per_oz)| {
                json!({
                    "id": new_id("rate"),
                    "object": "Rate",
                    "carrier": carrier,
                    "service": service,
                    "rate": format!("{:.2}", base + per_oz * weight),
                    "currency": "USD",
                    "shipment_id": shipment_id,
                })
            })
            .collect(),
    )
}

fn create_shipment_doc(store: &mut Store, spec: &Value) -> Result<Value, Failure> {
    let id = new_id("shp");
    let to_address = resolve_address(store, &spec["to_address"])?;
    let from_address = resolve_address(store, &spec["from_address"])?;
    let parcel = resolve_parcel(store, &spec["parcel"])?;
    let customs_info = match &spec["customs_info"] {
        Value::Null => Value::Null,
        info => resolve_customs_info(store, info)?,
    };
    let rates = quote_rates(&id, &parcel);
    let doc = json!({
        "id": id,
        "object": "Shipment",
        "to_address": to_address,
        "from_address": from_address,
        "parcel": parcel,
        "customs_info": customs_info,
        "rates": rates,
        "selected_rate": null,
        "postage_label": null,
        "tracking_code": null,
        "reference": text_or_null(spec, "reference"),
        "refund_status": null,
        "batch_status": null,
        "options": spec.get("options").cloned().unwrap_or_else(|| json!({})),
    });
    Ok(save(store, doc))
}

/// Buy postage on a stored shipment at the first rate matching `pick`.
fn buy(store: &mut Store, shipment_id: &str, pick: impl Fn(&Value) -> bool) -> Result<Value, Failure> {
    let mut shipment = lookup(store, shipment_id)?;
    if !shipment["postage_label"].is_null() {
        return Err(unprocessable("shipment already has postage"));
    }
    let rate = shipment["rates"]
        .as_array()
        .and_then(|rates| rates.iter().find(|rate| pick(*rate)))
        .cloned()
        .ok_or_else(|| unprocessable("rate not found"))?;

    let label_id = new_id("pl");
    shipment["postage_label"] = json!({
        "id": label_id,
        "object": "PostageLabel",
        "date_advance": 0,
        "integrated_form": "none",
        "label_resolution": 300,
        "label_size": "4x6",
        "label_type": "default",
        "label_file_type": "image/png",
        "label_url": format!("https://mock.easypost.local/labels/{label_id}.png"),
        "label_pdf_url": null,
        "label_epl2_url": null,
        "label_zpl_url": null,
        "selected_rate": rate.clone(),
    });
    shipment["selected_rate"] = rate;
    shipment["tracking_code"] = json!(format!("EZ{:018}", Uuid::new_v4().as_u128() % 10u128.pow(18)));
    Ok(save(store, shipment))
}

fn has_postage(store: &Store, shipment: &Value) -> bool {
    store
        .get(&text(shipment, "id"))
        .is_some_and(|stored| !stored["postage_label"].is_null())
}

/// Recount batch status from the stored state of its shipments.
fn refresh_batch_status(store: &Store, batch: &mut Value) {
    let shipments = batch["shipments"].as_array().cloned().unwrap_or_default();
    let (mut created, mut purchased, mut failed) = (0, 0, 0);
    // Stored postage wins over a stale failure mark on the batch copy.
    for shipment in &shipments {
        if has_postage(store, shipment) {
            purchased += 1;
        } else if shipment["batch_status"] == "postage_purchase_failed" {
            failed += 1;
        } else {
            created += 1;
        }
    }
    batch["status"] = json!({
        "created": created,
        "postage_purchased": purchased,
        "postage_purchase_failed": failed,
    });
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn retrieve(State(db): State<Db>, Path(id): Path<String>) -> Reply {
    let store = db.read().await;
    lookup(&store, &id).map(Json)
}

async fn create_address(State(db): State<Db>, Form(pairs): Pairs) -> Reply {
    let form = nest(&pairs);
    let mut store = db.write().await;
    Ok(Json(save(&mut store, address_doc(&form["address"]))))
}

async fn verify_address(State(db): State<Db>, Path(id): Path<String>) -> Reply {
    let store = db.read().await;
    let mut address = lookup(&store, &id)?;
    if text(&address, "street1").is_empty() {
        return Err(unprocessable("Unable to verify address."));
    }
    for field in ["street1", "street2", "city", "state"] {
        if let Some(s) = address[field].as_str() {
            address[field] = json!(s.to_uppercase());
        }
    }
    Ok(Json(json!({ "address": address, "message": "Address verified" })))
}

async fn create_parcel(State(db): State<Db>, Form(pairs): Pairs) -> Reply {
    let form = nest(&pairs);
    let mut store = db.write().await;
    Ok(Json(save(&mut store, parcel_doc(&form["parcel"]))))
}

async fn create_shipment(State(db): State<Db>, Form(pairs): Pairs) -> Reply {
    let form = nest(&pairs);
    let mut store = db.write().await;
    create_shipment_doc(&mut store, &form["shipment"]).map(Json)
}

async fn buy_shipment(State(db): State<Db>, Path(id): Path<String>, Form(pairs): Pairs) -> Reply {
    let form = nest(&pairs);
    let rate_id = text(&form["rate"], "id");
    if rate_id.is_empty() {
        return Err(unprocessable("rate[id] is required"));
    }
    let mut store = db.write().await;
    buy(&mut store, &id, |rate| rate["id"] == rate_id.as_str()).map(Json)
}

async fn refund_shipment(State(db): State<Db>, Path(id): Path<String>) -> Reply {
    let mut store = db.write().await;
    let mut shipment = lookup(&store, &id)?;
    if shipment["postage_label"].is_null() {
        return Err(unprocessable("shipment has no postage to refund"));
    }
    shipment["refund_status"] = json!("submitted");
    let refund = json!({
        "id": new_id("rfnd"),
        "object": "Refund",
        "tracking_code": shipment["tracking_code"].clone(),
        "status": "submitted",
        "carrier": shipment["selected_rate"]["carrier"].clone(),
        "shipment_id": id,
    });
    save(&mut store, shipment);
    Ok(Json(save(&mut store, refund)))
}

async fn create_customs_item(State(db): State<Db>, Form(pairs): Pairs) -> Reply {
    let form = nest(&pairs);
    let mut store = db.write().await;
    Ok(Json(save(&mut store, customs_item_doc(&form["customs_item"]))))
}

async fn create_customs_info(State(db): State<Db>, Form(pairs): Pairs) -> Reply {
    let form = nest(&pairs);
    let mut store = db.write().await;
    resolve_customs_info(&mut store, &form["customs_info"]).map(Json)
}

async fn create_refund(State(db): State<Db>, Form(pairs): Pairs) -> Reply {
    let form = nest(&pairs);
    let carrier = text(&form["refund"], "carrier");
    let tracking_code = text(&form["refund"], "tracking_codes");
    if carrier.is_empty() || tracking_code.is_empty() {
        return Err(unprocessable("refund[carrier] and refund[tracking_codes] are required"));
    }
    let mut store = db.write().await;
    let shipment_id = store
        .values()
        .find(|doc| doc["object"] == "Shipment" && doc["tracking_code"] == tracking_code.as_str())
        .map(|doc| doc["id"].clone())
        .unwrap_or(Value::Null);
    let status = if shipment_id.is_null() { "not_applicable" } else { "submitted" };
    let refund = json!({
        "id": new_id("rfnd"),
        "object": "Refund",
        "tracking_code": tracking_code,
        "status": status,
        "carrier": carrier,
        "shipment_id": shipment_id,
    });
    Ok(Json(save(&mut store, refund)))
}

async fn create_batch(State(db): State<Db>, Form(pairs): Pairs) -> Reply {
    let mut store = db.write().await;
    batch_doc(&mut store, &nest(&pairs), false).map(Json)
}

async fn create_and_buy_batch(State(db): State<Db>, Form(pairs): Pairs) -> Reply {
    let mut store = db.write().await;
    batch_doc(&mut store, &nest(&pairs), true).map(Json)
}

fn batch_doc(store: &mut Store, form: &Value, purchase: bool) -> Result<Value, Failure> {
    let specs = form["batch"]["shipment"]
        .as_array()
        .cloned()
        .ok_or_else(|| unprocessable("batch[shipment] is required"))?;

    let mut shipments = Vec::new();
    for spec in &specs {
        let mut shipment = create_shipment_doc(store, spec)?;
        if purchase {
            let carrier = text(spec, "carrier");
            let service = text(spec, "service");
            let id = text(&shipment, "id");
            shipment = match buy(store, &id, |r| r["carrier"] == carrier.as_str() && r["service"] == service.as_str()) {
                Ok(bought) => bought,
                Err(_) => {
                    shipment["batch_status"] = json!("postage_purchase_failed");
                    shipment["batch_message"] = json!("no rate matches the requested carrier and service");
                    save(store, shipment)
                }
            };
        }
        shipments.push(shipment);
    }

    let state = if purchase { "purchased" } else { "created" };
    let mut batch = json!({
        "id": new_id("batch"),
        "object": "Batch",
        "state": state,
        "reference": null,
        "shipments": shipments,
        "label_url": null,
    });
    refresh_batch_status(store, &mut batch);
    Ok(save(store, batch))
}

async fn batch_label(State(db): State<Db>, Path(id): Path<String>, Form(pairs): Pairs) -> Reply {
    let form = nest(&pairs);
    let file_format = text(&form, "file_format").to_lowercase();
    if !["pdf", "epl2", "zpl"].contains(&file_format.as_str()) {
        return Err(unprocessable("file_format must be one of pdf, epl2, zpl"));
    }
    let mut store = db.write().await;
    let mut batch = lookup(&store, &id)?;
    let shipments = batch["shipments"].as_array().cloned().unwrap_or_default();
    let ready = !shipments.is_empty() && shipments.iter().all(|s| has_postage(&store, s));
    if ready {
        batch["state"] = json!("label_generated");
        batch["label_url"] = json!(format!("https://mock.easypost.local/batches/{id}.{file_format}"));
    }
    Ok(Json(save(&mut store, batch)))
}

async fn add_shipments(State(db): State<Db>, Path(id): Path<String>, Form(pairs): Pairs) -> Reply {
    let mut store = db.write().await;
    update_membership(&mut store, &id, &nest(&pairs), true).map(Json)
}

async fn remove_shipments(State(db): State<Db>, Path(id): Path<String>, Form(pairs): Pairs) -> Reply {
    let mut store = db.write().await;
    update_membership(&mut store, &id, &nest(&pairs), false).map(Json)
}

fn update_membership(store: &mut Store, batch_id: &str, form: &Value, add: bool) -> Result<Value, Failure> {
    let mut batch = lookup(store, batch_id)?;
    let ids: Vec<String> = form["shipments"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|s| text(s, "id"))
        .filter(|id| !id.is_empty())
        .collect();
    if ids.is_empty() {
        return Err(unprocessable("shipments[<index>][id] is required"));
    }

    let mut shipments = batch["shipments"].as_array().cloned().unwrap_or_default();
    if add {
        for id in &ids {
            let shipment = lookup(store, id)?;
            if !shipments.iter().any(|s| s["id"] == id.as_str()) {
                shipments.push(shipment);
            }
        }
    } else {
        shipments.retain(|s| !ids.iter().any(|id| s["id"] == id.as_str()));
    }
    batch["shipments"] = Value::Array(shipments);
    refresh_batch_status(store, &mut batch);
    Ok(save(store, batch))
}

async fn create_scan_form(State(db): State<Db>, Form(pairs): Pairs) -> Reply {
    let form = nest(&pairs);
    let spec = &form["scan_form"];
    let tracking_codes: Vec<String> = text(spec, "tracking_codes")
        .split(',')
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect();
    if tracking_codes.is_empty() {
        return Err(unprocessable("scan_form[tracking_codes] is required"));
    }
    let mut store = db.write().await;
    let address = resolve_address(&mut store, &spec["from_address"])?;
    let id = new_id("sf");
    let scan_form = json!({
        "id": id,
        "object": "ScanForm",
        "address": address,
        "tracking_codes": tracking_codes,
        "form_url": format!("https://mock.easypost.local/scan_forms/{id}.pdf"),
        "form_file_type": "application/pdf",
    });
    Ok(Json(save(&mut store, scan_form)))
}
