//! Resource operations for the EasyPost API.
//!
//! # Design
//! `EasyPostClient` owns its `Config` and a `Transport` and carries no other
//! state between calls. Every operation is split in two: a public `build_*`
//! method that turns its inputs into an `HttpRequest` without any I/O, and
//! the operation itself, which sends that request through the transport and
//! decodes the body. Exactly one round-trip happens per operation.
//!
//! The HTTP method is derived from the parameters: GET when there are none,
//! POST with a form-encoded body otherwise.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::decode::{decode, decode_field};
use crate::error::{ApiError, Result};
use crate::form::{self, FormParams};
use crate::http::{HttpMethod, HttpRequest, Transport, UreqTransport};
use crate::services::enrich_shipment;
use crate::types::{
    Address, Batch, BatchMode, CustomsInfo, CustomsItem, Parcel, PostageLabel, Rate, Refund,
    ScanForm, Shipment, VerifiedAddress,
};

/// Value of the client identification header.
pub const USER_AGENT: &str = concat!("easypost-rust/", env!("CARGO_PKG_VERSION"));

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Synchronous client for the EasyPost API.
#[derive(Debug, Clone)]
pub struct EasyPostClient<T = UreqTransport> {
    config: Config,
    transport: T,
}

impl EasyPostClient<UreqTransport> {
    pub fn new(config: Config) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> EasyPostClient<T> {
    pub fn with_transport(config: Config, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Addresses
    // -----------------------------------------------------------------------

    pub fn build_create_address(&self, address: &Address) -> Result<HttpRequest> {
        let mut params = FormParams::new();
        form::address_fields(&mut params, "address", address);
        self.request("/addresses", &params)
    }

    pub fn create_address(&self, address: &Address) -> Result<Address> {
        self.call(self.build_create_address(address)?)
    }

    pub fn build_retrieve_address(&self, id: &str) -> Result<HttpRequest> {
        self.get(&format!("/addresses/{}", self.require_id("address", id)?))
    }

    pub fn retrieve_address(&self, id: &str) -> Result<Address> {
        self.call(self.build_retrieve_address(id)?)
    }

    pub fn build_verify_address(&self, id: &str) -> Result<HttpRequest> {
        self.get(&format!("/addresses/{}/verify", self.require_id("address", id)?))
    }

    /// Verify a previously created address.
    ///
    /// Returns the service's canonical address alongside its verification
    /// message; the caller decides whether to adopt the canonical form.
    pub fn verify_address(&self, id: &str) -> Result<VerifiedAddress> {
        self.call(self.build_verify_address(id)?)
    }

    // -----------------------------------------------------------------------
    // Parcels
    // -----------------------------------------------------------------------

    pub fn build_create_parcel(&self, parcel: &Parcel) -> Result<HttpRequest> {
        let mut params = FormParams::new();
        form::parcel_fields(&mut params, "parcel", parcel);
        self.request("/parcels", &params)
    }

    pub fn create_parcel(&self, parcel: &Parcel) -> Result<Parcel> {
        self.call(self.build_create_parcel(parcel)?)
    }

    pub fn build_retrieve_parcel(&self, id: &str) -> Result<HttpRequest> {
        self.get(&format!("/parcels/{}", self.require_id("parcel", id)?))
    }

    pub fn retrieve_parcel(&self, id: &str) -> Result<Parcel> {
        self.call(self.build_retrieve_parcel(id)?)
    }

    // -----------------------------------------------------------------------
    // Shipments
    // -----------------------------------------------------------------------

    pub fn build_create_shipment(&self, shipment: &Shipment) -> Result<HttpRequest> {
        let mut params = FormParams::new();
        form::shipment_fields(&mut params, "shipment", shipment);
        self.request("/shipments", &params)
    }

    /// Create a shipment and return it with its rate quotes. Each quote gets
    /// its service display name and numeric price filled in.
    pub fn create_shipment(&self, shipment: &Shipment) -> Result<Shipment> {
        let mut created: Shipment = self.call(self.build_create_shipment(shipment)?)?;
        enrich_shipment(&mut created);
        Ok(created)
    }

    pub fn build_retrieve_shipment(&self, id: &str) -> Result<HttpRequest> {
        self.get(&format!("/shipments/{}", self.require_id("shipment", id)?))
    }

    pub fn retrieve_shipment(&self, id: &str) -> Result<Shipment> {
        let mut shipment: Shipment = self.call(self.build_retrieve_shipment(id)?)?;
        enrich_shipment(&mut shipment);
        Ok(shipment)
    }

    pub fn build_retrieve_rates(&self, shipment_id: &str) -> Result<HttpRequest> {
        self.get(&format!("/shipments/{}/rates", self.require_id("shipment", shipment_id)?))
    }

    /// Current rate quotes for a shipment.
    pub fn retrieve_rates(&self, shipment_id: &str) -> Result<Vec<Rate>> {
        // The service answers with a shipment-shaped document.
        let mut shipment: Shipment = self.call(self.build_retrieve_rates(shipment_id)?)?;
        enrich_shipment(&mut shipment);
        Ok(shipment.rates)
    }

    pub fn build_buy_shipping_label(&self, shipment_id: &str, rate_id: &str) -> Result<HttpRequest> {
        let shipment_id = self.require_id("shipment", shipment_id)?;
        let mut params = FormParams::new();
        params.set("rate[id]", self.require_id("rate", rate_id)?);
        self.request(&format!("/shipments/{shipment_id}/buy"), &params)
    }

    /// Buy postage for `shipment_id` at `rate_id` and return the label.
    ///
    /// The response is the purchased shipment; the label is read from its
    /// `postage_label` field once the shipment itself has decoded cleanly.
    pub fn buy_shipping_label(&self, shipment_id: &str, rate_id: &str) -> Result<PostageLabel> {
        let body = self.execute(&self.build_buy_shipping_label(shipment_id, rate_id)?)?;
        let mut label: PostageLabel = decode_field(&body, "postage_label")?;
        if let Some(rate) = label.selected_rate.as_mut() {
            crate::services::enrich_rate(rate);
        }
        Ok(label)
    }

    pub fn build_refund_shipment(&self, shipment_id: &str) -> Result<HttpRequest> {
        self.get(&format!("/shipments/{}/refund", self.require_id("shipment", shipment_id)?))
    }

    /// Request a refund for a shipment bought through this account.
    pub fn refund_shipment(&self, shipment_id: &str) -> Result<Refund> {
        self.call(self.build_refund_shipment(shipment_id)?)
    }

    // -----------------------------------------------------------------------
    // Customs
    // -----------------------------------------------------------------------

    pub fn build_create_customs_item(&self, item: &CustomsItem) -> Result<HttpRequest> {
        let mut params = FormParams::new();
        form::customs_item_fields(&mut params, "customs_item", item);
        self.request("/customs_items", &params)
    }

    pub fn create_customs_item(&self, item: &CustomsItem) -> Result<CustomsItem> {
        self.call(self.build_create_customs_item(item)?)
    }

    pub fn build_retrieve_customs_item(&self, id: &str) -> Result<HttpRequest> {
        self.get(&format!("/customs_items/{}", self.require_id("customs item", id)?))
    }

    pub fn retrieve_customs_item(&self, id: &str) -> Result<CustomsItem> {
        self.call(self.build_retrieve_customs_item(id)?)
    }

    pub fn build_create_customs_info(&self, info: &CustomsInfo) -> Result<HttpRequest> {
        let mut params = FormParams::new();
        form::customs_info_fields(&mut params, "customs_info", info);
        self.request("/customs_infos", &params)
    }

    pub fn create_customs_info(&self, info: &CustomsInfo) -> Result<CustomsInfo> {
        self.call(self.build_create_customs_info(info)?)
    }

    pub fn build_retrieve_customs_info(&self, id: &str) -> Result<HttpRequest> {
        self.get(&format!("/customs_infos/{}", self.require_id("customs info", id)?))
    }

    pub fn retrieve_customs_info(&self, id: &str) -> Result<CustomsInfo> {
        self.call(self.build_retrieve_customs_info(id)?)
    }

    // -----------------------------------------------------------------------
    // Refunds
    // -----------------------------------------------------------------------

    pub fn build_create_refund(&self, carrier: &str, tracking_code: &str) -> Result<HttpRequest> {
        self.config.ensure_credential()?;
        if carrier.trim().is_empty() {
            return Err(ApiError::InvalidInput("refund requires a carrier".to_string()));
        }
        if tracking_code.trim().is_empty() || tracking_code.contains(',') {
            return Err(ApiError::InvalidInput(
                "refund takes exactly one tracking code".to_string(),
            ));
        }
        let mut params = FormParams::new();
        params.set("refund[carrier]", carrier);
        params.set("refund[tracking_codes]", tracking_code.trim());
        self.request("/refunds", &params)
    }

    /// Refund a label bought outside this account.
    ///
    /// Takes a single tracking code; several codes per request are not
    /// supported.
    pub fn create_refund(&self, carrier: &str, tracking_code: &str) -> Result<Refund> {
        self.call(self.build_create_refund(carrier, tracking_code)?)
    }

    pub fn build_retrieve_refund(&self, id: &str) -> Result<HttpRequest> {
        self.get(&format!("/refunds/{}", self.require_id("refund", id)?))
    }

    pub fn retrieve_refund(&self, id: &str) -> Result<Refund> {
        self.call(self.build_retrieve_refund(id)?)
    }

    // -----------------------------------------------------------------------
    // Batches
    // -----------------------------------------------------------------------

    pub fn build_create_batch(&self, shipments: &[Shipment], mode: BatchMode) -> Result<HttpRequest> {
        self.config.ensure_credential()?;
        if shipments.is_empty() {
            return Err(ApiError::InvalidInput(
                "batch requires at least one shipment".to_string(),
            ));
        }

        let mut params = FormParams::new();
        for (index, shipment) in shipments.iter().enumerate() {
            let prefix = format!("batch[shipment][{index}]");
            form::shipment_fields(&mut params, &prefix, shipment);
            if mode == BatchMode::CreateAndBuy {
                let rate = shipment.rates.first().ok_or_else(|| {
                    ApiError::InvalidInput(format!(
                        "shipment {index} has no rates to buy postage with"
                    ))
                })?;
                params.set(format!("{prefix}[carrier]"), &rate.carrier);
                params.set(format!("{prefix}[service]"), &rate.service);
            }
        }

        let path = match mode {
            BatchMode::CreateOnly => "/batches",
            BatchMode::CreateAndBuy => "/batches/create_and_buy",
        };
        self.request(path, &params)
    }

    /// Create a batch from `shipments`. With `BatchMode::CreateAndBuy` the
    /// service also buys postage for each shipment at its first rate.
    pub fn create_batch(&self, shipments: &[Shipment], mode: BatchMode) -> Result<Batch> {
        let mut batch: Batch = self.call(self.build_create_batch(shipments, mode)?)?;
        batch.shipments.iter_mut().for_each(enrich_shipment);
        Ok(batch)
    }

    pub fn build_retrieve_batch(&self, id: &str) -> Result<HttpRequest> {
        self.get(&format!("/batches/{}", self.require_id("batch", id)?))
    }

    pub fn retrieve_batch(&self, id: &str) -> Result<Batch> {
        let mut batch: Batch = self.call(self.build_retrieve_batch(id)?)?;
        batch.shipments.iter_mut().for_each(enrich_shipment);
        Ok(batch)
    }

    pub fn build_batch_label(&self, batch_id: &str, file_format: &str) -> Result<HttpRequest> {
        let batch_id = self.require_id("batch", batch_id)?;
        if file_format.trim().is_empty() {
            return Err(ApiError::InvalidInput("label file format is empty".to_string()));
        }
        let mut params = FormParams::new();
        params.set("file_format", file_format.trim());
        self.request(&format!("/batches/{batch_id}/label"), &params)
    }

    /// Ask for a combined label file (`pdf`, `epl2`, `zpl`) for a batch.
    ///
    /// The service may answer before the file exists; `label_url` stays
    /// empty until every shipment has postage. Nothing here waits for it.
    pub fn batch_label(&self, batch_id: &str, file_format: &str) -> Result<Batch> {
        self.call(self.build_batch_label(batch_id, file_format)?)
    }

    pub fn build_add_shipments_to_batch(&self, batch_id: &str, shipment_ids: &[&str]) -> Result<HttpRequest> {
        self.build_batch_membership(batch_id, shipment_ids, "add_shipments")
    }

    pub fn add_shipments_to_batch(&self, batch_id: &str, shipment_ids: &[&str]) -> Result<Batch> {
        self.call(self.build_add_shipments_to_batch(batch_id, shipment_ids)?)
    }

    pub fn build_remove_shipments_from_batch(&self, batch_id: &str, shipment_ids: &[&str]) -> Result<HttpRequest> {
        self.build_batch_membership(batch_id, shipment_ids, "remove_shipments")
    }

    pub fn remove_shipments_from_batch(&self, batch_id: &str, shipment_ids: &[&str]) -> Result<Batch> {
        self.call(self.build_remove_shipments_from_batch(batch_id, shipment_ids)?)
    }

    fn build_batch_membership(&self, batch_id: &str, shipment_ids: &[&str], action: &str) -> Result<HttpRequest> {
        let batch_id = self.require_id("batch", batch_id)?;
        if shipment_ids.is_empty() {
            return Err(ApiError::InvalidInput(format!("{action} needs at least one shipment id")));
        }
        let mut params = FormParams::new();
        for (index, id) in shipment_ids.iter().enumerate() {
            params.set(format!("shipments[{index}][id]"), self.require_id("shipment", id)?);
        }
        self.request(&format!("/batches/{batch_id}/{action}"), &params)
    }

    // -----------------------------------------------------------------------
    // Scan forms
    // -----------------------------------------------------------------------

    pub fn build_create_scan_form(&self, scan_form: &ScanForm) -> Result<HttpRequest> {
        self.config.ensure_credential()?;
        if scan_form.tracking_codes.iter().all(|code| code.trim().is_empty()) {
            return Err(ApiError::InvalidInput(
                "scan form needs at least one tracking code".to_string(),
            ));
        }
        let mut params = FormParams::new();
        form::address_ref(&mut params, "scan_form[from_address]", &scan_form.address);
        params.set_joined("scan_form[tracking_codes]", &scan_form.tracking_codes);
        self.request("/scan_forms", &params)
    }

    pub fn create_scan_form(&self, scan_form: &ScanForm) -> Result<ScanForm> {
        self.call(self.build_create_scan_form(scan_form)?)
    }

    pub fn build_retrieve_scan_form(&self, id: &str) -> Result<HttpRequest> {
        self.get(&format!("/scan_forms/{}", self.require_id("scan form", id)?))
    }

    pub fn retrieve_scan_form(&self, id: &str) -> Result<ScanForm> {
        self.call(self.build_retrieve_scan_form(id)?)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// A trimmed resource id fit for a URL path. The credential is checked
    /// first so a missing key wins over bad input.
    fn require_id<'a>(&self, what: &str, id: &'a str) -> Result<&'a str> {
        self.config.ensure_credential()?;
        let id = id.trim();
        if id.is_empty() {
            return Err(ApiError::InvalidInput(format!("{what} id is empty")));
        }
        if id.contains(['/', '?', '#']) {
            return Err(ApiError::InvalidInput(format!("{what} id `{id}` is not a valid id")));
        }
        Ok(id)
    }

    fn get(&self, path: &str) -> Result<HttpRequest> {
        self.request(path, &FormParams::new())
    }

    /// Build the request for `path`. Fails before anything else when the
    /// credential is missing.
    fn request(&self, path: &str, params: &FormParams) -> Result<HttpRequest> {
        self.config.ensure_credential()?;

        let credentials = BASE64.encode(format!("{}:", self.config.api_key()));
        let mut headers = vec![
            ("Authorization".to_string(), format!("Basic {credentials}")),
            ("X-EasyPost-Client-User-Agent".to_string(), USER_AGENT.to_string()),
        ];

        let (method, body) = if params.is_empty() {
            (HttpMethod::Get, None)
        } else {
            headers.push(("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()));
            (HttpMethod::Post, Some(params.encode()))
        };

        Ok(HttpRequest {
            method,
            url: format!("{}{path}", self.config.base_url()),
            headers,
            body,
        })
    }

    fn call<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<R> {
        let body = self.execute(&request)?;
        decode(&body)
    }

    #[instrument(skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
    fn execute(&self, request: &HttpRequest) -> Result<String> {
        debug!("dispatching request");
        let response = self.transport.send(request)?;
        debug!(status = response.status, bytes = response.body.len(), "response received");

        if response.body.trim().is_empty() {
            warn!(status = response.status, "response from api is empty");
            return Err(ApiError::Transport("response from api is empty".to_string()));
        }
        Ok(response.body)
    }
}
