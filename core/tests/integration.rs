//! Shipping lifecycle test against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every client
//! operation over real HTTP through the default `UreqTransport`. Checks that
//! request encoding, auth headers, and response decoding agree with a server
//! that actually parses the nested form bodies.

use easypost_core::{
    Address, ApiError, BatchMode, Config, CustomsInfo, CustomsItem, EasyPostClient, Parcel,
    ScanForm, Shipment,
};

/// Start the mock server on a random port and return its base URL.
fn start_mock_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client(base_url: &str) -> EasyPostClient {
    EasyPostClient::new(Config::new("test_key").with_base_url(base_url))
}

fn jane_doe() -> Address {
    Address {
        name: "Jane Doe".to_string(),
        street1: "1 Main St".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        zip: "62701".to_string(),
        country: "US".to_string(),
        ..Address::default()
    }
}

fn warehouse() -> Address {
    Address {
        name: "Warehouse".to_string(),
        street1: "9 Dock Rd".to_string(),
        city: "Chicago".to_string(),
        state: "IL".to_string(),
        zip: "60601".to_string(),
        country: "US".to_string(),
        ..Address::default()
    }
}

fn small_box() -> Parcel {
    Parcel {
        length: 10.0,
        width: 8.0,
        height: 4.0,
        weight: 10.0,
        ..Parcel::default()
    }
}

#[test]
fn shipping_lifecycle() {
    let base_url = start_mock_server();
    let client = client(&base_url);

    // Step 1: addresses.
    let to = client.create_address(&jane_doe()).unwrap();
    assert!(to.id.starts_with("adr_"), "unexpected id {}", to.id);
    assert_eq!(to.name, "Jane Doe");
    assert_eq!(to.company, "");

    let fetched = client.retrieve_address(&to.id).unwrap();
    assert_eq!(fetched, to);

    let verified = client.verify_address(&to.id).unwrap();
    assert_eq!(verified.message, "Address verified");
    assert_eq!(verified.address.street1, "1 MAIN ST");
    assert_eq!(verified.address.id, to.id);

    let from = client.create_address(&warehouse()).unwrap();

    // Step 2: parcel.
    let parcel = client.create_parcel(&small_box()).unwrap();
    assert!(parcel.id.starts_with("prcl_"));
    assert_eq!(parcel.weight, 10.0);
    assert_eq!(client.retrieve_parcel(&parcel.id).unwrap().length, 10.0);

    // Step 3: shipment, from-address and parcel referenced by id.
    let shipment = client
        .create_shipment(&Shipment {
            to_address: jane_doe(),
            from_address: Address::by_id(&from.id),
            parcel: Parcel::by_id(&parcel.id),
            reference: "order-1001".to_string(),
            ..Shipment::default()
        })
        .unwrap();
    assert!(shipment.id.starts_with("shp_"));
    assert_eq!(shipment.from_address.name, "Warehouse");
    assert_eq!(shipment.to_address.name, "Jane Doe");
    assert_eq!(shipment.parcel.id, parcel.id);
    assert_eq!(shipment.reference, "order-1001");
    assert_eq!(shipment.rates.len(), 3);
    assert!(shipment.rates.iter().all(|r| !r.service_name.is_empty()));
    assert!(shipment.rates.iter().all(|r| r.rate_value.is_some()));

    // Step 4: rates and label.
    let rates = client.retrieve_rates(&shipment.id).unwrap();
    let priority = rates.iter().find(|r| r.service == "Priority").unwrap();
    assert_eq!(priority.service_name, "USPS Priority Mail");
    assert_eq!(priority.rate, "8.30");
    assert_eq!(priority.rate_value, Some(8.30));

    let label = client.buy_shipping_label(&shipment.id, &priority.id).unwrap();
    assert!(label.label_url.ends_with(".png"));
    assert_eq!(label.label_resolution, 300);
    let selected = label.selected_rate.as_ref().unwrap();
    assert_eq!(selected.id, priority.id);
    assert_eq!(selected.service_name, "USPS Priority Mail");

    let bought = client.retrieve_shipment(&shipment.id).unwrap();
    assert!(bought.tracking_code.starts_with("EZ"));
    assert_eq!(bought.selected_rate.as_ref().unwrap().service_name, "USPS Priority Mail");

    // A second purchase is rejected by the service.
    let err = client.buy_shipping_label(&shipment.id, &priority.id).unwrap_err();
    assert!(matches!(err, ApiError::Remote(ref m) if m == "shipment already has postage"), "{err:?}");

    // Step 5: refunds.
    let refund = client.refund_shipment(&shipment.id).unwrap();
    assert_eq!(refund.status, "submitted");
    assert_eq!(refund.shipment_id, shipment.id);
    assert_eq!(refund.tracking_code, bought.tracking_code);
    assert_eq!(client.retrieve_refund(&refund.id).unwrap(), refund);

    let outside = client.create_refund("USPS", "EZ0000000000000000001").unwrap();
    assert_eq!(outside.status, "not_applicable");
    assert_eq!(outside.carrier, "USPS");

    // Step 6: customs.
    let item = client
        .create_customs_item(&CustomsItem {
            description: "T-shirt".to_string(),
            quantity: 2.0,
            value: "23.50".to_string(),
            weight: 6.0,
            origin_country: "US".to_string(),
            ..CustomsItem::default()
        })
        .unwrap();
    assert!(item.id.starts_with("cstitem_"));
    assert_eq!(item.value, "23.50");
    assert_eq!(client.retrieve_customs_item(&item.id).unwrap().description, "T-shirt");

    let info = client
        .create_customs_info(&CustomsInfo {
            customs_certify: true,
            customs_signer: "Jane Doe".to_string(),
            contents_type: "merchandise".to_string(),
            customs_items: vec![
                CustomsItem { id: item.id.clone(), ..CustomsItem::default() },
                CustomsItem {
                    description: "Mug".to_string(),
                    quantity: 1.0,
                    value: "9".to_string(),
                    weight: 12.0,
                    ..CustomsItem::default()
                },
            ],
            ..CustomsInfo::default()
        })
        .unwrap();
    assert!(info.customs_certify);
    assert_eq!(info.customs_items.len(), 2);
    assert_eq!(info.customs_items[0].id, item.id);
    assert_eq!(info.customs_items[1].description, "Mug");
    assert_eq!(client.retrieve_customs_info(&info.id).unwrap().customs_items.len(), 2);

    // Step 7: batches.
    let template = client.retrieve_shipment(&shipment.id).unwrap();
    let batch = client
        .create_batch(std::slice::from_ref(&template), BatchMode::CreateOnly)
        .unwrap();
    assert_eq!(batch.state, "created");
    assert_eq!(batch.status.created, 1);
    assert_eq!(batch.shipments.len(), 1);
    assert!(batch.shipments[0].rates.iter().all(|r| !r.service_name.is_empty()));

    let labelled = client.batch_label(&batch.id, "pdf").unwrap();
    assert_eq!(labelled.label_url, "", "label must wait for postage");

    let bought_batch = client
        .create_batch(std::slice::from_ref(&template), BatchMode::CreateAndBuy)
        .unwrap();
    assert_eq!(bought_batch.status.postage_purchased, 1);
    assert_eq!(bought_batch.status.postage_purchase_failed, 0);
    let batched = &bought_batch.shipments[0];
    assert_eq!(batched.selected_rate.as_ref().unwrap().carrier, template.rates[0].carrier);

    let labelled = client.batch_label(&bought_batch.id, "zpl").unwrap();
    assert!(labelled.label_url.ends_with(".zpl"));

    let grown = client
        .add_shipments_to_batch(&batch.id, &[shipment.id.as_str()])
        .unwrap();
    assert_eq!(grown.shipments.len(), 2);
    assert_eq!(grown.status.postage_purchased, 1);

    let shrunk = client
        .remove_shipments_from_batch(&batch.id, &[shipment.id.as_str()])
        .unwrap();
    assert_eq!(shrunk.shipments.len(), 1);
    assert_eq!(client.retrieve_batch(&batch.id).unwrap().shipments.len(), 1);

    // Step 8: scan forms.
    let scan_form = client
        .create_scan_form(&ScanForm {
            address: Address::by_id(&from.id),
            tracking_codes: vec![bought.tracking_code.clone(), batched.tracking_code.clone()],
            ..ScanForm::default()
        })
        .unwrap();
    assert!(scan_form.id.starts_with("sf_"));
    assert_eq!(scan_form.address.name, "Warehouse");
    assert_eq!(scan_form.tracking_codes, vec![bought.tracking_code.clone(), batched.tracking_code.clone()]);
    assert!(scan_form.form_url.ends_with(".pdf"));
    assert_eq!(client.retrieve_scan_form(&scan_form.id).unwrap(), scan_form);
}

#[test]
fn service_errors_surface_as_remote() {
    let base_url = start_mock_server();
    let client = client(&base_url);

    let err = client.retrieve_address("adr_missing").unwrap_err();
    assert!(matches!(err, ApiError::Remote(ref m) if m == "adr_missing not found"), "{err:?}");

    // Nothing to verify without a street line.
    let bare = client
        .create_address(&Address { name: "Nobody".to_string(), ..Address::default() })
        .unwrap();
    let err = client.verify_address(&bare.id).unwrap_err();
    assert!(matches!(err, ApiError::Remote(ref m) if m == "Unable to verify address."), "{err:?}");
}

#[test]
fn empty_credential_never_reaches_the_server() {
    let base_url = start_mock_server();
    let client = EasyPostClient::new(Config::new("").with_base_url(&base_url));

    let err = client.create_address(&jane_doe()).unwrap_err();
    assert!(matches!(err, ApiError::Configuration(_)), "{err:?}");
}

fn without_identity_address(mut address: Address) -> Address {
    address.id.clear();
    address.object.clear();
    address.created_at = None;
    address.updated_at = None;
    address
}

fn without_identity_parcel(mut parcel: Parcel) -> Parcel {
    parcel.id.clear();
    parcel.object.clear();
    parcel.created_at = None;
    parcel.updated_at = None;
    parcel
}

fn without_identity_item(mut item: CustomsItem) -> CustomsItem {
    item.id.clear();
    item.object.clear();
    item.created_at = None;
    item.updated_at = None;
    item
}

fn without_identity_info(mut info: CustomsInfo) -> CustomsInfo {
    info.id.clear();
    info.object.clear();
    info.created_at = None;
    info.updated_at = None;
    info.customs_items = info.customs_items.into_iter().map(without_identity_item).collect();
    info
}

#[test]
fn records_round_trip_through_the_service() {
    let base_url = start_mock_server();
    let client = client(&base_url);

    let address = Address {
        name: "Jane Doe".to_string(),
        company: "Doe & Daughters".to_string(),
        street1: "1 Main St".to_string(),
        street2: "Suite #4".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        zip: "62704".to_string(),
        country: "US".to_string(),
        phone: "+1 555-0100".to_string(),
        email: "jane@doe.example".to_string(),
        ..Address::default()
    };
    let created = client.create_address(&address).unwrap();
    let fetched = client.retrieve_address(&created.id).unwrap();
    assert_eq!(without_identity_address(created), address);
    assert_eq!(without_identity_address(fetched), address);

    let parcel = Parcel {
        length: 12.5,
        width: 9.25,
        height: 1.0,
        weight: 15.5,
        predefined_package: "FlatRateEnvelope".to_string(),
        ..Parcel::default()
    };
    let created = client.create_parcel(&parcel).unwrap();
    let fetched = client.retrieve_parcel(&created.id).unwrap();
    assert_eq!(without_identity_parcel(created), parcel);
    assert_eq!(without_identity_parcel(fetched), parcel);

    let item = CustomsItem {
        description: "Cotton T-shirt".to_string(),
        quantity: 3.0,
        value: "12.75".to_string(),
        weight: 4.5,
        hs_tariff_number: "610910".to_string(),
        origin_country: "US".to_string(),
        ..CustomsItem::default()
    };
    let created = client.create_customs_item(&item).unwrap();
    let fetched = client.retrieve_customs_item(&created.id).unwrap();
    assert_eq!(without_identity_item(created), item);
    assert_eq!(without_identity_item(fetched), item);

    let info = CustomsInfo {
        customs_certify: true,
        customs_signer: "Jane Doe".to_string(),
        contents_type: "other".to_string(),
        contents_explanation: "Promotional shirts".to_string(),
        restriction_type: "none".to_string(),
        restriction_comments: "n/a".to_string(),
        non_delivery_option: "return".to_string(),
        eel_pfc: "NOEEI 30.37(a)".to_string(),
        customs_items: vec![
            item.clone(),
            CustomsItem {
                description: "Ceramic mug".to_string(),
                quantity: 1.0,
                value: "9".to_string(),
                weight: 12.0,
                hs_tariff_number: "691200".to_string(),
                origin_country: "CN".to_string(),
                ..CustomsItem::default()
            },
        ],
        ..CustomsInfo::default()
    };
    let created = client.create_customs_info(&info).unwrap();
    let fetched = client.retrieve_customs_info(&created.id).unwrap();
    assert_eq!(without_identity_info(created), info);
    assert_eq!(without_identity_info(fetched), info);
}
