//! Display names for carrier service codes, and the rate post-processing
//! that uses them.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::types::{Rate, Shipment};

static SERVICE_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // USPS
        ("First", "USPS First-Class Mail"),
        ("Priority", "USPS Priority Mail"),
        ("Express", "USPS Priority Mail Express"),
        ("ParcelSelect", "USPS Parcel Select"),
        ("LibraryMail", "USPS Library Mail"),
        ("MediaMail", "USPS Media Mail"),
        ("GroundAdvantage", "USPS Ground Advantage"),
        ("CriticalMail", "USPS Critical Mail"),
        ("FirstClassMailInternational", "USPS First-Class Mail International"),
        ("FirstClassPackageInternationalService", "USPS First-Class Package International"),
        ("PriorityMailInternational", "USPS Priority Mail International"),
        ("ExpressMailInternational", "USPS Priority Mail Express International"),
        // UPS
        ("Ground", "UPS Ground"),
        ("UPSStandard", "UPS Standard"),
        ("UPSSaver", "UPS Saver"),
        ("ExpressPlus", "UPS Worldwide Express Plus"),
        ("Expedited", "UPS Worldwide Expedited"),
        ("NextDayAir", "UPS Next Day Air"),
        ("NextDayAirSaver", "UPS Next Day Air Saver"),
        ("NextDayAirEarlyAM", "UPS Next Day Air Early A.M."),
        ("2ndDayAir", "UPS 2nd Day Air"),
        ("2ndDayAirAM", "UPS 2nd Day Air A.M."),
        ("3DaySelect", "UPS 3 Day Select"),
        // FedEx
        ("FEDEX_GROUND", "FedEx Ground"),
        ("FEDEX_2_DAY", "FedEx 2Day"),
        ("FEDEX_2_DAY_AM", "FedEx 2Day A.M."),
        ("FEDEX_EXPRESS_SAVER", "FedEx Express Saver"),
        ("STANDARD_OVERNIGHT", "FedEx Standard Overnight"),
        ("FIRST_OVERNIGHT", "FedEx First Overnight"),
        ("PRIORITY_OVERNIGHT", "FedEx Priority Overnight"),
        ("INTERNATIONAL_ECONOMY", "FedEx International Economy"),
        ("INTERNATIONAL_FIRST", "FedEx International First"),
        ("INTERNATIONAL_PRIORITY", "FedEx International Priority"),
        ("GROUND_HOME_DELIVERY", "FedEx Ground Home Delivery"),
        ("SMART_POST", "FedEx SmartPost"),
    ])
});

/// Display name for a service code, or `""` when the code is unknown.
pub fn service_name(code: &str) -> &'static str {
    SERVICE_NAMES.get(code).copied().unwrap_or_default()
}

/// Fill in the derived fields of a rate quote.
pub fn enrich_rate(rate: &mut Rate) {
    rate.service_name = service_name(&rate.service).to_string();
    rate.rate_value = rate.rate.trim().parse().ok();
}

/// Enrich every rate a decoded shipment carries.
pub(crate) fn enrich_shipment(shipment: &mut Shipment) {
    shipment.rates.iter_mut().for_each(enrich_rate);
    if let Some(rate) = shipment.selected_rate.as_mut() {
        enrich_rate(rate);
    }
    if let Some(rate) = shipment
        .postage_label
        .as_mut()
        .and_then(|label| label.selected_rate.as_mut())
    {
        enrich_rate(rate);
    }
}
