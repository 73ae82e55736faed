//! Region tagging for records whose source did not supply one.

use crate::types::{Region, TaskCategory};

/// Headquarters region of well-known semiconductor vendors.
const MANUFACTURER_REGIONS: &[(&str, Region)] = &[
    ("infineon", Region::Eu),
    ("stmicroelectronics", Region::Eu),
    ("st", Region::Eu),
    ("nxp", Region::Eu),
    ("philips", Region::Eu),
    ("renesas", Region::Asia),
    ("rohm", Region::Asia),
    ("toshiba", Region::Asia),
    ("panasonic", Region::Asia),
    ("sony", Region::Asia),
    ("samsung", Region::Asia),
    ("hynix", Region::Asia),
    ("sk hynix", Region::Asia),
    ("mediatek", Region::Asia),
    ("hisilicon", Region::Asia),
    ("texas instruments", Region::Us),
    ("ti", Region::Us),
    ("analog devices", Region::Us),
    ("adi", Region::Us),
    ("microchip", Region::Us),
    ("onsemi", Region::Us),
    ("on semiconductor", Region::Us),
    ("maxim", Region::Us),
    ("intel", Region::Us),
];

/// Region of a manufacturer, matched on its leading name.
pub fn manufacturer_region(manufacturer: &str) -> Option<Region> {
    let name = manufacturer.trim().to_lowercase();
    MANUFACTURER_REGIONS
        .iter()
        .find(|(vendor, _)| {
            name == *vendor
                || name
                    .strip_prefix(vendor)
                    .is_some_and(|rest| rest.starts_with(|c: char| !c.is_alphanumeric()))
        })
        .map(|(_, region)| *region)
}

/// Region a record is tagged with.
///
/// Literature and patents are global unless the source says otherwise.
/// Component-like records fall back to the manufacturer's region and are
/// `None` when that is unknown too.
pub fn resolve_region(
    category: TaskCategory,
    explicit: Option<Region>,
    manufacturer: Option<&str>,
) -> Option<Region> {
    if explicit.is_some() {
        return explicit;
    }
    match category {
        TaskCategory::Literature | TaskCategory::Patent => Some(Region::Global),
        _ => manufacturer.and_then(manufacturer_region),
    }
}
