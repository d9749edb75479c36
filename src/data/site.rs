//! Static site data for Colorado Plateau stream gauges
//!
//! This module contains the static list of monitored USGS gauges with their
//! coordinates and the county FIPS codes used for drought lookups.

use super::Site;

/// Static array of all monitored gauges
///
/// Eight active USGS gauges on the major rivers of the Colorado Plateau,
/// with site numbers matching the NWIS and Water Quality Portal naming.
pub static SITES: [Site; 8] = [
    Site {
        id: "lees-ferry",
        site_no: "09380000",
        name: "Colorado River at Lees Ferry, AZ",
        river: "Colorado River",
        state: "AZ",
        latitude: 36.8647,
        longitude: -111.5878,
        county_fips: "04005",
    },
    Site {
        id: "grand-canyon",
        site_no: "09402500",
        name: "Colorado River near Grand Canyon, AZ",
        river: "Colorado River",
        state: "AZ",
        latitude: 36.0992,
        longitude: -112.0847,
        county_fips: "04005",
    },
    Site {
        id: "cisco",
        site_no: "09180500",
        name: "Colorado River near Cisco, UT",
        river: "Colorado River",
        state: "UT",
        latitude: 38.8103,
        longitude: -109.2932,
        county_fips: "49019",
    },
    Site {
        id: "green-river",
        site_no: "09315000",
        name: "Green River at Green River, UT",
        river: "Green River",
        state: "UT",
        latitude: 38.9861,
        longitude: -110.1513,
        county_fips: "49015",
    },
    Site {
        id: "greendale",
        site_no: "09234500",
        name: "Green River near Greendale, UT",
        river: "Green River",
        state: "UT",
        latitude: 40.9086,
        longitude: -109.4226,
        county_fips: "49009",
    },
    Site {
        id: "bluff",
        site_no: "09379500",
        name: "San Juan River near Bluff, UT",
        river: "San Juan River",
        state: "UT",
        latitude: 37.1467,
        longitude: -109.8646,
        county_fips: "49037",
    },
    Site {
        id: "durango",
        site_no: "09361500",
        name: "Animas River at Durango, CO",
        river: "Animas River",
        state: "CO",
        latitude: 37.2792,
        longitude: -107.8801,
        county_fips: "08067",
    },
    Site {
        id: "dolores",
        site_no: "09166500",
        name: "Dolores River at Dolores, CO",
        river: "Dolores River",
        state: "CO",
        latitude: 37.4725,
        longitude: -108.4968,
        county_fips: "08083",
    },
];

/// Returns all monitored sites
pub fn all_sites() -> &'static [Site] {
    &SITES
}

/// Get a site by its short ID or USGS site number
///
/// # Arguments
///
/// * `id` - Either the short identifier (e.g. "lees-ferry") or the USGS
///   site number (e.g. "09380000")
///
/// # Returns
///
/// Returns `Some(&Site)` if found, `None` otherwise
pub fn get_site_by_id(id: &str) -> Option<&'static Site> {
    SITES
        .iter()
        .find(|site| site.id == id || site.site_no == id)
}
