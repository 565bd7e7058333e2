//! GNSS receivers and their sampled location.

use serde_json::{json, Value};

use empower_core::keys::{channels, DeviceType};
use empower_core::n2k::GnssDevice;
use empower_core::transform::{combine_latest3, round_to};
use empower_core::{Channel, Stream, Thing, ThingType};

use crate::error::ConfigBuildError;
use crate::streams::Sources;

const LAT_LON_DECIMALS: u32 = 5;
const SOG_DECIMALS: u32 = 2;

/// Rounded `{lat, lon, sog}`, or `None` until a position is known.
fn location(lat: &Value, lon: &Value, sog: &Value) -> Option<Value> {
    let lat = round_to(lat.as_f64()?, LAT_LON_DECIMALS);
    let lon = round_to(lon.as_f64()?, LAT_LON_DECIMALS);
    let sog = sog.as_f64().map(|s| round_to(s, SOG_DECIMALS));
    Some(json!({ "lat": lat, "lon": lon, "sog": sog }))
}

/// Position sampled on the configured interval, re-emitted only when the
/// rounded tuple changes.
fn location_stream(instance: u32, sources: &Sources<'_>) -> Stream<Value> {
    let lat = sources.channel(DeviceType::Gnss, instance, channels::GNSS_LATITUDE);
    let lon = sources.channel(DeviceType::Gnss, instance, channels::GNSS_LONGITUDE);
    let sog = sources.channel(DeviceType::Gnss, instance, channels::GNSS_SOG);
    let interval = sources.settings().gnss.sample_interval();

    combine_latest3(&lat, &lon, &sog)
        .sample(&sources.ticker().every(interval))
        .filter_map(|(lat, lon, sog)| location(&lat, &lon, &sog))
        .distinct_until_changed()
}

pub fn build_gnss(device: &GnssDevice, sources: &Sources<'_>) -> Result<Thing, ConfigBuildError> {
    let mut thing = Thing::new(ThingType::Gnss, device.instance, device.name.clone());
    thing.set_metadata("isExternal", device.is_external);

    thing.bind(Channel::point("location", "Location"), location_stream(device.instance, sources))?;
    thing.bind(
        Channel::string("fixType", "Fix Type"),
        sources.discrete(DeviceType::Gnss, device.instance, channels::GNSS_FIX_TYPE),
    )?;
    Ok(thing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use empower_core::config::EmpowerSettings;
    use empower_core::{ChannelStore, ManualTicker, MemoryChannelStore};

    #[test]
    fn test_location_sampled_and_rounded() {
        let store = MemoryChannelStore::new();
        let settings = EmpowerSettings::default();
        let ticker = ManualTicker::new();
        let sources = Sources::new(&store, &settings, &ticker);

        let device = GnssDevice {
            instance: 0,
            ..Default::default()
        };
        let mut thing = build_gnss(&device, &sources).unwrap();
        thing.activate(&store);

        store.update_channel("GNSS.0", "Latitude", json!(47.1234567));
        store.update_channel("GNSS.0", "Longitude", json!(-122.9876543));
        store.update_channel("GNSS.0", "Sog", json!(5.456));
        assert_eq!(store.mobile_value("gnss.0.location"), None);

        ticker.tick();
        assert_eq!(
            store.mobile_value("gnss.0.location"),
            Some(json!({"lat": 47.12346, "lon": -122.98765, "sog": 5.46}))
        );
    }

    #[test]
    fn test_location_skips_unchanged_tuple() {
        let store = MemoryChannelStore::new();
        let settings = EmpowerSettings::default();
        let ticker = ManualTicker::new();
        let sources = Sources::new(&store, &settings, &ticker);

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = location_stream(1, &sources).subscribe(move |v| sink.lock().unwrap().push(v));

        store.update_channel("GNSS.1", "Latitude", json!(10.0));
        store.update_channel("GNSS.1", "Longitude", json!(20.0));
        store.update_channel("GNSS.1", "Sog", json!(1.0));
        ticker.tick();
        store.update_channel("GNSS.1", "Sog", json!(1.001));
        ticker.tick();
        store.update_channel("GNSS.1", "Sog", json!(1.5));
        ticker.tick();

        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
