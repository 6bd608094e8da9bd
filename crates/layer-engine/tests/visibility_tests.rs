//! Property and scenario tests for the layer visibility store.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use layer_engine::LayerVisibilityStore;
use map_common::{LayerKind, RadarSource};
use test_utils::fixtures::sample_locations;

fn event_names() -> Vec<String> {
    ["Flood Warning", "Heat Advisory", "Wind Advisory", "Tornado Watch"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ============================================================================
// Toggle parity
// ============================================================================

#[test]
fn test_final_visibility_is_initial_xor_odd_toggle_count() {
    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let locations = sample_locations(5);
        let store = LayerVisibilityStore::with_forecast_locations(&locations);
        store.merge_event_types(&event_names());

        // start from a random mix of visible and hidden
        let mut initial: HashMap<(LayerKind, String), bool> = HashMap::new();
        for kind in [LayerKind::Forecast, LayerKind::Event] {
            for d in store.descriptors(kind) {
                if rng.gen_bool(0.5) {
                    store.toggle(kind, &d.name).unwrap();
                }
                initial.insert((kind, d.name.clone()), store.is_visible(kind, &d.name).unwrap());
            }
        }

        let mut counts: HashMap<(LayerKind, String), usize> = HashMap::new();
        for _ in 0..200 {
            let kind = if rng.gen_bool(0.5) {
                LayerKind::Forecast
            } else {
                LayerKind::Event
            };
            let names = store.descriptors(kind);
            let name = names[rng.gen_range(0..names.len())].name.clone();
            store.toggle(kind, &name).unwrap();
            *counts.entry((kind, name)).or_default() += 1;
        }

        for (key, start) in &initial {
            let toggles = counts.get(key).copied().unwrap_or(0);
            let expected = *start ^ (toggles % 2 == 1);
            assert_eq!(
                store.is_visible(key.0, &key.1),
                Some(expected),
                "seed {} layer {:?}",
                seed,
                key
            );
        }
    }
}

#[test]
fn test_published_lists_are_ordered_per_subscriber() {
    let store = LayerVisibilityStore::with_forecast_locations(&sample_locations(1));
    let name = sample_locations(1)[0].name.clone();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let watched = name.clone();
    store.subscribe(LayerKind::Forecast, move |_, descriptors| {
        let visible = descriptors.iter().find(|d| d.name == watched).unwrap().visible;
        sink.lock().unwrap().push(visible);
    });

    for _ in 0..6 {
        store.toggle(LayerKind::Forecast, &name).unwrap();
    }
    assert_eq!(
        *seen.lock().unwrap(),
        vec![false, true, false, true, false, true]
    );
}

// ============================================================================
// Radar exclusivity
// ============================================================================

#[test]
fn test_toggle_noaa_then_rainviewer_leaves_only_rainviewer() {
    let store = LayerVisibilityStore::new();
    store.register_radar(RadarSource::Noaa);
    store.register_radar(RadarSource::RainViewer);

    store.toggle(LayerKind::Radar, "NOAA").unwrap();
    store.toggle(LayerKind::Radar, "RainViewer").unwrap();

    let visible: Vec<String> = store
        .get_visible(LayerKind::Radar)
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(visible, vec!["RainViewer"]);
}

#[test]
fn test_exactly_one_radar_visible_under_random_commands() {
    let mut rng = StdRng::seed_from_u64(7);
    let store = LayerVisibilityStore::new();
    store.register_radar(RadarSource::RainViewer);
    store.register_radar(RadarSource::Noaa);

    for _ in 0..100 {
        let source = RadarSource::ALL[rng.gen_range(0..2)];
        if rng.gen_bool(0.5) {
            store.toggle(LayerKind::Radar, source.as_str()).unwrap();
        } else {
            store.set_exclusive(LayerKind::Radar, source.as_str()).unwrap();
        }
        let visible = store.get_visible(LayerKind::Radar);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, source.as_str());
    }
}
