// Archive round-trip and fingerprint tests.
//
// A map written to JSON and read back through the standard registry must
// compute the same values. Archive versions follow metadata presence, ids
// are dense in visit order, and fingerprints depend on structure only.

use emodel::archive::{MapArchive, NodeRegistry, ARCHIVE_NO_METADATA, ARCHIVE_WITH_METADATA};
use emodel::nodes::{ArgMaxNode, ArgMinNode, InputNode, MovingAverageNode, OutputNode};
use emodel::*;

const FEED: [[f64; 3]; 3] = [[1.0, 2.0, 3.0], [9.0, 0.0, 4.0], [5.0, 5.0, 5.0]];

/// `input(3) → {argmin, argmax}`, each `val` averaged over `window`, output
/// node over `[avg(min), avg(max)]`.
fn min_max_map(window: usize) -> Map {
    let mut model = Model::new();
    let input = model.add_node(InputNode::<f64>::new(3)).unwrap();
    let (input_id, samples) = (input.id(), PortElements::from(input.output()));
    let min = model.add_node(ArgMinNode::<f64>::new(samples.clone())).unwrap();
    let min = PortElements::from(min.val());
    let max = model.add_node(ArgMaxNode::<f64>::new(samples)).unwrap();
    let max = PortElements::from(max.val());
    let min_average = model
        .add_node(MovingAverageNode::<f64>::new(min, window).unwrap())
        .unwrap();
    let min_average = PortElements::from(min_average.output());
    let max_average = model
        .add_node(MovingAverageNode::<f64>::new(max, window).unwrap())
        .unwrap();
    let max_average = PortElements::from(max_average.output());
    let output = model
        .add_node(OutputNode::<f64>::new(PortElements::concat([&min_average, &max_average])))
        .unwrap();
    let range = PortElements::from(output.output());
    Map::from_model(model, &[("samples", input_id)], &[("range", range)]).unwrap()
}

fn run(map: &mut Map) -> Vec<Vec<f64>> {
    FEED.iter()
        .map(|sample| {
            map.set_input_value("samples", sample).unwrap();
            map.compute_output::<f64>("range").unwrap()
        })
        .collect()
}

#[test]
fn json_round_trip_computes_the_same() {
    let mut original = min_max_map(2);
    let json = original.to_json().unwrap();
    let mut loaded = Map::from_json(&json, &NodeRegistry::standard()).unwrap();

    assert_eq!(loaded.input_names(), vec!["samples"]);
    assert_eq!(loaded.output_names(), vec!["range"]);
    assert_eq!(loaded.model().size(), original.model().size());
    assert_eq!(run(&mut original), run(&mut loaded));
}

#[test]
fn refined_map_round_trips() {
    let mut original = min_max_map(2);
    original.refine(&TransformContext::new()).unwrap();
    let json = original.to_json().unwrap();
    let mut loaded = Map::from_json(&json, &NodeRegistry::standard()).unwrap();
    assert_eq!(run(&mut original), run(&mut loaded));
}

#[test]
fn archive_ids_are_dense_in_visit_order() {
    let map = min_max_map(2);
    let archive = map.archive().unwrap();
    let ids: Vec<u64> = archive.model.nodes.iter().map(|n| n.id).collect();
    assert_eq!(ids, (0..archive.model.nodes.len() as u64).collect::<Vec<_>>());
    for node in &archive.model.nodes {
        for ranges in &node.inputs {
            assert!(ranges.iter().all(|r| r.node < node.id));
        }
    }

    let tags: Vec<&str> = archive.model.nodes.iter().map(|n| n.type_name.as_str()).collect();
    insta::assert_snapshot!(tags.join("\n"), @r###"
    InputNode<double>
    ArgMinNode<double>
    MovingAverageNode<double>
    ArgMaxNode<double>
    MovingAverageNode<double>
    OutputNode<double>
    "###);
}

#[test]
fn version_follows_metadata() {
    let mut map = min_max_map(2);
    assert_eq!(map.archive().unwrap().version, ARCHIVE_NO_METADATA);

    map.metadata_mut()
        .insert("author".into(), serde_json::json!("bench rig"));
    let archive = map.archive().unwrap();
    assert_eq!(archive.version, ARCHIVE_WITH_METADATA);

    let loaded = Map::from_archive(&archive, &NodeRegistry::standard()).unwrap();
    assert_eq!(loaded.metadata().get("author"), Some(&serde_json::json!("bench rig")));
}

#[test]
fn old_archives_ignore_metadata() {
    let mut map = min_max_map(2);
    map.metadata_mut().insert("author".into(), serde_json::json!("x"));
    let mut archive = map.archive().unwrap();
    archive.version = ARCHIVE_NO_METADATA;
    let loaded = Map::from_archive(&archive, &NodeRegistry::standard()).unwrap();
    assert!(loaded.metadata().is_empty());
}

#[test]
fn unsupported_versions_are_rejected() {
    let map = min_max_map(2);
    let mut archive = map.archive().unwrap();
    archive.version = 7;
    let err = Map::from_archive(&archive, &NodeRegistry::standard()).unwrap_err();
    assert!(matches!(
        err,
        ModelError::UnsupportedVersion { ref entity, version: 7 } if entity == "map"
    ));

    let mut archive = map.archive().unwrap();
    archive.model.nodes[2].version = 9;
    let err = Map::from_archive(&archive, &NodeRegistry::standard()).unwrap_err();
    assert!(matches!(
        err,
        ModelError::UnsupportedVersion { ref entity, version: 9 } if entity == "MovingAverageNode<double>"
    ));
}

#[test]
fn overflowing_ranges_are_rejected_on_read() {
    let map = min_max_map(2);
    let mut archive = map.archive().unwrap();
    archive.output_elements[0][0].start = usize::MAX;
    let json = serde_json::to_string(&archive).unwrap();
    let err = Map::from_json(&json, &NodeRegistry::standard()).unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)));

    let mut archive = map.archive().unwrap();
    archive.model.nodes[5].inputs[0][0].start = usize::MAX - 1;
    let err = Map::from_archive(&archive, &NodeRegistry::standard()).unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)));
}

#[test]
fn unknown_node_types_and_bad_json_fail() {
    let json = min_max_map(2).to_json().unwrap();
    let err = Map::from_json(&json, &NodeRegistry::new()).unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)));

    let err = Map::from_json("{\"version\": 3", &NodeRegistry::standard()).unwrap_err();
    assert!(matches!(err, ModelError::Archive(_)));
}

#[test]
fn archive_json_shape() {
    let json = min_max_map(2).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["input_names"], serde_json::json!(["samples"]));
    assert_eq!(value["input_ids"], serde_json::json!([0]));
    assert_eq!(value["model"]["nodes"][2]["fields"]["window"], serde_json::json!(2));
    let archive: MapArchive = serde_json::from_value(value).unwrap();
    assert_eq!(archive.output_elements[0].len(), 1);
}

#[test]
fn fingerprint_depends_on_structure_only() {
    let a = min_max_map(2).fingerprint().unwrap();
    let b = min_max_map(2).fingerprint().unwrap();
    let c = min_max_map(3).fingerprint().unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
}
