//! Nodeflow - headless driver for the node graph engine
//!
//! `nodeflow [scene.json]` loads a saved scene, or builds a small demo graph
//! (two numbers into an addition, shown as a number and as text), runs
//! propagation and prints the resulting scene.

use log::{error, info};
use std::rc::Rc;

use nodeflow::nodes::math::{self, AdditionModel, NumberDisplayModel, NumberSourceModel, TextDisplayModel};
use nodeflow::{DataModelRegistry, GraphEvent, NodeGraph, NodeId, Result, SceneConfig};

fn build_demo(graph: &mut NodeGraph) -> Result<NodeId> {
    let a = graph.create_node(Box::new(NumberSourceModel::with_value(2.0)));
    let b = graph.create_node(Box::new(NumberSourceModel::new()));
    let add = graph.create_node_by_name(AdditionModel::NAME)?;
    let display = graph.create_node_by_name(NumberDisplayModel::NAME)?;
    let text = graph.create_node_by_name(TextDisplayModel::NAME)?;

    graph.connect(a, 0, add, 0)?;
    graph.connect(b, 0, add, 1)?;
    graph.connect(add, 0, display, 0)?;
    // number -> text goes through the registered converter
    graph.connect(add, 0, text, 0)?;

    graph.update_model(b, |model, signals| {
        if let Err(e) = model.restore(&serde_json::json!({ "number": 40.0 })) {
            error!("{}", e);
        }
        signals.data_updated(0);
    })?;
    graph.process_conversions();
    Ok(add)
}

fn run() -> Result<()> {
    let config = SceneConfig::load_or_default();
    let mut registry = DataModelRegistry::new();
    math::register_all(&mut registry);
    info!("Registered models: {:?}", registry.registered_model_names());

    let mut graph = NodeGraph::new(Rc::new(registry), config);
    graph.subscribe(|event| {
        if let GraphEvent::DataUpdated { node, port } = event {
            info!("Data updated on {} #{}", node, port);
        }
    });

    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            graph.load_from_str(&text)?;
            graph.process_conversions();
        }
        None => {
            let add = build_demo(&mut graph)?;
            let mut sum = None;
            graph.update_model(add, |model, _| sum = model.out_data(0))?;
            println!("2 + 40 = {:?}", sum);
        }
    }

    for node in graph.nodes() {
        let model = node.model();
        println!(
            "{} {:<14} {:?} {}",
            node.id(),
            model.caption(),
            model.validation_state(),
            model.validation_message()
        );
    }
    for missing in graph.unsatisfied_inputs() {
        println!("unconnected required input #{} on {}", missing.index, missing.node_id);
    }
    println!("{}", graph.save_to_string()?);
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("{}", e);
        eprintln!("nodeflow: {}", e);
        std::process::exit(1);
    }
}
