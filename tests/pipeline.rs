//! End to end: JSON description -> compiler -> backend.

use ndarray::array;
use serde_json::json;

use ninemlc::backend::{render_summary, render_template, FlatView, RhsEvaluator};
use ninemlc::compiler::diagnostics::SourceDiagnostics;
use ninemlc::compiler::parse_component;
use ninemlc::ir::expr::{Expr, SymbolValues};
use ninemlc::{CompileContext, Compiler, ErrorKind};

fn expr(s: &str) -> Expr {
    Expr::parse(s).unwrap()
}

/// An integrate-and-fire cell driven by an exponential synapse that the
/// cell's own spikes feed back into.
fn network() -> serde_json::Value {
    json!({
        "name": "Net",
        "subnodes": {
            "cell": {
                "name": "Iaf",
                "parameters": [{ "name": "tau" }, { "name": "theta" }, { "name": "V_reset" }],
                "state_variables": [{ "name": "V" }],
                "analog_ports": [
                    { "name": "ISyn", "mode": { "Reduce": "+" } },
                    { "name": "V", "mode": "Send" }
                ],
                "event_ports": [{ "name": "spikeout", "mode": "Send" }],
                "regimes": [{
                    "name": "sub",
                    "time_derivatives": [{ "variable": "V", "rhs": "-V / tau + ISyn" }],
                    "on_conditions": [{
                        "trigger": "V > theta",
                        "state_assignments": [{ "variable": "V", "rhs": "V_reset" }],
                        "output_events": [{ "port": "spikeout" }]
                    }]
                }]
            },
            "syn": {
                "name": "ExpSyn",
                "parameters": [{ "name": "tau_s" }, { "name": "w" }],
                "state_variables": [{ "name": "g" }],
                "aliases": [{ "name": "I", "rhs": "g" }],
                "analog_ports": [{ "name": "I", "mode": "Send" }],
                "event_ports": [{ "name": "spikein", "mode": "Receive" }],
                "regimes": [{
                    "name": "r",
                    "time_derivatives": [{ "variable": "g", "rhs": "-g / tau_s" }],
                    "on_events": [{
                        "source_port": "spikein",
                        "state_assignments": [{ "variable": "g", "rhs": "g + w" }]
                    }]
                }]
            }
        },
        "port_connections": [
            { "from": "syn.I", "to": "cell.ISyn" },
            { "from": "cell.spikeout", "to": "syn.spikein" }
        ]
    })
}

#[test]
fn test_network_compiles() {
    let source = network().to_string();
    let result = Compiler::new().compile_str(&source, "net.json").unwrap();
    let flat = result.flat();

    assert!(flat.is_flat());
    assert_eq!(flat.regimes.len(), 1);
    let regime = &flat.regimes[0];
    assert_eq!(regime.name, "cell:sub|syn:r");
    assert_eq!(
        regime.time_derivative("cell_V").unwrap().rhs,
        expr("-cell_V / cell_tau + syn_I")
    );

    // The synapse handler runs as part of the threshold crossing.
    let spike = &regime.on_conditions[0];
    assert_eq!(spike.trigger, expr("cell_V > cell_theta"));
    assert_eq!(spike.state_assignments.len(), 2);
    assert_eq!(spike.state_assignments[1].variable, "syn_g");
    assert_eq!(spike.state_assignments[1].rhs, expr("syn_g + syn_w"));
    assert!(regime.on_events.is_empty());

    let ports: Vec<&str> = flat.analog_ports.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(ports, vec!["cell_V", "syn_I"]);
    let events: Vec<&str> = flat.event_ports.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(events, vec!["cell_spikeout"]);
}

#[test]
fn test_rhs_of_flat_network() {
    let result = Compiler::new()
        .compile_str(&network().to_string(), "net.json")
        .unwrap();
    let view = FlatView::new(result.flat()).unwrap();
    let layout: Vec<&str> = view.state_layout().keys().map(String::as_str).collect();
    assert_eq!(layout, vec!["cell_V", "syn_g"]);

    let mut rhs = RhsEvaluator::new(&view, &CompileContext::new()).unwrap();
    let parameters = SymbolValues::from([
        ("cell_tau".to_string(), 10.0),
        ("cell_theta".to_string(), 1.0),
        ("cell_V_reset".to_string(), 0.0),
        ("syn_tau_s".to_string(), 5.0),
        ("syn_w".to_string(), 0.5),
    ]);
    let dx = rhs
        .derivative_rhs("cell:sub|syn:r", &array![2.0, 1.0], &parameters, 0.0)
        .unwrap();
    assert!((dx[0] - 0.8).abs() < 1e-12);
    assert!((dx[1] + 0.2).abs() < 1e-12);

    let fired = rhs
        .triggered("cell:sub|syn:r", &array![2.0, 1.0], &parameters, 0.0)
        .unwrap();
    assert_eq!(fired, vec![0]);
}

#[test]
fn test_templates_on_flat_network() {
    let result = Compiler::new()
        .compile_str(&network().to_string(), "net.json")
        .unwrap();
    let view = FlatView::new(result.flat()).unwrap();
    let out = render_template(
        &view,
        "{% for r in component.regimes %}{% for tr in r.transitions %}\
         {{ tr.trigger.on }};{{ tr.target }};{{ tr.output_events|join(',') }}\
         {% endfor %}{% endfor %}",
    )
    .unwrap();
    assert_eq!(out, "cell_V > cell_theta;cell:sub|syn:r;cell_spikeout");

    let summary = render_summary(&view).unwrap();
    assert!(summary.starts_with("component Net"));
    assert!(summary.contains("alias syn_I := syn_g"));
    assert!(summary.contains("dsyn_g/dt = -syn_g / syn_tau_s"));
}

#[test]
fn test_unflattened_network_has_no_view() {
    let component = parse_component(&network().to_string(), "net.json").unwrap();
    let err = FlatView::new(&component).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFlat);
}

#[test]
fn test_errors_point_into_the_source() {
    let mut net = network();
    net["subnodes"]["syn"]["regimes"][0]["on_events"][0]["source_port"] = json!("spikeIn");
    let source = serde_json::to_string_pretty(&net).unwrap();
    let component = parse_component(&source, "net.json").unwrap();
    let err = Compiler::new().compile(&component).unwrap_err();
    assert!(err.contains(ErrorKind::UnknownPort));

    let files = SourceDiagnostics::new("net.json", &source);
    let diagnostics = files.from_model_error(&err);
    assert!(!diagnostics.is_empty());
    let rendered = files.render(&diagnostics).unwrap();
    assert!(rendered.contains("spikeIn"));
    assert!(rendered.contains("in subnode 'syn'"));
}
