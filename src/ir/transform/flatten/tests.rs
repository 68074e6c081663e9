use super::*;
use crate::ir::ast::{AnalogPort, EventPort, OnCondition, OnEvent, ReduceOp, Regime};
use crate::ir::builder::ComponentBuilder;
use crate::ir::error::ErrorKind;

fn expr(s: &str) -> Expr {
    Expr::parse(s).unwrap()
}

fn ctx() -> CompileContext {
    CompileContext::default()
}

/// Two regimes, one analog input and the state exposed as output.
fn switch() -> Component {
    ComponentBuilder::new("Switch")
        .analog_port(AnalogPort::receive("cIn1"))
        .analog_port(AnalogPort::send("x"))
        .regime(
            Regime::new("r1")
                .with_time_derivative("x", expr("-x + cIn1"))
                .with_on_condition(OnCondition::new(expr("x > 1")).to_regime("r2")),
        )
        .regime(
            Regime::new("r2")
                .with_time_derivative("x", expr("1"))
                .with_on_condition(OnCondition::new(expr("x < 0")).to_regime("r1")),
        )
        .build()
        .unwrap()
}

fn component_b() -> Component {
    ComponentBuilder::new("B")
        .subnode("c1", &switch())
        .subnode("c2", &switch())
        .subnode("d", &switch())
        .connect("c1.x", "c2.cIn1")
        .build()
        .unwrap()
}

fn component_a() -> Component {
    ComponentBuilder::new("A")
        .subnode("b", &component_b())
        .subnode("e", &switch())
        .connect("e.x", "b.c1.cIn1")
        .build()
        .unwrap()
}

fn names<'a, T>(items: &'a [T], name: impl Fn(&'a T) -> &'a str) -> Vec<&'a str> {
    items.iter().map(name).collect()
}

#[test]
fn test_regime_product_size_and_names() {
    let flat = flatten(&component_b(), &ctx()).unwrap();
    assert!(flat.is_flat());
    assert_eq!(flat.regimes.len(), 8);
    assert_eq!(flat.regimes[0].name, "c1:r1|c2:r1|d:r1");
    assert_eq!(flat.regimes[7].name, "c1:r2|c2:r2|d:r2");

    let flat = flatten(&component_a(), &ctx()).unwrap();
    assert_eq!(flat.regimes.len(), 16);
    assert_eq!(flat.regimes[0].name, "b.c1:r1|b.c2:r1|b.d:r1|e:r1");
}

#[test]
fn test_namespaced_declarations_and_ports() {
    let flat = flatten(&component_a(), &ctx()).unwrap();
    assert_eq!(
        names(&flat.state_variables, |s| s.name.as_str()),
        vec!["b_c1_x", "b_c2_x", "b_d_x", "e_x"]
    );
    // b.c1.cIn1 is driven from e.x and b.c2.cIn1 from b.c1.x.
    assert_eq!(
        names(&flat.analog_ports, |p| p.name.as_str()),
        vec!["b_c1_x", "b_c2_x", "b_d_cIn1", "b_d_x", "e_cIn1", "e_x"]
    );

    let first = &flat.regimes[0];
    let rhs = |variable: &str| first.time_derivative(variable).unwrap().rhs.clone();
    assert_eq!(rhs("b_c1_x"), expr("-b_c1_x + e_x"));
    assert_eq!(rhs("b_c2_x"), expr("-b_c2_x + b_c1_x"));
    assert_eq!(rhs("b_d_x"), expr("-b_d_x + b_d_cIn1"));
}

#[test]
fn test_sibling_isolation() {
    let flat = flatten(&component_a(), &ctx()).unwrap();
    let first = &flat.regimes[0];
    assert_eq!(first.on_conditions.len(), 4);

    let c1 = first
        .on_conditions
        .iter()
        .find(|oc| oc.trigger == expr("b_c1_x > 1"))
        .unwrap();
    assert_eq!(
        c1.target_regime.as_deref(),
        Some("b.c1:r2|b.c2:r1|b.d:r1|e:r1")
    );
    let e = first
        .on_conditions
        .iter()
        .find(|oc| oc.trigger == expr("e_x > 1"))
        .unwrap();
    assert_eq!(
        e.target_regime.as_deref(),
        Some("b.c1:r1|b.c2:r1|b.d:r1|e:r2")
    );
}

#[test]
fn test_flatten_is_idempotent() {
    let once = flatten(&component_a(), &ctx()).unwrap();
    let twice = flatten(&once, &ctx()).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_zero_subnodes_is_identity() {
    let leaf = switch();
    assert_eq!(flatten(&leaf, &ctx()).unwrap(), leaf);
}

#[test]
fn test_round_trip_through_json() {
    let flat = flatten(&component_a(), &ctx()).unwrap();
    let json = serde_json::to_string(&flat).unwrap();
    let restored: Component = serde_json::from_str(&json).unwrap();
    assert_eq!(flatten(&restored, &ctx()).unwrap(), flat);
}

#[test]
fn test_deterministic_across_threads() {
    let parallel = flatten(&component_a(), &ctx().with_parallel(true)).unwrap();
    let sequential = flatten(&component_a(), &ctx().with_parallel(false)).unwrap();
    assert_eq!(fingerprint(&parallel), fingerprint(&sequential));
    let again = flatten(&component_a(), &ctx()).unwrap();
    assert_eq!(fingerprint(&parallel), fingerprint(&again));
}

#[test]
fn test_regime_explosion() {
    let err = flatten(&component_b(), &ctx().with_max_regimes(7)).unwrap_err();
    match err {
        ModelError::RegimeExplosion { count, limit } => {
            assert_eq!(count, 8);
            assert_eq!(limit, 7);
        }
        other => panic!("unexpected error {:?}", other),
    }

    // Raised while merging subnode b, so it carries that address.
    let err = flatten(&component_a(), &ctx().with_max_regimes(7)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RegimeExplosion);
    assert!(matches!(
        &err,
        ModelError::InSubnode { address, .. } if address.to_string() == "b"
    ));
}

fn synapse_target() -> Component {
    ComponentBuilder::new("Cell")
        .analog_port(AnalogPort::reduce("I_syn", ReduceOp::Add))
        .analog_port(AnalogPort::reduce("gain", ReduceOp::Mul))
        .analog_port(AnalogPort::send("V"))
        .regime(Regime::new("r").with_time_derivative("V", expr("-V + I_syn * gain")))
        .build()
        .unwrap()
}

fn source() -> Component {
    ComponentBuilder::new("Source")
        .alias("out", "amplitude * sin(t)")
        .analog_port(AnalogPort::send("out"))
        .build()
        .unwrap()
}

#[test]
fn test_unconnected_reduce_ports_are_sealed() {
    let net = ComponentBuilder::new("Net")
        .subnode("n", &synapse_target())
        .build()
        .unwrap();
    let flat = flatten(&net, &ctx()).unwrap();
    assert_eq!(names(&flat.analog_ports, |p| p.name.as_str()), vec!["n_V"]);
    assert_eq!(flat.regimes[0].time_derivatives[0].rhs, expr("-n_V"));
}

#[test]
fn test_reduce_ports_fold_across_levels() {
    let inner = ComponentBuilder::new("Inner")
        .subnode("src", &source())
        .subnode("cell", &synapse_target())
        .connect("src.out", "cell.I_syn")
        .build()
        .unwrap();
    let outer = ComponentBuilder::new("Outer")
        .subnode("b", &inner)
        .subnode("other", &source())
        .connect("other.out", "b.cell.I_syn")
        .build()
        .unwrap();

    // Flattened on its own, the inner component seals the port.
    let inner_flat = flatten(&inner, &ctx()).unwrap();
    assert_eq!(
        inner_flat.regimes[0].time_derivatives[0].rhs,
        expr("-cell_V + src_out")
    );

    let flat = flatten(&outer, &ctx()).unwrap();
    assert_eq!(
        flat.regimes[0].time_derivatives[0].rhs,
        expr("-b_cell_V + (b_src_out + other_out)")
    );
    assert!(flat.analog_port("b_cell_I_syn").is_none());
    assert!(flat.analog_port("b_cell_gain").is_none());
}

#[test]
fn test_outermost_reduce_port_stays_open() {
    let net = ComponentBuilder::new("Net")
        .analog_port(AnalogPort::reduce("I_ext", ReduceOp::Add))
        .alias("total", "I_ext")
        .analog_port(AnalogPort::send("total"))
        .subnode("src", &source())
        .connect("src.out", "I_ext")
        .build()
        .unwrap();
    let flat = flatten(&net, &ctx()).unwrap();
    assert!(flat.analog_port("I_ext").is_some());
    assert_eq!(flat.alias("total").unwrap().rhs, expr("src_out + I_ext"));
}

fn pulse() -> Component {
    ComponentBuilder::new("Pulse")
        .event_port(EventPort::send("spike"))
        .regime(
            Regime::new("idle")
                .with_time_derivative("x", expr("1"))
                .with_on_condition(
                    OnCondition::new(expr("x > 1"))
                        .assign("x", expr("0"))
                        .emit("spike"),
                ),
        )
        .build()
        .unwrap()
}

fn counter() -> Component {
    ComponentBuilder::new("Counter")
        .event_port(EventPort::receive("kick"))
        .event_port(EventPort::send("overflow"))
        .regime(
            Regime::new("low").with_on_event(
                OnEvent::new("kick")
                    .assign("n", expr("n + 1"))
                    .to_regime("high"),
            ),
        )
        .regime(
            Regime::new("high").with_on_event(
                OnEvent::new("kick")
                    .assign("n", expr("0"))
                    .emit("overflow")
                    .to_regime("low"),
            ),
        )
        .build()
        .unwrap()
}

#[test]
fn test_event_daisy_chaining() {
    let net = ComponentBuilder::new("Net")
        .subnode("p", &pulse())
        .subnode("c", &counter())
        .connect("p.spike", "c.kick")
        .build()
        .unwrap();
    let flat = flatten(&net, &ctx()).unwrap();

    assert_eq!(
        names(&flat.regimes, |r| r.name.as_str()),
        vec!["c:low|p:idle", "c:high|p:idle"]
    );
    assert_eq!(
        names(&flat.event_ports, |p| p.name.as_str()),
        vec!["p_spike", "c_overflow"]
    );

    let low = &flat.regimes[0];
    assert!(low.on_events.is_empty());
    let oc = &low.on_conditions[0];
    assert_eq!(oc.target_regime.as_deref(), Some("c:high|p:idle"));
    assert_eq!(
        names(&oc.state_assignments, |sa| sa.variable.as_str()),
        vec!["p_x", "c_n"]
    );
    assert_eq!(oc.state_assignments[1].rhs, expr("c_n + 1"));

    let high = &flat.regimes[1];
    let oc = &high.on_conditions[0];
    assert_eq!(oc.target_regime.as_deref(), Some("c:low|p:idle"));
    assert_eq!(
        names(&oc.output_events, |e| e.port.as_str()),
        vec!["p_spike", "c_overflow"]
    );
}

#[test]
fn test_unconnected_event_port_stays_open() {
    let net = ComponentBuilder::new("Net")
        .subnode("p", &pulse())
        .subnode("c", &counter())
        .build()
        .unwrap();
    let flat = flatten(&net, &ctx()).unwrap();
    let low = &flat.regimes[0];
    assert_eq!(low.on_events.len(), 1);
    assert_eq!(low.on_events[0].source_port, "c_kick");
    assert_eq!(
        low.on_events[0].target_regime.as_deref(),
        Some("c:high|p:idle")
    );
    // The pulse keeps its own transition without a target.
    assert_eq!(low.on_conditions[0].target_regime, None);
    assert_eq!(low.on_conditions[0].output_events[0].port, "p_spike");
}

#[test]
fn test_no_regimes_when_no_constituent_has_any() {
    let net = ComponentBuilder::new("Net")
        .subnode("a", &source())
        .subnode("b", &source())
        .build()
        .unwrap();
    let flat = flatten(&net, &ctx()).unwrap();
    assert!(flat.regimes.is_empty());
    assert_eq!(
        names(&flat.parameters, |p| p.name.as_str()),
        vec!["a_amplitude", "b_amplitude"]
    );
}

#[test]
fn test_parent_regimes_join_the_product() {
    let net = ComponentBuilder::new("Net")
        .regime(Regime::new("on").with_time_derivative("z", expr("-z")))
        .subnode("s", &switch())
        .build()
        .unwrap();
    let flat = flatten(&net, &ctx()).unwrap();
    assert_eq!(
        names(&flat.regimes, |r| r.name.as_str()),
        vec!["on|s:r1", "on|s:r2"]
    );
    assert_eq!(flat.regimes[0].time_derivatives.len(), 2);
}

#[test]
fn test_invalid_input_is_rejected() {
    let mut net = component_b();
    net.connect("d.x", "c2.cIn1");
    let err = flatten(&net, &ctx()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(err.contains(ErrorKind::IllegalPortConnection));
}

fn pair(wired: bool) -> Component {
    let mut builder = ComponentBuilder::new("Pair")
        .subnode("s", &pulse())
        .subnode("k", &counter());
    if wired {
        builder = builder.connect("s.spike", "k.kick");
    }
    builder.build().unwrap()
}

#[test]
fn test_event_connection_inside_one_subnode() {
    let deep = ComponentBuilder::new("Net")
        .subnode("b", &pair(false))
        .connect("b.s.spike", "b.k.kick")
        .build()
        .unwrap();
    let local = ComponentBuilder::new("Net")
        .subnode("b", &pair(true))
        .build()
        .unwrap();
    let flat = flatten(&deep, &ctx()).unwrap();
    assert_eq!(flat, flatten(&local, &ctx()).unwrap());

    let low = &flat.regimes[0];
    assert_eq!(low.name, "b.k:low|b.s:idle");
    assert!(low.on_events.is_empty());
    let oc = &low.on_conditions[0];
    assert_eq!(
        names(&oc.state_assignments, |sa| sa.variable.as_str()),
        vec!["b_s_x", "b_k_n"]
    );
    assert_eq!(oc.target_regime.as_deref(), Some("b.k:high|b.s:idle"));
}

#[test]
fn test_event_connection_into_nested_subnode() {
    let net = ComponentBuilder::new("Net")
        .subnode("p", &pulse())
        .subnode("b", &pair(false))
        .connect("p.spike", "b.k.kick")
        .build()
        .unwrap();
    let flat = flatten(&net, &ctx()).unwrap();
    assert_eq!(
        names(&flat.event_ports, |p| p.name.as_str()),
        vec!["p_spike", "b_s_spike", "b_k_overflow"]
    );

    let first = &flat.regimes[0];
    assert_eq!(first.name, "b.k:low|b.s:idle|p:idle");
    assert!(first.on_events.is_empty());
    let oc = first
        .on_conditions
        .iter()
        .find(|oc| oc.trigger == expr("p_x > 1"))
        .unwrap();
    assert_eq!(
        names(&oc.state_assignments, |sa| sa.variable.as_str()),
        vec!["p_x", "b_k_n"]
    );
    assert_eq!(oc.target_regime.as_deref(), Some("b.k:high|b.s:idle|p:idle"));
    let own = first
        .on_conditions
        .iter()
        .find(|oc| oc.trigger == expr("b_s_x > 1"))
        .unwrap();
    assert_eq!(own.target_regime, None);
}

#[test]
fn test_structured_regime_names_are_rejected() {
    let mut child = Component::new("C");
    child.regimes.push(Regime::new("r"));
    child.regimes.push(Regime::new("s"));
    let mut net = Component::new("Net");
    net.regimes.push(Regime::new("c:r"));
    net.regimes.push(Regime::new("c:s"));
    net.insert_subnode("c", &child);

    let err = flatten(&net, &ctx()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(err.contains(ErrorKind::InvalidRegimeName));
    assert!(!err.contains(ErrorKind::InternalFlatteningInvariantViolation));

    // Plain names combine into distinct regimes.
    net.regimes[0].name = "on".to_string();
    net.regimes[1].name = "off".to_string();
    let flat = flatten(&net, &ctx()).unwrap();
    assert_eq!(
        names(&flat.regimes, |r| r.name.as_str()),
        vec!["c:r|on", "c:s|on", "c:r|off", "c:s|off"]
    );
}

#[test]
fn test_invalid_output_is_an_internal_error() {
    let flat = flatten(&component_b(), &ctx()).unwrap();
    assert!(check_flattened("B", &flat, &ctx()).is_ok());

    let mut broken = flat.clone();
    let copy = broken.regimes[0].clone();
    broken.regimes.push(copy);
    let err = check_flattened("B", &broken, &ctx()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalFlatteningInvariantViolation);
    assert!(err.contains(ErrorKind::DuplicateName));
    assert!(!err.contains(ErrorKind::ValidationFailed));
}
