//! Code generation from a flat component through minijinja templates.
//!
//! Templates see a single variable, `component`, with these fields:
//! `name`, `declarations`, `parameters`, `state_variables`, `aliases`,
//! `constants`, `analog_ports`, `event_ports` and `regimes`. Every regime
//! carries `name`, `time_derivatives` (complete, one per state variable)
//! and `transitions` (with `trigger.kind`, `trigger.on`, `target`,
//! `state_assignments` and `output_events`).

use std::path::Path;

use anyhow::Context;
use log::warn;
use minijinja::{context, Environment, Error, ErrorKind};
use serde::Serialize;
use unindent::unindent;

use super::view::{Declaration, DeclarationKind, FlatView, Transition};
use crate::ir::ast::{Alias, Constant, TimeDerivative};

#[derive(Debug, Serialize)]
struct RegimeContext {
    name: String,
    time_derivatives: Vec<TimeDerivative>,
    transitions: Vec<Transition>,
}

#[derive(Debug, Serialize)]
struct PortContext {
    name: String,
    mode: String,
}

#[derive(Debug, Serialize)]
struct ComponentContext<'a> {
    name: &'a str,
    declarations: Vec<Declaration>,
    parameters: Vec<Declaration>,
    state_variables: Vec<Declaration>,
    aliases: &'a [Alias],
    constants: &'a [Constant],
    analog_ports: Vec<PortContext>,
    event_ports: Vec<PortContext>,
    regimes: Vec<RegimeContext>,
}

impl<'a> ComponentContext<'a> {
    fn new(view: &FlatView<'a>) -> anyhow::Result<Self> {
        let declarations = view.declarations();
        let of_kind = |kind: DeclarationKind| -> Vec<Declaration> {
            declarations
                .iter()
                .filter(|d| d.kind == kind)
                .cloned()
                .collect()
        };
        let parameters = of_kind(DeclarationKind::Parameter);
        let state_variables = of_kind(DeclarationKind::StateVariable);

        let mut regimes = Vec::new();
        for name in view.regime_names() {
            regimes.push(RegimeContext {
                name: name.to_string(),
                time_derivatives: view.time_derivatives(name)?,
                transitions: view.transitions(name)?,
            });
        }
        let component = view.component();
        Ok(Self {
            name: &component.name,
            declarations,
            parameters,
            state_variables,
            aliases: &component.aliases,
            constants: &component.constants,
            analog_ports: component
                .analog_ports
                .iter()
                .map(|p| PortContext {
                    name: p.name.clone(),
                    mode: p.mode.to_string(),
                })
                .collect(),
            event_ports: component
                .event_ports
                .iter()
                .map(|p| PortContext {
                    name: p.name.clone(),
                    mode: p.mode.to_string(),
                })
                .collect(),
            regimes,
        })
    }
}

fn fail(msg: &str) -> Result<(), Error> {
    Err(Error::new(ErrorKind::InvalidOperation, msg.to_string()))
}

fn warn_from_template(msg: &str) {
    warn!("template: {}", msg);
}

/// Render `template` with the flat component in scope as `component`.
pub fn render_template(view: &FlatView, template: &str) -> anyhow::Result<String> {
    let mut env = Environment::new();
    env.add_function("panic", fail);
    env.add_function("warn", warn_from_template);
    env.add_template("template", template)
        .context("invalid template")?;
    let tmpl = env.get_template("template")?;
    let ctx = ComponentContext::new(view)?;
    let txt = tmpl
        .render(context!(component => ctx))
        .context("template rendering failed")?;
    Ok(txt)
}

pub fn render_template_file(view: &FlatView, path: impl AsRef<Path>) -> anyhow::Result<String> {
    let path = path.as_ref();
    let template = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template {}", path.display()))?;
    render_template(view, &template)
        .with_context(|| format!("failed to render template {}", path.display()))
}

/// A human-readable listing of the flat component.
pub fn summary_template() -> String {
    unindent(
        r#"
        component {{ component.name }}
        {%- for p in component.parameters %}
        parameter {{ p.name }}
        {%- endfor %}
        {%- for s in component.state_variables %}
        state {{ s.name }}
        {%- endfor %}
        {%- for a in component.aliases %}
        alias {{ a.name }} := {{ a.rhs }}
        {%- endfor %}
        {%- for port in component.analog_ports %}
        analog port {{ port.name }} ({{ port.mode }})
        {%- endfor %}
        {%- for port in component.event_ports %}
        event port {{ port.name }} ({{ port.mode }})
        {%- endfor %}
        {%- for r in component.regimes %}
        regime {{ r.name }}
        {%- for d in r.time_derivatives %}
          d{{ d.variable }}/dt = {{ d.rhs }}
        {%- endfor %}
        {%- for tr in r.transitions %}
          {% if tr.trigger.kind == "condition" %}when{% else %}on{% endif %} {{ tr.trigger.on }} -> {{ tr.target }}
          {%- for sa in tr.state_assignments %}
            {{ sa.variable }} := {{ sa.rhs }}
          {%- endfor %}
          {%- for e in tr.output_events %}
            emit {{ e }}
          {%- endfor %}
        {%- endfor %}
        {%- endfor %}
        "#,
    )
}

pub fn render_summary(view: &FlatView) -> anyhow::Result<String> {
    render_template(view, &summary_template())
}
