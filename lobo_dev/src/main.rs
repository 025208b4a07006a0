use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result, bail};
use lobo_expr::{FnContext, evaluate_source};
use lobo_variant::{Value, ValueType};
use lobo_vars::{
    ContainerHandle, ContainerResolver, EmptyRegistry, ExpressionStrategy, NodePath,
    NodeVarContainer, NodeVarData, NodeVarOperation, NodeVarReference, NodeVarStrategy,
    PointerStrategy, ValueStrategy,
};

fn main() -> Result<()> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let Some(command) = args.get(1).map(String::as_str) else {
        print_usage();
        std::process::exit(2);
    };

    match command {
        "eval" => eval_command(&args[2..]),
        "demo" => demo_command(),
        _ => {
            print_usage();
            bail!("unknown command `{command}`")
        }
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  lobo_dev eval \"<expression>\" [--var name=<json>]...");
    eprintln!("  lobo_dev demo    # wire up a small container tree and print it");
}

/// Evaluates an expression from the command line, with optional variables
/// given as JSON values (e.g. `--var health=50`).
fn eval_command(args: &[String]) -> Result<()> {
    let mut expression = None;
    let mut vars: HashMap<String, Value> = HashMap::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--var" {
            let binding = iter.next().context("--var expects name=<json>")?;
            let (name, raw) = binding
                .split_once('=')
                .context("--var expects name=<json>")?;
            let json: serde_json::Value =
                serde_json::from_str(raw).with_context(|| format!("`{raw}` is not valid JSON"))?;
            let value = Value::from_json(&json)
                .with_context(|| format!("`{raw}` is not a supported value"))?;
            vars.insert(name.to_string(), value);
        } else if expression.is_none() {
            expression = Some(arg.clone());
        } else {
            bail!("unexpected argument `{arg}`");
        }
    }
    let expression = expression.context("missing expression")?;

    let lookup = |name: &str| vars.get(name).cloned();
    let ctx = FnContext {
        variables: Some(&lookup),
        functions: None,
    };
    let value = evaluate_source(&expression, &ctx)?;
    println!("{value}");
    Ok(())
}

struct DemoTree {
    containers: HashMap<String, ContainerHandle>,
}

impl DemoTree {
    fn add(&mut self, container: NodeVarContainer) -> ContainerHandle {
        let path = container.path().as_str().to_string();
        let handle = container.into_handle();
        self.containers.insert(path, handle.clone());
        handle
    }
}

impl ContainerResolver for DemoTree {
    fn resolve(&self, _from: &NodePath, path: &NodePath) -> Option<ContainerHandle> {
        self.containers.get(path.as_str()).cloned()
    }
}

/// Builds a tiny scene: a player with stored values, and a HUD that mirrors
/// them through a pointer and an expression.
fn demo_command() -> Result<()> {
    let mut tree = DemoTree {
        containers: HashMap::new(),
    };

    tree.add(
        NodeVarContainer::new("/root/Player")
            .declare("health", ValueType::Int, NodeVarOperation::GetSet)
            .declare_var(NodeVarData::new(
                "max_health",
                NodeVarOperation::Get,
                NodeVarStrategy::Value(ValueStrategy::new(Some(Value::Int(100)))),
            )),
    );
    let hud = tree.add(
        NodeVarContainer::new("/root/Hud")
            .with_function("percent", |args| {
                Some(Value::Int(args[0].as_int()? * 100 / args[1].as_int()?))
            })
            .declare_var(NodeVarData::new(
                "health",
                NodeVarOperation::Get,
                NodeVarStrategy::Pointer(PointerStrategy::new("/root/Player", "health")),
            ))
            .declare_var(NodeVarData::new(
                "health_percent",
                NodeVarOperation::Get,
                NodeVarStrategy::Expression(
                    ExpressionStrategy::new("percent(hp, max)")
                        .with_reference(NodeVarReference::aliased("hp", "/root/Player", "health"))
                        .with_reference(NodeVarReference::aliased(
                            "max",
                            "/root/Player",
                            "max_health",
                        )),
                ),
            )),
    );

    for handle in tree.containers.values() {
        NodeVarContainer::ready(handle, &tree, &EmptyRegistry);
    }
    log::info!("readied {} containers", tree.containers.len());

    tree.containers["/root/Player"]
        .borrow()
        .set_node_var("health", Value::Int(72))
        .context("setting player health")?;

    let hud = hud.borrow();
    for var in hud.node_vars() {
        match var.get_value(true) {
            Ok(value) => println!("{} = {value}", var.name),
            Err(err) => println!("{} = <{err}>", var.name),
        }
    }
    Ok(())
}
