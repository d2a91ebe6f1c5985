use crate::output::print_json;
use whattime_server::ROUTES;

/// Print every route the server registers, one per line:
/// `<name> <methods> <path>`.
pub fn run(json: bool) -> anyhow::Result<()> {
    if json {
        let routes: Vec<serde_json::Value> = ROUTES
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.name,
                    "methods": r.methods,
                    "path": r.path,
                })
            })
            .collect();
        return print_json(&routes);
    }
    for route in ROUTES {
        println!("{route}");
    }
    Ok(())
}
