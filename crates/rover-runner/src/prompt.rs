use dialoguer::Select;

const RUN_NORMAL: &str = "Run in Normal Mode";
const RUN_DEBUG: &str = "Run in Debug Mode";

/// Ask whether a local subgraph should start under the debugger.
pub fn choose_debug() -> anyhow::Result<bool> {
    let items = &[RUN_NORMAL, RUN_DEBUG];
    let selection = Select::new()
        .with_prompt("How should the subgraph run?")
        .items(items)
        .default(0)
        .interact()?;
    Ok(items[selection] == RUN_DEBUG)
}
