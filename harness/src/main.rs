use query_harness_runner::prelude::*;

fn main() -> HarnessResult<()> {
    let cli = init();

    run(cli)?;

    Ok(())
}
