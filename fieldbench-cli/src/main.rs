use anyhow::Result;

fn main() -> Result<()> {
    fieldbench_cli::cli::execute()
}
