fn main() -> anyhow::Result<()> {
    poiscout::run_cli()
}
