fn main() -> anyhow::Result<()> {
    portgen_lib::run()
}
