use anyhow::Result;

fn main() -> Result<()> {
    drizzle::cli::run()
}
