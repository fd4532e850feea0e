//! bgstrip command-line tool

#[cfg(feature = "cli")]
use bgstrip::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("bgstrip was built without the `cli` feature; rebuild with --features cli");
    std::process::exit(2);
}
