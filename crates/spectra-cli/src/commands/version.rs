use anyhow::Result;

pub fn run() -> Result<()> {
    println!("spectra {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
