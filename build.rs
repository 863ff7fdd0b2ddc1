use vergen::EmitBuilder;

// Embeds build and git metadata into the binary for `--version` output.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    EmitBuilder::builder().all_build().all_git().emit()?;
    Ok(())
}
