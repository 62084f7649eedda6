use vergen_gitcl::{Emitter, GitclBuilder};

// Exposes VERGEN_GIT_SHA to the health endpoint.
fn main() -> anyhow::Result<()> {
    let gitcl = GitclBuilder::default().sha(true).build()?;
    Emitter::default().add_instructions(&gitcl)?.emit()?;

    Ok(())
}
