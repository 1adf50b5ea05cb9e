use anyhow::{Context, Result};
use segue_discover::sources::ElementKind;
use segue_discover::{Clients, Config};

/// Resolve an id, URI or link to a catalog element and print it.
pub async fn run_describe(config: &Config, input: &str, kind: Option<ElementKind>) -> Result<()> {
    let clients = Clients::from_config(config)?;
    let (link_kind, id) = ElementKind::parse_link(input);

    match clients
        .spotify
        .describe(&id, kind.or(link_kind))
        .await
        .context("Lookup failed")?
    {
        Some(element) => println!("{element}"),
        None => println!("Nothing found for {id}"),
    }

    Ok(())
}
