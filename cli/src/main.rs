use clap::Parser;
use facet_cli::FacetCli;

fn main() -> anyhow::Result<()> {
    facet_cli::init_logging();
    FacetCli::parse().run()
}
