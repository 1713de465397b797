use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "tessera", about = "Token-pair session service")]
pub struct Cli {
    /// Settings TOML; defaults to the build profile's file under settings/.
    #[arg(long)]
    pub settings: Option<String>,
}
