use clap::Parser;
use shadow_rs::shadow;

shadow!(build);

// Command line args
#[derive(Parser)]
#[clap(version = build::CLAP_LONG_VERSION)]
#[clap(about = "Evaluation worker for the Sterta online judge.", long_about = None)]
pub struct Args {
  /// Extra config files layered over /etc/sterta/worker, later ones winning.
  #[clap(short, long, value_parser, value_name = "PATH")]
  pub config_search_path: Vec<String>,
}
