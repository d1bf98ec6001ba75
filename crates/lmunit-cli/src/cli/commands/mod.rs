use super::args::*;
use crate::dataset::UnitTestCatalog;
use crate::exit_codes::SUCCESS;

pub(crate) mod run;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => run::run(args).await,
        Command::Catalog => {
            println!(
                "{}",
                serde_json::to_string_pretty(&UnitTestCatalog::reward_bench())?
            );
            Ok(SUCCESS)
        }
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
