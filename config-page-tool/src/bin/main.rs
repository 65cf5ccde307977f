use std::path::PathBuf;

use clap::{Parser, Subcommand};
use config_page_tool::{CONFIG_PAGE_SIZE, ConfigPage, Error};

#[derive(Parser)]
#[command(name = "config-page-tool")]
#[command(about = "LED module config page generator and parser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a config page image from a CSV file
    Generate {
        /// Input CSV file path
        input: PathBuf,

        /// Output image file path
        output: PathBuf,

        /// Write the image even if the configuration does not pass validation
        #[arg(short, long)]
        force: bool,
    },
    /// Parse a config page image to a CSV file
    Parse {
        /// Input image file path
        input: PathBuf,

        /// Output CSV file path
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            output,
            force,
        } => {
            println!("Parsing CSV file: {}", input.display());
            let page = ConfigPage::from_csv_file(&input)?;

            match page.validate() {
                Ok(warnings) => warnings.iter().for_each(|w| println!("{w}")),
                Err(e) if force => println!("Ignoring {e}"),
                Err(e) => return Err(e.into()),
            }

            println!("Generating config page image...");
            page.generate_image_file(&output)?;

            println!("Successfully generated config page: {}", output.display());
            println!("Size: {} bytes", CONFIG_PAGE_SIZE);

            Ok(())
        }
        Commands::Parse { input, output } => {
            println!("Parsing image file: {}", input.display());
            let (page, statistics) = ConfigPage::parse_image_file(&input)?;
            println!(
                "Slots: {} free, {} in use, {} old, {} dirty, {} corrupt",
                statistics.free,
                statistics.in_use,
                statistics.old,
                statistics.dirty,
                statistics.corrupt
            );
            if !statistics.is_consistent() {
                println!("Warning: the page is inconsistent, using the first slot in use");
            }

            if let Err(Error::InvalidConfig(lines)) = page.validate() {
                lines.iter().for_each(|line| println!("{line}"));
            }

            println!("Writing CSV file...");
            page.to_csv_file(&output)?;

            println!("Successfully parsed config page to: {}", output.display());

            Ok(())
        }
    }
}
