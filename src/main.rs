//! Binary entry point: parse flags, set up logging, load the two files, and
//! hand the library to whichever front-end was asked for.
use std::io;

use anyhow::Result;
use clap::Parser;
use city_library::config::Cli;
use city_library::{run_app, App, Console, Library};

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging()?;

    let (library, report) = Library::open(cli.store());

    if cli.tui {
        let mut app = App::new(library);
        app.show_load_report(&report);
        run_app(&mut app)?;
        match app.into_library().save() {
            Ok(()) => println!("Exiting. Data saved. Thank you!"),
            Err(err) => println!("Exiting. Data could not be saved: {err:#}"),
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut console = Console::new(library, stdin.lock(), stdout.lock());
    console.print_load_report(&report)?;
    console.run()
}
