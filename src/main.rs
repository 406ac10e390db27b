use clap::{App, Arg};
use lc3_vm::{Config, Outcome};
use std::process;

fn main() {
    let matches = App::new("LC-3 VM")
        .arg(
            Arg::with_name("IMAGE")
                .help("One or more LC-3 object files to load.")
                .multiple(true)
                .index(1),
        )
        .get_matches();

    let image_paths: Vec<String> = matches
        .values_of("IMAGE")
        .map(|values| values.map(String::from).collect())
        .unwrap_or_default();

    let config = Config::with(image_paths).unwrap_or_else(|_| {
        eprintln!("usage: lc3 <image-file1> [<image-file2> ...]");
        process::exit(2);
    });

    match lc3_vm::run(config) {
        Ok(Outcome::Halted) => process::exit(0),
        Ok(Outcome::Interrupted) => {
            println!();
            process::exit(130);
        }
        Err(e) => {
            eprintln!("lc3: {}", e);
            process::exit(1);
        }
    }
}
